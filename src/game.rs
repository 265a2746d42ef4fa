use crate::error::{Error, Result};
use crate::grid::{Action, Grid, Position};
use crate::replay::{ReplayLog, ReplayRecord};
use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Every game and every agent set draws from an explicitly seeded generator.
pub type GameRng = SmallRng;

pub const DEFAULT_PILL_DENSITY: f64 = 0.1;
pub const DEFAULT_FRUIT_PROBABILITY: f64 = 0.2;
pub const DEFAULT_FRUIT_SCORE: u32 = 10;
pub const DEFAULT_TIME_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_NUM_PURSUERS: usize = 3;
pub const DEFAULT_NUM_PURSUED: usize = 1;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum PlayerKey {
    Pursued(usize),
    Pursuer(usize),
}

impl PlayerKey {
    pub fn is_pursued(self) -> bool {
        matches!(self, PlayerKey::Pursued(_))
    }
}

// The first pursued player is `m`, the rest `m0`, `m1`, ...; pursuers are
// their bare index.
impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerKey::Pursued(0) => write!(f, "m"),
            PlayerKey::Pursued(i) => write!(f, "m{}", i - 1),
            PlayerKey::Pursuer(i) => write!(f, "{}", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PillPlacement {
    /// Each eligible cell holds a pill with probability `pill_density`;
    /// at least one pill is always placed.
    #[default]
    Stochastic,
    /// Every `round(1 / pill_density)`-th eligible cell in row-major order.
    Linear,
    /// As `Linear`, with cells ordered by distance from the origin first.
    Manhattan,
    /// An explicit layout, reused on every reset.
    Fixed(Vec<Position>),
}

impl FromStr for PillPlacement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stochastic" => Ok(PillPlacement::Stochastic),
            "linear" => Ok(PillPlacement::Linear),
            "manhattan" => Ok(PillPlacement::Manhattan),
            _ => Err(Error::UnknownPillPlacement(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub pill_density: f64,
    pub fruit_probability: f64,
    pub fruit_score: u32,
    pub time_multiplier: f64,
    pub num_pursuers: usize,
    /// Values below one are treated as one.
    pub num_pursued: usize,
    pub pill_placement: PillPlacement,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            pill_density: DEFAULT_PILL_DENSITY,
            fruit_probability: DEFAULT_FRUIT_PROBABILITY,
            fruit_score: DEFAULT_FRUIT_SCORE,
            time_multiplier: DEFAULT_TIME_MULTIPLIER,
            num_pursuers: DEFAULT_NUM_PURSUERS,
            num_pursued: DEFAULT_NUM_PURSUED,
            pill_placement: PillPlacement::Stochastic,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GameState {
    Active,
    Over,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct Players {
    pursued: Vec<Position>,
    pursuers: Vec<Position>,
}

impl Players {
    fn get(&self, key: PlayerKey) -> Option<Position> {
        match key {
            PlayerKey::Pursued(i) => self.pursued.get(i).copied(),
            PlayerKey::Pursuer(i) => self.pursuers.get(i).copied(),
        }
    }

    fn set(&mut self, key: PlayerKey, pos: Position) {
        let slot = match key {
            PlayerKey::Pursued(i) => self.pursued.get_mut(i),
            PlayerKey::Pursuer(i) => self.pursuers.get_mut(i),
        };
        if let Some(slot) = slot {
            *slot = pos;
        }
    }

    fn iter(&self) -> impl Iterator<Item = (PlayerKey, Position)> + '_ {
        let pursued = self
            .pursued
            .iter()
            .enumerate()
            .map(|(i, p)| (PlayerKey::Pursued(i), *p));
        let pursuers = self
            .pursuers
            .iter()
            .enumerate()
            .map(|(i, p)| (PlayerKey::Pursuer(i), *p));
        pursued.chain(pursuers)
    }
}

/// What the world would look like if `player` took one candidate action.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Observation {
    pub action: Action,
    pub pills: BTreeSet<Position>,
    pub fruit: Option<Position>,
    pub players: Vec<(PlayerKey, Position)>,
}

#[derive(Debug, Clone)]
pub struct Game {
    grid: Grid,
    config: GameConfig,
    rng: GameRng,
    players: Players,
    pills: BTreeSet<Position>,
    initial_pills: usize,
    pills_consumed: usize,
    fruit: Option<Position>,
    fruit_consumed: usize,
    initial_time: u32,
    time: u32,
    score: u32,
    bonus: u32,
    state: GameState,
    graveyard: BTreeSet<usize>,
    registered: BTreeMap<PlayerKey, Action>,
    legal_cache: RefCell<HashMap<PlayerKey, Vec<Action>>>,
    log: ReplayLog,
}

impl Game {
    pub fn create(grid: Grid, config: GameConfig, seed: u64) -> Result<Self> {
        Self::create_with_rng(grid, config, GameRng::seed_from_u64(seed))
    }

    pub fn create_with_rng(grid: Grid, config: GameConfig, rng: GameRng) -> Result<Self> {
        let num_pursued = config.num_pursued.max(1);
        let players = Players {
            pursued: vec![grid.pursued_spawn(); num_pursued],
            pursuers: vec![grid.pursuer_spawn(); config.num_pursuers],
        };

        let mut game = Self {
            grid,
            config,
            rng,
            players,
            pills: BTreeSet::new(),
            initial_pills: 0,
            pills_consumed: 0,
            fruit: None,
            fruit_consumed: 0,
            initial_time: 0,
            time: 0,
            score: 0,
            bonus: 0,
            state: GameState::Active,
            graveyard: BTreeSet::new(),
            registered: BTreeMap::new(),
            legal_cache: RefCell::new(HashMap::new()),
            log: ReplayLog::new(),
        };
        game.reset()?;
        Ok(game)
    }

    /// Starts a fresh game on the same map and configuration: players back
    /// on their spawns, a new pill layout, full clock, new replay log.
    pub fn reset(&mut self) -> Result<()> {
        let pursued_spawn = self.grid.pursued_spawn();
        let pursuer_spawn = self.grid.pursuer_spawn();
        self.players.pursued.fill(pursued_spawn);
        self.players.pursuers.fill(pursuer_spawn);

        self.pills = self.place_pills()?;
        self.initial_pills = self.pills.len();
        self.pills_consumed = 0;
        self.fruit = None;
        self.fruit_consumed = 0;

        let cells = (self.grid.width() * self.grid.height()) as f64;
        self.initial_time = (cells * self.config.time_multiplier).floor() as u32;
        self.time = self.initial_time;
        self.score = 0;
        self.bonus = 0;
        self.state = GameState::Active;
        self.graveyard.clear();
        self.registered.clear();
        self.legal_cache.borrow_mut().clear();

        self.log = ReplayLog::new();
        self.log.push(ReplayRecord::Width(self.grid.width()));
        self.log.push(ReplayRecord::Height(self.grid.height()));
        for (key, at) in self.players.iter() {
            self.log.push(ReplayRecord::Player { key, at });
        }
        for wall in self.grid.walls() {
            self.log.push(ReplayRecord::Wall(wall));
        }
        for pill in &self.pills {
            self.log.push(ReplayRecord::Pill(*pill));
        }
        self.log.push(ReplayRecord::Time {
            remaining: self.time,
            score: self.score,
        });

        debug!(
            "new {}x{} game: {} pills, {} ticks",
            self.grid.width(),
            self.grid.height(),
            self.initial_pills,
            self.initial_time
        );
        Ok(())
    }

    fn place_pills(&mut self) -> Result<BTreeSet<Position>> {
        let spawns = [self.grid.pursued_spawn(), self.grid.pursuer_spawn()];
        let eligible: Vec<Position> = self
            .grid
            .open_cells()
            .filter(|p| !spawns.contains(p))
            .collect();
        let density = self.config.pill_density;

        let pills = match &self.config.pill_placement {
            PillPlacement::Stochastic => {
                let mut pills: BTreeSet<Position> = eligible
                    .iter()
                    .copied()
                    .filter(|_| self.rng.gen::<f64>() < density)
                    .collect();
                if pills.is_empty() {
                    let pick = eligible
                        .choose(&mut self.rng)
                        .ok_or(Error::NoPillLocations)?;
                    pills.insert(*pick);
                }
                pills
            }
            PillPlacement::Linear | PillPlacement::Manhattan => {
                if eligible.is_empty() {
                    return Err(Error::NoPillLocations);
                }
                let mut ordered = eligible;
                if self.config.pill_placement == PillPlacement::Manhattan {
                    ordered.sort_by_key(|p| p.x + p.y);
                }
                let every = ((1.0 / density).round() as usize).max(1);
                ordered.into_iter().step_by(every).collect()
            }
            PillPlacement::Fixed(layout) => {
                if layout.is_empty() {
                    return Err(Error::NoPillLocations);
                }
                layout
                    .iter()
                    .map(|p| {
                        if eligible.contains(p) {
                            Ok(*p)
                        } else {
                            Err(Error::InvalidPill(*p))
                        }
                    })
                    .collect::<Result<BTreeSet<_>>>()?
            }
        };

        Ok(pills)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_over(&self) -> bool {
        self.state == GameState::Over
    }

    pub fn position(&self, key: PlayerKey) -> Option<Position> {
        self.players.get(key)
    }

    /// All players, pursued first.
    pub fn players(&self) -> impl Iterator<Item = (PlayerKey, Position)> + '_ {
        self.players.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = PlayerKey> + '_ {
        self.players.iter().map(|(k, _)| k)
    }

    pub fn pursuer_positions(&self) -> &[Position] {
        &self.players.pursuers
    }

    /// Pursued players that have not been caught.
    pub fn active_pursued(&self) -> impl Iterator<Item = (PlayerKey, Position)> + '_ {
        self.players
            .pursued
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.graveyard.contains(i))
            .map(|(i, p)| (PlayerKey::Pursued(i), *p))
    }

    pub fn is_caught(&self, key: PlayerKey) -> bool {
        match key {
            PlayerKey::Pursued(i) => self.graveyard.contains(&i),
            PlayerKey::Pursuer(_) => false,
        }
    }

    pub fn caught(&self) -> impl Iterator<Item = PlayerKey> + '_ {
        self.graveyard.iter().map(|i| PlayerKey::Pursued(*i))
    }

    pub fn pills(&self) -> &BTreeSet<Position> {
        &self.pills
    }

    pub fn initial_pill_count(&self) -> usize {
        self.initial_pills
    }

    pub fn pills_consumed(&self) -> usize {
        self.pills_consumed
    }

    pub fn fruit(&self) -> Option<Position> {
        self.fruit
    }

    pub fn fruit_consumed(&self) -> usize {
        self.fruit_consumed
    }

    pub fn time(&self) -> u32 {
        self.time
    }

    pub fn initial_time(&self) -> u32 {
        self.initial_time
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn bonus(&self) -> u32 {
        self.bonus
    }

    /// The pill share of the score, without fruit or time bonuses.
    pub fn pill_percentage(&self) -> u32 {
        pill_percentage(self.pills_consumed, self.pills.len())
    }

    pub fn log(&self) -> &ReplayLog {
        &self.log
    }

    /// Legal actions for `key` from where it stands now. Cached until the
    /// next tick. Unknown players have none.
    pub fn legal_actions(&self, key: PlayerKey) -> Vec<Action> {
        if let Some(cached) = self.legal_cache.borrow().get(&key) {
            return cached.clone();
        }

        let Some(pos) = self.players.get(key) else {
            return vec![];
        };

        let mut actions = vec![];
        if key.is_pursued() {
            actions.push(Action::Hold);
        }
        actions.extend(
            Action::MOVES
                .into_iter()
                .filter(|a| self.grid.apply(pos, *a).is_some()),
        );

        self.legal_cache.borrow_mut().insert(key, actions.clone());
        actions
    }

    /// Queues `action` for the next tick. Actions for caught players are
    /// accepted and ignored.
    pub fn register_action(&mut self, key: PlayerKey, action: Action) -> Result<()> {
        if self.is_over() {
            return Err(Error::GameOver);
        }
        if self.players.get(key).is_none() {
            return Err(Error::UnknownPlayer(key));
        }
        if self.is_caught(key) {
            return Ok(());
        }
        if !self.legal_actions(key).contains(&action) {
            return Err(Error::IllegalAction {
                player: key,
                action,
            });
        }

        self.registered.insert(key, action);
        Ok(())
    }

    /// Advances the game one tick. Every free player with at least one legal
    /// action must have registered an action first.
    pub fn step(&mut self) -> Result<()> {
        if self.is_over() {
            return Err(Error::GameOver);
        }
        let keys: Vec<PlayerKey> = self.keys().collect();
        for key in keys {
            if !self.is_caught(key)
                && !self.registered.contains_key(&key)
                && !self.legal_actions(key).is_empty()
            {
                return Err(Error::MissingAction(key));
            }
        }

        self.time = self.time.saturating_sub(1);

        // moves resolve against pre-tick positions
        let previous = self.players.clone();
        for (key, action) in std::mem::take(&mut self.registered) {
            if let Some(from) = previous.get(key) {
                let to = self.grid.apply(from, action).unwrap_or(from);
                self.players.set(key, to);
            }
        }
        self.legal_cache.borrow_mut().clear();

        self.resolve_catches(&previous);

        if self.graveyard.len() == self.players.pursued.len() {
            self.state = GameState::Over;
            debug!("all pursued players caught with {} ticks left", self.time);
        } else {
            self.resolve_consumption();
            if self.pills.is_empty() {
                self.state = GameState::Over;
                self.bonus += self.time_bonus();
                self.update_score();
                debug!("all pills eaten with {} ticks left", self.time);
            } else if self.time == 0 {
                self.state = GameState::Over;
                debug!("clock ran out");
            }
        }

        for (key, at) in self.players.iter() {
            self.log.push(ReplayRecord::Player { key, at });
        }
        if !self.is_over() {
            self.manage_fruit();
        }
        self.log.push(ReplayRecord::Time {
            remaining: self.time,
            score: self.score,
        });

        Ok(())
    }

    fn resolve_catches(&mut self, previous: &Players) {
        for (i, now) in self.players.pursued.iter().enumerate() {
            if self.graveyard.contains(&i) {
                continue;
            }
            let before = previous.pursued[i];
            let caught = self
                .players
                .pursuers
                .iter()
                .zip(&previous.pursuers)
                .any(|(g_now, g_before)| {
                    g_now == now || (g_now == &before && g_before == now)
                });
            if caught {
                trace!("{} caught at {}", PlayerKey::Pursued(i), now);
                self.graveyard.insert(i);
            }
        }
    }

    fn resolve_consumption(&mut self) {
        let eaters: Vec<Position> = self.active_pursued().map(|(_, p)| p).collect();

        let eaten: Vec<Position> = eaters
            .iter()
            .copied()
            .filter(|p| self.pills.contains(p))
            .collect();
        for pill in &eaten {
            if self.pills.remove(pill) {
                self.pills_consumed += 1;
            }
        }

        if let Some(fruit) = self.fruit {
            if eaters.contains(&fruit) {
                trace!("fruit eaten at {}", fruit);
                self.fruit = None;
                self.fruit_consumed += 1;
                self.bonus += self.config.fruit_score;
            }
        }

        self.update_score();
    }

    fn time_bonus(&self) -> u32 {
        if self.initial_time == 0 {
            return 0;
        }
        (100 * u64::from(self.time) / u64::from(self.initial_time)) as u32
    }

    fn update_score(&mut self) {
        self.score = pill_percentage(self.pills_consumed, self.pills.len()) + self.bonus;
    }

    fn manage_fruit(&mut self) {
        if self.fruit.is_some() || self.rng.gen::<f64>() >= self.config.fruit_probability {
            return;
        }

        let pursued: Vec<Position> = self.players.pursued.clone();
        let available: Vec<Position> = self
            .grid
            .open_cells()
            .filter(|p| !self.pills.contains(p) && !pursued.contains(p))
            .collect();

        if let Some(spot) = available.choose(&mut self.rng) {
            trace!("fruit spawned at {}", spot);
            self.fruit = Some(*spot);
            self.log.push(ReplayRecord::Fruit(*spot));
        }
    }

    /// One lookahead per candidate action. The game is left untouched.
    pub fn observe(&self, key: PlayerKey, actions: &[Action]) -> Vec<Observation> {
        let Some(from) = self.players.get(key) else {
            return vec![];
        };

        actions
            .iter()
            .map(|action| {
                let mut players = self.players.clone();
                players.set(key, self.grid.apply(from, *action).unwrap_or(from));
                Observation {
                    action: *action,
                    pills: self.pills.clone(),
                    fruit: self.fruit,
                    players: players.iter().collect(),
                }
            })
            .collect()
    }
}

/// ⌊100 × consumed / (consumed + remaining)⌋, or 0 with no pills at all.
pub fn pill_percentage(consumed: usize, remaining: usize) -> u32 {
    let total = consumed + remaining;
    if total == 0 {
        return 0;
    }
    (100 * consumed / total) as u32
}
