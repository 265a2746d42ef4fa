use crate::error::{Error, Result};
use crate::game::{Game, GameRng, PlayerKey};
use crate::grid::{Action, Grid, Position};
use crate::pathfinding::{
    nearest_manhattan_distance, path_to_fruit, path_to_pills, path_to_pursued, Plan,
    PursuerProximityCost, UnitCost, DEFAULT_AVOIDANCE_RADIUS,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// A decision strategy for one player. Called once per tick with the game
/// as it stands before the tick resolves.
pub trait Agent {
    fn select_action(&mut self, game: &Game, player: PlayerKey, rng: &mut GameRng) -> Action;
}

fn random_legal(game: &Game, player: PlayerKey, rng: &mut GameRng) -> Action {
    game.legal_actions(player)
        .choose(rng)
        .copied()
        .unwrap_or(Action::Hold)
}

// Planned actions should always be legal; if one is not, the plan is
// abandoned for a random legal move rather than handed to the engine.
fn checked(game: &Game, player: PlayerKey, action: Action, rng: &mut GameRng) -> Action {
    if game.legal_actions(player).contains(&action) {
        action
    } else {
        random_legal(game, player, rng)
    }
}

/// A queued plan plus when and toward what it was made. Agents own one and
/// decide for themselves when it has gone stale.
#[derive(Debug, Clone, Default)]
pub struct Route {
    actions: Plan,
    /// Cell the player should stand on before each queued action. Empty for
    /// plans installed with [`Route::replace`].
    waypoints: VecDeque<Position>,
    target: Option<Position>,
    made_at: Option<u32>,
}

impl Route {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn target(&self) -> Option<Position> {
        self.target
    }

    pub fn replace(&mut self, actions: Plan, target: Option<Position>, now: u32) {
        self.actions = actions;
        self.waypoints.clear();
        self.target = target;
        self.made_at = Some(now);
    }

    /// Installs `actions` as walked from `start`. The target becomes the
    /// cell the plan ends on, and every step's starting cell is kept so
    /// [`Route::drift`] can tell when the player has left the path.
    pub fn follow(&mut self, grid: &Grid, start: Position, actions: Plan, now: u32) {
        let mut at = start;
        let mut waypoints = VecDeque::with_capacity(actions.len());
        for action in &actions {
            waypoints.push_back(at);
            at = grid.apply(at, *action).unwrap_or(at);
        }

        self.target = if actions.is_empty() { None } else { Some(at) };
        self.actions = actions;
        self.waypoints = waypoints;
        self.made_at = Some(now);
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.waypoints.clear();
        self.target = None;
    }

    pub fn next_action(&mut self) -> Option<Action> {
        self.waypoints.pop_front();
        self.actions.pop_front()
    }

    /// Distance from `at` to where the plan expects the player to be.
    /// Zero when the plan carries no waypoints.
    pub fn drift(&self, at: Position) -> usize {
        self.waypoints.front().map_or(0, |w| w.manhattan(at))
    }

    /// Ticks since the plan was made; the game clock counts down.
    pub fn age(&self, now: u32) -> u32 {
        self.made_at.map_or(0, |t| t.saturating_sub(now))
    }

    /// True once the nearest of `quarry` sits at least one cell from the
    /// planned target per `ratio` cells of plan left. Empty or untargeted
    /// plans, and plans with no quarry left, are always stale.
    pub fn is_stale<'a, I>(&self, quarry: I, ratio: usize) -> bool
    where
        I: IntoIterator<Item = &'a Position>,
    {
        if self.actions.is_empty() {
            return true;
        }
        match self.target.and_then(|t| nearest_manhattan_distance(t, quarry)) {
            Some(off) => off * ratio >= self.actions.len(),
            None => true,
        }
    }
}

/// Uniformly random legal action, every tick. Works for either role.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomAgent;

impl Agent for RandomAgent {
    fn select_action(&mut self, game: &Game, player: PlayerKey, rng: &mut GameRng) -> Action {
        random_legal(game, player, rng)
    }
}

/// Walks the shortest path to the nearest pill, planning again only when
/// the current plan runs out.
#[derive(Debug, Clone, Default)]
pub struct PillSeeker {
    route: Route,
}

impl Agent for PillSeeker {
    fn select_action(&mut self, game: &Game, player: PlayerKey, rng: &mut GameRng) -> Action {
        if self.route.is_empty() {
            let plan = path_to_pills(game, player, &UnitCost, rng);
            self.route.replace(plan, None, game.time());
        }
        let action = self.route.next_action().unwrap_or(Action::Hold);
        checked(game, player, action, rng)
    }
}

/// Like [`PillSeeker`], but heads for the fruit whenever one is on the map
/// and no plan is in progress.
#[derive(Debug, Clone, Default)]
pub struct FruitSeeker {
    pills: PillSeeker,
}

impl Agent for FruitSeeker {
    fn select_action(&mut self, game: &Game, player: PlayerKey, rng: &mut GameRng) -> Action {
        if game.fruit().is_some() && self.pills.route.is_empty() {
            let plan = path_to_fruit(game, player, &UnitCost);
            self.pills.route.replace(plan, game.fruit(), game.time());
        }
        self.pills.select_action(game, player, rng)
    }
}

#[derive(Debug, Clone)]
pub struct AvoidingAgent {
    route: Route,
    /// Distance at which a pursuer forces a fresh plan.
    avoidance_radius: usize,
    maximum_path_age: u32,
    /// How many times longer than the pill path a fruit path may be.
    fruit_factor: usize,
    /// How far off the planned path the player may stand before replanning.
    maximum_drift: usize,
    cost_radius: usize,
}

impl Default for AvoidingAgent {
    fn default() -> Self {
        Self::new(3, 10, 4)
    }
}

impl AvoidingAgent {
    pub fn new(avoidance_radius: usize, maximum_path_age: u32, fruit_factor: usize) -> Self {
        Self {
            route: Route::default(),
            avoidance_radius,
            maximum_path_age,
            fruit_factor,
            maximum_drift: 0,
            cost_radius: DEFAULT_AVOIDANCE_RADIUS,
        }
    }

    pub fn with_maximum_drift(mut self, maximum_drift: usize) -> Self {
        self.maximum_drift = maximum_drift;
        self
    }

    // the pill or fruit the plan was heading for is gone
    fn target_gone(&self, game: &Game) -> bool {
        self.route
            .target()
            .map_or(false, |t| !game.pills().contains(&t) && game.fruit() != Some(t))
    }

    fn prefer_fruit(&self, fruit_path: &Plan, pill_path: &Plan, time: u32) -> bool {
        if fruit_path.front() == Some(&Action::Hold) {
            return false;
        }
        if pill_path.front() == Some(&Action::Hold) {
            return true;
        }
        fruit_path.len() < pill_path.len() * self.fruit_factor
            && 2 * fruit_path.len() + pill_path.len() < time as usize
    }
}

impl Agent for AvoidingAgent {
    fn select_action(&mut self, game: &Game, player: PlayerKey, rng: &mut GameRng) -> Action {
        let Some(here) = game.position(player) else {
            return Action::Hold;
        };
        let pursuers = game.pursuer_positions();
        let now = game.time();

        let threatened = nearest_manhattan_distance(here, pursuers)
            .map_or(false, |d| d <= self.avoidance_radius);
        if threatened
            || self.route.age(now) > self.maximum_path_age
            || self.route.drift(here) > self.maximum_drift
            || self.target_gone(game)
        {
            self.route.clear();
        }

        if self.route.is_empty() {
            let cost = PursuerProximityCost::with_radius(pursuers, self.cost_radius);
            let pill_path = path_to_pills(game, player, &cost, rng);
            let plan = if game.fruit().is_some() {
                let fruit_path = path_to_fruit(game, player, &cost);
                if self.prefer_fruit(&fruit_path, &pill_path, now) {
                    fruit_path
                } else {
                    pill_path
                }
            } else {
                pill_path
            };
            self.route.follow(game.grid(), here, plan, now);
        }

        let action = self.route.next_action().unwrap_or(Action::Hold);
        checked(game, player, action, rng)
    }
}

/// Follows the nearest free pursued player, with an occasional random step
/// so pursuers don't bunch up.
#[derive(Debug, Clone)]
pub struct ChasingPursuer {
    route: Route,
    /// The quarry may drift one cell from the target per this many cells
    /// of remaining plan before the plan is redone.
    staleness_ratio: usize,
    random_wander_chance: f64,
}

impl Default for ChasingPursuer {
    fn default() -> Self {
        Self::new(5, 0.25)
    }
}

impl ChasingPursuer {
    pub fn new(staleness_ratio: usize, random_wander_chance: f64) -> Self {
        Self {
            route: Route::default(),
            staleness_ratio,
            random_wander_chance,
        }
    }
}

impl Agent for ChasingPursuer {
    fn select_action(&mut self, game: &Game, player: PlayerKey, rng: &mut GameRng) -> Action {
        let quarry: Vec<Position> = game.active_pursued().map(|(_, p)| p).collect();

        if self.route.is_stale(&quarry, self.staleness_ratio) {
            if rng.gen::<f64>() < self.random_wander_chance {
                self.route.clear();
                return random_legal(game, player, rng);
            }
            match (game.position(player), path_to_pursued(game, player)) {
                (Some(start), Ok(plan)) if !plan.is_empty() => {
                    self.route.follow(game.grid(), start, plan, game.time());
                }
                _ => {
                    self.route.clear();
                    return random_legal(game, player, rng);
                }
            }
        }

        match self.route.next_action() {
            Some(action) => checked(game, player, action, rng),
            None => random_legal(game, player, rng),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum PursuedStrategy {
    #[default]
    Pill,
    Fruit,
    Avoid,
    Random,
}

impl PursuedStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            PursuedStrategy::Pill => "pill",
            PursuedStrategy::Fruit => "fruit",
            PursuedStrategy::Avoid => "avoid",
            PursuedStrategy::Random => "random",
        }
    }

    pub fn build(self) -> Box<dyn Agent> {
        match self {
            PursuedStrategy::Pill => Box::new(PillSeeker::default()),
            PursuedStrategy::Fruit => Box::new(FruitSeeker::default()),
            PursuedStrategy::Avoid => Box::new(AvoidingAgent::default()),
            PursuedStrategy::Random => Box::new(RandomAgent),
        }
    }
}

impl FromStr for PursuedStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pill" => Ok(PursuedStrategy::Pill),
            "fruit" => Ok(PursuedStrategy::Fruit),
            "avoid" => Ok(PursuedStrategy::Avoid),
            "random" => Ok(PursuedStrategy::Random),
            _ => Err(Error::UnknownPursuedStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for PursuedStrategy {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for PursuedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum PursuerStrategy {
    #[default]
    Wander,
    Chase,
}

impl PursuerStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            PursuerStrategy::Wander => "wander",
            PursuerStrategy::Chase => "chase",
        }
    }

    pub fn build(self) -> Box<dyn Agent> {
        match self {
            PursuerStrategy::Wander => Box::new(RandomAgent),
            PursuerStrategy::Chase => Box::new(ChasingPursuer::default()),
        }
    }
}

impl FromStr for PursuerStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "wander" => Ok(PursuerStrategy::Wander),
            "chase" => Ok(PursuerStrategy::Chase),
            _ => Err(Error::UnknownPursuerStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for PursuerStrategy {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for PursuerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
