//! Grid search used by every planning agent.
//!
//! Two searches over 4-connected moves: a FIFO breadth-first search that
//! stops at the first target it discovers, and a multi-target A* whose step
//! cost is pluggable through [`StepCost`]. A* gives up with
//! [`PathError::NoSafePath`] once the cheapest frontier entry reaches
//! [`IMPOSSIBLE_COST`]; callers answer that with a one-tick hold.

use crate::game::{Game, PlayerKey};
use crate::grid::{Action, Direction, Grid, Position};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Cost higher than any ordinary route; a search whose best option costs
/// this much has no safe path.
pub const IMPOSSIBLE_COST: u64 = 1_000_000;

/// Above this many targets the Manhattan heuristic stops paying for itself
/// and plain BFS is used instead.
pub const BFS_TARGET_THRESHOLD: usize = 30;

pub const DEFAULT_AVOIDANCE_RADIUS: usize = 10;

/// Queued actions, front first.
pub type Plan = VecDeque<Action>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    #[error("no safe path to any target")]
    NoSafePath,
    #[error("no target is reachable")]
    Unreachable,
}

pub fn hold_plan() -> Plan {
    VecDeque::from([Action::Hold])
}

/// Cost of stepping into `cell`. Must be at least 1 so the Manhattan
/// heuristic stays admissible.
pub trait StepCost {
    fn cost(&self, cell: Position) -> u64;
}

impl<F> StepCost for F
where
    F: Fn(Position) -> u64,
{
    fn cost(&self, cell: Position) -> u64 {
        self(cell)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnitCost;

impl StepCost for UnitCost {
    fn cost(&self, _cell: Position) -> u64 {
        1
    }
}

/// Makes cells near pursuers expensive: a pursuer's own cell costs
/// [`IMPOSSIBLE_COST`], an adjacent cell a tenth of that, and anything
/// closer than `radius` the square of how far inside the radius it is.
#[derive(Debug, Clone, Copy)]
pub struct PursuerProximityCost<'a> {
    pursuers: &'a [Position],
    radius: usize,
}

impl<'a> PursuerProximityCost<'a> {
    pub fn new(pursuers: &'a [Position]) -> Self {
        Self::with_radius(pursuers, DEFAULT_AVOIDANCE_RADIUS)
    }

    pub fn with_radius(pursuers: &'a [Position], radius: usize) -> Self {
        Self { pursuers, radius }
    }
}

impl StepCost for PursuerProximityCost<'_> {
    fn cost(&self, cell: Position) -> u64 {
        match nearest_manhattan_distance(cell, self.pursuers) {
            None => 1,
            Some(0) => IMPOSSIBLE_COST,
            Some(1) => IMPOSSIBLE_COST / 10,
            Some(d) => {
                let inside = self.radius.saturating_sub(d) as u64;
                inside * inside + 1
            }
        }
    }
}

pub fn manhattan_distance(a: Position, b: Position) -> usize {
    a.manhattan(b)
}

/// Distance to the closest of `targets`, or `None` if there are none.
pub fn nearest_manhattan_distance<'a, I>(from: Position, targets: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a Position>,
{
    targets.into_iter().map(|t| from.manhattan(*t)).min()
}

fn reconstruct(
    parents: &HashMap<Position, (Position, Direction)>,
    start: Position,
    goal: Position,
) -> Plan {
    let mut plan = Plan::new();
    let mut at = goal;
    while at != start {
        match parents.get(&at) {
            Some((prev, dir)) => {
                plan.push_front(Action::Move(*dir));
                at = *prev;
            }
            None => break,
        }
    }
    plan
}

/// Breadth-first search to the first target discovered. Neighbor order is
/// shuffled with `rng`, so equal-length paths are picked at random.
/// An empty plan means `start` is already a target.
pub fn bfs_path<R: Rng + ?Sized>(
    grid: &Grid,
    start: Position,
    targets: &BTreeSet<Position>,
    rng: &mut R,
) -> Option<Plan> {
    if targets.is_empty() {
        return None;
    }
    if targets.contains(&start) {
        return Some(Plan::new());
    }

    let mut visited: HashSet<Position> = HashSet::from([start]);
    let mut parents: HashMap<Position, (Position, Direction)> = HashMap::new();
    let mut queue: VecDeque<Position> = VecDeque::from([start]);
    let mut dirs = Direction::ALL;

    while let Some(pos) = queue.pop_front() {
        dirs.shuffle(rng);
        for dir in dirs {
            let Some(next) = grid.step(pos, dir) else {
                continue;
            };
            if !grid.is_open(next) || !visited.insert(next) {
                continue;
            }
            parents.insert(next, (pos, dir));
            if targets.contains(&next) {
                return Some(reconstruct(&parents, start, next));
            }
            queue.push_back(next);
        }
    }

    None
}

/// [`bfs_path`], holding for one tick when nothing is reachable.
pub fn path_to_nearest<R: Rng + ?Sized>(
    grid: &Grid,
    start: Position,
    targets: &BTreeSet<Position>,
    rng: &mut R,
) -> Plan {
    bfs_path(grid, start, targets, rng).unwrap_or_else(hold_plan)
}

/// A* toward whichever of `targets` is cheapest to reach. The heuristic is
/// the Manhattan distance to the nearest target; nodes are re-opened when a
/// cheaper route turns up, so non-uniform costs still give the cheapest
/// path.
pub fn a_star(
    grid: &Grid,
    start: Position,
    targets: &BTreeSet<Position>,
    cost: &dyn StepCost,
) -> Result<Plan, PathError> {
    if targets.is_empty() {
        return Err(PathError::Unreachable);
    }
    if targets.contains(&start) {
        return Ok(Plan::new());
    }

    let h = |p: Position| nearest_manhattan_distance(p, targets).unwrap_or(0) as u64;

    let mut frontier: BinaryHeap<Reverse<(u64, Position)>> = BinaryHeap::new();
    let mut best_g: HashMap<Position, u64> = HashMap::from([(start, 0)]);
    let mut parents: HashMap<Position, (Position, Direction)> = HashMap::new();

    frontier.push(Reverse((h(start), start)));

    while let Some(Reverse((f, pos))) = frontier.pop() {
        if f >= IMPOSSIBLE_COST {
            return Err(PathError::NoSafePath);
        }
        let g = best_g.get(&pos).copied().unwrap_or(u64::MAX);
        // stale entry, a cheaper route was queued later
        if f > g.saturating_add(h(pos)) {
            continue;
        }
        if targets.contains(&pos) {
            return Ok(reconstruct(&parents, start, pos));
        }

        for (dir, next) in grid.open_neighbors(pos) {
            let next_g = g.saturating_add(cost.cost(next));
            if next_g < best_g.get(&next).copied().unwrap_or(u64::MAX) {
                best_g.insert(next, next_g);
                parents.insert(next, (pos, dir));
                frontier.push(Reverse((next_g.saturating_add(h(next)), next)));
            }
        }
    }

    Err(PathError::Unreachable)
}

/// [`a_star`], holding for one tick when there is no (safe) path.
pub fn path_to_nearest_a_star(
    grid: &Grid,
    start: Position,
    targets: &BTreeSet<Position>,
    cost: &dyn StepCost,
) -> Plan {
    match a_star(grid, start, targets, cost) {
        Ok(plan) => plan,
        Err(e) => {
            debug!("holding at {}: {}", start, e);
            hold_plan()
        }
    }
}

/// Plan from `player` to the nearest pill. Large pill sets go through BFS,
/// which ignores `cost`.
pub fn path_to_pills<R: Rng + ?Sized>(
    game: &Game,
    player: PlayerKey,
    cost: &dyn StepCost,
    rng: &mut R,
) -> Plan {
    let Some(start) = game.position(player) else {
        return hold_plan();
    };
    let pills = game.pills();
    if pills.len() > BFS_TARGET_THRESHOLD {
        path_to_nearest(game.grid(), start, pills, rng)
    } else {
        path_to_nearest_a_star(game.grid(), start, pills, cost)
    }
}

pub fn path_to_fruit(game: &Game, player: PlayerKey, cost: &dyn StepCost) -> Plan {
    match (game.position(player), game.fruit()) {
        (Some(start), Some(fruit)) => {
            path_to_nearest_a_star(game.grid(), start, &BTreeSet::from([fruit]), cost)
        }
        _ => hold_plan(),
    }
}

/// Unit-cost route from `player` to the nearest pursued player still free.
/// Pursuers cannot hold, so failure is left to the caller.
pub fn path_to_pursued(game: &Game, player: PlayerKey) -> Result<Plan, PathError> {
    let start = game.position(player).ok_or(PathError::Unreachable)?;
    let targets: BTreeSet<Position> = game.active_pursued().map(|(_, p)| p).collect();
    a_star(game.grid(), start, &targets, &UnitCost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const RIGHT: Action = Action::Move(Direction::Right);
    const UP: Action = Action::Move(Direction::Up);

    fn targets(ps: &[(usize, usize)]) -> BTreeSet<Position> {
        ps.iter().map(|(x, y)| Position::new(*x, *y)).collect()
    }

    fn walk(grid: &Grid, start: Position, plan: &Plan) -> Position {
        plan.iter()
            .fold(start, |at, a| grid.apply(at, *a).expect("plan walks into a wall"))
    }

    #[test]
    fn bfs_reaches_nearest_target() {
        let mut rng = StdRng::seed_from_u64(1);
        let g = Grid::open(5, 1).unwrap();
        let plan = bfs_path(&g, Position::new(0, 0), &targets(&[(3, 0), (4, 0)]), &mut rng);
        assert_eq!(plan, Some(VecDeque::from([RIGHT, RIGHT, RIGHT])));
    }

    #[test]
    fn bfs_holds_without_targets() {
        let mut rng = StdRng::seed_from_u64(1);
        let g = Grid::open(3, 3).unwrap();
        let plan = path_to_nearest(&g, Position::new(0, 0), &BTreeSet::new(), &mut rng);
        assert_eq!(plan, hold_plan());
    }

    #[test]
    fn bfs_holds_when_unreachable() {
        let mut rng = StdRng::seed_from_u64(1);
        let g = Grid::parse(".#.").unwrap();
        let plan = path_to_nearest(&g, Position::new(0, 0), &targets(&[(2, 0)]), &mut rng);
        assert_eq!(plan, hold_plan());
    }

    #[test]
    fn bfs_routes_around_walls() {
        let mut rng = StdRng::seed_from_u64(3);
        let g = Grid::parse(
            "
            ...
            .#.
            .#.
            ",
        )
        .unwrap();
        let start = Position::new(0, 0);
        let goal = Position::new(2, 0);
        let plan = bfs_path(&g, start, &targets(&[(2, 0)]), &mut rng).unwrap();
        assert_eq!(plan.len(), 6);
        assert_eq!(walk(&g, start, &plan), goal);
    }

    #[test]
    fn a_star_matches_bfs_length() {
        let mut rng = StdRng::seed_from_u64(9);
        let g = Grid::parse(
            "
            ....#...
            .##.#.#.
            .#..#.#.
            .#.##.#.
            ........
            ",
        )
        .unwrap();
        let start = Position::new(0, 4);
        let goal = targets(&[(7, 4)]);
        let bfs = bfs_path(&g, start, &goal, &mut rng).unwrap();
        let astar = a_star(&g, start, &goal, &UnitCost).unwrap();
        assert_eq!(bfs.len(), astar.len());
        assert_eq!(walk(&g, start, &astar), Position::new(7, 4));
    }

    #[test]
    fn a_star_picks_cheapest_of_many_targets() {
        let g = Grid::open(6, 1).unwrap();
        let plan = a_star(&g, Position::new(2, 0), &targets(&[(0, 0), (5, 0)]), &UnitCost).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn a_star_reports_unreachable() {
        let g = Grid::parse("..#..").unwrap();
        let err = a_star(&g, Position::new(0, 0), &targets(&[(4, 0)]), &UnitCost).unwrap_err();
        assert_eq!(err, PathError::Unreachable);
        assert_eq!(
            a_star(&g, Position::new(0, 0), &BTreeSet::new(), &UnitCost),
            Err(PathError::Unreachable)
        );
    }

    #[test]
    fn proximity_cost_levels() {
        let pursuers = [Position::new(5, 5)];
        let cost = PursuerProximityCost::new(&pursuers);
        assert_eq!(cost.cost(Position::new(5, 5)), IMPOSSIBLE_COST);
        assert_eq!(cost.cost(Position::new(5, 4)), IMPOSSIBLE_COST / 10);
        assert_eq!(cost.cost(Position::new(5, 2)), 50);
        assert_eq!(cost.cost(Position::new(0, 0)), 1);
        assert_eq!(PursuerProximityCost::new(&[]).cost(Position::new(0, 0)), 1);
    }

    #[test]
    fn proximity_cost_takes_the_long_way_round() {
        let g = Grid::parse(
            "
            .....
            .###.
            .....
            ",
        )
        .unwrap();
        let pursuers = [Position::new(2, 0)];
        let cost = PursuerProximityCost::new(&pursuers);
        let plan = a_star(&g, Position::new(0, 1), &targets(&[(4, 1)]), &cost).unwrap();
        assert_eq!(plan.len(), 6);
        assert_eq!(plan.front(), Some(&UP));
    }

    #[test]
    fn blocked_by_pursuer_means_hold() {
        let g = Grid::open(5, 1).unwrap();
        let pursuers = [Position::new(2, 0)];
        let cost = PursuerProximityCost::new(&pursuers);
        let start = Position::new(0, 0);
        let goal = targets(&[(4, 0)]);

        assert_eq!(a_star(&g, start, &goal, &cost), Err(PathError::NoSafePath));
        assert_eq!(path_to_nearest_a_star(&g, start, &goal, &cost), hold_plan());
    }

    #[test]
    fn closures_are_cost_functions() {
        let g = Grid::open(3, 2).unwrap();
        // the top row is expensive
        let cost = |p: Position| if p.y == 1 { 50 } else { 1 };
        let plan = a_star(&g, Position::new(0, 1), &targets(&[(2, 1)]), &cost).unwrap();
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn nearest_distance() {
        let ts = [Position::new(4, 4), Position::new(1, 0)];
        assert_eq!(nearest_manhattan_distance(Position::new(0, 0), &ts), Some(1));
        let none: [Position; 0] = [];
        assert_eq!(nearest_manhattan_distance(Position::new(0, 0), &none), None);
        assert_eq!(manhattan_distance(Position::new(0, 0), Position::new(4, 4)), 8);
    }
}
