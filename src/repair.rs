use crate::grid::{Cell, Grid, Position};
use log::debug;
use std::collections::{HashSet, VecDeque};

/// Breadth-first flood over open, 4-connected cells. `start` is always part
/// of the result, even when it sits on a wall.
pub fn reachable_cells(grid: &Grid, start: Position) -> HashSet<Position> {
    let mut visited: HashSet<Position> = HashSet::new();
    let mut queue: VecDeque<Position> = VecDeque::new();

    visited.insert(start);
    queue.push_back(start);

    while let Some(pos) = queue.pop_front() {
        for (_, next) in grid.open_neighbors(pos) {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    visited
}

/// Turns every open cell not reachable from `start` into a wall.
/// Returns the number of cells converted.
pub fn repair_unreachable_cells(grid: &mut Grid, start: Position) -> usize {
    let reachable = reachable_cells(grid, start);
    let pockets: Vec<Position> = grid
        .open_cells()
        .filter(|p| !reachable.contains(p))
        .collect();

    for pos in &pockets {
        grid.set(*pos, Cell::Wall);
    }

    pockets.len()
}

/// Makes a generated map playable: both spawns open, the pursuer spawn
/// reachable from the pursued spawn, and no open cell outside that region.
/// Returns the number of cells changed.
pub fn repair_map(grid: &mut Grid) -> usize {
    let pursued_spawn = grid.pursued_spawn();
    let pursuer_spawn = grid.pursuer_spawn();
    let mut repairs = 0;

    for spawn in [pursued_spawn, pursuer_spawn] {
        if grid.is_wall(spawn) {
            grid.set(spawn, Cell::Open);
            repairs += 1;
        }
    }

    let pursued_reachable = reachable_cells(grid, pursued_spawn);
    if !pursued_reachable.contains(&pursuer_spawn) {
        let pursuer_reachable = reachable_cells(grid, pursuer_spawn);
        if let Some((a, b)) = nearest_pair(grid, &pursued_reachable, &pursuer_reachable) {
            let tunnel = carve_tunnel(grid, a, b);
            debug!("carved tunnel {} -> {} ({} walls)", a, b, tunnel);
            repairs += tunnel;
        }
    }

    let sealed = repair_unreachable_cells(grid, pursued_spawn);
    if sealed > 0 {
        debug!("sealed {} unreachable cells", sealed);
    }

    repairs + sealed
}

// Closest pair by Manhattan distance; ties keep the first pair found when
// both sides are enumerated in row-major order.
fn nearest_pair(
    grid: &Grid,
    from: &HashSet<Position>,
    to: &HashSet<Position>,
) -> Option<(Position, Position)> {
    let ordered = |set: &HashSet<Position>| -> Vec<Position> {
        grid.positions().filter(|p| set.contains(p)).collect()
    };
    let from = ordered(from);
    let to = ordered(to);

    let mut best: Option<(usize, Position, Position)> = None;
    for a in &from {
        for b in &to {
            let d = a.manhattan(*b);
            if best.map_or(true, |(bd, _, _)| d < bd) {
                best = Some((d, *a, *b));
            }
        }
    }

    best.map(|(_, a, b)| (a, b))
}

// Opens the rectangle spanned by `a` and `b`: both rows across the x-range
// and both columns across the y-range.
fn carve_tunnel(grid: &mut Grid, a: Position, b: Position) -> usize {
    let mut cleared = 0;
    let mut clear = |grid: &mut Grid, pos: Position| {
        if grid.is_wall(pos) {
            grid.set(pos, Cell::Open);
            cleared += 1;
        }
    };

    for x in a.x.min(b.x)..=a.x.max(b.x) {
        clear(grid, Position::new(x, a.y));
        clear(grid, Position::new(x, b.y));
    }
    for y in a.y.min(b.y)..=a.y.max(b.y) {
        clear(grid, Position::new(a.x, y));
        clear(grid, Position::new(b.x, y));
    }

    cleared
}
