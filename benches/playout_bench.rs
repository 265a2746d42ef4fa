use criterion::{black_box, criterion_group, criterion_main, Criterion};
use maze_pursuit::agents::{PursuedStrategy, PursuerStrategy};
use maze_pursuit::fitness::{evaluate, play, EvaluationSettings};
use maze_pursuit::game::GameRng;
use maze_pursuit::grid::Grid;
use maze_pursuit::pathfinding::{a_star, bfs_path, PursuerProximityCost, UnitCost};
use rand::SeedableRng;
use std::collections::BTreeSet;

fn cross_genome(size: usize) -> Vec<u8> {
    let grid = Grid::cross(size).unwrap();
    grid.positions().map(|p| u8::from(grid.is_wall(p))).collect()
}

fn settings(pursued: PursuedStrategy, pursuer: PursuerStrategy) -> EvaluationSettings {
    EvaluationSettings {
        pursued_strategy: pursued,
        pursuer_strategy: pursuer,
        ..EvaluationSettings::default()
    }
}

fn benchmark_search(c: &mut Criterion) {
    let grid = Grid::open(30, 30).unwrap();
    let start = grid.pursued_spawn();
    let target: BTreeSet<_> = [grid.pursuer_spawn()].into_iter().collect();
    let pursuers = [grid.pursuer_spawn()];

    c.bench_function("bfs_open_30x30", |b| {
        let mut rng = GameRng::seed_from_u64(0);
        b.iter(|| black_box(bfs_path(&grid, start, &target, &mut rng)));
    });

    c.bench_function("a_star_unit_open_30x30", |b| {
        b.iter(|| black_box(a_star(&grid, start, &target, &UnitCost)));
    });

    c.bench_function("a_star_proximity_open_30x30", |b| {
        let cost = PursuerProximityCost::new(&pursuers);
        b.iter(|| black_box(a_star(&grid, start, &target, &cost)));
    });
}

fn benchmark_playout(c: &mut Criterion) {
    let grid = Grid::cross(21).unwrap();

    c.bench_function("playout_pill_vs_wander", |b| {
        let s = settings(PursuedStrategy::Pill, PursuerStrategy::Wander);
        b.iter(|| black_box(play(grid.clone(), &s, 7)));
    });

    c.bench_function("playout_avoid_vs_chase", |b| {
        let s = settings(PursuedStrategy::Avoid, PursuerStrategy::Chase);
        b.iter(|| black_box(play(grid.clone(), &s, 7)));
    });

    c.bench_function("evaluate_cross_21", |b| {
        let genome = cross_genome(21);
        let s = settings(PursuedStrategy::Fruit, PursuerStrategy::Chase);
        b.iter(|| black_box(evaluate(&genome, 21, 21, &s)));
    });
}

criterion_group!(benches, benchmark_search, benchmark_playout);
criterion_main!(benches);
