//! Property-based tests for field geometry and harvest rules.
//!
//! Run with: cargo test --release prop_farm

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use furrow::config::SimConfig;
use furrow::game::harvest::{is_sorted, is_strict_maximum, pumpkin_yield};
use furrow::game::{Coloring, coords, step_cell};
use furrow::{Cell, Coord, Direction, Entity, Ground};

fn opposite(dir: Direction) -> Direction {
    match dir {
        Direction::North => Direction::South,
        Direction::South => Direction::North,
        Direction::East => Direction::West,
        Direction::West => Direction::East,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    /// Growth and water always read back inside [0, 1].
    #[test]
    fn prop_cell_reads_are_clamped(growth in -1e6f64..1e6, water in -1e6f64..1e6) {
        let cell = Cell::new(Entity::Carrot, Ground::Tilled)
            .with_growth(growth)
            .with_water(water);
        prop_assert!((0.0..=1.0).contains(&cell.growth()));
        prop_assert!((0.0..=1.0).contains(&cell.water()));
    }

    /// A simulation step never makes a reading leave [0, 1].
    #[test]
    fn prop_step_keeps_readings_in_range(
        growth in 0.0f64..2.0,
        water in 0.0f64..2.0,
        trees in 0u32..5,
        dt in 0.0f64..30.0
    ) {
        let mut cell = Cell::new(Entity::Tree, Ground::Dirt).with_growth(growth).with_water(water);
        step_cell(&mut cell, trees, dt, &SimConfig::default());
        prop_assert!((0.0..=1.0).contains(&cell.growth()));
        prop_assert!((0.0..=1.0).contains(&cell.water()));
        prop_assert!(cell.raw_water() <= water);
    }

    /// Moving and moving back returns to the start on any torus.
    #[test]
    fn prop_moves_are_reversible(size in 1u16..40, x in 0u16..40, y in 0u16..40, dir_index in 0usize..4) {
        let start = Coord::new(x % size, y % size);
        let dir = Direction::ALL[dir_index];
        let there = start.step(dir, size);
        prop_assert!(there.in_world(size));
        prop_assert_eq!(there.step(opposite(dir), size), start);
    }

    /// Every cell has exactly four neighbors, each a single move away.
    #[test]
    fn prop_neighbors_are_one_move_away(size in 1u16..40, x in 0u16..40, y in 0u16..40) {
        let pos = Coord::new(x % size, y % size);
        let neighbors = pos.neighbors(size);
        for (dir, neighbor) in Direction::ALL.into_iter().zip(neighbors) {
            prop_assert_eq!(pos.step(dir, size), neighbor);
        }
    }

    /// The coloring partitions the world into squares; multi-cell squares
    /// hold only ripe pumpkins.
    #[test]
    fn prop_coloring_partitions_into_ripe_squares(
        size in 1u16..9,
        ripe_bits in proptest::collection::vec(any::<bool>(), 64)
    ) {
        let ripe = |c: Coord| ripe_bits[c.index(8)];
        let coloring = Coloring::compute(size, ripe);

        let regions = coloring.regions();
        let covered: usize = regions.iter().map(Vec::len).sum();
        prop_assert_eq!(covered, usize::from(size) * usize::from(size));
        let distinct: BTreeSet<Coord> = regions.iter().flatten().copied().collect();
        prop_assert_eq!(distinct.len(), covered);

        for region in &regions {
            let min_x = region.iter().map(|c| c.x).min().unwrap();
            let max_x = region.iter().map(|c| c.x).max().unwrap();
            let min_y = region.iter().map(|c| c.y).min().unwrap();
            let max_y = region.iter().map(|c| c.y).max().unwrap();
            let side = usize::from(max_x - min_x + 1);
            prop_assert_eq!(usize::from(max_y - min_y + 1), side);
            prop_assert_eq!(region.len(), side * side);
            if side > 1 {
                prop_assert!(region.iter().all(|&c| ripe(c)));
            }
        }
    }

    /// The same field always colors the same way.
    #[test]
    fn prop_coloring_is_deterministic(
        size in 1u16..9,
        ripe_bits in proptest::collection::vec(any::<bool>(), 64)
    ) {
        let ripe = |c: Coord| ripe_bits[c.index(8)];
        prop_assert_eq!(Coloring::compute(size, ripe), Coloring::compute(size, ripe));
    }

    /// Bigger squares never pay less, and always pay at least their area.
    #[test]
    fn prop_pumpkin_yield_is_superlinear(area in 1u64..10_000) {
        prop_assert!(pumpkin_yield(area + 1) >= pumpkin_yield(area));
        prop_assert!(pumpkin_yield(area) >= area);
    }

    /// Exactly one cell wins a sunflower harvest when the top rank is unique,
    /// none when it is shared.
    #[test]
    fn prop_at_most_one_sunflower_maximum(ranks in proptest::collection::vec(1u32..=16, 1..20)) {
        let field: BTreeMap<Coord, u32> = ranks
            .iter()
            .enumerate()
            .map(|(i, &r)| (Coord::new(u16::try_from(i).unwrap(), 0), r))
            .collect();
        let winners = field.keys().filter(|&&c| is_strict_maximum(&field, c)).count();
        let top = ranks.iter().max().unwrap();
        let tied = ranks.iter().filter(|&r| r == top).count();
        prop_assert_eq!(winners, usize::from(tied == 1));
    }

    /// Ranks increasing with both x and y are always sorted.
    #[test]
    fn prop_monotone_cacti_are_sorted(size in 1u16..6, bump in 0u32..3) {
        let field: BTreeMap<Coord, u32> = coords(size)
            .map(|c| (c, u32::from(c.x) + u32::from(c.y) * bump + 1))
            .collect();
        prop_assert!(is_sorted(&field));
    }
}
