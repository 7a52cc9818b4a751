//! Harvest resolution.
//!
//! [`resolve`] inspects the field and decides what a harvest at a given cell
//! does without touching the store; [`apply`] carries the decision out. Keeping
//! the two apart lets the scan logic be tested on plain grids.
//!
//! Three entities have field-wide rules:
//! - Pumpkins are claimed in maximal squares and harvested a square at a time.
//! - Sunflowers pay out only when the harvested flower has the strict highest rank.
//! - Cacti pay out only when ranks never decrease towards the north-east.
//!
//! The rank-based rules treat every grown plant of the type as one group, even
//! when the plants form separate clusters.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::StoreError;
use crate::game::{Coord, Entity, Item, StateStore, coords};

/// How a harvest was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Empty cell or occupant not fully grown.
    NotReady,
    /// A single plant was harvested.
    Single,
    /// A pumpkin square was harvested.
    Square {
        /// Cells in the square.
        area: u64,
    },
    /// The harvested sunflower held the strict highest rank.
    Maximum,
    /// A higher or equal ranked sunflower exists; the field was punished.
    NotMaximum,
    /// All grown cacti are sorted.
    Sorted,
    /// Some cactus outranks one to its north-east; the field was punished.
    Unsorted,
}

/// The full effect of one harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOutcome {
    /// What happened.
    pub verdict: Verdict,
    /// Item and amount credited, if any.
    pub award: Option<(Item, u64)>,
    /// Cells reverted by the harvest.
    pub reset: Vec<Coord>,
}

impl HarvestOutcome {
    const fn not_ready() -> Self {
        Self {
            verdict: Verdict::NotReady,
            award: None,
            reset: Vec::new(),
        }
    }

    /// Whether the harvest did anything.
    #[must_use]
    pub fn harvested(&self) -> bool {
        self.verdict != Verdict::NotReady
    }
}

/// A partition of the world into pumpkin squares.
///
/// Every cell carries a color. Cells sharing a color form one square of grown
/// pumpkins; every other cell has a color of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coloring {
    size: u16,
    colors: Vec<usize>,
}

impl Coloring {
    /// Color a `size × size` world where `ripe` tells whether a cell holds a
    /// grown pumpkin.
    ///
    /// Cells are scanned row by row from the south-west corner. Each uncolored
    /// cell seeds a new color; a ripe seed then grows its square one ring at a
    /// time while the whole new east column and north row are ripe and still
    /// uncolored.
    pub fn compute<F>(size: u16, ripe: F) -> Self
    where
        F: Fn(Coord) -> bool,
    {
        let stride = size;
        let mut colors: Vec<Option<usize>> = vec![None; usize::from(size) * usize::from(size)];
        let mut next = 0;
        for y in 0..size {
            let mut x = 0;
            while x < size {
                let seed = Coord::new(x, y);
                if colors[seed.index(stride)].is_some() {
                    x += 1;
                    continue;
                }
                let color = next;
                next += 1;
                colors[seed.index(stride)] = Some(color);
                if !ripe(seed) {
                    x += 1;
                    continue;
                }

                let mut side = 1;
                while x + side < size && y + side < size {
                    let mut ring = (0..=side)
                        .flat_map(|i| [Coord::new(x + side, y + i), Coord::new(x + i, y + side)]);
                    if !ring.all(|c| ripe(c) && colors[c.index(stride)].is_none()) {
                        break;
                    }
                    for i in 0..=side {
                        colors[Coord::new(x + side, y + i).index(stride)] = Some(color);
                        colors[Coord::new(x + i, y + side).index(stride)] = Some(color);
                    }
                    side += 1;
                }
                x += side;
            }
        }
        Self {
            size,
            colors: colors.into_iter().map(|c| c.unwrap_or(usize::MAX)).collect(),
        }
    }

    /// Color the current world of a store.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn of_store<S: StateStore>(store: &S) -> Result<Self, StoreError> {
        let size = store.world_size();
        let mut ripe = vec![false; usize::from(size) * usize::from(size)];
        for pos in coords(size) {
            ripe[pos.index(size)] = store.cell(pos)?.is_grown_as(Entity::Pumpkin);
        }
        Ok(Self::compute(size, |c| ripe[c.index(size)]))
    }

    /// Color of the cell at `pos`.
    #[must_use]
    pub fn color(&self, pos: Coord) -> Option<usize> {
        if pos.in_world(self.size) {
            self.colors.get(pos.index(self.size)).copied()
        } else {
            None
        }
    }

    /// All cells sharing `color`, row-major.
    #[must_use]
    pub fn members(&self, color: usize) -> Vec<Coord> {
        coords(self.size)
            .filter(|&c| self.color(c) == Some(color))
            .collect()
    }

    /// Groups of cells by color, ignoring label values.
    #[must_use]
    pub fn regions(&self) -> Vec<Vec<Coord>> {
        let mut by_color: BTreeMap<usize, Vec<Coord>> = BTreeMap::new();
        for c in coords(self.size) {
            if let Some(color) = self.color(c) {
                by_color.entry(color).or_default().push(c);
            }
        }
        let mut regions: Vec<_> = by_color.into_values().collect();
        regions.sort();
        regions
    }
}

/// Pumpkins paid for a square of `area` cells: `floor(area^1.5)`.
#[must_use]
pub fn pumpkin_yield(area: u64) -> u64 {
    area.saturating_pow(3).isqrt()
}

/// Ranks of every grown `entity` in the current world. Missing ranks count as 0.
///
/// # Errors
///
/// Propagates store errors.
pub fn grown_ranks<S: StateStore>(store: &S, entity: Entity) -> Result<BTreeMap<Coord, u32>, StoreError> {
    let mut ranks = BTreeMap::new();
    for pos in coords(store.world_size()) {
        let cell = store.cell(pos)?;
        if cell.is_grown_as(entity) {
            ranks.insert(pos, cell.measure.unwrap_or(0));
        }
    }
    Ok(ranks)
}

/// Whether the plant at `at` holds a rank no other plant reaches.
#[must_use]
pub fn is_strict_maximum(ranks: &BTreeMap<Coord, u32>, at: Coord) -> bool {
    let Some(&mine) = ranks.get(&at) else {
        return false;
    };
    ranks.iter().all(|(&pos, &rank)| pos == at || rank < mine)
}

/// Whether no plant outranks another at greater-or-equal x and y.
#[must_use]
pub fn is_sorted(ranks: &BTreeMap<Coord, u32>) -> bool {
    ranks.iter().all(|(a, &ra)| {
        ranks
            .iter()
            .all(|(b, &rb)| b.x < a.x || b.y < a.y || rb >= ra)
    })
}

fn group_size(ranks: &BTreeMap<Coord, u32>) -> u64 {
    u64::try_from(ranks.len()).unwrap_or(u64::MAX)
}

/// Decide what harvesting the cell at `pos` does.
///
/// # Errors
///
/// Propagates store errors, including [`StoreError::OutOfBounds`].
pub fn resolve<S: StateStore>(store: &S, pos: Coord) -> Result<HarvestOutcome, StoreError> {
    let cell = store.cell(pos)?;
    let Some(item) = cell.entity.harvest_item() else {
        return Ok(HarvestOutcome::not_ready());
    };
    if !cell.is_grown() {
        return Ok(HarvestOutcome::not_ready());
    }

    let outcome = match cell.entity {
        Entity::Pumpkin => {
            let coloring = Coloring::of_store(store)?;
            let reset = coloring
                .color(pos)
                .map(|color| coloring.members(color))
                .unwrap_or_default();
            let area = u64::try_from(reset.len()).unwrap_or(u64::MAX);
            HarvestOutcome {
                verdict: Verdict::Square { area },
                award: Some((item, pumpkin_yield(area))),
                reset,
            }
        }
        Entity::Sunflower => {
            let ranks = grown_ranks(store, Entity::Sunflower)?;
            if is_strict_maximum(&ranks, pos) {
                HarvestOutcome {
                    verdict: Verdict::Maximum,
                    award: Some((item, group_size(&ranks))),
                    reset: vec![pos],
                }
            } else {
                HarvestOutcome {
                    verdict: Verdict::NotMaximum,
                    award: None,
                    reset: ranks.into_keys().collect(),
                }
            }
        }
        Entity::Cactus => {
            let ranks = grown_ranks(store, Entity::Cactus)?;
            let sorted = is_sorted(&ranks);
            let count = group_size(&ranks);
            HarvestOutcome {
                verdict: if sorted { Verdict::Sorted } else { Verdict::Unsorted },
                award: sorted.then(|| (item, count.saturating_mul(count))),
                reset: ranks.into_keys().collect(),
            }
        }
        _ => HarvestOutcome {
            verdict: Verdict::Single,
            award: Some((item, 1)),
            reset: vec![pos],
        },
    };
    Ok(outcome)
}

/// Carry out a resolved harvest: credit the award and reset cells.
///
/// # Errors
///
/// Propagates store errors.
#[allow(clippy::cast_precision_loss)]
pub fn apply<S: StateStore>(store: &mut S, outcome: &HarvestOutcome) -> Result<(), StoreError> {
    if let Some((item, amount)) = outcome.award {
        store.add_items(item, amount as f64);
    }
    for &pos in &outcome.reset {
        store.update_cell(pos, |cell| cell.reset())?;
    }
    if outcome.harvested() {
        debug!(
            verdict = ?outcome.verdict,
            award = ?outcome.award,
            reset = outcome.reset.len(),
            "harvest resolved"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Cell, GameState, Ground};

    fn grown(entity: Entity, rank: Option<u32>) -> Cell {
        Cell::new(entity, Ground::Tilled)
            .with_growth(1.0)
            .with_measure(rank)
    }

    fn field(size: u16, cells: &[((u16, u16), Cell)]) -> GameState {
        let mut state = GameState::new(size, size).unwrap();
        for &((x, y), cell) in cells {
            state.set_cell(Coord::new(x, y), cell).unwrap();
        }
        state
    }

    #[test]
    fn test_pumpkin_yield_values() {
        assert_eq!(pumpkin_yield(1), 1);
        assert_eq!(pumpkin_yield(4), 8);
        assert_eq!(pumpkin_yield(9), 27);
        assert_eq!(pumpkin_yield(2), 2);
        assert_eq!(pumpkin_yield(5), 11);
    }

    #[test]
    fn test_two_by_two_pumpkins_yield_eight() {
        let p = grown(Entity::Pumpkin, None);
        let mut state = field(4, &[((1, 1), p), ((2, 1), p), ((1, 2), p), ((2, 2), p)]);
        let outcome = resolve(&state, Coord::new(2, 2)).unwrap();
        assert_eq!(outcome.verdict, Verdict::Square { area: 4 });
        assert_eq!(outcome.award, Some((Item::Pumpkin, 8)));
        apply(&mut state, &outcome).unwrap();
        assert!((state.item_count(Item::Pumpkin) - 8.0).abs() < f64::EPSILON);
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            let cell = state.cell(Coord::new(x, y)).unwrap();
            assert_eq!(cell.entity, Entity::Nothing);
            assert!(cell.growth().abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_unripe_pumpkin_breaks_square() {
        let p = grown(Entity::Pumpkin, None);
        let young = Cell::new(Entity::Pumpkin, Ground::Tilled).with_growth(0.9);
        let state = field(3, &[((0, 0), p), ((1, 0), p), ((0, 1), p), ((1, 1), young)]);
        let outcome = resolve(&state, Coord::new(1, 0)).unwrap();
        assert_eq!(outcome.verdict, Verdict::Square { area: 1 });
        assert_eq!(outcome.reset, vec![Coord::new(1, 0)]);
    }

    #[test]
    fn test_three_by_three_then_remainder() {
        let p = grown(Entity::Pumpkin, None);
        let cells: Vec<_> = coords(4)
            .filter(|c| c.x < 4 && c.y < 3)
            .map(|c| ((c.x, c.y), p))
            .collect();
        let state = field(4, &cells);
        let coloring = Coloring::of_store(&state).unwrap();
        let big = coloring.color(Coord::new(0, 0)).unwrap();
        assert_eq!(coloring.members(big).len(), 9);
        // The column x = 3 cannot join the 3×3 square; its cells seed their own.
        let side = coloring.color(Coord::new(3, 0)).unwrap();
        assert_ne!(side, big);
        assert_eq!(coloring.members(side), vec![Coord::new(3, 0)]);
    }

    #[test]
    fn test_coloring_is_deterministic() {
        let p = grown(Entity::Pumpkin, None);
        let state = field(5, &[((0, 0), p), ((1, 0), p), ((0, 1), p), ((1, 1), p), ((4, 4), p)]);
        let a = Coloring::of_store(&state).unwrap();
        let b = Coloring::of_store(&state).unwrap();
        assert_eq!(a.regions(), b.regions());
    }

    #[test]
    fn test_sunflower_strict_maximum_awards_count() {
        let cells = [
            ((0, 0), grown(Entity::Sunflower, Some(3))),
            ((1, 0), grown(Entity::Sunflower, Some(7))),
            ((2, 0), grown(Entity::Sunflower, Some(5))),
        ];
        let mut state = field(3, &cells);
        let outcome = resolve(&state, Coord::new(1, 0)).unwrap();
        assert_eq!(outcome.verdict, Verdict::Maximum);
        apply(&mut state, &outcome).unwrap();
        assert!((state.item_count(Item::Power) - 3.0).abs() < f64::EPSILON);
        assert_eq!(state.cell(Coord::new(1, 0)).unwrap().entity, Entity::Nothing);
        assert_eq!(state.cell(Coord::new(0, 0)).unwrap().entity, Entity::Sunflower);
        assert_eq!(state.cell(Coord::new(2, 0)).unwrap().entity, Entity::Sunflower);
    }

    #[test]
    fn test_sunflower_non_maximum_punishes_field() {
        let cells = [
            ((0, 0), grown(Entity::Sunflower, Some(3))),
            ((1, 0), grown(Entity::Sunflower, Some(7))),
            ((2, 0), grown(Entity::Sunflower, Some(5))),
        ];
        let mut state = field(3, &cells);
        let outcome = resolve(&state, Coord::new(0, 0)).unwrap();
        assert_eq!(outcome.verdict, Verdict::NotMaximum);
        apply(&mut state, &outcome).unwrap();
        assert!(state.item_count(Item::Power).abs() < f64::EPSILON);
        for (x, y) in [(0, 0), (1, 0), (2, 0)] {
            assert_eq!(state.cell(Coord::new(x, y)).unwrap().entity, Entity::Nothing);
        }
    }

    #[test]
    fn test_sunflower_tie_is_not_maximum() {
        let mut ranks = BTreeMap::new();
        ranks.insert(Coord::new(0, 0), 7);
        ranks.insert(Coord::new(1, 0), 7);
        assert!(!is_strict_maximum(&ranks, Coord::new(0, 0)));
    }

    #[test]
    fn test_ungrown_sunflowers_are_ignored() {
        let young = Cell::new(Entity::Sunflower, Ground::Tilled)
            .with_growth(0.5)
            .with_measure(Some(16));
        let state = field(3, &[((0, 0), grown(Entity::Sunflower, Some(2))), ((1, 0), young)]);
        let outcome = resolve(&state, Coord::new(0, 0)).unwrap();
        assert_eq!(outcome.verdict, Verdict::Maximum);
        assert_eq!(outcome.award, Some((Item::Power, 1)));
    }

    #[test]
    fn test_sorted_cacti_award_square() {
        let cells = [
            ((0, 0), grown(Entity::Cactus, Some(1))),
            ((1, 0), grown(Entity::Cactus, Some(2))),
            ((0, 1), grown(Entity::Cactus, Some(3))),
        ];
        let mut state = field(3, &cells);
        let outcome = resolve(&state, Coord::new(0, 1)).unwrap();
        assert_eq!(outcome.verdict, Verdict::Sorted);
        apply(&mut state, &outcome).unwrap();
        assert!((state.item_count(Item::Power) - 9.0).abs() < f64::EPSILON);
        assert_eq!(outcome.reset.len(), 3);
    }

    #[test]
    fn test_unsorted_cacti_reset_without_award() {
        let cells = [
            ((0, 0), grown(Entity::Cactus, Some(1))),
            ((1, 0), grown(Entity::Cactus, Some(0))),
            ((0, 1), grown(Entity::Cactus, Some(3))),
        ];
        let mut state = field(3, &cells);
        let outcome = resolve(&state, Coord::new(0, 0)).unwrap();
        assert_eq!(outcome.verdict, Verdict::Unsorted);
        apply(&mut state, &outcome).unwrap();
        assert!(state.item_count(Item::Power).abs() < f64::EPSILON);
        for (x, y) in [(0, 0), (1, 0), (0, 1)] {
            assert_eq!(state.cell(Coord::new(x, y)).unwrap().entity, Entity::Nothing);
        }
    }

    #[test]
    fn test_default_harvest_and_not_ready() {
        let mut state = field(2, &[((0, 0), Cell::new(Entity::Bush, Ground::Dirt).with_growth(1.2))]);
        let outcome = resolve(&state, Coord::new(0, 0)).unwrap();
        assert_eq!(outcome.award, Some((Item::Wood, 1)));
        apply(&mut state, &outcome).unwrap();
        assert_eq!(state.cell(Coord::new(0, 0)).unwrap().entity, Entity::Hay);

        // Fresh hay has zero growth.
        let outcome = resolve(&state, Coord::new(0, 0)).unwrap();
        assert!(!outcome.harvested());
        let empty = field(2, &[((1, 1), Cell::new(Entity::Nothing, Ground::Tilled))]);
        assert!(!resolve(&empty, Coord::new(1, 1)).unwrap().harvested());
    }
}
