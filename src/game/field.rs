//! Coordinates and field cells.

use serde::{Deserialize, Serialize};

use crate::game::{Direction, Entity, Ground};

/// A coordinate on the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "[u16; 2]", into = "[u16; 2]")]
pub struct Coord {
    /// X coordinate (column).
    pub x: u16,
    /// Y coordinate (row).
    pub y: u16,
}

impl Coord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Whether the coordinate lies inside a `size × size` world.
    #[must_use]
    pub const fn in_world(self, size: u16) -> bool {
        self.x < size && self.y < size
    }

    /// The neighbor in `dir`, wrapping around both axes of a `size × size` world.
    #[must_use]
    pub fn step(self, dir: Direction, size: u16) -> Self {
        if size == 0 {
            return self;
        }
        let (dx, dy) = dir.offset();
        let size = i32::from(size);
        let wrap = |v: u16, d: i32| -> u16 {
            // rem_euclid keeps the result in 0..size, which fits in u16.
            u16::try_from((i32::from(v) + d).rem_euclid(size)).unwrap_or(0)
        };
        Self::new(wrap(self.x, dx), wrap(self.y, dy))
    }

    /// The four toroidal neighbors, in [`Direction::ALL`] order.
    #[must_use]
    pub fn neighbors(self, size: u16) -> [Coord; 4] {
        Direction::ALL.map(|dir| self.step(dir, size))
    }

    /// Index into a row-major field whose rows are `stride` cells wide.
    #[must_use]
    #[inline]
    pub fn index(self, stride: u16) -> usize {
        usize::from(self.y) * usize::from(stride) + usize::from(self.x)
    }
}

impl From<[u16; 2]> for Coord {
    fn from([x, y]: [u16; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Coord> for [u16; 2] {
    fn from(coord: Coord) -> Self {
        [coord.x, coord.y]
    }
}

/// Iterate a `size × size` world in row-major order (y outer, x inner).
pub fn coords(size: u16) -> impl Iterator<Item = Coord> {
    (0..size).flat_map(move |y| (0..size).map(move |x| Coord::new(x, y)))
}

/// A single field cell.
///
/// Growth and water are stored as written and clamped to `[0, 1]` on read,
/// so decay arithmetic may leave the stored value slightly out of range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Occupant.
    #[serde(rename = "type")]
    pub entity: Entity,
    /// Ground state.
    pub ground: Ground,
    growth: f64,
    water: f64,
    /// Rank assigned at planting time, for rank-ordered harvests.
    pub measure: Option<u32>,
}

impl Default for Cell {
    fn default() -> Self {
        Self::new(Entity::Hay, Ground::Dirt)
    }
}

impl Cell {
    /// A fresh cell with zero growth and water.
    #[must_use]
    pub const fn new(entity: Entity, ground: Ground) -> Self {
        Self {
            entity,
            ground,
            growth: 0.0,
            water: 0.0,
            measure: None,
        }
    }

    /// Builder-style growth override.
    #[must_use]
    pub const fn with_growth(mut self, growth: f64) -> Self {
        self.growth = growth;
        self
    }

    /// Builder-style water override.
    #[must_use]
    pub const fn with_water(mut self, water: f64) -> Self {
        self.water = water;
        self
    }

    /// Builder-style measure override.
    #[must_use]
    pub const fn with_measure(mut self, measure: Option<u32>) -> Self {
        self.measure = measure;
        self
    }

    /// Growth clamped to `[0, 1]`.
    #[must_use]
    pub fn growth(&self) -> f64 {
        self.growth.clamp(0.0, 1.0)
    }

    /// Growth exactly as stored.
    #[must_use]
    pub const fn raw_growth(&self) -> f64 {
        self.growth
    }

    /// Store a growth value without clamping.
    pub fn set_growth(&mut self, growth: f64) {
        self.growth = growth;
    }

    /// Water clamped to `[0, 1]`.
    #[must_use]
    pub fn water(&self) -> f64 {
        self.water.clamp(0.0, 1.0)
    }

    /// Water exactly as stored.
    #[must_use]
    pub const fn raw_water(&self) -> f64 {
        self.water
    }

    /// Store a water value without clamping.
    pub fn set_water(&mut self, water: f64) {
        self.water = water;
    }

    /// Whether the occupant is fully grown.
    #[must_use]
    pub fn is_grown(&self) -> bool {
        self.growth() >= 1.0
    }

    /// Whether the cell holds a fully grown `entity`.
    #[must_use]
    pub fn is_grown_as(&self, entity: Entity) -> bool {
        self.entity == entity && self.is_grown()
    }

    /// Revert to the post-harvest state: Hay on dirt, Nothing on tilled ground.
    pub fn reset(&mut self) {
        self.entity = match self.ground {
            Ground::Dirt => Entity::Hay,
            Ground::Tilled => Entity::Nothing,
        };
        self.growth = 0.0;
        self.measure = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_wraps_east_edge() {
        let n = 5;
        assert_eq!(Coord::new(n - 1, 2).step(Direction::East, n), Coord::new(0, 2));
        assert_eq!(Coord::new(0, 2).step(Direction::West, n), Coord::new(n - 1, 2));
        assert_eq!(Coord::new(3, n - 1).step(Direction::North, n), Coord::new(3, 0));
        assert_eq!(Coord::new(3, 0).step(Direction::South, n), Coord::new(3, n - 1));
    }

    #[test]
    fn test_neighbors_on_single_cell_world() {
        let c = Coord::new(0, 0);
        assert_eq!(c.neighbors(1), [c; 4]);
    }

    #[test]
    fn test_coords_row_major() {
        let all: Vec<_> = coords(2).collect();
        assert_eq!(
            all,
            vec![Coord::new(0, 0), Coord::new(1, 0), Coord::new(0, 1), Coord::new(1, 1)]
        );
        assert_eq!(Coord::new(1, 1).index(3), 4);
    }

    #[test]
    fn test_clamped_reads() {
        let cell = Cell::default().with_growth(1.7).with_water(-0.2);
        assert!((cell.growth() - 1.0).abs() < f64::EPSILON);
        assert!(cell.water().abs() < f64::EPSILON);
        assert!((cell.raw_growth() - 1.7).abs() < f64::EPSILON);
        assert!(cell.is_grown());
    }

    #[test]
    fn test_reset_depends_on_ground() {
        let mut dirt = Cell::new(Entity::Tree, Ground::Dirt).with_growth(1.0);
        dirt.reset();
        assert_eq!(dirt.entity, Entity::Hay);
        assert!(dirt.growth().abs() < f64::EPSILON);

        let mut tilled = Cell::new(Entity::Cactus, Ground::Tilled).with_measure(Some(3));
        tilled.reset();
        assert_eq!(tilled.entity, Entity::Nothing);
        assert_eq!(tilled.measure, None);
    }

    #[test]
    fn test_cell_json_shape() {
        let cell = Cell::new(Entity::Pumpkin, Ground::Tilled).with_growth(0.5);
        let json = serde_json::to_value(cell).unwrap();
        assert_eq!(json["type"], "PUMPKIN");
        assert_eq!(json["ground"], "TILLED");
        assert_eq!(json["measure"], serde_json::Value::Null);
        let coord = serde_json::to_string(&Coord::new(3, 4)).unwrap();
        assert_eq!(coord, "[3,4]");
    }
}
