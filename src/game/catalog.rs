//! Static catalogs: directions, items, field entities and ground.
//!
//! Every variant's attributes live in a `match` table on the enum itself.
//! Nothing here is constructed at runtime.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// A cardinal direction the drone can face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// +y.
    North,
    /// +x.
    East,
    /// -y.
    South,
    /// -x.
    West,
}

impl Direction {
    /// All directions in declaration order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit offset `(dx, dy)`.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    /// Script-facing name (`North`, ...).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Direction::North => "North",
            Direction::East => "East",
            Direction::South => "South",
            Direction::West => "West",
        }
    }

    /// Look up a direction by its script-facing name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

/// Tradeable and usable goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Item {
    /// Harvested from Hay.
    Hay,
    /// Harvested from Bush and Tree.
    Wood,
    /// Harvested from Carrot.
    Carrot,
    /// Plants a Carrot.
    CarrotSeed,
    /// Harvested from Pumpkin squares.
    Pumpkin,
    /// Plants a Pumpkin.
    PumpkinSeed,
    /// Fills up over time into a Full Bucket.
    EmptyBucket,
    /// Waters a cell.
    FullBucket,
    /// Advances a plant's growth.
    Fertilizer,
    /// Plants a Sunflower.
    SunflowerSeed,
    /// Doubles the drone speed while positive; slowly drains.
    Power,
    /// Plants a Cactus.
    CactusSeed,
    /// Cactus goods.
    Cactus,
}

impl Item {
    /// All items in declaration order.
    pub const ALL: [Item; 13] = [
        Item::Hay,
        Item::Wood,
        Item::Carrot,
        Item::CarrotSeed,
        Item::Pumpkin,
        Item::PumpkinSeed,
        Item::EmptyBucket,
        Item::FullBucket,
        Item::Fertilizer,
        Item::SunflowerSeed,
        Item::Power,
        Item::CactusSeed,
        Item::Cactus,
    ];

    /// Display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Item::Hay => "Hay",
            Item::Wood => "Wood",
            Item::Carrot => "Carrot",
            Item::CarrotSeed => "Carrot Seed",
            Item::Pumpkin => "Pumpkin",
            Item::PumpkinSeed => "Pumpkin Seed",
            Item::EmptyBucket => "Empty Bucket",
            Item::FullBucket => "Full Bucket",
            Item::Fertilizer => "Fertilizer",
            Item::SunflowerSeed => "Sunflower Seed",
            Item::Power => "Power",
            Item::CactusSeed => "Cactus Seed",
            Item::Cactus => "Cactus",
        }
    }

    /// Identifier used in scripts (`Item.CARROT_SEED`) and in the store.
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Item::Hay => "HAY",
            Item::Wood => "WOOD",
            Item::Carrot => "CARROT",
            Item::CarrotSeed => "CARROT_SEED",
            Item::Pumpkin => "PUMPKIN",
            Item::PumpkinSeed => "PUMPKIN_SEED",
            Item::EmptyBucket => "EMPTY_BUCKET",
            Item::FullBucket => "FULL_BUCKET",
            Item::Fertilizer => "FERTILIZER",
            Item::SunflowerSeed => "SUNFLOWER_SEED",
            Item::Power => "POWER",
            Item::CactusSeed => "CACTUS_SEED",
            Item::Cactus => "CACTUS",
        }
    }

    /// Look up an item by identifier.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.identifier() == identifier)
    }

    /// Ingredients consumed to craft one unit. Empty means not tradeable.
    #[must_use]
    pub const fn recipe(self) -> &'static [(Item, u32)] {
        match self {
            Item::CarrotSeed => &[(Item::Wood, 1), (Item::Hay, 1)],
            Item::PumpkinSeed => &[(Item::Carrot, 2)],
            Item::EmptyBucket => &[(Item::Wood, 5)],
            Item::Fertilizer => &[(Item::Pumpkin, 10)],
            Item::SunflowerSeed => &[(Item::Carrot, 5)],
            Item::CactusSeed => &[(Item::Power, 5)],
            Item::Hay
            | Item::Wood
            | Item::Carrot
            | Item::Pumpkin
            | Item::FullBucket
            | Item::Power
            | Item::Cactus => &[],
        }
    }

    /// Whether `use_item` accepts this item.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Item::FullBucket | Item::Fertilizer)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Occupant of a field cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Entity {
    /// Empty cell.
    Nothing,
    /// Grows by itself on dirt.
    #[default]
    Hay,
    /// Yields wood.
    Bush,
    /// Yields wood, slowed by neighboring trees.
    Tree,
    /// Needs tilled soil.
    Carrot,
    /// Harvested in squares.
    Pumpkin,
    /// Harvested by strict maximum rank.
    Sunflower,
    /// Harvested when sorted.
    Cactus,
}

impl Entity {
    /// All entities in declaration order.
    pub const ALL: [Entity; 8] = [
        Entity::Nothing,
        Entity::Hay,
        Entity::Bush,
        Entity::Tree,
        Entity::Carrot,
        Entity::Pumpkin,
        Entity::Sunflower,
        Entity::Cactus,
    ];

    /// Display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Entity::Nothing => "Nothing",
            Entity::Hay => "Hay",
            Entity::Bush => "Bush",
            Entity::Tree => "Tree",
            Entity::Carrot => "Carrot",
            Entity::Pumpkin => "Pumpkin",
            Entity::Sunflower => "Sunflower",
            Entity::Cactus => "Cactus",
        }
    }

    /// Identifier used in scripts (`Entity.PUMPKIN`) and in the store.
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Entity::Nothing => "NOTHING",
            Entity::Hay => "HAY",
            Entity::Bush => "BUSH",
            Entity::Tree => "TREE",
            Entity::Carrot => "CARROT",
            Entity::Pumpkin => "PUMPKIN",
            Entity::Sunflower => "SUNFLOWER",
            Entity::Cactus => "CACTUS",
        }
    }

    /// Look up an entity by identifier.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.identifier() == identifier)
    }

    /// Item consumed when planting, if any.
    #[must_use]
    pub const fn planting_item(self) -> Option<Item> {
        match self {
            Entity::Carrot => Some(Item::CarrotSeed),
            Entity::Pumpkin => Some(Item::PumpkinSeed),
            Entity::Sunflower => Some(Item::SunflowerSeed),
            Entity::Cactus => Some(Item::CactusSeed),
            Entity::Nothing | Entity::Hay | Entity::Bush | Entity::Tree => None,
        }
    }

    /// Whether planting requires tilled ground.
    #[must_use]
    pub const fn requires_tilled(self) -> bool {
        matches!(
            self,
            Entity::Carrot | Entity::Pumpkin | Entity::Sunflower | Entity::Cactus
        )
    }

    /// Growth per second at zero water.
    #[must_use]
    pub const fn growth_rate(self) -> f64 {
        match self {
            Entity::Nothing => 0.0,
            Entity::Hay => 0.5,
            Entity::Bush => 0.35,
            Entity::Tree => 0.1,
            Entity::Carrot => 0.25,
            Entity::Pumpkin => 0.2,
            Entity::Sunflower | Entity::Cactus => 0.3,
        }
    }

    /// Ranks a freshly planted cell draws its measure from.
    #[must_use]
    pub const fn measure_ranks(self) -> Option<RangeInclusive<u32>> {
        match self {
            Entity::Sunflower => Some(1..=16),
            Entity::Cactus => Some(1..=10),
            _ => None,
        }
    }

    /// Item credited by a harvest.
    #[must_use]
    pub const fn harvest_item(self) -> Option<Item> {
        match self {
            Entity::Nothing => None,
            Entity::Hay => Some(Item::Hay),
            Entity::Bush | Entity::Tree => Some(Item::Wood),
            Entity::Carrot => Some(Item::Carrot),
            Entity::Pumpkin => Some(Item::Pumpkin),
            Entity::Sunflower | Entity::Cactus => Some(Item::Power),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Ground state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ground {
    /// Untilled.
    #[default]
    Dirt,
    /// Tilled.
    Tilled,
}

impl Ground {
    /// Identifier used in scripts (`Ground.TILLED`) and in the store.
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Ground::Dirt => "DIRT",
            Ground::Tilled => "TILLED",
        }
    }

    /// Look up a ground state by identifier.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        [Ground::Dirt, Ground::Tilled]
            .into_iter()
            .find(|g| g.identifier() == identifier)
    }

    /// The other ground state.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Ground::Dirt => Ground::Tilled,
            Ground::Tilled => Ground::Dirt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_round_trip() {
        for item in Item::ALL {
            assert_eq!(Item::from_identifier(item.identifier()), Some(item));
        }
        for entity in Entity::ALL {
            assert_eq!(Entity::from_identifier(entity.identifier()), Some(entity));
        }
        assert_eq!(Ground::from_identifier("TILLED"), Some(Ground::Tilled));
        assert_eq!(Item::from_identifier("carrot"), None);
    }

    #[test]
    fn test_serde_names_match_identifiers() {
        for item in Item::ALL {
            let json = serde_json::to_string(&item).unwrap();
            assert_eq!(json, format!("\"{}\"", item.identifier()));
        }
        for entity in Entity::ALL {
            let json = serde_json::to_string(&entity).unwrap();
            assert_eq!(json, format!("\"{}\"", entity.identifier()));
        }
    }

    #[test]
    fn test_recipes_only_reference_other_items() {
        for item in Item::ALL {
            for (ingredient, count) in item.recipe() {
                assert_ne!(*ingredient, item);
                assert!(*count > 0);
            }
        }
        assert!(Item::Hay.recipe().is_empty());
        assert_eq!(Item::CarrotSeed.recipe(), &[(Item::Wood, 1), (Item::Hay, 1)]);
    }

    #[test]
    fn test_planting_requirements_are_consistent() {
        for entity in Entity::ALL {
            // Everything that needs a seed needs tilled soil, and vice versa.
            assert_eq!(entity.planting_item().is_some(), entity.requires_tilled());
        }
        assert_eq!(Entity::Sunflower.measure_ranks(), Some(1..=16));
        assert_eq!(Entity::Tree.measure_ranks(), None);
    }

    #[test]
    fn test_direction_offsets_cancel() {
        let (nx, ny) = Direction::North.offset();
        let (sx, sy) = Direction::South.offset();
        assert_eq!((nx + sx, ny + sy), (0, 0));
        let (ex, ey) = Direction::East.offset();
        let (wx, wy) = Direction::West.offset();
        assert_eq!((ex + wx, ey + wy), (0, 0));
        assert_eq!(Direction::from_name("West"), Some(Direction::West));
    }
}
