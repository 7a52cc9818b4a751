//! Drone and inventory primitives.
//!
//! A [`Farm`] bundles a state store with its scheduler. Every primitive checks
//! its precondition, mutates the store, and finishes with exactly one
//! scheduler tick. Rule violations are not errors: the primitive returns
//! `false` and is charged the rejected cost.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::SimConfig;
use crate::error::FaultResult;
use crate::game::harvest;
use crate::game::{Cell, Direction, Entity, Ground, Item, StateStore};
use crate::scheduler::{Clock, Scheduler};

/// Script-callable primitives, by script name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `move(dir)`
    Move,
    /// `measure(dir?)`
    Measure,
    /// `get_water()`
    GetWater,
    /// `harvest()`
    Harvest,
    /// `can_harvest()`
    CanHarvest,
    /// `plant(entity)`
    Plant,
    /// `till()`
    Till,
    /// `trade(item)`
    Trade,
    /// `use_item(item)`
    UseItem,
    /// `swap(dir)`
    Swap,
    /// `num_items(item)`
    NumItems,
    /// `get_pos_x()`
    GetPosX,
    /// `get_pos_y()`
    GetPosY,
    /// `get_world_size()`
    GetWorldSize,
    /// `delay(seconds)`
    Delay,
}

impl Primitive {
    /// All primitives.
    pub const ALL: [Primitive; 15] = [
        Primitive::Move,
        Primitive::Measure,
        Primitive::GetWater,
        Primitive::Harvest,
        Primitive::CanHarvest,
        Primitive::Plant,
        Primitive::Till,
        Primitive::Trade,
        Primitive::UseItem,
        Primitive::Swap,
        Primitive::NumItems,
        Primitive::GetPosX,
        Primitive::GetPosY,
        Primitive::GetWorldSize,
        Primitive::Delay,
    ];

    /// Name scripts call the primitive by.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Move => "move",
            Primitive::Measure => "measure",
            Primitive::GetWater => "get_water",
            Primitive::Harvest => "harvest",
            Primitive::CanHarvest => "can_harvest",
            Primitive::Plant => "plant",
            Primitive::Till => "till",
            Primitive::Trade => "trade",
            Primitive::UseItem => "use_item",
            Primitive::Swap => "swap",
            Primitive::NumItems => "num_items",
            Primitive::GetPosX => "get_pos_x",
            Primitive::GetPosY => "get_pos_y",
            Primitive::GetWorldSize => "get_world_size",
            Primitive::Delay => "delay",
        }
    }

    /// Look up a primitive by script name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Accepted argument counts, inclusive.
    #[must_use]
    pub const fn arity(self) -> (usize, usize) {
        match self {
            Primitive::Measure => (0, 1),
            Primitive::Move
            | Primitive::Plant
            | Primitive::Trade
            | Primitive::UseItem
            | Primitive::Swap
            | Primitive::NumItems
            | Primitive::Delay => (1, 1),
            Primitive::GetWater
            | Primitive::Harvest
            | Primitive::CanHarvest
            | Primitive::Till
            | Primitive::GetPosX
            | Primitive::GetPosY
            | Primitive::GetWorldSize => (0, 0),
        }
    }
}

type Echo = Box<dyn FnMut(&str) + Send>;

/// Printed lines a farm keeps; older lines are dropped first.
pub const MAX_TRANSCRIPT_LINES: usize = 1000;

/// A store, its scheduler, and the randomness used for planting.
pub struct Farm<S: StateStore, C: Clock> {
    store: S,
    scheduler: Scheduler<C>,
    rng: StdRng,
    transcript: Vec<String>,
    echo: Option<Echo>,
}

impl<S: StateStore + fmt::Debug, C: Clock + fmt::Debug> fmt::Debug for Farm<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Farm")
            .field("store", &self.store)
            .field("scheduler", &self.scheduler)
            .field("transcript", &self.transcript.len())
            .field("echo", &self.echo.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: StateStore, C: Clock> Farm<S, C> {
    /// Create a farm. `seed` drives the ranks assigned at planting time.
    pub fn new(store: S, clock: C, config: SimConfig, seed: u64) -> Self {
        Self {
            store,
            scheduler: Scheduler::new(clock, config),
            rng: StdRng::seed_from_u64(seed),
            transcript: Vec::new(),
            echo: None,
        }
    }

    /// Forward every printed line to `echo` as well as the transcript.
    pub fn set_echo<F>(&mut self, echo: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.echo = Some(Box::new(echo));
    }

    /// The state store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The state store, mutably.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consume the farm, returning its store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// The scheduler.
    pub const fn scheduler(&self) -> &Scheduler<C> {
        &self.scheduler
    }

    /// The scheduler, mutably.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler<C> {
        &mut self.scheduler
    }

    /// The most recent [`MAX_TRANSCRIPT_LINES`] printed lines.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Take the printed lines, leaving the transcript empty.
    pub fn take_transcript(&mut self) -> Vec<String> {
        std::mem::take(&mut self.transcript)
    }

    /// Random source shared by planting and the script's `random` builtins.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Seconds on the scheduler's clock.
    pub fn clock_time(&self) -> f64 {
        self.scheduler.clock().now()
    }

    fn config(&self) -> SimConfig {
        *self.scheduler.config()
    }

    fn tick(&mut self, operations: u32) -> FaultResult<()> {
        self.scheduler.tick(&mut self.store, operations)
    }

    fn succeed(&mut self) -> FaultResult<bool> {
        let ops = self.config().costs.default_ops;
        self.tick(ops)?;
        Ok(true)
    }

    fn reject(&mut self, primitive: Primitive, reason: &str) -> FaultResult<bool> {
        debug!(primitive = primitive.name(), reason, "rejected");
        let ops = self.config().costs.rejected_ops;
        self.tick(ops)?;
        Ok(false)
    }

    fn query_tick(&mut self) -> FaultResult<()> {
        let ops = self.config().costs.query_ops;
        self.tick(ops)
    }

    /// Move one cell in `dir`, wrapping at the edges.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and store faults.
    pub fn move_drone(&mut self, dir: Direction) -> FaultResult<bool> {
        let size = self.store.world_size();
        let next = self.store.drone().position.step(dir, size);
        self.store.set_drone_position(next)?;
        self.succeed()
    }

    /// Entity on the drone's cell, or on the neighbor in `dir`.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and store faults.
    pub fn measure(&mut self, dir: Option<Direction>) -> FaultResult<Entity> {
        let mut pos = self.store.drone().position;
        if let Some(dir) = dir {
            pos = pos.step(dir, self.store.world_size());
        }
        self.succeed()?;
        Ok(self.store.cell(pos)?.entity)
    }

    /// Water level of the drone's cell.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and store faults.
    pub fn get_water(&mut self) -> FaultResult<f64> {
        let pos = self.store.drone().position;
        self.succeed()?;
        Ok(self.store.cell(pos)?.water())
    }

    /// Harvest the drone's cell.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and store faults.
    pub fn harvest(&mut self) -> FaultResult<bool> {
        let pos = self.store.drone().position;
        let outcome = harvest::resolve(&self.store, pos)?;
        if !outcome.harvested() {
            return self.reject(Primitive::Harvest, "nothing grown");
        }
        harvest::apply(&mut self.store, &outcome)?;
        self.succeed()
    }

    /// Whether the drone's cell holds something fully grown.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and store faults.
    pub fn can_harvest(&mut self) -> FaultResult<bool> {
        self.succeed()?;
        let cell = self.store.cell(self.store.drone().position)?;
        Ok(cell.entity.harvest_item().is_some() && cell.is_grown())
    }

    /// Plant `entity` on the drone's cell.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and store faults.
    pub fn plant(&mut self, entity: Entity) -> FaultResult<bool> {
        let pos = self.store.drone().position;
        let mut cell = self.store.cell(pos)?;
        if entity.requires_tilled() && cell.ground != Ground::Tilled {
            return self.reject(Primitive::Plant, "ground not tilled");
        }
        if let Some(seed) = entity.planting_item() {
            if self.store.item_count(seed) < 1.0 {
                return self.reject(Primitive::Plant, "no seeds");
            }
            self.store.remove_items(seed, 1.0);
        }
        cell.entity = entity;
        cell.set_growth(0.0);
        cell.measure = entity.measure_ranks().map(|ranks| self.rng.gen_range(ranks));
        self.store.set_cell(pos, cell)?;
        self.succeed()
    }

    /// Toggle the ground of the drone's cell.
    ///
    /// Untilling removes any occupant that needs tilled soil.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and store faults.
    pub fn till(&mut self) -> FaultResult<()> {
        let pos = self.store.drone().position;
        self.store.update_cell(pos, |cell| {
            cell.ground = cell.ground.toggled();
            if cell.ground == Ground::Dirt && cell.entity.requires_tilled() {
                cell.entity = Entity::Nothing;
                cell.set_growth(0.0);
                cell.measure = None;
            }
        })?;
        self.succeed()?;
        Ok(())
    }

    /// Craft one `item` from its recipe.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and store faults.
    pub fn trade(&mut self, item: Item) -> FaultResult<bool> {
        let recipe = item.recipe();
        if recipe.is_empty() {
            return self.reject(Primitive::Trade, "not tradeable");
        }
        let affordable = recipe
            .iter()
            .all(|&(ingredient, count)| self.store.item_count(ingredient) >= f64::from(count));
        if !affordable {
            return self.reject(Primitive::Trade, "missing ingredients");
        }
        for &(ingredient, count) in recipe {
            self.store.remove_items(ingredient, f64::from(count));
        }
        self.store.add_items(item, 1.0);
        self.succeed()
    }

    /// Apply one `item` to the drone's cell.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and store faults.
    pub fn use_item(&mut self, item: Item) -> FaultResult<bool> {
        if !item.is_usable() {
            return self.reject(Primitive::UseItem, "not usable");
        }
        if self.store.item_count(item) < 1.0 {
            return self.reject(Primitive::UseItem, "none in inventory");
        }
        let config = self.config();
        let pos = self.store.drone().position;
        self.store.update_cell(pos, |cell| match item {
            Item::Fertilizer => {
                let boost = config.fertilizer_seconds * cell.entity.growth_rate();
                cell.set_growth(cell.growth() + boost);
            }
            Item::FullBucket => cell.set_water(cell.water() + config.bucket_water),
            _ => {}
        })?;
        self.store.remove_items(item, 1.0);
        self.succeed()
    }

    /// Exchange occupant, growth and measure with the neighbor in `dir`.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and store faults.
    pub fn swap(&mut self, dir: Direction) -> FaultResult<bool> {
        let here = self.store.drone().position;
        let there = here.step(dir, self.store.world_size());
        let a = self.store.cell(here)?;
        let b = self.store.cell(there)?;
        let moved = |to: Cell, from: Cell| {
            let mut cell = to;
            cell.entity = from.entity;
            cell.set_growth(from.raw_growth());
            cell.measure = from.measure;
            cell
        };
        self.store.set_cell(here, moved(a, b))?;
        self.store.set_cell(there, moved(b, a))?;
        self.succeed()
    }

    /// Whole units of `item` in the inventory.
    ///
    /// # Errors
    ///
    /// Propagates scheduler faults.
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_items(&mut self, item: Item) -> FaultResult<i64> {
        self.succeed()?;
        Ok(self.store.item_count(item).floor() as i64)
    }

    /// Drone column.
    ///
    /// # Errors
    ///
    /// Propagates scheduler faults.
    pub fn get_pos_x(&mut self) -> FaultResult<i64> {
        self.query_tick()?;
        Ok(i64::from(self.store.drone().position.x))
    }

    /// Drone row.
    ///
    /// # Errors
    ///
    /// Propagates scheduler faults.
    pub fn get_pos_y(&mut self) -> FaultResult<i64> {
        self.query_tick()?;
        Ok(i64::from(self.store.drone().position.y))
    }

    /// Edge length of the current world.
    ///
    /// # Errors
    ///
    /// Propagates scheduler faults.
    pub fn get_world_size(&mut self) -> FaultResult<i64> {
        self.query_tick()?;
        Ok(i64::from(self.store.world_size()))
    }

    /// Wait `seconds` of real time, at most
    /// [`MAX_SLEEP_SECONDS`](crate::scheduler::MAX_SLEEP_SECONDS).
    ///
    /// # Errors
    ///
    /// Propagates scheduler faults.
    pub fn delay(&mut self, seconds: f64) -> FaultResult<()> {
        self.scheduler.sleep(seconds);
        self.query_tick()
    }

    /// Record a printed line.
    ///
    /// # Errors
    ///
    /// Propagates scheduler faults.
    pub fn print(&mut self, line: String) -> FaultResult<()> {
        debug!(target: "furrow::print", "{line}");
        if let Some(echo) = self.echo.as_mut() {
            echo(&line);
        }
        if self.transcript.len() == MAX_TRANSCRIPT_LINES {
            self.transcript.remove(0);
        }
        self.transcript.push(line);
        let ops = self.config().costs.print_ops;
        self.tick(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fault;
    use crate::game::{Coord, GameState};
    use crate::scheduler::ManualClock;

    fn farm(size: u16) -> Farm<GameState, ManualClock> {
        Farm::new(
            GameState::new(size, size).unwrap(),
            ManualClock::new(),
            SimConfig::default(),
            7,
        )
    }

    #[test]
    fn test_primitive_names_round_trip() {
        for p in Primitive::ALL {
            assert_eq!(Primitive::from_name(p.name()), Some(p));
        }
        assert_eq!(Primitive::from_name("print"), None);
    }

    #[test]
    fn test_move_wraps_east() {
        let mut farm = farm(4);
        farm.store_mut().set_drone_position(Coord::new(3, 2)).unwrap();
        assert!(farm.move_drone(Direction::East).unwrap());
        let drone = farm.store().drone();
        assert_eq!(drone.position, Coord::new(0, 2));
        assert_eq!(drone.last_position, Coord::new(3, 2));
        assert_eq!(farm.scheduler().stats().operations, 200);
    }

    #[test]
    fn test_trade_round_trip() {
        let mut farm = farm(3);
        farm.store_mut().add_items(Item::Wood, 1.0);
        farm.store_mut().add_items(Item::Hay, 1.0);
        assert!(farm.trade(Item::CarrotSeed).unwrap());
        let store = farm.store();
        assert!(store.item_count(Item::Wood).abs() < f64::EPSILON);
        assert!(store.item_count(Item::Hay).abs() < f64::EPSILON);
        assert!((store.item_count(Item::CarrotSeed) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trade_rejected_without_ingredients() {
        let mut farm = farm(3);
        farm.store_mut().add_items(Item::Hay, 1.0);
        let before = farm.store().inventory.clone();
        assert!(!farm.trade(Item::CarrotSeed).unwrap());
        assert_eq!(farm.store().inventory, before);
        assert_eq!(farm.scheduler().stats().operations, 1);
        assert!(!farm.trade(Item::Hay).unwrap());
    }

    #[test]
    fn test_plant_requires_tilled_ground_and_seed() {
        let mut farm = farm(3);
        farm.store_mut().add_items(Item::SunflowerSeed, 1.0);
        assert!(!farm.plant(Entity::Sunflower).unwrap());
        farm.till().unwrap();
        assert!(farm.plant(Entity::Sunflower).unwrap());
        let cell = farm.store().cell(Coord::new(0, 0)).unwrap();
        assert_eq!(cell.entity, Entity::Sunflower);
        assert!(matches!(cell.measure, Some(1..=16)));
        assert!(farm.store().item_count(Item::SunflowerSeed).abs() < f64::EPSILON);
        // Out of seeds now.
        assert!(!farm.plant(Entity::Sunflower).unwrap());
    }

    #[test]
    fn test_plant_bush_needs_nothing() {
        let mut farm = farm(3);
        assert!(farm.plant(Entity::Bush).unwrap());
        let cell = farm.store().cell(Coord::new(0, 0)).unwrap();
        assert_eq!(cell.entity, Entity::Bush);
        assert_eq!(cell.measure, None);
    }

    #[test]
    fn test_untill_clears_seeded_plant() {
        let mut farm = farm(3);
        farm.till().unwrap();
        farm.store_mut().add_items(Item::CactusSeed, 1.0);
        assert!(farm.plant(Entity::Cactus).unwrap());
        farm.till().unwrap();
        let cell = farm.store().cell(Coord::new(0, 0)).unwrap();
        assert_eq!(cell.ground, Ground::Dirt);
        assert_eq!(cell.entity, Entity::Nothing);
        assert_eq!(cell.measure, None);
    }

    #[test]
    fn test_use_bucket_and_fertilizer() {
        let mut farm = farm(3);
        farm.store_mut().add_items(Item::FullBucket, 1.0);
        farm.store_mut().add_items(Item::Fertilizer, 1.0);
        assert!(farm.use_item(Item::FullBucket).unwrap());
        assert!(farm.use_item(Item::Fertilizer).unwrap());
        let cell = farm.store().cell(Coord::new(0, 0)).unwrap();
        assert!(cell.water() > 0.2);
        // Hay: 2 s at 0.5 per second fills it, plus whatever grew during ticks.
        assert!(cell.is_grown());
        assert!(!farm.use_item(Item::FullBucket).unwrap());
        assert!(!farm.use_item(Item::Hay).unwrap());
    }

    #[test]
    fn test_swap_keeps_ground_and_water() {
        let mut farm = farm(3);
        let tree = Cell::new(Entity::Tree, Ground::Tilled)
            .with_growth(0.5)
            .with_water(0.75);
        farm.store_mut().set_cell(Coord::new(1, 0), tree).unwrap();
        assert!(farm.swap(Direction::East).unwrap());
        let here = farm.store().cell(Coord::new(0, 0)).unwrap();
        let there = farm.store().cell(Coord::new(1, 0)).unwrap();
        assert_eq!(here.entity, Entity::Tree);
        assert_eq!(here.ground, Ground::Dirt);
        assert!(here.raw_growth() >= 0.5);
        assert!(here.water() < 0.1);
        assert_eq!(there.entity, Entity::Hay);
        assert_eq!(there.ground, Ground::Tilled);
    }

    #[test]
    fn test_harvest_ungrown_is_rejected() {
        let mut farm = farm(3);
        assert!(!farm.harvest().unwrap());
        assert_eq!(farm.scheduler().stats().operations, 1);
        assert!(!farm.can_harvest().unwrap());
    }

    #[test]
    fn test_harvest_grown_hay() {
        let mut farm = farm(3);
        farm.store_mut()
            .set_cell(Coord::new(0, 0), Cell::default().with_growth(1.0))
            .unwrap();
        assert!(farm.can_harvest().unwrap());
        assert!(farm.harvest().unwrap());
        assert!((farm.store().item_count(Item::Hay) - 1.0).abs() < f64::EPSILON);
        assert_eq!(farm.num_items(Item::Hay).unwrap(), 1);
    }

    #[test]
    fn test_measure_neighbor_and_queries() {
        let mut farm = farm(3);
        farm.store_mut()
            .set_cell(Coord::new(0, 2), Cell::new(Entity::Bush, Ground::Dirt))
            .unwrap();
        assert_eq!(farm.measure(Some(Direction::South)).unwrap(), Entity::Bush);
        assert_eq!(farm.measure(None).unwrap(), Entity::Hay);
        assert_eq!(farm.get_world_size().unwrap(), 3);
        assert_eq!(farm.get_pos_x().unwrap(), 0);
        assert_eq!(farm.get_pos_y().unwrap(), 0);
    }

    #[test]
    fn test_print_records_and_charges() {
        let mut farm = farm(1);
        farm.print("hello 1".to_string()).unwrap();
        assert_eq!(farm.transcript(), ["hello 1".to_string()]);
        assert_eq!(farm.scheduler().stats().operations, 500);
    }

    #[test]
    fn test_transcript_keeps_the_latest_lines() {
        let mut farm = farm(1);
        for i in 0..MAX_TRANSCRIPT_LINES + 5 {
            farm.print(i.to_string()).unwrap();
        }
        assert_eq!(farm.transcript().len(), MAX_TRANSCRIPT_LINES);
        assert_eq!(farm.transcript()[0], "5");
        assert_eq!(farm.transcript().last().map(String::as_str), Some("1004"));
    }

    #[test]
    fn test_stop_flag_interrupts_primitive() {
        let mut farm = farm(3);
        farm.store_mut().request_stop();
        assert!(matches!(farm.move_drone(Direction::North), Err(Fault::Stopped)));
    }

    #[test]
    fn test_delay_advances_clock() {
        let mut farm = farm(1);
        farm.delay(2.5).unwrap();
        assert!(farm.clock_time() >= 2.5);
    }

    #[test]
    fn test_enormous_delay_is_capped() {
        let mut farm = farm(2);
        farm.delay(1e300).unwrap();
        farm.delay(f64::INFINITY).unwrap();
        let limit = crate::scheduler::MAX_SLEEP_SECONDS;
        assert!(farm.clock_time() >= 2.0 * limit);
        assert!(farm.clock_time() < 2.0 * limit + 1.0);
        assert!(crate::game::invariants::check_invariants(farm.store()).is_empty());
    }
}
