#![no_main]

use arbitrary::Arbitrary;
use furrow::game::invariants::check_invariants;
use furrow::scheduler::ManualClock;
use furrow::{Allowlist, Farm, GameState, Item, RunOptions, SimConfig, StateStore, run_script};
use libfuzzer_sys::fuzz_target;

/// Structured input: a tiny script built from primitive calls.
#[derive(Arbitrary, Debug)]
struct FarmInput {
    /// World edge length (capped).
    size: u8,
    /// Starting seeds and buckets.
    stock: [u8; 4],
    /// Calls to make, by index into `CALLS`.
    calls: Vec<u8>,
    /// RNG seed for planting ranks.
    seed: u64,
}

const CALLS: [&str; 16] = [
    "move(North)",
    "move(East)",
    "move(South)",
    "move(West)",
    "till()",
    "harvest()",
    "plant(Entity.PUMPKIN)",
    "plant(Entity.SUNFLOWER)",
    "plant(Entity.CACTUS)",
    "plant(Entity.CARROT)",
    "plant(Entity.TREE)",
    "swap(East)",
    "swap(North)",
    "use_item(Item.FULL_BUCKET)",
    "use_item(Item.FERTILIZER)",
    "delay(1)",
];

fuzz_target!(|input: FarmInput| {
    let size = u16::from(input.size % 8) + 1;
    let Ok(mut state) = GameState::new(size, size) else {
        return;
    };
    let stock = [Item::PumpkinSeed, Item::SunflowerSeed, Item::CactusSeed, Item::FullBucket];
    for (item, amount) in stock.into_iter().zip(input.stock) {
        state.set_item_count(item, f64::from(amount));
    }
    state.set_item_count(Item::Fertilizer, 10.0);
    state.set_item_count(Item::CarrotSeed, 10.0);

    let source: String = input
        .calls
        .iter()
        .take(256)
        .map(|&i| format!("{}\n", CALLS[usize::from(i) % CALLS.len()]))
        .collect();

    let mut farm = Farm::new(state, ManualClock::new(), SimConfig::default(), input.seed);
    let outcome = run_script(&mut farm, &source, &Allowlist::default(), &RunOptions::default());
    assert!(outcome.succeeded(), "{:?}", outcome.error);

    let violations = check_invariants(farm.store());
    assert!(violations.is_empty(), "{violations:?}");
});
