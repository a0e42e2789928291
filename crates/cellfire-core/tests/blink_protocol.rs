//! Integration tests for the Blink phase: firing, nudging, border
//! propagation and quiescence detection across real cell workers.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cellfire_core::blink::BlinkSignal;
use cellfire_core::{Firefly, SimulationConfig, World};
use cellfire_events::{BlinkRecord, ChannelSink, NullSink};
use cellfire_types::{CellCoord, Direction, FireflyId};
use tokio::sync::mpsc;

const PERIOD: u64 = 1_000_000;
const NUDGE: u64 = 50_000;

fn config(columns: u32, rows: u32, cell_size: f32) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.world.columns = columns;
    config.world.rows = rows;
    config.world.cell_size = cell_size;
    config.swarm.turn_jitter_degrees = 0;
    config.coupling.nudge_amount_us = NUDGE;
    config
}

async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("blink round did not reach quiescence in time")
}

fn drain(rx: &mut mpsc::UnboundedReceiver<BlinkRecord>) -> Vec<BlinkRecord> {
    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}

async fn spawn_at(world: &mut World, id: u32, x: f32, y: f32, next_blink: u64) -> FireflyId {
    let id = FireflyId::new(id);
    world
        .insert_firefly(Firefly::new(id, x, y, 0, PERIOD, next_blink))
        .await
        .unwrap();
    id
}

async fn get(world: &World, id: FireflyId) -> Firefly {
    world.find_firefly(id).await.unwrap().1
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_blink_nudges_a_close_neighbor_without_firing_it() {
    let (sink, mut rx) = ChannelSink::new();
    let mut world = World::new(&config(3, 3, 100.0), Arc::new(sink)).unwrap();
    let f = spawn_at(&mut world, 0, 150.0, 150.0, 0).await;
    let g = spawn_at(&mut world, 1, 151.0, 151.0, 500_000).await;

    let blinks = within(world.blink_phase()).await.unwrap();

    assert_eq!(blinks, 1);
    let g_after = get(&world, g).await;
    assert_eq!(g_after.next_blink(), 500_000 - NUDGE);
    assert!(g_after.is_nudgeable());

    let f_after = get(&world, f).await;
    assert_eq!(f_after.next_blink(), PERIOD);
    assert!(!f_after.is_nudgeable());

    let records = drain(&mut rx);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].firefly, f);
    assert_eq!((records[0].second, records[0].millisecond), (0, 0));
    world.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_cascade_fires_every_link_once() {
    let (sink, mut rx) = ChannelSink::new();
    let mut world = World::new(&config(3, 3, 100.0), Arc::new(sink)).unwrap();
    let f1 = spawn_at(&mut world, 0, 150.0, 150.0, 0).await;
    let f2 = spawn_at(&mut world, 1, 151.0, 151.0, NUDGE).await;
    let f3 = spawn_at(&mut world, 2, 152.0, 152.0, 2 * NUDGE).await;

    let blinks = within(world.blink_phase()).await.unwrap();
    assert_eq!(blinks, 3);

    for id in [f1, f2, f3] {
        let f = get(&world, id).await;
        assert!(!f.is_nudgeable(), "firefly {id} should have fired");
        assert_eq!(f.last_blink(), 0);
        assert_eq!(f.next_blink(), PERIOD);
    }

    let fired: BTreeSet<FireflyId> = drain(&mut rx).iter().map(|r| r.firefly).collect();
    assert_eq!(fired, BTreeSet::from([f1, f2, f3]));
    world.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fireflies_out_of_range_are_not_nudged() {
    let mut world = World::new(&config(3, 3, 100.0), Arc::new(NullSink)).unwrap();
    spawn_at(&mut world, 0, 110.0, 110.0, 0).await;
    let far = spawn_at(&mut world, 1, 190.0, 190.0, 500_000).await;

    within(world.blink_phase()).await.unwrap();
    assert_eq!(get(&world, far).await.next_blink(), 500_000);
    world.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blinks_cross_cell_borders() {
    let mut world = World::new(&config(3, 3, 100.0), Arc::new(NullSink)).unwrap();
    spawn_at(&mut world, 0, 99.0, 50.0, 0).await;
    let across = spawn_at(&mut world, 1, 101.0, 50.0, 500_000).await;
    let wrapped = spawn_at(&mut world, 2, 299.0, 50.0, 500_000).await;

    within(world.blink_phase()).await.unwrap();

    // Right neighbor is reached through the shared edge.
    assert_eq!(get(&world, across).await.next_blink(), 500_000 - NUDGE);
    // Cell (2, 0) does not share the edge the blink was close to.
    assert_eq!(get(&world, wrapped).await.next_blink(), 500_000);
    world.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blinks_wrap_around_the_torus() {
    let mut world = World::new(&config(3, 3, 100.0), Arc::new(NullSink)).unwrap();
    spawn_at(&mut world, 0, 1.0, 50.0, 0).await;
    let wrapped = spawn_at(&mut world, 1, 299.0, 50.0, 500_000).await;

    within(world.blink_phase()).await.unwrap();
    assert_eq!(get(&world, wrapped).await.next_blink(), 500_000 - NUDGE);
    world.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn corner_blink_reaches_right_and_top_neighbors() {
    let world_cfg = config(10, 10, 100.0);
    let mut world = World::new(&world_cfg, Arc::new(NullSink)).unwrap();
    let f = spawn_at(&mut world, 0, 99.5, 99.5, u64::MAX).await;

    let reached = world.propagate_blink(f).await.unwrap();

    assert_eq!(reached, 2);
    assert_eq!(world.queued_blinks(CellCoord::new(1, 0)).unwrap(), 1);
    assert_eq!(world.queued_blinks(CellCoord::new(0, 1)).unwrap(), 1);
    assert_eq!(world.queued_blinks(CellCoord::new(0, 0)).unwrap(), 0);
    assert_eq!(world.queued_blinks(CellCoord::new(1, 1)).unwrap(), 0);
    world.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn edge_blink_reaches_exactly_one_neighbor() {
    let mut world = World::new(&config(10, 10, 100.0), Arc::new(NullSink)).unwrap();
    let f = spawn_at(&mut world, 0, 99.5, 50.0, u64::MAX).await;

    assert_eq!(world.propagate_blink(f).await.unwrap(), 1);
    assert_eq!(world.queued_blinks(CellCoord::new(1, 0)).unwrap(), 1);
    assert_eq!(world.queued_blinks(CellCoord::new(0, 1)).unwrap(), 0);
    assert_eq!(world.queued_blinks(CellCoord::new(9, 0)).unwrap(), 0);

    let center = spawn_at(&mut world, 1, 350.0, 350.0, u64::MAX).await;
    assert_eq!(world.propagate_blink(center).await.unwrap(), 0);
    world.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn send_blink_wraps_at_the_grid_edge() {
    let world = World::new(&config(10, 10, 100.0), Arc::new(NullSink)).unwrap();
    let origin = CellCoord::new(0, 0);
    let signal = BlinkSignal {
        firefly: FireflyId::new(0),
        x: 0.5,
        y: 0.5,
    };

    let cases = [
        (Direction::Left, CellCoord::new(9, 0)),
        (Direction::Bottom, CellCoord::new(0, 9)),
        (Direction::Right, CellCoord::new(1, 0)),
        (Direction::Top, CellCoord::new(0, 1)),
    ];
    for (direction, expected) in cases {
        let target = world
            .send_blink_to_neighbor(signal, origin, direction)
            .await
            .unwrap();
        assert_eq!(target, expected, "{direction:?}");
        assert_eq!(world.queued_blinks(expected).unwrap(), 1, "{direction:?}");
    }
    world.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queued_blinks_from_outside_a_round_are_absorbed_by_the_next_one() {
    let mut world = World::new(&config(3, 3, 100.0), Arc::new(NullSink)).unwrap();
    let g = spawn_at(&mut world, 0, 150.0, 150.0, 500_000).await;
    let stray = BlinkSignal {
        firefly: FireflyId::new(99),
        x: 149.0,
        y: 150.0,
    };
    world
        .send_blink_to_neighbor(stray, CellCoord::new(0, 1), Direction::Right)
        .await
        .unwrap();

    within(world.blink_phase()).await.unwrap();
    assert_eq!(get(&world, g).await.next_blink(), 500_000 - NUDGE);
    assert_eq!(world.queued_blinks(CellCoord::new(1, 1)).unwrap(), 0);
    world.shutdown().await;
}

/// Fireflies laid out on a lattice with deadlines spread over a few ticks,
/// dense enough that cascades cross many cell borders.
async fn lattice(world: &mut World, count: u32) {
    for i in 0..count {
        let x = ((i * 37) % 200) as f32 + 0.5;
        let y = ((i * 53) % 150) as f32 + 0.5;
        let next_blink = u64::from(i * 7_919) % 150_000;
        world
            .insert_firefly(Firefly::new(FireflyId::new(i), x, y, 0, PERIOD, next_blink))
            .await
            .unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn every_round_terminates_and_nudgeable_matches_fired() {
    let (sink, mut rx) = ChannelSink::new();
    let mut cfg = config(4, 3, 50.0);
    cfg.coupling.nudge_radius = 40.0;
    let mut world = World::new(&cfg, Arc::new(sink)).unwrap();
    lattice(&mut world, 240).await;

    let mut total = 0;
    for _ in 0..12 {
        let summary = within(world.step()).await.unwrap();
        let records = drain(&mut rx);
        assert_eq!(records.len() as u64, summary.blinks);

        let fired: BTreeSet<FireflyId> = records.iter().map(|r| r.firefly).collect();
        assert_eq!(fired.len(), records.len(), "a firefly fired twice in one round");

        let not_nudgeable: BTreeSet<FireflyId> = world
            .fireflies()
            .await
            .into_iter()
            .filter(|f| !f.is_nudgeable())
            .map(|f| f.id())
            .collect();
        assert_eq!(fired, not_nudgeable, "tick {}", summary.tick);
        total += summary.blinks;
    }

    // Every deadline lies in the first 150ms and nudges only pull them
    // earlier, so everyone fired at least once.
    assert!(total >= 240, "only {total} firings");
    for cell in world.cells() {
        assert_eq!(world.queued_blinks(cell.coord()).unwrap(), 0);
    }
    world.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn single_cell_world_terminates() {
    let mut world = World::new(&config(1, 1, 100.0), Arc::new(NullSink)).unwrap();
    for i in 0..20 {
        let f = i as f32;
        spawn_at(&mut world, i, 40.0 + f, 40.0 + f, u64::from(i) * NUDGE).await;
    }
    let blinks = within(world.blink_phase()).await.unwrap();
    assert_eq!(blinks, 20);
    world.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_world_rounds_terminate() {
    let mut world = World::new(&config(6, 6, 10.0), Arc::new(NullSink)).unwrap();
    for _ in 0..50 {
        let summary = within(world.step()).await.unwrap();
        assert_eq!(summary.blinks, 0);
    }
    world.shutdown().await;
}
