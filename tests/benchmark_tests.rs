//! Performance benchmarks for the hot paths of the replication layer.

use shared::codec::{decode_message, encode_frame};
use shared::units::Ship;
use shared::{EntityRegistry, IdAllocator, Message, Replica, Vec2, WorldBounds};
use std::collections::HashMap;
use std::time::Instant;

/// Benchmarks the per-entity update blob encode
#[test]
fn benchmark_update_encoding() {
    let ids = IdAllocator::new();
    let mut ship = Ship::new(&ids, "P1", 100);
    ship.velocity = Vec2::new(10.0, -5.0);

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = ship.encode_update();
    }

    let duration = start.elapsed();
    println!(
        "Update encoding: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks a full registry update pass over a large entity set
#[test]
fn benchmark_registry_update_pass() {
    let ids = IdAllocator::new();
    let world = WorldBounds::new(800.0, 600.0);
    let mut registry = EntityRegistry::new();

    for i in 0..500 {
        let mut ship = Ship::new(&ids, &format!("P{}", i % 8), 100);
        ship.core_mut().position = Vec2::new(400.0, 300.0);
        ship.velocity = Vec2::new(0.1, 0.1);
        registry.add(Box::new(ship));
    }
    assert_eq!(registry.len(), 500);

    let ticks = 100;
    let start = Instant::now();

    for _ in 0..ticks {
        registry.update(0.001, &world);
    }

    let duration = start.elapsed();
    println!(
        "Registry update: {} entities x {} ticks in {:?} ({:.2} us/tick)",
        registry.len(),
        ticks,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    assert_eq!(registry.len(), 500, "nothing was culled");
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks snapshot application against a populated registry
#[test]
fn benchmark_snapshot_application() {
    let ids = IdAllocator::new();
    let mut registry = EntityRegistry::new();
    let mut updates = HashMap::new();

    for _ in 0..500 {
        let mut ship = Ship::new(&ids, "P1", 100);
        ship.core_mut().position = Vec2::new(1.0, 2.0);
        updates.insert(ship.key(), ship.encode_update());
        registry.add(Box::new(ship));
    }

    let iterations = 200;
    let start = Instant::now();

    for _ in 0..iterations {
        for (key, blob) in &updates {
            registry.lookup_mut(key).unwrap().apply_update(blob).unwrap();
        }
    }

    let duration = start.elapsed();
    println!(
        "Snapshot apply: {} entities x {} rounds in {:?} ({:.2} us/round)",
        updates.len(),
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}

/// Benchmarks the frame codec with a realistically sized snapshot
#[test]
fn benchmark_frame_codec() {
    let ids = IdAllocator::new();
    let mut updates = HashMap::new();
    for _ in 0..64 {
        let mut ship = Ship::new(&ids, "P1", 100);
        updates.insert(ship.key(), ship.encode_update());
    }
    let message = Message::Snapshot {
        timestamp: 1,
        updates,
    };

    let iterations = 5_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = encode_frame(&message).unwrap();
        let _ = decode_message(&frame[4..]).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Frame codec: {} iterations in {:?} ({:.2} us/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}
