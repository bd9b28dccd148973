//! Scripted scenarios exercised by the demo

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Result};
use lanecache::{Error, ShardedCache};
use lanestore::SimulatedStore;
use tracing::{debug, info};

pub type DemoCache = ShardedCache<String, String, SimulatedStore<String, String>>;

/// One scripted check against a shared cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Basic,
    FillToCapacity,
    Eviction,
    Update,
    RepeatedUpdate,
    Concurrent,
    Affinity,
    Miss,
    Stress,
    Failure,
}

impl Scenario {
    pub const ALL: [Scenario; 10] = [
        Scenario::Basic,
        Scenario::FillToCapacity,
        Scenario::Eviction,
        Scenario::Update,
        Scenario::RepeatedUpdate,
        Scenario::Concurrent,
        Scenario::Affinity,
        Scenario::Miss,
        Scenario::Stress,
        Scenario::Failure,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Scenario::Basic => "Basic write and read",
            Scenario::FillToCapacity => "Fill cache to capacity",
            Scenario::Eviction => "LRU eviction",
            Scenario::Update => "Update existing key",
            Scenario::RepeatedUpdate => "Multiple updates to same key",
            Scenario::Concurrent => "Concurrent writes",
            Scenario::Affinity => "Same-key ordering",
            Scenario::Miss => "Cache miss",
            Scenario::Stress => "Stress (100 mixed operations)",
            Scenario::Failure => "Durable store outage",
        }
    }

    /// Run the scenario; `Ok(false)` means the check did not hold
    pub fn run(self, cache: &Arc<DemoCache>) -> Result<bool> {
        debug!(scenario = ?self, "running");
        match self {
            Scenario::Basic => basic(cache),
            Scenario::FillToCapacity => fill_to_capacity(cache),
            Scenario::Eviction => eviction(cache),
            Scenario::Update => update(cache),
            Scenario::RepeatedUpdate => repeated_update(cache),
            Scenario::Concurrent => concurrent(cache),
            Scenario::Affinity => affinity(cache),
            Scenario::Miss => miss(cache),
            Scenario::Stress => stress(cache),
            Scenario::Failure => failure(cache),
        }
    }
}

fn write(cache: &DemoCache, key: &str, value: &str) -> Result<()> {
    cache.write(key.to_string(), value.to_string())?;
    Ok(())
}

fn read(cache: &DemoCache, key: &str) -> Result<Option<String>> {
    Ok(cache.read(&key.to_string())?)
}

fn print_size(cache: &DemoCache) {
    println!("Size: {}/{}", cache.current_size(), cache.capacity());
}

fn basic(cache: &DemoCache) -> Result<bool> {
    let users = [("user1", "Alice"), ("user2", "Bob"), ("user3", "Charlie")];
    let count = users.len().min(cache.capacity());

    for (key, value) in &users[..count] {
        write(cache, key, value)?;
    }

    let mut ok = true;
    for (key, value) in &users[..count] {
        let got = read(cache, key)?;
        println!("Read {key}: {got:?}");
        ok &= got.as_deref() == Some(*value);
    }
    print_size(cache);
    Ok(ok)
}

fn fill_to_capacity(cache: &DemoCache) -> Result<bool> {
    for i in 0..cache.capacity() {
        write(cache, &format!("fill{i}"), &format!("F{i}"))?;
    }
    print_size(cache);
    println!("Expected: {0}/{0}", cache.capacity());
    Ok(cache.current_size() == cache.capacity())
}

fn eviction(cache: &DemoCache) -> Result<bool> {
    let capacity = cache.capacity();
    for i in 0..capacity {
        write(cache, &format!("evict{i}"), &format!("E{i}"))?;
    }

    // Refresh the oldest key; with room for two or more, the next oldest goes
    let (expected_gone, expected_kept) = if capacity >= 2 {
        read(cache, "evict0")?;
        println!("Accessed evict0 (now most recent)");
        ("evict1", Some("evict0"))
    } else {
        ("evict0", None)
    };

    println!("Adding evict-new... should evict {expected_gone}");
    write(cache, "evict-new", "Frank")?;

    let gone = read(cache, expected_gone)?;
    let added = read(cache, "evict-new")?;
    println!("Read {expected_gone} (should be None): {gone:?}");
    println!("Read evict-new (should be 'Frank'): {added:?}");
    print_size(cache);

    let mut ok = gone.is_none() && added.as_deref() == Some("Frank");
    if let Some(kept) = expected_kept {
        ok &= read(cache, kept)?.is_some();
    }
    Ok(ok && cache.current_size() == capacity)
}

fn update(cache: &DemoCache) -> Result<bool> {
    write(cache, "user2", "Bob")?;
    let size_before = cache.current_size();

    write(cache, "user2", "Bob_Updated")?;
    let size_after = cache.current_size();
    let updated = read(cache, "user2")?;

    println!("Updated user2 to: {updated:?}");
    println!("Size before: {size_before}, after: {size_after}");
    Ok(size_before == size_after && updated.as_deref() == Some("Bob_Updated"))
}

fn repeated_update(cache: &DemoCache) -> Result<bool> {
    write(cache, "user3", "Charlie")?;
    let size_before = cache.current_size();

    for version in ["Charlie_v2", "Charlie_v3", "Charlie_v4"] {
        write(cache, "user3", version)?;
    }
    let size_after = cache.current_size();
    let final_value = read(cache, "user3")?;

    println!("Final value: {final_value:?}");
    println!("Size before: {size_before}, after: {size_after}");
    Ok(size_before == size_after && final_value.as_deref() == Some("Charlie_v4"))
}

fn concurrent(cache: &Arc<DemoCache>) -> Result<bool> {
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let cache = Arc::clone(cache);
            thread::spawn(move || cache.write(format!("concurrent{i}"), format!("Value{i}")))
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow!("writer thread panicked"))??;
    }

    println!("Wrote 20 concurrent keys");
    print_size(cache);
    Ok(cache.current_size() <= cache.capacity())
}

fn affinity(cache: &DemoCache) -> Result<bool> {
    for version in ["v1", "v2", "v3"] {
        write(cache, "affinity-test", version)?;
    }
    let value = read(cache, "affinity-test")?;
    println!("Wrote v1, v2, v3 sequentially; final value: {value:?}");
    Ok(value.as_deref() == Some("v3"))
}

fn miss(cache: &DemoCache) -> Result<bool> {
    let value = read(cache, "nonexistent-key")?;
    println!("Read nonexistent key: {value:?}");
    Ok(value.is_none())
}

fn stress(cache: &Arc<DemoCache>) -> Result<bool> {
    let handles: Vec<_> = (0..100)
        .map(|i| {
            let cache = Arc::clone(cache);
            thread::spawn(move || -> lanecache::Result<()> {
                let key = format!("stress{}", i % 30);
                if i % 2 == 0 {
                    cache.write(key, format!("V{i}"))
                } else {
                    cache.read(&key).map(|_| ())
                }
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow!("stress thread panicked"))??;
    }

    print_size(cache);
    Ok(cache.current_size() <= cache.capacity())
}

fn failure(cache: &DemoCache) -> Result<bool> {
    cache.durable().set_failing(true);
    let result = cache.write("outage".to_string(), "lost".to_string());
    cache.durable().set_failing(false);

    let rejected = matches!(result, Err(Error::WriteFailed(_)));
    if let Err(e) = &result {
        info!("write during outage rejected: {e}");
    }
    let cached = read(cache, "outage")?;
    println!("Write during outage rejected: {rejected}; cached value: {cached:?}");
    print_size(cache);
    Ok(rejected && cached.is_none())
}
