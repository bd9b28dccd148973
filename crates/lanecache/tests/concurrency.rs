use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use lanecache::{CacheConfig, Error, ShardedCache};
use lanestore::SimulatedStore;

type Cache = ShardedCache<String, String, SimulatedStore<String, String>>;

fn shared_cache(capacity: usize, latency: Duration) -> Arc<Cache> {
    let store = SimulatedStore::with_latency(latency);
    let config = CacheConfig::new(capacity).with_victim_wait(Duration::from_secs(10));
    Arc::new(ShardedCache::new(config, store).unwrap())
}

#[test]
fn test_concurrent_new_keys_fill_to_capacity() {
    let capacity = 5;
    let writers = 20;
    let cache = shared_cache(capacity, Duration::from_millis(10));
    let barrier = Arc::new(Barrier::new(writers));

    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache
                    .write(format!("concurrent{i}"), format!("Value{i}"))
                    .unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.current_size(), capacity);

    let resident = (0..writers)
        .filter(|i| cache.read(&format!("concurrent{i}")).unwrap().is_some())
        .count();
    assert_eq!(resident, capacity);

    // Every value reached the durable store regardless of eviction
    assert_eq!(cache.durable().len(), writers);
}

#[test]
fn test_size_never_exceeds_capacity_while_sampled() {
    let capacity = 5;
    let cache = shared_cache(capacity, Duration::from_millis(2));
    let done = Arc::new(AtomicBool::new(false));

    let sampler = {
        let cache = Arc::clone(&cache);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut samples = 0u64;
            while !done.load(Ordering::Relaxed) {
                assert!(cache.current_size() <= cache.capacity());
                samples += 1;
                thread::yield_now();
            }
            samples
        })
    };

    let handles: Vec<_> = (0..100)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let key = format!("stress{}", i % 30);
                if i % 2 == 0 {
                    cache.write(key, format!("V{i}")).unwrap();
                } else {
                    cache.read(&key).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    done.store(true, Ordering::Relaxed);

    assert!(sampler.join().unwrap() > 0);
    assert!(cache.current_size() <= capacity);
}

#[test]
fn test_same_key_writes_from_many_threads_count_once() {
    let cache = shared_cache(5, Duration::from_millis(1));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.write("hot".to_string(), format!("v{i}")).unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.current_size(), 1);
    assert!(cache.read(&"hot".to_string()).unwrap().is_some());
}

#[test]
fn test_slow_lane_does_not_block_other_keys() {
    // Long durable latency on one write must not stall writes on other lanes
    let store = SimulatedStore::with_latency(Duration::from_millis(200));
    let config = CacheConfig::new(100).with_shards(4);
    let cache: Arc<Cache> = Arc::new(ShardedCache::new(config, store).unwrap());

    let slow_key = "slow".to_string();
    let slow_shard = cache.shard_for(&slow_key);
    let other_key = (0..)
        .map(|i| format!("other{i}"))
        .find(|k| cache.shard_for(k) != slow_shard)
        .unwrap();

    let slow = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.write(slow_key, "x".to_string()).unwrap())
    };
    thread::sleep(Duration::from_millis(20));

    // Reading a key on another lane completes while the slow write is in flight
    let start = std::time::Instant::now();
    assert_eq!(cache.read(&other_key).unwrap(), None);
    assert!(start.elapsed() < Duration::from_millis(150));

    slow.join().unwrap();
}

#[test]
fn test_shutdown_drains_in_flight_writes() {
    let cache = shared_cache(50, Duration::from_millis(20));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.write(format!("k{i}"), "v".to_string()))
        })
        .collect();

    thread::sleep(Duration::from_millis(5));
    cache.shutdown().unwrap();

    let mut written = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(()) => written += 1,
            Err(Error::ShutDown) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Everything that was accepted reached the durable store
    assert_eq!(cache.durable().len(), written);
    assert!(matches!(cache.read(&"k0".to_string()), Err(Error::ShutDown)));
}

#[test]
fn test_shutdown_reports_lanes_past_deadline() {
    let store = SimulatedStore::with_latency(Duration::from_millis(500));
    let config = CacheConfig::new(5)
        .with_shards(1)
        .with_shutdown_grace(Duration::from_millis(20));
    let cache: Arc<Cache> = Arc::new(ShardedCache::new(config, store).unwrap());

    let writer = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.write("k".to_string(), "v".to_string()))
    };
    thread::sleep(Duration::from_millis(50));

    let result = cache.shutdown();
    assert!(matches!(result, Err(Error::ShutdownTimedOut { lanes: 1 })));

    // The lane keeps draining; the accepted write still completes
    writer.join().unwrap().unwrap();
    assert_eq!(cache.durable().len(), 1);
}

fn spawn_write(cache: &Arc<Cache>, key: &str, value: &str) -> thread::JoinHandle<()> {
    let cache = Arc::clone(cache);
    let (key, value) = (key.to_string(), value.to_string());
    thread::spawn(move || cache.write(key, value).unwrap())
}

fn resident_keys(cache: &Cache, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .map(|k| k.to_string())
        .filter(|k| cache.read(k).unwrap().is_some())
        .collect()
}

#[test]
fn test_victim_touched_before_deletion_is_evicted_once() {
    let store = SimulatedStore::with_latency(Duration::from_millis(100));
    let config = CacheConfig::new(2)
        .with_shards(1)
        .with_victim_wait(Duration::from_secs(5));
    let cache: Arc<Cache> = Arc::new(ShardedCache::new(config, store).unwrap());

    cache.write("a".to_string(), "a1".to_string()).unwrap();
    cache.write("x".to_string(), "x1".to_string()).unwrap();

    // The update of x and the read of a both run after x and a are claimed
    let mut handles = vec![spawn_write(&cache, "x", "x2")];
    thread::sleep(Duration::from_millis(10));
    handles.push({
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            cache.read(&"a".to_string()).unwrap();
        })
    });
    for key in ["c", "d", "e"] {
        thread::sleep(Duration::from_millis(10));
        handles.push(spawn_write(&cache, key, "v"));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.resident_count(), 2);
    assert_eq!(cache.current_size(), 2);
    let resident = resident_keys(&cache, &["a", "x", "c", "d", "e"]);
    assert_eq!(resident.len(), 2);

    // Rolling back every resident key empties the cache cleanly
    cache.durable().set_failing(true);
    for key in resident {
        let result = cache.write(key, "lost".to_string());
        assert!(matches!(result, Err(Error::WriteFailed(_))));
    }
    assert_eq!(cache.current_size(), 0);
    assert_eq!(cache.resident_count(), 0);
}

#[test]
fn test_write_over_capacity_after_victim_wait() {
    let store = SimulatedStore::with_latency(Duration::from_millis(200));
    let config = CacheConfig::new(1).with_victim_wait(Duration::from_millis(10));
    let cache: Arc<Cache> = Arc::new(ShardedCache::new(config, store).unwrap());

    // a holds the only slot but is not evictable until its write lands
    let first = spawn_write(&cache, "a", "a1");
    thread::sleep(Duration::from_millis(20));
    cache.write("b".to_string(), "b1".to_string()).unwrap();
    first.join().unwrap();

    // b is resident without a slot
    assert_eq!(cache.current_size(), 1);
    assert_eq!(cache.resident_count(), 2);

    cache.durable().set_failing(true);
    for key in ["a", "b"] {
        let result = cache.write(key.to_string(), "lost".to_string());
        assert!(matches!(result, Err(Error::WriteFailed(_))));
    }
    cache.durable().set_failing(false);

    assert_eq!(cache.current_size(), 0);
    assert_eq!(cache.resident_count(), 0);

    cache.write("c".to_string(), "c1".to_string()).unwrap();
    assert_eq!(cache.current_size(), 1);
    assert_eq!(cache.read(&"c".to_string()).unwrap(), Some("c1".to_string()));
}

#[test]
fn test_over_capacity_key_is_evicted_without_freeing_a_slot() {
    let store = SimulatedStore::with_latency(Duration::from_millis(100));
    let config = CacheConfig::new(1)
        .with_shards(1)
        .with_victim_wait(Duration::from_millis(10));
    let cache: Arc<Cache> = Arc::new(ShardedCache::new(config, store).unwrap());

    let first = spawn_write(&cache, "a", "a1");
    thread::sleep(Duration::from_millis(20));
    cache.write("b".to_string(), "b1".to_string()).unwrap();
    first.join().unwrap();
    assert_eq!(cache.resident_count(), 2);

    // a is least recent and holds the slot
    cache.write("c".to_string(), "c1".to_string()).unwrap();
    assert_eq!(cache.current_size(), 1);
    assert_eq!(cache.resident_count(), 2);

    // b goes first, then c hands its slot to d
    cache.write("d".to_string(), "d1".to_string()).unwrap();
    assert_eq!(cache.current_size(), 1);
    assert_eq!(cache.resident_count(), 1);
    assert_eq!(cache.read(&"b".to_string()).unwrap(), None);
    assert_eq!(cache.read(&"d".to_string()).unwrap(), Some("d1".to_string()));
    assert_eq!(cache.stats().evictions(), 3);
}

#[test]
fn test_resident_keys_match_size_after_mixed_traffic() {
    let capacity = 5;
    let store = SimulatedStore::with_latency(Duration::from_millis(1));
    let config = CacheConfig::new(capacity)
        .with_shards(4)
        .with_victim_wait(Duration::from_secs(10));
    let cache: Arc<Cache> = Arc::new(ShardedCache::new(config, store).unwrap());
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..50 {
                    let key = format!("mixed{}", (t * 7 + i) % 20);
                    if i % 3 == 0 {
                        cache.read(&key).unwrap();
                    } else {
                        cache.write(key, format!("{t}-{i}")).unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.resident_count(), capacity);
    assert_eq!(cache.current_size(), cache.resident_count());

    let keys: Vec<String> = (0..20).map(|i| format!("mixed{i}")).collect();
    let readable = keys
        .iter()
        .filter(|k| cache.read(k).unwrap().is_some())
        .count();
    assert_eq!(readable, capacity);
    assert_eq!(cache.keys_by_recency().len(), capacity);
}
