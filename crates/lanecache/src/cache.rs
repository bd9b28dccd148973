//! ShardedCache: write-through LRU cache over a durable store
//!
//! Every key is pinned to one lane by hash, so operations on the same key run
//! in the order they were submitted while different keys proceed in
//! parallel. Admission and victim selection happen on the calling thread
//! under short critical sections; all store I/O happens on the lanes.

use std::collections::HashSet;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Instant;

use ahash::RandomState;
use lanestore::DurableStore;
use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::fast::FastStore;
use crate::lane::{Pending, ShardLane};
use crate::lru::LruEvictionPolicy;
use crate::stats::CacheStats;
use crate::write_through::WriteThrough;

/// Who owns which slot. Guarded by the capacity lock.
///
/// Every key is in at most one of the three sets. Only `slotted` keys count
/// toward `current_size`, so the counter always equals `slotted.len()`.
struct Ledger<K> {
    /// Keys holding one of the `capacity` slots
    slotted: HashSet<K, RandomState>,
    /// New keys waiting for a victim's slot
    pending: HashSet<K, RandomState>,
    /// Keys written after the victim wait ran out; resident but uncounted
    overflow: HashSet<K, RandomState>,
}

/// Outcome of the capacity check for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// Key already known to the ledger
    Update,
    /// Free slot reserved
    Insert,
    /// Cache full; someone has to leave
    EvictionRequired,
}

/// What a key popped from the eviction policy turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    /// Its slot now belongs to the waiting key
    Transferred,
    /// Over-capacity key; evicted without freeing a slot
    Overflow,
    /// Already gone from the ledger; nothing to evict
    Phantom,
}

impl<K: Hash + Eq + Clone> Ledger<K> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slotted: HashSet::with_capacity_and_hasher(capacity, RandomState::new()),
            pending: HashSet::with_hasher(RandomState::new()),
            overflow: HashSet::with_hasher(RandomState::new()),
        }
    }

    fn size(&self) -> usize {
        self.slotted.len()
    }

    fn admit(&mut self, key: &K, capacity: usize) -> Admission {
        if self.is_resident(key) || self.pending.contains(key) {
            return Admission::Update;
        }
        if self.slotted.len() < capacity {
            self.slotted.insert(key.clone());
            Admission::Insert
        } else {
            self.pending.insert(key.clone());
            Admission::EvictionRequired
        }
    }

    /// Whether a write for `key` may land in the fast store
    fn is_resident(&self, key: &K) -> bool {
        self.slotted.contains(key) || self.overflow.contains(key)
    }

    /// Hand `victim`'s slot to the pending `key`
    fn claim(&mut self, victim: &K, key: &K) -> Claim {
        if self.slotted.remove(victim) {
            self.pending.remove(key);
            self.slotted.insert(key.clone());
            Claim::Transferred
        } else if self.overflow.remove(victim) {
            Claim::Overflow
        } else {
            Claim::Phantom
        }
    }

    /// Give the pending `key` a slot freed by a rolled-back write, if any
    fn take_free_slot(&mut self, key: &K, capacity: usize) -> bool {
        if self.slotted.len() < capacity {
            self.pending.remove(key);
            self.slotted.insert(key.clone());
            true
        } else {
            false
        }
    }

    /// Stop waiting for a slot and let `key` in over capacity
    fn overflow(&mut self, key: &K) {
        self.pending.remove(key);
        self.overflow.insert(key.clone());
    }

    /// Forget a resident key. Pending keys are left to their writer.
    fn release(&mut self, key: &K) {
        if !self.slotted.remove(key) {
            self.overflow.remove(key);
        }
    }
}

/// State shared with the lanes
struct Core<K, V, D> {
    /// Capacity lock
    ledger: Mutex<Ledger<K>>,
    fast: Arc<FastStore<K, V>>,
    eviction: LruEvictionPolicy<K>,
    write_through: WriteThrough<K, V, D>,
    stats: CacheStats,
}

impl<K, V, D> Core<K, V, D>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
    D: DurableStore<K, V>,
{
    /// Write-through then touch. On failure the key is dropped from the
    /// cache entirely and its slot released, so no half-written entry stays
    /// visible. Runs on the key's lane, which orders it against every
    /// eviction or rollback of the same key.
    fn apply_write(&self, key: K, value: V) -> Result<()> {
        if !self.ledger.lock().is_resident(&key) {
            // Evicted or rolled back after this write was admitted as an
            // update, or the new key it updates is still waiting for a slot
            debug!("key not resident when its write ran, writing durable only");
            return self.write_through.durable().put(key, value).map_err(|err| {
                self.stats.record_write_failure();
                err.into()
            });
        }

        match self.write_through.write(key.clone(), value) {
            Ok(()) => {
                self.touch_if_resident(&key);
                Ok(())
            }
            Err(err) => {
                self.fast.delete(&key);
                self.eviction.remove(&key);
                self.ledger.lock().release(&key);
                self.stats.record_write_failure();
                Err(err)
            }
        }
    }

    /// Refresh recency only for keys that still own their place, so a
    /// claimed victim is never offered for eviction twice
    fn touch_if_resident(&self, key: &K) {
        if self.ledger.lock().is_resident(key) {
            self.eviction.touch(key);
        }
    }

    fn drop_victim(&self, victim: &K) {
        self.fast.delete(victim);
        // A read queued before this task may have touched it again
        self.eviction.remove(victim);
        self.stats.record_eviction();
    }

    fn read_local(&self, key: &K) -> Option<V> {
        match self.fast.get(key) {
            Some(value) => {
                // A claimed victim stays readable until its deletion runs
                self.touch_if_resident(key);
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }
}

/// Sharded write-through cache with bounded capacity and LRU eviction
///
/// ```
/// use std::time::Duration;
/// use lanecache::{CacheConfig, ShardedCache};
/// use lanestore::SimulatedStore;
///
/// let store = SimulatedStore::with_latency(Duration::ZERO);
/// let cache = ShardedCache::new(CacheConfig::new(2), store).unwrap();
///
/// cache.write("a".to_string(), 1).unwrap();
/// cache.write("b".to_string(), 2).unwrap();
/// cache.write("c".to_string(), 3).unwrap(); // evicts "a"
///
/// assert_eq!(cache.read(&"a".to_string()).unwrap(), None);
/// assert_eq!(cache.read(&"c".to_string()).unwrap(), Some(3));
/// assert_eq!(cache.current_size(), 2);
/// cache.shutdown().unwrap();
/// ```
pub struct ShardedCache<K, V, D> {
    config: CacheConfig,
    hasher: RandomState,
    core: Arc<Core<K, V, D>>,

    /// `None` once shut down
    lanes: RwLock<Option<Box<[ShardLane]>>>,
}

impl<K, V, D> ShardedCache<K, V, D>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    D: DurableStore<K, V> + 'static,
{
    /// Create a cache in front of `durable` and start its lanes
    ///
    /// # Errors
    /// * [`Error::InvalidCapacity`] / [`Error::InvalidShardCount`] for a bad config
    /// * [`Error::LaneSpawn`] if a worker thread cannot be started
    pub fn new(config: CacheConfig, durable: D) -> Result<Self> {
        config.validate()?;

        let lanes = (0..config.shards())
            .map(ShardLane::spawn)
            .collect::<Result<Vec<_>>>()?;

        let fast = Arc::new(FastStore::with_capacity(config.capacity()));
        let core = Core {
            ledger: Mutex::new(Ledger::with_capacity(config.capacity())),
            write_through: WriteThrough::new(Arc::clone(&fast), Arc::new(durable)),
            fast,
            eviction: LruEvictionPolicy::new(),
            stats: CacheStats::new(),
        };

        info!(
            capacity = config.capacity(),
            shards = config.shards(),
            "cache started"
        );

        Ok(Self {
            config,
            hasher: RandomState::new(),
            core: Arc::new(core),
            lanes: RwLock::new(Some(lanes.into_boxed_slice())),
        })
    }

    /// Lane that owns `key`
    pub fn shard_for(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) % self.config.shards() as u64) as usize
    }

    /// Store `value` under `key` in the cache and the durable store.
    ///
    /// Blocks until the write has landed in both. Writing a new key into a
    /// full cache evicts the least recently used key first.
    ///
    /// # Errors
    /// * [`Error::WriteFailed`] if the durable store rejected the write; the
    ///   key is then absent from the cache
    /// * [`Error::ShutDown`] after [`shutdown`](Self::shutdown)
    pub fn write(&self, key: K, value: V) -> Result<()> {
        let shard = self.shard_for(&key);
        let capacity = self.config.capacity();

        let admission = self.core.ledger.lock().admit(&key, capacity);
        match admission {
            Admission::Update => self.core.stats.record_update(),
            _ => self.core.stats.record_insert(),
        }

        let victims = match admission {
            Admission::EvictionRequired => self.claim_victims(&key),
            _ => Vec::new(),
        };

        let (evicted, written) = match self.dispatch_write(shard, key.clone(), value, victims) {
            Ok(pending) => pending,
            Err(err) => {
                // Nothing was queued; hand a fresh slot back here
                if admission != Admission::Update {
                    self.core.ledger.lock().release(&key);
                }
                return Err(err);
            }
        };

        for err in evicted.into_iter().filter_map(|p| p.wait().err()) {
            warn!(shard, error = %err, "victim deletion failed");
        }

        let result = written.wait().and_then(|outcome| outcome);
        if let Err(err) = &result {
            warn!(shard, error = %err, "write failed");
        }
        result
    }

    /// Look up `key`, refreshing its recency on a hit.
    ///
    /// Returns `None` for keys never written, evicted, or rolled back.
    pub fn read(&self, key: &K) -> Result<Option<V>> {
        let shard = self.shard_for(key);
        let core = Arc::clone(&self.core);
        let key = key.clone();

        let pending = self.lanes()?[shard].submit(move || core.read_local(&key))?;
        pending.wait()
    }

    /// Number of keys counted against capacity
    pub fn current_size(&self) -> usize {
        self.core.ledger.lock().size()
    }

    /// Number of keys held in the fast store.
    ///
    /// Equals [`current_size`](Self::current_size) once writes settle,
    /// unless a write went over capacity after its victim wait ran out.
    pub fn resident_count(&self) -> usize {
        self.core.fast.len()
    }

    /// Maximum number of keys
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    /// Number of lanes
    pub fn shard_count(&self) -> usize {
        self.config.shards()
    }

    /// Configuration this cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Traffic counters
    pub fn stats(&self) -> &CacheStats {
        &self.core.stats
    }

    /// The durable store behind the cache
    pub fn durable(&self) -> &D {
        self.core.write_through.durable()
    }

    /// Keys in eviction order, most recently used first
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.core.eviction.keys_by_recency()
    }

    /// Check if the cache has been shut down
    pub fn is_shut_down(&self) -> bool {
        self.lanes.read().is_none()
    }

    /// Stop accepting work and wait for queued work to finish.
    ///
    /// Lanes get [`CacheConfig::shutdown_grace`] in total to drain. Calling
    /// this again is a no-op.
    ///
    /// # Errors
    /// * [`Error::ShutdownTimedOut`] if some lanes were still busy at the
    ///   deadline; they keep draining in the background
    pub fn shutdown(&self) -> Result<()> {
        let Some(lanes) = self.lanes.write().take() else {
            return Ok(());
        };

        info!(shards = lanes.len(), "shutting down cache");
        let deadline = Instant::now() + self.config.shutdown_grace();

        let drained: Vec<_> = lanes.into_vec().into_iter().map(ShardLane::close).collect();
        let stuck = drained
            .iter()
            .filter(|lane| !lane.wait_until(deadline))
            .count();

        if stuck > 0 {
            return Err(Error::ShutdownTimedOut { lanes: stuck });
        }
        info!("cache stopped");
        Ok(())
    }

    fn lanes(&self) -> Result<MappedRwLockReadGuard<'_, [ShardLane]>> {
        RwLockReadGuard::try_map(self.lanes.read(), |lanes| lanes.as_deref())
            .map_err(|_| Error::ShutDown)
    }

    /// Find a slot for `key`, which found the cache full.
    ///
    /// Pops LRU keys until one hands over its slot. Keys the ledger no longer
    /// knows are skipped; keys that went over capacity earlier are evicted
    /// along the way without freeing a slot. If every resident key is still
    /// being written there is nothing to evict yet: wait for one to land, or
    /// for a failed write to hand its slot back. Gives up after the
    /// configured wait and lets `key` in over capacity.
    ///
    /// Returns the keys to delete from the fast store.
    fn claim_victims(&self, key: &K) -> Vec<K> {
        let capacity = self.config.capacity();
        let deadline = Instant::now() + self.config.victim_wait();
        let mut victims = Vec::new();

        loop {
            if let Some(victim) = self.core.eviction.evict_one() {
                let claim = self.core.ledger.lock().claim(&victim, key);
                match claim {
                    Claim::Transferred => {
                        victims.push(victim);
                        return victims;
                    }
                    Claim::Overflow => victims.push(victim),
                    Claim::Phantom => debug!("skipping victim already claimed"),
                }
                continue;
            }

            if self.core.ledger.lock().take_free_slot(key, capacity) {
                return victims;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.core.eviction.wait_for_entry(remaining) {
                warn!(capacity, "no eviction victim available, writing over capacity");
                self.core.ledger.lock().overflow(key);
                return victims;
            }
        }
    }

    /// Queue the tasks for a write. Returns the victim deletions that run on
    /// other lanes and the write itself.
    #[allow(clippy::type_complexity)]
    fn dispatch_write(
        &self,
        shard: usize,
        key: K,
        value: V,
        victims: Vec<K>,
    ) -> Result<(Vec<Pending<()>>, Pending<Result<()>>)> {
        let lanes = self.lanes()?;
        let (local, remote): (Vec<K>, Vec<K>) = victims
            .into_iter()
            .partition(|victim| self.shard_for(victim) == shard);

        let mut evicted = Vec::with_capacity(remote.len());
        for victim in remote {
            let victim_shard = self.shard_for(&victim);
            debug!(shard, victim_shard, "evicting on another lane");
            let core = Arc::clone(&self.core);
            evicted.push(lanes[victim_shard].submit(move || core.drop_victim(&victim))?);
        }

        if !local.is_empty() {
            debug!(shard, count = local.len(), "evicting on the writer's lane");
        }
        let core = Arc::clone(&self.core);
        let written = lanes[shard].submit(move || {
            for victim in &local {
                core.drop_victim(victim);
            }
            core.apply_write(key, value)
        })?;

        Ok((evicted, written))
    }
}

impl<K, V, D> Drop for ShardedCache<K, V, D> {
    fn drop(&mut self) {
        // Closing the senders lets the lanes finish what is queued and exit
        if let Some(lanes) = self.lanes.get_mut().take() {
            debug!(shards = lanes.len(), "cache dropped without shutdown");
        }
    }
}
