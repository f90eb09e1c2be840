//! Memoizing cache for parsed term datasets.
//!
//! Entries are keyed by dataset and term and remember the modification time
//! of the file they were read from; a different mtime on the next lookup is a
//! miss. Concurrent misses for the same file share a single load, parsing
//! happens on the blocking pool without holding the cache lock, and a failed
//! or timed-out load never leaves an entry behind.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::decode::{DecodeScope, TermDataset};
use super::resolver::{join_paths, Resolution, ResolveError, TermDataResolver};
use crate::terms::{Term, TermId};

const READ_BUFFER_BYTES: usize = 256 * 1024;

/// Cache sizing and expiry controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub max_entries: usize,
    pub load_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            max_entries: 3,
            load_timeout: Duration::from_secs(120),
        }
    }
}

/// Failure to produce a dataset. Cloned to every caller waiting on the same load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("dataset `{dataset}` is unavailable for term {term} (tried {})", join_paths(.tried))]
    DatasetUnavailable {
        dataset: String,
        term: TermId,
        tried: Vec<PathBuf>,
    },
    #[error("`{0}` is not a valid dataset name")]
    InvalidDataset(String),
    #[error("dataset `{dataset}` for term {term} could not be read from {}: {cause}", .path.display())]
    Unreadable {
        dataset: String,
        term: TermId,
        path: PathBuf,
        cause: String,
    },
    #[error("dataset `{dataset}` for term {term} failed to parse: {cause}")]
    ParseFailure {
        dataset: String,
        term: TermId,
        cause: String,
    },
    #[error("loading dataset `{dataset}` for term {term} timed out after {}ms", .after.as_millis())]
    TimedOut {
        dataset: String,
        term: TermId,
        after: Duration,
    },
    #[error("loading dataset `{dataset}` for term {term} was aborted")]
    LoadAborted { dataset: String, term: TermId },
}

impl From<ResolveError> for CacheError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::NotFound {
                dataset,
                term,
                tried,
            } => CacheError::DatasetUnavailable {
                dataset,
                term,
                tried,
            },
            ResolveError::InvalidDataset(name) => CacheError::InvalidDataset(name),
        }
    }
}

/// Point-in-time counters for diagnostics endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub resident: usize,
    pub in_flight: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    dataset: String,
    term: TermId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LoadKey {
    key: CacheKey,
    path: PathBuf,
    modified: SystemTime,
}

struct CacheEntry<D> {
    payload: Arc<D>,
    path: PathBuf,
    modified: SystemTime,
    inserted_at: Instant,
    last_access: u64,
}

impl<D> CacheEntry<D> {
    fn is_current(&self, path: &Path, modified: SystemTime, ttl: Duration) -> bool {
        self.modified == modified && self.path == path && self.inserted_at.elapsed() < ttl
    }
}

type LoadOutcome<D> = Option<Result<Arc<D>, CacheError>>;

struct CacheState<D> {
    entries: HashMap<CacheKey, CacheEntry<D>>,
    in_flight: HashMap<LoadKey, watch::Receiver<LoadOutcome<D>>>,
    clock: u64,
}

impl<D> CacheState<D> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

struct CacheInner<D> {
    name: &'static str,
    resolver: Arc<TermDataResolver>,
    config: CacheConfig,
    state: Mutex<CacheState<D>>,
    counters: Counters,
}

impl<D> CacheInner<D> {
    fn lock(&self) -> MutexGuard<'_, CacheState<D>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }

    fn sweep_expired(&self) -> usize {
        let ttl = self.config.ttl;
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        let removed = before - state.entries.len();
        drop(state);

        if removed > 0 {
            self.counters
                .expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
            metrics::counter!("term_cache_expirations_total", "cache" => self.name)
                .increment(removed as u64);
            tracing::debug!(cache = self.name, removed, "swept expired dataset entries");
        }
        removed
    }

    fn finish_load(&self, load_key: LoadKey, outcome: &Result<Arc<D>, CacheError>) {
        let mut state = self.lock();
        state.in_flight.remove(&load_key);

        let Ok(payload) = outcome else {
            return;
        };

        let tick = state.tick();
        state.entries.insert(
            load_key.key,
            CacheEntry {
                payload: Arc::clone(payload),
                path: load_key.path,
                modified: load_key.modified,
                inserted_at: Instant::now(),
                last_access: tick,
            },
        );

        let capacity = self.config.max_entries.max(1);
        let mut evicted = 0u64;
        while state.entries.len() > capacity {
            let Some(oldest) = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            state.entries.remove(&oldest);
            tracing::debug!(
                cache = self.name,
                dataset = %oldest.dataset,
                term = %oldest.term,
                "evicted least recently used dataset"
            );
            evicted += 1;
        }
        drop(state);

        if evicted > 0 {
            self.counters
                .evictions
                .fetch_add(evicted, Ordering::Relaxed);
            metrics::counter!("term_cache_evictions_total", "cache" => self.name).increment(evicted);
        }
    }
}

/// Shared, cloneable cache of decoded term datasets of type `D`.
pub struct TermDataCache<D> {
    inner: Arc<CacheInner<D>>,
}

impl<D> Clone for TermDataCache<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: TermDataset> TermDataCache<D> {
    /// `name` labels log lines and metrics for this cache instance.
    pub fn new(name: &'static str, resolver: Arc<TermDataResolver>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                name,
                resolver,
                config,
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    in_flight: HashMap::new(),
                    clock: 0,
                }),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Fetch a dataset using the configured load timeout.
    pub async fn get(&self, dataset: &str, term: &Term) -> Result<Arc<D>, CacheError> {
        self.get_with_timeout(dataset, term, self.inner.config.load_timeout)
            .await
    }

    /// Fetch a dataset, waiting at most `timeout` for it to load.
    ///
    /// When this call starts the load, the same timeout cancels the read; a
    /// caller joining a load already in progress only stops waiting.
    pub async fn get_with_timeout(
        &self,
        dataset: &str,
        term: &Term,
        timeout: Duration,
    ) -> Result<Arc<D>, CacheError> {
        let key = CacheKey {
            dataset: dataset.to_string(),
            term: term.id,
        };

        // Metadata only: a warm entry is served without opening the file.
        let located = self.inner.resolver.locate(dataset, term)?;
        let located_modified = modified_time(&located.path).ok();
        if let Some(modified) = located_modified {
            if let Some(payload) = self.lookup(&key, &located.path, modified) {
                self.record_hit();
                return Ok(payload);
            }
        }

        let resolution = self.inner.resolver.resolve(dataset, term)?;
        let modified = match located_modified {
            Some(modified) if resolution.path == located.path => modified,
            _ => modified_time(&resolution.path).map_err(|err| CacheError::Unreadable {
                dataset: dataset.to_string(),
                term: term.id,
                path: resolution.path.clone(),
                cause: err.to_string(),
            })?,
        };

        let (receiver, start) = {
            let mut state = self.inner.lock();
            let tick = state.tick();
            let ttl = self.inner.config.ttl;

            let mut stale = false;
            if let Some(entry) = state.entries.get_mut(&key) {
                if entry.is_current(&resolution.path, modified, ttl) {
                    entry.last_access = tick;
                    let payload = Arc::clone(&entry.payload);
                    drop(state);
                    self.record_hit();
                    return Ok(payload);
                }
                stale = true;
            }
            if stale {
                state.entries.remove(&key);
                tracing::debug!(
                    cache = self.inner.name,
                    dataset,
                    term = %term.id,
                    "cached dataset is stale"
                );
            }

            self.record_miss();
            let load_key = LoadKey {
                key,
                path: resolution.path.clone(),
                modified,
            };
            match state.in_flight.get(&load_key) {
                Some(receiver) => (receiver.clone(), None),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    state.in_flight.insert(load_key.clone(), receiver.clone());
                    (receiver, Some((load_key, sender)))
                }
            }
        };

        // Spawned outside the lock: a task dropped on spawn clears its marker.
        if let Some((load_key, sender)) = start {
            self.spawn_load(load_key, resolution, term.clone(), timeout, sender);
        }

        self.wait_for(receiver, dataset, term.id, timeout).await
    }

    fn lookup(&self, key: &CacheKey, path: &Path, modified: SystemTime) -> Option<Arc<D>> {
        let mut state = self.inner.lock();
        let tick = state.tick();
        let ttl = self.inner.config.ttl;
        let entry = state.entries.get_mut(key)?;
        if !entry.is_current(path, modified, ttl) {
            return None;
        }
        entry.last_access = tick;
        Some(Arc::clone(&entry.payload))
    }

    async fn wait_for(
        &self,
        mut receiver: watch::Receiver<LoadOutcome<D>>,
        dataset: &str,
        term: TermId,
        timeout: Duration,
    ) -> Result<Arc<D>, CacheError> {
        let waited = tokio::time::timeout(timeout, receiver.wait_for(Option::is_some)).await;
        match waited {
            Ok(Ok(outcome)) => match &*outcome {
                Some(result) => result.clone(),
                None => Err(CacheError::LoadAborted {
                    dataset: dataset.to_string(),
                    term,
                }),
            },
            Ok(Err(_closed)) => Err(CacheError::LoadAborted {
                dataset: dataset.to_string(),
                term,
            }),
            Err(_elapsed) => Err(CacheError::TimedOut {
                dataset: dataset.to_string(),
                term,
                after: timeout,
            }),
        }
    }

    fn spawn_load(
        &self,
        load_key: LoadKey,
        resolution: Resolution,
        term: Term,
        timeout: Duration,
        sender: watch::Sender<LoadOutcome<D>>,
    ) {
        let inner = Arc::clone(&self.inner);
        inner.counters.loads.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("term_cache_loads_total", "cache" => inner.name).increment(1);
        let dataset = load_key.key.dataset.clone();
        let guard = InFlightGuard {
            inner: Arc::clone(&inner),
            load_key: Some(load_key),
        };

        tokio::spawn(async move {
            let term_id = term.id;
            let started = Instant::now();
            let cancel = Arc::new(AtomicBool::new(false));

            let mut handle = {
                let cancel = Arc::clone(&cancel);
                let dataset = dataset.clone();
                let scope = DecodeScope::new(term, resolution.tier);
                let path = resolution.path.clone();
                tokio::task::spawn_blocking(move || load_file::<D>(&dataset, &path, &scope, &cancel))
            };

            let outcome = match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(result)) => result.map(Arc::new),
                Ok(Err(join_error)) => {
                    tracing::warn!(dataset = %dataset, term = %term_id, error = %join_error, "dataset load task failed");
                    Err(CacheError::LoadAborted {
                        dataset: dataset.clone(),
                        term: term_id,
                    })
                }
                Err(_elapsed) => {
                    cancel.store(true, Ordering::Release);
                    let _ = handle.await;
                    Err(CacheError::TimedOut {
                        dataset: dataset.clone(),
                        term: term_id,
                        after: timeout,
                    })
                }
            };

            match &outcome {
                Ok(payload) => tracing::info!(
                    cache = inner.name,
                    dataset = %dataset,
                    term = %term_id,
                    tier = %resolution.tier,
                    entries = payload.entry_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "loaded dataset"
                ),
                Err(err) => {
                    inner.counters.load_failures.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("term_cache_load_failures_total", "cache" => inner.name)
                        .increment(1);
                    tracing::warn!(
                        cache = inner.name,
                        dataset = %dataset,
                        term = %term_id,
                        error = %err,
                        "dataset load failed"
                    );
                }
            }

            guard.finish(&outcome);
            let _ = sender.send(Some(outcome));
        });
    }

    fn record_hit(&self) {
        self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("term_cache_hits_total", "cache" => self.inner.name).increment(1);
    }

    fn record_miss(&self) {
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("term_cache_misses_total", "cache" => self.inner.name).increment(1);
    }

    /// Drop entries older than the TTL. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    /// Forget every resident entry; loads in progress are unaffected.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let (resident, in_flight) = {
            let state = self.inner.lock();
            (state.entries.len(), state.in_flight.len())
        };
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            loads: counters.loads.load(Ordering::Relaxed),
            load_failures: counters.load_failures.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            expirations: counters.expirations.load(Ordering::Relaxed),
            resident,
            in_flight,
        }
    }

    /// Start the periodic TTL sweep. The task ends when the handle is shut
    /// down or the cache is dropped.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        let weak: Weak<CacheInner<D>> = Arc::downgrade(&self.inner);
        let period = self.inner.config.sweep_interval.max(Duration::from_millis(1));
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner.sweep_expired();
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        SweeperHandle { shutdown, task }
    }
}

/// Clears the in-flight marker of a load that never reached `finish_load`,
/// e.g. when its task is dropped during runtime shutdown or panics.
struct InFlightGuard<D> {
    inner: Arc<CacheInner<D>>,
    load_key: Option<LoadKey>,
}

impl<D> InFlightGuard<D> {
    fn finish(mut self, outcome: &Result<Arc<D>, CacheError>) {
        if let Some(load_key) = self.load_key.take() {
            self.inner.finish_load(load_key, outcome);
        }
    }
}

impl<D> Drop for InFlightGuard<D> {
    fn drop(&mut self) {
        if let Some(load_key) = self.load_key.take() {
            self.inner.lock().in_flight.remove(&load_key);
            tracing::warn!(
                cache = self.inner.name,
                dataset = %load_key.key.dataset,
                term = %load_key.key.term,
                "dataset load abandoned before completion"
            );
        }
    }
}

/// Owns a running sweep task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "cache sweeper ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn modified_time(path: &Path) -> io::Result<SystemTime> {
    path.metadata()?.modified()
}

fn load_file<D: TermDataset>(
    dataset: &str,
    path: &Path,
    scope: &DecodeScope,
    cancel: &Arc<AtomicBool>,
) -> Result<D, CacheError> {
    let term = scope.term.id;
    let file = File::open(path).map_err(|err| CacheError::Unreadable {
        dataset: dataset.to_string(),
        term,
        path: path.to_path_buf(),
        cause: err.to_string(),
    })?;
    let reader = BufReader::with_capacity(
        READ_BUFFER_BYTES,
        CancellableReader {
            inner: file,
            cancel: Arc::clone(cancel),
        },
    );

    D::decode(reader, scope).map_err(|err| {
        if cancel.load(Ordering::Acquire) {
            CacheError::LoadAborted {
                dataset: dataset.to_string(),
                term,
            }
        } else if err.is_io() {
            CacheError::Unreadable {
                dataset: dataset.to_string(),
                term,
                path: path.to_path_buf(),
                cause: err.to_string(),
            }
        } else {
            CacheError::ParseFailure {
                dataset: dataset.to_string(),
                term,
                cause: err.to_string(),
            }
        }
    })
}

/// Stops yielding bytes once the load is cancelled.
struct CancellableReader<R> {
    inner: R,
    cancel: Arc<AtomicBool>,
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "dataset load cancelled"));
        }
        self.inner.read(buf)
    }
}
