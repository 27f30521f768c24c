//! Event store trait and implementations

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::event::{Event, EventRecord, NewEvent};
use crate::log::EventLog;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

/// Abstract trait for event store backends
///
/// `insert` may be called concurrently; implementations serialize the
/// physical writes so that ids follow append order. `fetch_recent` is the
/// only read primitive and returns events newest first.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    /// Initialize the backend
    async fn initialize(&mut self) -> Result<()>;

    /// Flush and shut down the backend
    async fn shutdown(&mut self) -> Result<()>;

    /// Append an event and return its assigned id
    async fn insert(&self, event: NewEvent) -> Result<u64>;

    /// The `limit` highest-id events, newest first
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Event>>;

    /// Push buffered appends to durable storage
    async fn flush(&self) -> Result<()>;

    /// Highest id assigned so far (0 when empty)
    async fn last_id(&self) -> u64;

    /// Get the configuration
    fn config(&self) -> &StoreConfig;
}

/// Most recent events, newest at the back
struct HotCache {
    events: VecDeque<Event>,
    capacity: usize,
    /// True while nothing has been evicted, i.e. the cache holds the whole log
    complete: bool,
}

impl HotCache {
    fn preload(capacity: usize, mut newest_first: Vec<Event>) -> Self {
        let complete = newest_first.len() < capacity;
        newest_first.reverse();
        Self { events: newest_first.into(), capacity, complete }
    }

    fn push(&mut self, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.complete = false;
        }
        self.events.push_back(event);
    }

    /// Serve `limit` events if the cache is guaranteed to hold them
    fn recent(&self, limit: usize) -> Option<Vec<Event>> {
        if limit <= self.events.len() || self.complete {
            Some(self.events.iter().rev().take(limit).cloned().collect())
        } else {
            None
        }
    }
}

/// Local file-based event store: the segmented log plus a hot cache
pub struct LocalEventStore {
    config: StoreConfig,
    log: EventLog,
    cache: RwLock<HotCache>,
    initialized: bool,
}

impl LocalEventStore {
    /// Open a local store, recovering ids and the hot cache from disk
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate().map_err(StoreError::config)?;

        let log = EventLog::open(config.clone())?;
        let recent = log.scan_recent(config.hot_cache_size)?;
        tracing::debug!("Preloaded {} events into hot cache", recent.len());
        let cache = RwLock::new(HotCache::preload(config.hot_cache_size, recent));

        Ok(Self { config, log, cache, initialized: false })
    }

    /// Create a new local store with default config
    pub fn with_default_config(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(StoreConfig::new(data_dir))
    }
}

#[async_trait::async_trait]
impl EventStore for LocalEventStore {
    async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        std::fs::create_dir_all(self.config.segments_dir())?;
        self.initialized = true;

        tracing::info!(
            "Local event store initialized at {:?} (last id {})",
            self.config.data_dir,
            self.log.last_id().await
        );

        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }

        self.log.flush().await?;
        self.initialized = false;

        tracing::info!("Local event store shutdown complete");

        Ok(())
    }

    async fn insert(&self, event: NewEvent) -> Result<u64> {
        if !self.initialized {
            return Err(StoreError::not_initialized());
        }

        // Holding the cache lock across the append keeps cache order == id order
        let mut cache = self.cache.write().await;
        let stored = self.log.append(event).await?;
        let id = stored.id;
        cache.push(stored);

        tracing::debug!("Inserted event {}", id);

        Ok(id)
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Event>> {
        if !self.initialized {
            return Err(StoreError::not_initialized());
        }

        if let Some(events) = self.cache.read().await.recent(limit) {
            return Ok(events);
        }

        tracing::debug!("Window of {} exceeds hot cache, reading segments", limit);
        self.log.read_recent(limit).await
    }

    async fn flush(&self) -> Result<()> {
        self.log.flush().await
    }

    async fn last_id(&self) -> u64 {
        self.log.last_id().await
    }

    fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// In-memory event store (for testing)
pub struct InMemoryEventStore {
    config: StoreConfig,
    events: Mutex<Vec<Event>>,
    initialized: bool,
}

impl InMemoryEventStore {
    /// Create a new in-memory store
    pub fn new(config: StoreConfig) -> Self {
        Self { config, events: Mutex::new(Vec::new()), initialized: false }
    }

    /// Create a new in-memory store with default config
    pub fn with_default_config() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait::async_trait]
impl EventStore for InMemoryEventStore {
    async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        self.initialized = true;

        tracing::info!("In-memory event store initialized");

        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.initialized = false;
        Ok(())
    }

    async fn insert(&self, event: NewEvent) -> Result<u64> {
        if !self.initialized {
            return Err(StoreError::not_initialized());
        }

        let mut events = self.events.lock().await;
        let id = events.len() as u64 + 1;
        events.push(EventRecord::encode(id, event, chrono::Utc::now()).into_event());

        Ok(id)
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Event>> {
        if !self.initialized {
            return Err(StoreError::not_initialized());
        }

        let events = self.events.lock().await;
        Ok(events.iter().rev().take(limit).cloned().collect())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn last_id(&self) -> u64 {
        self.events.lock().await.len() as u64
    }

    fn config(&self) -> &StoreConfig {
        &self.config
    }
}
