//! # Event Store
//!
//! Durable, ordered, append-only persistence for client interaction events.
//!
//! ## Architecture
//!
//! - **EventStore**: Abstract trait for storage backends
//! - **LocalEventStore**: Segmented JSON-lines log on local disk with a hot
//!   cache of the most recent events
//! - **InMemoryEventStore**: Volatile store for tests and demos
//!
//! Events are never updated or deleted. Ids are assigned in append order and
//! `fetch_recent` is the only read primitive.
//!
//! ## Usage
//!
//! ```rust
//! use event_store::{create_local_store, EventStore, NewEvent};
//! use tempfile::TempDir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = TempDir::new()?;
//!     let mut store = create_local_store(temp_dir.path())?;
//!     store.initialize().await?;
//!
//!     let id = store.insert(NewEvent::new("page_view").with_page("/home")).await?;
//!     let recent = store.fetch_recent(10).await?;
//!     assert_eq!(recent[0].id, id);
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod local;
pub mod log;

pub use backend::{EventStore, InMemoryEventStore, LocalEventStore};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use event::{Event, EventKind, NewEvent, DEFAULT_USER};
pub use local::{create_local_store, create_local_store_with_config};
