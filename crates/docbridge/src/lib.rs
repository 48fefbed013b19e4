//! Bidirectional adapter between a tuple pipeline and a document store.
//!
//! A [`SourceTask`] turns scrolled documents into tuples and a [`SinkTask`]
//! turns tuples into documents. Both resolve their [`Settings`] once at
//! configuration time, acquire store access through a [`RepositoryFactory`]
//! when opened, and forward the store's counters into a [`CounterSink`] when
//! closed.
//!
//! [`Settings`]: docbridge_types::Settings

pub mod alias;
pub mod counters;
pub mod init;
pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod path;
pub mod projector;
pub mod repository;

pub use alias::FieldAlias;
pub use counters::{CounterSink, InMemoryCounters};
pub use init::{AdapterSpec, TaskKind};
pub use lifecycle::{LifecycleState, SinkTask, SourceTask, TaskLifecycle};
pub use memory::{FailurePoint, MemoryFactory, MemoryStore};
pub use projector::{ProjectionContext, WriteProjection};
pub use repository::{Hit, Repository, RepositoryFactory, ScrollCursor, WriteRecord};
