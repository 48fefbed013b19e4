//! In-process store backend.
//!
//! Keeps resources as ordered document lists behind a shared handle so a test
//! (or an embedding application) can seed data, inspect what was written and
//! inject failures at any repository call. Queries are not evaluated: every
//! scroll matches the whole resource.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use docbridge_types::{BridgeError, Document, FormatMode, Settings, StatsSnapshot};

use crate::repository::{Hit, Repository, RepositoryFactory, ScrollCursor, WriteRecord};

/// Repository call at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    Open,
    Scroll,
    Write,
    Flush,
    ResourceExists,
    NextHit,
    Close,
}

#[derive(Debug, Default)]
struct StoreState {
    resources: HashMap<String, Vec<Hit>>,
    failures: HashMap<FailurePoint, BridgeError>,
    close_log: Vec<String>,
    next_id: u64,
}

fn lock_mutex<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, BridgeError> {
    mutex
        .lock()
        .map_err(|_| BridgeError::internal("MUTEX_POISONED", format!("{name} mutex poisoned")))
}

/// Shared handle to an in-memory store. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, BridgeError> {
        lock_mutex(&self.state, "memory store")
    }

    /// Create `resource` if needed and append `documents` to it.
    ///
    /// # Errors
    ///
    /// Fails only if the store lock is poisoned.
    pub fn seed<I>(&self, resource: &str, documents: I) -> Result<(), BridgeError>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut state = self.lock()?;
        let StoreState {
            resources, next_id, ..
        } = &mut *state;
        let hits = resources.entry(resource.to_string()).or_default();
        for document in documents {
            *next_id += 1;
            hits.push(Hit {
                id: format!("doc-{next_id}"),
                document,
            });
        }
        Ok(())
    }

    /// Create an empty resource.
    ///
    /// # Errors
    ///
    /// Fails only if the store lock is poisoned.
    pub fn create_resource(&self, resource: &str) -> Result<(), BridgeError> {
        self.seed(resource, std::iter::empty())
    }

    /// Documents stored under `resource`, in insertion order.
    ///
    /// # Errors
    ///
    /// Fails only if the store lock is poisoned.
    pub fn documents(&self, resource: &str) -> Result<Vec<Document>, BridgeError> {
        Ok(self
            .lock()?
            .resources
            .get(resource)
            .map(|hits| hits.iter().map(|h| h.document.clone()).collect())
            .unwrap_or_default())
    }

    /// Make every later call at `point` fail with `error`.
    ///
    /// # Errors
    ///
    /// Fails only if the store lock is poisoned.
    pub fn inject_failure(&self, point: FailurePoint, error: BridgeError) -> Result<(), BridgeError> {
        self.lock()?.failures.insert(point, error);
        Ok(())
    }

    /// Stop failing at `point`.
    ///
    /// # Errors
    ///
    /// Fails only if the store lock is poisoned.
    pub fn clear_failure(&self, point: FailurePoint) -> Result<(), BridgeError> {
        self.lock()?.failures.remove(&point);
        Ok(())
    }

    /// Labels of released repositories and cursors, in release order.
    ///
    /// # Errors
    ///
    /// Fails only if the store lock is poisoned.
    pub fn close_log(&self) -> Result<Vec<String>, BridgeError> {
        Ok(self.lock()?.close_log.clone())
    }

    fn check(&self, point: FailurePoint) -> Result<(), BridgeError> {
        match self.lock()?.failures.get(&point) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn append(&self, resource: &str, documents: Vec<Document>) -> Result<(), BridgeError> {
        self.seed(resource, documents)
    }

    fn snapshot(&self, resource: &str) -> Result<Vec<Hit>, BridgeError> {
        Ok(self
            .lock()?
            .resources
            .get(resource)
            .cloned()
            .unwrap_or_default())
    }

    fn contains(&self, resource: &str) -> Result<bool, BridgeError> {
        Ok(self.lock()?.resources.contains_key(resource))
    }

    fn log_close(&self, label: String) -> Result<(), BridgeError> {
        self.lock()?.close_log.push(label);
        Ok(())
    }
}

/// [`RepositoryFactory`] over a [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryFactory {
    store: MemoryStore,
}

impl MemoryFactory {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn repository(&self, resource: &str, settings: &Settings) -> Result<MemoryRepository, BridgeError> {
        Ok(MemoryRepository {
            store: self.store.clone(),
            resource: resource.to_string(),
            mode: settings.format_mode()?,
            batch_size: settings.batch_size_entries()?,
            pending: Vec::new(),
            pending_bytes: 0,
            stats: StatsSnapshot::default(),
            closed: false,
        })
    }
}

fn required<'a>(resource: Option<&'a str>, what: &str) -> Result<&'a str, BridgeError> {
    resource.ok_or_else(|| {
        BridgeError::config("MISSING_RESOURCE", format!("no {what} resource configured"))
    })
}

impl RepositoryFactory for MemoryFactory {
    type Repository = MemoryRepository;
    type Cursor = MemoryCursor;

    fn open(&self, settings: &Settings) -> Result<MemoryRepository, BridgeError> {
        self.store.check(FailurePoint::Open)?;
        let resource = required(
            settings.resource_write().or_else(|| settings.resource_read()),
            "target",
        )?;
        self.repository(resource, settings)
    }

    fn scroll(&self, settings: &Settings) -> Result<MemoryCursor, BridgeError> {
        self.store.check(FailurePoint::Scroll)?;
        let resource = required(settings.resource_read(), "read")?;
        let hits = self.store.snapshot(resource)?;
        tracing::debug!(resource, hits = hits.len(), "memory scroll started");
        Ok(MemoryCursor {
            repository: self.repository(resource, settings)?,
            hits: hits.into(),
            stats: StatsSnapshot::default(),
            closed: false,
        })
    }
}

/// Buffered writer into one memory resource.
#[derive(Debug)]
pub struct MemoryRepository {
    store: MemoryStore,
    resource: String,
    mode: FormatMode,
    batch_size: usize,
    pending: Vec<Document>,
    pending_bytes: u64,
    stats: StatsSnapshot,
    closed: bool,
}

impl MemoryRepository {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn record_read(&mut self, bytes: u64) {
        self.stats.bytes_read += bytes;
    }
}

fn encoded_len(document: &Document) -> u64 {
    serde_json::to_vec(document).map_or(0, |b| b.len() as u64)
}

impl Repository for MemoryRepository {
    fn write(&mut self, record: WriteRecord) -> Result<(), BridgeError> {
        self.store.check(FailurePoint::Write)?;
        let document = record.to_document(self.mode);
        self.pending_bytes += encoded_len(&document);
        self.pending.push(document);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BridgeError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.store.check(FailurePoint::Flush)?;
        let batch = std::mem::take(&mut self.pending);
        let bytes = std::mem::take(&mut self.pending_bytes);
        let docs = batch.len() as u64;
        self.store.append(&self.resource, batch)?;
        self.stats.bulk_writes += 1;
        self.stats.docs_written += docs;
        self.stats.docs_recorded += docs;
        self.stats.bytes_written += bytes;
        self.stats.bytes_recorded += bytes;
        Ok(())
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats
    }

    fn resource_exists(&mut self) -> Result<bool, BridgeError> {
        self.store.check(FailurePoint::ResourceExists)?;
        self.store.contains(&self.resource)
    }

    fn create_resource(&mut self) -> Result<(), BridgeError> {
        self.store.create_resource(&self.resource)
    }

    fn close(&mut self) -> Result<(), BridgeError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let flushed = self.flush();
        self.store.log_close(format!("repository:{}", self.resource))?;
        flushed?;
        self.store.check(FailurePoint::Close)
    }
}

/// Scroll over a snapshot of one memory resource.
#[derive(Debug)]
pub struct MemoryCursor {
    repository: MemoryRepository,
    hits: VecDeque<Hit>,
    stats: StatsSnapshot,
    closed: bool,
}

impl ScrollCursor for MemoryCursor {
    type Repository = MemoryRepository;

    fn next_hit(&mut self) -> Result<Option<Hit>, BridgeError> {
        self.repository.store.check(FailurePoint::NextHit)?;
        let Some(hit) = self.hits.pop_front() else {
            return Ok(None);
        };
        self.stats.docs_read += 1;
        self.repository.record_read(encoded_len(&hit.document));
        Ok(Some(hit))
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats
    }

    fn repository(&self) -> &MemoryRepository {
        &self.repository
    }

    fn close(&mut self) -> Result<(), BridgeError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.hits.clear();
        let store = self.repository.store.clone();
        store.log_close(format!("cursor:{}", self.repository.resource))?;
        self.repository.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_types::settings::keys;
    use docbridge_types::Value;
    use serde_json::json;

    fn settings(resource: &str) -> Settings {
        Settings::new()
            .with(keys::RESOURCE, resource)
            .with(keys::BATCH_SIZE_ENTRIES, "2")
    }

    fn record(name: &str) -> WriteRecord {
        WriteRecord {
            entries: vec![("user.name".to_string(), Value::from(name))],
        }
    }

    #[test]
    fn writes_are_batched() {
        let factory = MemoryFactory::default();
        let mut repo = factory.open(&settings("out")).unwrap();
        repo.write(record("a")).unwrap();
        assert_eq!(repo.pending(), 1);
        assert!(factory.store().documents("out").unwrap().is_empty());

        repo.write(record("b")).unwrap();
        assert_eq!(repo.pending(), 0);
        assert_eq!(factory.store().documents("out").unwrap().len(), 2);
        assert_eq!(repo.stats().bulk_writes, 1);

        repo.write(record("c")).unwrap();
        repo.close().unwrap();
        let stats = repo.stats();
        assert_eq!(stats.bulk_writes, 2);
        assert_eq!(stats.docs_written, 3);
        assert!(stats.bytes_written > 0);
        assert_eq!(
            factory.store().documents("out").unwrap()[2],
            Document::from_json(json!({"user": {"name": "c"}})).unwrap()
        );
    }

    #[test]
    fn cursor_counts_docs_and_repository_counts_bytes() {
        let store = MemoryStore::new();
        store
            .seed("in", [Document::from_json(json!({"a": 1})).unwrap()])
            .unwrap();
        let mut cursor = MemoryFactory::new(store.clone())
            .scroll(&settings("in"))
            .unwrap();
        let hit = cursor.next_hit().unwrap().unwrap();
        assert_eq!(hit.id, "doc-1");
        assert!(cursor.next_hit().unwrap().is_none());
        assert_eq!(cursor.stats().docs_read, 1);
        assert_eq!(cursor.stats().bytes_read, 0);
        assert_eq!(cursor.repository().stats().bytes_read, 7);
        cursor.close().unwrap();
        cursor.close().unwrap();
        assert_eq!(
            store.close_log().unwrap(),
            vec!["cursor:in".to_string(), "repository:in".to_string()]
        );
    }

    #[test]
    fn injected_failures_fire() {
        let store = MemoryStore::new();
        store
            .inject_failure(
                FailurePoint::Scroll,
                BridgeError::transport("NODE_UNAVAILABLE", "no node reachable"),
            )
            .unwrap();
        let err = MemoryFactory::new(store).scroll(&settings("in")).unwrap_err();
        assert_eq!(err.code, "NODE_UNAVAILABLE");
    }

    #[test]
    fn resource_existence() {
        let store = MemoryStore::new();
        let factory = MemoryFactory::new(store.clone());
        let mut repo = factory.open(&settings("out")).unwrap();
        assert!(!repo.resource_exists().unwrap());
        store.create_resource("out").unwrap();
        assert!(repo.resource_exists().unwrap());
    }
}
