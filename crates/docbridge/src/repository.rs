//! Collaborator contracts for store access.
//!
//! Transport, batching and retries live behind these traits. The adapter only
//! drives them and treats every call as already resilient: errors coming out
//! of a [`Repository`] or [`ScrollCursor`] are passed through untouched.

use docbridge_types::{BridgeError, Document, FormatMode, Settings, StatsSnapshot, Value};

/// One document returned by a scroll.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Store-assigned document identifier.
    pub id: String,
    pub document: Document,
}

/// Tuple values keyed by their output attribute names, ready for the
/// repository to turn into a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteRecord {
    pub entries: Vec<(String, Value)>,
}

impl WriteRecord {
    /// Build the document for this record.
    ///
    /// Under [`FormatMode::Current`] dotted names become nested maps
    /// (`user.name` lands in `{"user": {"name": ..}}`); under
    /// [`FormatMode::Legacy`] every name stays one flat key.
    pub fn to_document(&self, mode: FormatMode) -> Document {
        let mut doc = Document::new();
        for (name, value) in &self.entries {
            match mode {
                FormatMode::Current => insert_path(&mut doc, name, value.clone()),
                FormatMode::Legacy => {
                    doc.insert(name.clone(), value.clone());
                }
            }
        }
        doc
    }
}

fn insert_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            let slot = doc.entry_map(head);
            if !matches!(slot, Value::Map(_)) {
                *slot = Value::Map(Document::new());
            }
            if let Value::Map(child) = slot {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Write-side and bookkeeping access to one resource of the store.
pub trait Repository {
    /// Queue one record. Implementations batch and flush on their own terms.
    ///
    /// # Errors
    ///
    /// Propagates transport failures that survived the repository's retries.
    fn write(&mut self, record: WriteRecord) -> Result<(), BridgeError>;

    /// Send any queued records.
    ///
    /// # Errors
    ///
    /// Propagates transport failures that survived the repository's retries.
    fn flush(&mut self) -> Result<(), BridgeError>;

    /// Counters accumulated so far.
    fn stats(&self) -> StatsSnapshot;

    /// Whether the target resource exists.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    fn resource_exists(&mut self) -> Result<bool, BridgeError>;

    /// Create the target resource.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    fn create_resource(&mut self) -> Result<(), BridgeError>;

    /// Release the repository. Flushes pending records first.
    ///
    /// # Errors
    ///
    /// Propagates failures of the final flush.
    fn close(&mut self) -> Result<(), BridgeError>;
}

/// Paged reader over the documents matching a query.
pub trait ScrollCursor {
    type Repository: Repository;

    /// Next matching document, or `None` once the scroll is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    fn next_hit(&mut self) -> Result<Option<Hit>, BridgeError>;

    /// Counters accumulated by the cursor itself.
    fn stats(&self) -> StatsSnapshot;

    /// Repository the cursor reads through.
    fn repository(&self) -> &Self::Repository;

    /// Release the scroll and its repository.
    ///
    /// # Errors
    ///
    /// Propagates failures while releasing server-side scroll state.
    fn close(&mut self) -> Result<(), BridgeError>;
}

/// Builds repositories and cursors bound to resolved task settings.
pub trait RepositoryFactory {
    type Repository: Repository;
    type Cursor: ScrollCursor;

    /// Repository for the write resource (or the read resource on read tasks).
    ///
    /// # Errors
    ///
    /// Returns a config error when settings are unusable.
    fn open(&self, settings: &Settings) -> Result<Self::Repository, BridgeError>;

    /// Cursor over the read resource and query.
    ///
    /// # Errors
    ///
    /// Returns a config error when settings are unusable, or propagates
    /// transport failures from starting the scroll.
    fn scroll(&self, settings: &Settings) -> Result<Self::Cursor, BridgeError>;
}
