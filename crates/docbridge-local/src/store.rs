//! JSON-lines backed repository and cursor.
//!
//! Each resource is one `<root>/<resource>.jsonl` file holding one document
//! per line. Writes are buffered and appended as a bulk.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};

use docbridge::repository::{Hit, Repository, RepositoryFactory, ScrollCursor, WriteRecord};
use docbridge_types::{BridgeError, Document, FormatMode, Settings, StatsSnapshot};

use crate::query::TermQuery;

const EXTENSION: &str = "jsonl";

fn io_error(action: &str, path: &Path, err: &std::io::Error) -> BridgeError {
    BridgeError::transport("IO_ERROR", format!("{action} {}: {err}", path.display()))
        .with_details(serde_json::json!({ "path": path.display().to_string() }))
}

/// [`RepositoryFactory`] rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalFactory {
    root: PathBuf,
}

impl LocalFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `resource`.
    ///
    /// # Errors
    ///
    /// Returns a config error for names that would escape the root directory.
    pub fn resource_path(&self, resource: &str) -> Result<PathBuf, BridgeError> {
        let valid = !resource.is_empty()
            && !resource.starts_with('.')
            && !resource.contains(['/', '\\']);
        if !valid {
            return Err(BridgeError::config(
                "INVALID_RESOURCE",
                format!("resource name '{resource}' is not a plain file name"),
            ));
        }
        Ok(self.root.join(format!("{resource}.{EXTENSION}")))
    }

    fn repository(&self, resource: &str, settings: &Settings) -> Result<LocalRepository, BridgeError> {
        Ok(LocalRepository {
            path: self.resource_path(resource)?,
            mode: settings.format_mode()?,
            batch_size: settings.batch_size_entries()?,
            pending: Vec::new(),
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

impl RepositoryFactory for LocalFactory {
    type Repository = LocalRepository;
    type Cursor = LocalCursor;

    fn open(&self, settings: &Settings) -> Result<LocalRepository, BridgeError> {
        let resource = required(
            settings.resource_write().or_else(|| settings.resource_read()),
            "target",
        )?;
        self.repository(resource, settings)
    }

    fn scroll(&self, settings: &Settings) -> Result<LocalCursor, BridgeError> {
        let resource = required(settings.resource_read(), "read")?;
        let query = TermQuery::parse(settings.query())?;
        let repository = self.repository(resource, settings)?;
        let file = File::open(&repository.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::config(
                    "RESOURCE_MISSING",
                    format!("resource '{resource}' does not exist"),
                )
            } else {
                io_error("opening", &repository.path, &e)
            }
        })?;
        tracing::debug!(resource, path = %repository.path.display(), ?query, "local scroll started");
        Ok(LocalCursor {
            resource: resource.to_string(),
            repository,
            lines: Some(BufReader::new(file).lines()),
            query,
            line_no: 0,
            stats: StatsSnapshot::default(),
        })
    }
}

/// Buffered appender to one resource file.
#[derive(Debug)]
pub struct LocalRepository {
    path: PathBuf,
    mode: FormatMode,
    batch_size: usize,
    pending: Vec<String>,
    stats: StatsSnapshot,
    closed: bool,
}

impl LocalRepository {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<(), BridgeError> {
        match self.path.parent() {
            Some(parent) => fs::create_dir_all(parent)
                .map_err(|e| io_error("creating directory for", &self.path, &e)),
            None => Ok(()),
        }
    }

    fn open_append(&self) -> Result<File, BridgeError> {
        self.ensure_parent()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error("opening", &self.path, &e))
    }
}

impl Repository for LocalRepository {
    fn write(&mut self, record: WriteRecord) -> Result<(), BridgeError> {
        let document = record.to_document(self.mode);
        let line = serde_json::to_string(&document).map_err(|e| {
            BridgeError::data("ENCODE_FAILED", format!("document is not encodable: {e}"))
        })?;
        self.pending.push(line);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BridgeError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for line in &self.pending {
            buf.push_str(line);
            buf.push('\n');
        }
        let mut file = self.open_append()?;
        file.write_all(buf.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| io_error("appending to", &self.path, &e))?;

        let docs = self.pending.len() as u64;
        let bytes = buf.len() as u64;
        self.pending.clear();
        self.stats.bulk_writes += 1;
        self.stats.docs_written += docs;
        self.stats.docs_recorded += docs;
        self.stats.bytes_written += bytes;
        self.stats.bytes_recorded += bytes;
        tracing::debug!(path = %self.path.display(), docs, bytes, "bulk appended");
        Ok(())
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats
    }

    fn resource_exists(&mut self) -> Result<bool, BridgeError> {
        self.path
            .try_exists()
            .map_err(|e| io_error("checking", &self.path, &e))
    }

    fn create_resource(&mut self) -> Result<(), BridgeError> {
        self.open_append().map(drop)
    }

    fn close(&mut self) -> Result<(), BridgeError> {
        if self.closed {
            return Ok(());
        }
        // Pending lines survive a failed flush; a later close retries them.
        self.flush()?;
        self.closed = true;
        Ok(())
    }
}

/// Line-by-line scroll over one resource file.
#[derive(Debug)]
pub struct LocalCursor {
    resource: String,
    repository: LocalRepository,
    lines: Option<Lines<BufReader<File>>>,
    query: TermQuery,
    line_no: u64,
    stats: StatsSnapshot,
}

impl ScrollCursor for LocalCursor {
    type Repository = LocalRepository;

    fn next_hit(&mut self) -> Result<Option<Hit>, BridgeError> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };
        for line in lines.by_ref() {
            let line = line.map_err(|e| io_error("reading", &self.repository.path, &e))?;
            self.line_no += 1;
            self.repository.stats.bytes_read += line.len() as u64 + 1;
            if line.trim().is_empty() {
                continue;
            }
            let document: Document = serde_json::from_str(&line).map_err(|e| {
                BridgeError::data("INVALID_DOCUMENT", format!("{}: {e}", self.resource))
                    .with_details(serde_json::json!({ "line": self.line_no }))
            })?;
            if !self.query.matches(&document, self.repository.mode) {
                continue;
            }
            self.stats.docs_read += 1;
            return Ok(Some(Hit {
                id: format!("{}:{}", self.resource, self.line_no),
                document,
            }));
        }
        self.lines = None;
        Ok(None)
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats
    }

    fn repository(&self) -> &LocalRepository {
        &self.repository
    }

    fn close(&mut self) -> Result<(), BridgeError> {
        self.lines = None;
        self.repository.close()
    }
}
