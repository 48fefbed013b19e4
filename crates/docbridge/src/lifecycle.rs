//! Per-task adapter lifecycle.
//!
//! A task moves through `Uninitialized -> Configured -> Open -> Closed`. The
//! stage enum owns whatever the task holds at that point (resolved settings,
//! repository, cursor), so there is no nullable client to guard. Integration
//! shims for a concrete engine call `configure`, `open`, `read_next` or
//! `write_one`, and `close`; nothing here depends on an engine's callback
//! signatures.

use std::fmt;
use std::mem;

use docbridge_types::{BridgeError, Settings, Stage, Tuple};

use crate::counters::CounterSink;
use crate::init::{self, AdapterSpec, TaskKind};
use crate::metrics;
use crate::projector::{ProjectionContext, WriteProjection};
use crate::repository::{Repository, RepositoryFactory, ScrollCursor};

/// Observable lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Uninitialized,
    Configured,
    Open,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

/// Operations every task exposes to an integration shim.
pub trait TaskLifecycle {
    /// Resolve settings for this task. Repeated calls are skipped.
    ///
    /// # Errors
    ///
    /// Returns a config error when settings are unusable.
    fn configure(&mut self, task_config: &Settings) -> Result<(), BridgeError>;

    /// Acquire the repository (and cursor, for reads).
    ///
    /// # Errors
    ///
    /// Fails when the task is not configured, on validation failures, or when
    /// the repository cannot be opened.
    fn open(&mut self) -> Result<(), BridgeError>;

    /// Report counters and release every held resource. Safe to call from any
    /// state and any number of times.
    ///
    /// # Errors
    ///
    /// Returns the first failure raised while releasing resources; every
    /// resource is still released.
    fn close(&mut self, counters: &dyn CounterSink) -> Result<(), BridgeError>;

    fn state(&self) -> LifecycleState;
}

/// Settings and projection resolved by `configure`.
#[derive(Debug, Clone)]
struct Configured {
    settings: Settings,
    projection: ProjectionContext,
}

impl Configured {
    fn resolve(
        task_config: &Settings,
        spec: &AdapterSpec,
        kind: TaskKind,
    ) -> Result<Self, BridgeError> {
        let settings = init::resolve_settings(task_config, spec, kind)?;
        let projection = ProjectionContext::from_settings(&settings)?;
        tracing::debug!(
            %kind,
            format = %projection.mode(),
            aliases = projection.alias().len(),
            "task configured"
        );
        Ok(Self {
            settings,
            projection,
        })
    }
}

fn not_configured(stage: Stage) -> BridgeError {
    BridgeError::internal("NOT_CONFIGURED", "task must be configured first").at_stage(stage)
}

fn not_open(stage: Stage, state: LifecycleState) -> BridgeError {
    let message = match state {
        LifecycleState::Open => "task open did not complete".to_string(),
        other => format!("task is {other}, not open"),
    };
    BridgeError::internal("NOT_OPEN", message).at_stage(stage)
}

/// Keep the first error, log the rest.
fn record_failure(first: &mut Option<BridgeError>, err: BridgeError) {
    if first.is_none() {
        *first = Some(err);
    } else {
        tracing::warn!(error = %err, "additional failure while closing task");
    }
}

// ── Source ──────────────────────────────────────────────────────────

enum SourceStage<F: RepositoryFactory> {
    Uninitialized,
    Configured(Configured),
    Open {
        configured: Configured,
        repository: F::Repository,
        /// `None` while a scroll failure left the open incomplete.
        cursor: Option<F::Cursor>,
    },
    Closed,
}

/// Read side of the adapter: one document in, one tuple out.
pub struct SourceTask<F: RepositoryFactory> {
    spec: AdapterSpec,
    factory: F,
    stage: SourceStage<F>,
}

impl<F: RepositoryFactory> SourceTask<F> {
    pub fn new(spec: AdapterSpec, factory: F) -> Self {
        Self {
            spec,
            factory,
            stage: SourceStage::Uninitialized,
        }
    }

    pub fn spec(&self) -> &AdapterSpec {
        &self.spec
    }

    /// Resolved settings, once configured.
    pub fn settings(&self) -> Option<&Settings> {
        self.configured().map(|c| &c.settings)
    }

    /// Resolved projection, once configured.
    pub fn projection(&self) -> Option<&ProjectionContext> {
        self.configured().map(|c| &c.projection)
    }

    fn configured(&self) -> Option<&Configured> {
        match &self.stage {
            SourceStage::Configured(c) | SourceStage::Open { configured: c, .. } => Some(c),
            SourceStage::Uninitialized | SourceStage::Closed => None,
        }
    }

    /// Park the task as open. The repository stays owned by the task even when
    /// the scroll failed, so `close` can release it and `open` can retry.
    fn finish_open(
        &mut self,
        configured: Configured,
        repository: F::Repository,
        scrolled: Result<F::Cursor, BridgeError>,
    ) -> Result<(), BridgeError> {
        let (cursor, outcome) = match scrolled {
            Ok(cursor) => {
                tracing::info!(
                    resource = configured.settings.resource_read().unwrap_or_default(),
                    query = configured.settings.query().unwrap_or("*"),
                    "source opened"
                );
                (Some(cursor), Ok(()))
            }
            Err(e) => (None, Err(e.at_stage(Stage::Open))),
        };
        self.stage = SourceStage::Open {
            configured,
            repository,
            cursor,
        };
        outcome
    }

    /// Pull the next document and project it into `tuple`.
    ///
    /// Returns `Ok(false)` once the cursor is exhausted; `tuple` is left
    /// untouched in that case.
    ///
    /// # Errors
    ///
    /// Fails when the task is not open, propagates cursor failures, and
    /// returns a data error when a value cannot be coerced into its slot.
    pub fn read_next(&mut self, tuple: &mut Tuple) -> Result<bool, BridgeError> {
        let state = self.state();
        let SourceStage::Open {
            configured,
            cursor: Some(cursor),
            ..
        } = &mut self.stage
        else {
            return Err(not_open(Stage::Read, state));
        };
        let Some(hit) = cursor.next_hit().map_err(|e| e.at_stage(Stage::Read))? else {
            return Ok(false);
        };
        configured
            .projection
            .project(tuple, &hit.document)
            .map_err(|e| e.at_stage(Stage::Read))?;
        Ok(true)
    }
}

impl<F: RepositoryFactory> TaskLifecycle for SourceTask<F> {
    fn configure(&mut self, task_config: &Settings) -> Result<(), BridgeError> {
        if !matches!(self.stage, SourceStage::Uninitialized) {
            tracing::debug!(state = %self.state(), "source already configured, skipping");
            return Ok(());
        }
        let configured = Configured::resolve(task_config, &self.spec, TaskKind::Read)
            .map_err(|e| e.at_stage(Stage::Configure))?;
        self.stage = SourceStage::Configured(configured);
        Ok(())
    }

    fn open(&mut self) -> Result<(), BridgeError> {
        match mem::replace(&mut self.stage, SourceStage::Closed) {
            SourceStage::Configured(configured) => {
                let repository = match self.factory.open(&configured.settings) {
                    Ok(repository) => repository,
                    Err(e) => {
                        self.stage = SourceStage::Configured(configured);
                        return Err(e.at_stage(Stage::Open));
                    }
                };
                let scrolled = self.factory.scroll(&configured.settings);
                self.finish_open(configured, repository, scrolled)
            }
            SourceStage::Open {
                configured,
                repository,
                cursor: None,
            } => {
                tracing::debug!("retrying scroll of partially opened source");
                let scrolled = self.factory.scroll(&configured.settings);
                self.finish_open(configured, repository, scrolled)
            }
            open @ SourceStage::Open { .. } => {
                tracing::debug!("source already open");
                self.stage = open;
                Ok(())
            }
            SourceStage::Uninitialized => {
                self.stage = SourceStage::Uninitialized;
                Err(not_configured(Stage::Open))
            }
            SourceStage::Closed => Err(not_open(Stage::Open, LifecycleState::Closed)),
        }
    }

    fn close(&mut self, counters: &dyn CounterSink) -> Result<(), BridgeError> {
        let SourceStage::Open {
            mut repository,
            cursor,
            ..
        } = mem::replace(&mut self.stage, SourceStage::Closed)
        else {
            tracing::debug!("source close without open resources");
            return Ok(());
        };

        let mut first_error = None;
        if let Some(mut cursor) = cursor {
            metrics::report(counters, "cursor", cursor.stats());
            metrics::report(counters, "cursor.repository", cursor.repository().stats());
            if let Err(e) = cursor.close() {
                record_failure(&mut first_error, e.at_stage(Stage::Close));
            }
        }
        metrics::report(counters, "repository", repository.stats());
        if let Err(e) = repository.close() {
            record_failure(&mut first_error, e.at_stage(Stage::Close));
        }
        tracing::info!("source closed");
        first_error.map_or(Ok(()), Err)
    }

    fn state(&self) -> LifecycleState {
        match self.stage {
            SourceStage::Uninitialized => LifecycleState::Uninitialized,
            SourceStage::Configured(_) => LifecycleState::Configured,
            SourceStage::Open { .. } => LifecycleState::Open,
            SourceStage::Closed => LifecycleState::Closed,
        }
    }
}

// ── Sink ────────────────────────────────────────────────────────────

enum SinkStage<R> {
    Uninitialized,
    Configured(Configured, WriteProjection),
    Open {
        configured: Configured,
        projection: WriteProjection,
        repository: R,
    },
    Closed,
}

/// Write side of the adapter: one tuple in, one document out.
pub struct SinkTask<F: RepositoryFactory> {
    spec: AdapterSpec,
    factory: F,
    stage: SinkStage<F::Repository>,
}

impl<F: RepositoryFactory> SinkTask<F> {
    pub fn new(spec: AdapterSpec, factory: F) -> Self {
        Self {
            spec,
            factory,
            stage: SinkStage::Uninitialized,
        }
    }

    pub fn spec(&self) -> &AdapterSpec {
        &self.spec
    }

    /// Resolved settings, once configured.
    pub fn settings(&self) -> Option<&Settings> {
        match &self.stage {
            SinkStage::Configured(c, _) | SinkStage::Open { configured: c, .. } => {
                Some(&c.settings)
            }
            SinkStage::Uninitialized | SinkStage::Closed => None,
        }
    }

    /// Output attribute names, once configured.
    pub fn output_names(&self) -> Option<&[String]> {
        match &self.stage {
            SinkStage::Configured(_, p) | SinkStage::Open { projection: p, .. } => {
                Some(p.names())
            }
            SinkStage::Uninitialized | SinkStage::Closed => None,
        }
    }

    /// Hand one tuple to the repository.
    ///
    /// # Errors
    ///
    /// Fails when the task is not open or the tuple does not match the sink
    /// schema, and propagates repository failures unchanged.
    pub fn write_one(&mut self, tuple: &Tuple) -> Result<(), BridgeError> {
        let state = self.state();
        let SinkStage::Open {
            projection,
            repository,
            ..
        } = &mut self.stage
        else {
            return Err(not_open(Stage::Write, state));
        };
        let record = projection
            .record(tuple)
            .map_err(|e| e.at_stage(Stage::Write))?;
        repository
            .write(record)
            .map_err(|e| e.at_stage(Stage::Write))
    }
}

impl<F: RepositoryFactory> TaskLifecycle for SinkTask<F> {
    fn configure(&mut self, task_config: &Settings) -> Result<(), BridgeError> {
        if !matches!(self.stage, SinkStage::Uninitialized) {
            tracing::debug!(state = %self.state(), "sink already configured, skipping");
            return Ok(());
        }
        let configured = Configured::resolve(task_config, &self.spec, TaskKind::Write)
            .map_err(|e| e.at_stage(Stage::Configure))?;
        let projection = configured
            .projection
            .write_projection(&self.spec.fields)
            .map_err(|e| e.at_stage(Stage::Configure))?;
        self.stage = SinkStage::Configured(configured, projection);
        Ok(())
    }

    fn open(&mut self) -> Result<(), BridgeError> {
        match mem::replace(&mut self.stage, SinkStage::Closed) {
            SinkStage::Configured(configured, projection) => {
                let mut repository = match self.factory.open(&configured.settings) {
                    Ok(repository) => repository,
                    Err(e) => {
                        self.stage = SinkStage::Configured(configured, projection);
                        return Err(e.at_stage(Stage::Open));
                    }
                };
                if let Err(e) = init::check_resource_existence(&configured.settings, &mut repository)
                {
                    if let Err(close_err) = repository.close() {
                        tracing::warn!(error = %close_err, "failed to release rejected repository");
                    }
                    self.stage = SinkStage::Configured(configured, projection);
                    return Err(e.at_stage(Stage::Open));
                }
                tracing::info!(
                    resource = configured.settings.resource_write().unwrap_or_default(),
                    fields = projection.names().len(),
                    "sink opened"
                );
                self.stage = SinkStage::Open {
                    configured,
                    projection,
                    repository,
                };
                Ok(())
            }
            open @ SinkStage::Open { .. } => {
                tracing::debug!("sink already open");
                self.stage = open;
                Ok(())
            }
            SinkStage::Uninitialized => {
                self.stage = SinkStage::Uninitialized;
                Err(not_configured(Stage::Open))
            }
            SinkStage::Closed => Err(not_open(Stage::Open, LifecycleState::Closed)),
        }
    }

    fn close(&mut self, counters: &dyn CounterSink) -> Result<(), BridgeError> {
        let SinkStage::Open { mut repository, .. } =
            mem::replace(&mut self.stage, SinkStage::Closed)
        else {
            tracing::debug!("sink close without open resources");
            return Ok(());
        };

        let mut first_error = None;
        // Flush first so the reported counters include the final bulk.
        if let Err(e) = repository.flush() {
            record_failure(&mut first_error, e.at_stage(Stage::Close));
        }
        metrics::report(counters, "repository", repository.stats());
        if let Err(e) = repository.close() {
            record_failure(&mut first_error, e.at_stage(Stage::Close));
        }
        tracing::info!("sink closed");
        first_error.map_or(Ok(()), Err)
    }

    fn state(&self) -> LifecycleState {
        match self.stage {
            SinkStage::Uninitialized => LifecycleState::Uninitialized,
            SinkStage::Configured(..) => LifecycleState::Configured,
            SinkStage::Open { .. } => LifecycleState::Open,
            SinkStage::Closed => LifecycleState::Closed,
        }
    }
}
