//! Step runner: feeds rows through field resolution, transfer and routing.
//!
//! Rows run with bounded concurrency and keep their input order. A row
//! level failure routes the row to the failure output and processing goes
//! on; a step level failure (unknown field, bad upload source,
//! cancellation) stops the step and halts transfers still in flight.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use dropstep_protocol::FileMetadata;
use dropstep_transfer::{
    BackendFactory, FileTransfer, ProgressCallback, TransferError, TransferProgress,
};
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::StepConfig;
use crate::error::StepError;
use crate::fields::FieldMap;
use crate::types::{Direction, Route, Row, RowOutcome, StepEvent, StepReport};

/// Runs one transfer step over a batch of rows.
pub struct StepRunner {
    config: StepConfig,
    direction: Direction,
    factory: Arc<dyn BackendFactory>,
    cancel: CancellationToken,
    events_tx: Option<mpsc::Sender<StepEvent>>,
}

/// Per-run shared state.
struct RunState {
    fields: FieldMap,
    halt: CancellationToken,
    stopped: Mutex<Option<StepError>>,
}

impl RunState {
    fn is_stopped(&self) -> bool {
        self.stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Records the first step level error and halts in-flight transfers.
    fn stop(&self, err: StepError) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        if stopped.is_none() {
            error!(error = %err, "step stopped");
            *stopped = Some(err);
        }
        self.halt.cancel();
    }
}

impl StepRunner {
    /// Creates a runner; fails if the configuration is invalid.
    pub fn new(
        config: StepConfig,
        direction: Direction,
        factory: Arc<dyn BackendFactory>,
    ) -> Result<Self, StepError> {
        config.validate()?;
        Ok(Self {
            config,
            direction,
            factory,
            cancel: CancellationToken::new(),
            events_tx: None,
        })
    }

    /// Sends progress events to `events_tx` while running.
    pub fn with_events(mut self, events_tx: mpsc::Sender<StepEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    /// Returns a cancellation token for this step.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Processes `rows` and returns their outcomes.
    pub async fn run(&self, rows: Vec<Row>) -> StepReport {
        let Some(first) = rows.first() else {
            return StepReport::default();
        };

        let fields = match FieldMap::resolve(&self.config, first) {
            Ok(fields) => fields,
            Err(e) => {
                error!(error = %e, "step stopped");
                return StepReport {
                    outcomes: Vec::new(),
                    stopped: Some(e),
                };
            }
        };

        let state = RunState {
            fields,
            halt: self.cancel.child_token(),
            stopped: Mutex::new(None),
        };

        info!(
            rows = rows.len(),
            direction = ?self.direction,
            concurrency = self.config.transfer.concurrency,
            "step started"
        );

        let outcomes: Vec<RowOutcome> = stream::iter(rows.into_iter().enumerate())
            .map(|(index, row)| self.process(index, row, &state))
            .buffered(self.config.transfer.concurrency)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        let report = StepReport {
            outcomes,
            stopped: state
                .stopped
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            stopped = report.stopped.is_some(),
            "step finished"
        );
        report
    }

    async fn process(&self, index: usize, row: Row, state: &RunState) -> Option<RowOutcome> {
        if state.is_stopped() {
            return None;
        }
        if self.cancel.is_cancelled() {
            state.stop(StepError::Cancelled);
            return None;
        }

        let result = self.transfer_row(index, &row, state).await;
        let (route, metadata, err) = match result {
            Ok(metadata) => (self.route_for(true), Some(metadata), None),
            Err(e) if e.stops_step() => {
                state.stop(e);
                return None;
            }
            Err(e) => {
                error!(index, error = %e, "row transfer failed");
                (self.route_for(false), None, Some(e.to_string()))
            }
        };

        self.emit(StepEvent::RowFinished {
            index,
            route: route.clone(),
            error: err.clone(),
        })
        .await;

        Some(RowOutcome {
            index,
            row,
            route,
            metadata,
            error: err,
        })
    }

    async fn transfer_row(
        &self,
        index: usize,
        row: &Row,
        state: &RunState,
    ) -> Result<FileMetadata, StepError> {
        let values = state.fields.extract(row)?;
        if self.direction == Direction::Upload {
            check_source(&values.source).await?;
        }

        info!(
            index,
            source = %values.source,
            target = %values.target,
            direction = ?self.direction,
            "transferring"
        );
        self.emit(StepEvent::RowStarted {
            index,
            source: values.source.clone(),
        })
        .await;

        let backend = self.factory.connect(&values.access_token)?;
        let transfer = FileTransfer::new(backend.as_ref(), self.config.transfer.engine.clone())
            .with_cancel(state.halt.clone())
            .with_progress(self.progress_callback(index));

        let result = match self.direction {
            Direction::Upload => {
                transfer
                    .upload(Path::new(&values.source), &values.target)
                    .await
            }
            Direction::Download => {
                transfer
                    .download(&values.source, Path::new(&values.target))
                    .await
            }
        };

        let metadata = result.map_err(|e| match e {
            TransferError::Cancelled => StepError::Cancelled,
            e => StepError::Transfer(e),
        })?;
        info!(index, target = %values.target, size = metadata.size, "row transferred");
        Ok(metadata)
    }

    fn route_for(&self, success: bool) -> Route {
        if !self.config.chooses_target_steps() {
            return Route::Main;
        }
        let target = if success {
            &self.config.successful_step
        } else {
            &self.config.failed_step
        };
        target.clone().map_or(Route::Discard, Route::Target)
    }

    fn progress_callback(&self, index: usize) -> ProgressCallback {
        let events_tx = self.events_tx.clone();
        Arc::new(move |progress: TransferProgress| {
            if let Some(tx) = &events_tx {
                // Progress is best effort; a full channel drops updates.
                let _ = tx.try_send(StepEvent::Progress { index, progress });
            }
        })
    }

    async fn emit(&self, event: StepEvent) {
        if let Some(tx) = &self.events_tx
            && tx.send(event).await.is_err()
        {
            debug!("step event receiver dropped");
        }
    }
}

/// Checks that an upload source exists and is a regular file.
async fn check_source(path: &str) -> Result<(), StepError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(StepError::SourceNotAFile(path.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StepError::SourceNotFound(path.to_string()))
        }
        Err(e) => Err(StepError::Io(e)),
    }
}
