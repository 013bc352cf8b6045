// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Debounced batching of log submissions.
//!
//! Submissions are coalesced per debounce window and flushed as one append.
//! Every caller of a window receives the same [`AppendResult`].
//!
//! ```text
//!   StreamLogger (Clone)        LoggerService task           AppendWorker task
//!   ────────────────────        ──────────────────           ─────────────────
//!   submit ──Submit──────────>  IDLE ─first submit─> WINDOW_OPEN
//!   submit ──Submit──────────>  append to pending batch
//!                               timer fires: seal batch ──>  append(handle, records)
//!                               IDLE again                   resolve every waiter
//!   start  ──Start───────────>  forward ─────────────────>   ensure_stream
//! ```
//!
//! The window closes at `max(now, last_flush_start + window)`, so under
//! sustained load flushes happen once per window instead of drifting. Sealed
//! batches queue up for a single worker that owns the [`StreamHandle`], which
//! keeps at most one append in flight per stream even when the remote is
//! slower than the window, while new submissions keep being accepted.

use crate::client::LogStreamClient;
use crate::config::LoggerConfig;
use crate::deferred::{deferred, Resolver, Waiter};
use crate::engine::{AppendEngine, AppendResult, StreamHandle};
use crate::error::LoggerError;
use crate::lifecycle::StreamInfo;
use crate::normalize::{normalize, LogInput, SubmitOptions};
use crate::record::LogRecord;
use std::future::pending;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, warn};

/// Result handed to every caller of one flushed batch.
pub type SharedResult = Arc<AppendResult>;

#[derive(Debug)]
pub enum LoggerCommand {
    Submit {
        records: Vec<LogRecord>,
        resolver: Resolver<SharedResult>,
    },
    Start {
        stream_name: Option<String>,
        response_tx: oneshot::Sender<Result<StreamInfo, LoggerError>>,
    },
    GetStreamHandle(oneshot::Sender<StreamHandle>),
    /// Flush whatever is pending, drain the worker and stop.
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug)]
enum WorkerCommand {
    Append(PendingBatch),
    Start {
        stream_name: Option<String>,
        response_tx: oneshot::Sender<Result<StreamInfo, LoggerError>>,
    },
    GetStreamHandle(oneshot::Sender<StreamHandle>),
}

/// Records of one window and the callers waiting on its outcome, both in
/// arrival order.
#[derive(Debug, Default)]
struct PendingBatch {
    records: Vec<LogRecord>,
    waiters: Vec<Resolver<SharedResult>>,
}

impl PendingBatch {
    fn push(&mut self, records: Vec<LogRecord>, resolver: Resolver<SharedResult>) {
        self.records.extend(records);
        self.waiters.push(resolver);
    }

    fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    fn fail(self, group_name: &str, error: LoggerError) {
        let result = Arc::new(AppendResult::failed(group_name, None, self.records, error));
        for waiter in self.waiters {
            waiter.resolve(Arc::clone(&result));
        }
    }
}

/// Handle to a running logger. Cheap to clone; all clones feed the same
/// batches.
#[derive(Clone, Debug)]
pub struct StreamLogger {
    tx: mpsc::UnboundedSender<LoggerCommand>,
    group_name: Arc<str>,
}

impl StreamLogger {
    /// Spawns the logger service on the current tokio runtime.
    pub fn spawn(client: Arc<dyn LogStreamClient>, config: &LoggerConfig) -> Self {
        let (service, logger) = LoggerService::new(client, config);
        tokio::spawn(service.run());
        logger
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Queues `input` for the current window and returns a handle resolving
    /// to the window's shared result.
    pub fn submit(&self, input: impl Into<LogInput>) -> Waiter<SharedResult> {
        self.submit_with(input, SubmitOptions::default())
    }

    pub fn submit_with(
        &self,
        input: impl Into<LogInput>,
        options: SubmitOptions,
    ) -> Waiter<SharedResult> {
        let records = normalize(input.into(), options.timestamp);
        let (resolver, waiter) = deferred();

        if let Err(mpsc::error::SendError(command)) =
            self.tx.send(LoggerCommand::Submit { records, resolver })
        {
            warn!("Stream logger service is not running, rejecting submission");
            if let LoggerCommand::Submit { resolver, .. } = command {
                resolver.reject(LoggerError::ServiceStopped);
            }
        }
        waiter
    }

    /// Submits `input` and waits for its batch to be flushed. Never fails:
    /// errors are carried in the result.
    pub async fn put(&self, input: impl Into<LogInput>) -> SharedResult {
        match self.submit(input).await {
            Ok(result) => result,
            Err(e) => Arc::new(AppendResult::failed(&self.group_name, None, Vec::new(), e)),
        }
    }

    /// Selects the stream later batches go to, creating it if needed.
    /// Batches sealed before this call still go to the previous stream.
    pub async fn start(&self, stream_name: Option<&str>) -> Result<StreamInfo, LoggerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(LoggerCommand::Start {
                stream_name: stream_name.map(str::to_string),
                response_tx,
            })
            .map_err(|_| LoggerError::ServiceStopped)?;

        response_rx.await.map_err(|_| LoggerError::ServiceStopped)?
    }

    /// Snapshot of the stream position, e.g. to hand over to another logger.
    pub async fn stream_handle(&self) -> Result<StreamHandle, LoggerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(LoggerCommand::GetStreamHandle(response_tx))
            .map_err(|_| LoggerError::ServiceStopped)?;

        response_rx.await.map_err(|_| LoggerError::ServiceStopped)
    }

    /// Flushes the open window immediately and returns once every pending
    /// batch has been appended and its callers resolved.
    pub async fn shutdown(&self) -> Result<(), LoggerError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(LoggerCommand::Shutdown(done_tx))
            .map_err(|_| LoggerError::ServiceStopped)?;

        done_rx.await.map_err(|_| LoggerError::ServiceStopped)
    }
}

pub struct LoggerService {
    rx: mpsc::UnboundedReceiver<LoggerCommand>,
    group_name: String,
    window: Duration,
    pending: PendingBatch,
    /// Set while a window is open.
    deadline: Option<Instant>,
    last_flush_start: Instant,
    worker_tx: mpsc::UnboundedSender<WorkerCommand>,
    worker: Option<AppendWorker>,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
}

impl LoggerService {
    /// Returns the service (to be spawned) and a handle to send it commands.
    ///
    /// Construction counts as the first flush start, so submissions arriving
    /// right after it coalesce like any later window.
    pub fn new(client: Arc<dyn LogStreamClient>, config: &LoggerConfig) -> (Self, StreamLogger) {
        if let Err(e) = config.validate() {
            warn!("Starting stream logger with an invalid configuration: {e}");
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();

        let stream = initial_stream(client.as_ref(), config);
        let engine = AppendEngine::new(client, config.group_name.clone(), config.stream_name.clone());
        let worker = AppendWorker {
            engine,
            stream,
            rx: worker_rx,
        };

        let service = LoggerService {
            rx,
            group_name: config.group_name.clone(),
            window: config.window,
            pending: PendingBatch::default(),
            deadline: None,
            last_flush_start: Instant::now(),
            worker_tx,
            worker: Some(worker),
            shutdown_waiters: Vec::new(),
        };
        let logger = StreamLogger {
            tx,
            group_name: Arc::from(config.group_name.as_str()),
        };

        (service, logger)
    }

    /// Processes commands until shutdown or until every handle is dropped.
    /// Pending submissions are flushed before returning.
    pub async fn run(mut self) {
        debug!("Stream logger service started");
        let worker = self.worker.take().map(|worker| tokio::spawn(worker.run()));

        loop {
            tokio::select! {
                command = self.rx.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                () = window_elapsed(self.deadline) => self.seal(),
            }
        }

        debug!("Stream logger service shutting down");
        self.rx.close();
        while let Ok(command) = self.rx.try_recv() {
            self.handle_command(command);
        }
        self.seal();

        let LoggerService {
            worker_tx,
            shutdown_waiters,
            ..
        } = self;
        drop(worker_tx);
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!("Append worker failed: {e}");
            }
        }
        for done_tx in shutdown_waiters {
            if done_tx.send(()).is_err() {
                debug!("Shutdown caller dropped before completion");
            }
        }
        debug!("Stream logger service stopped");
    }

    /// Returns `false` when the service should stop taking new commands.
    fn handle_command(&mut self, command: LoggerCommand) -> bool {
        match command {
            LoggerCommand::Submit { records, resolver } => {
                self.enqueue(records, resolver);
                true
            }
            LoggerCommand::Start {
                stream_name,
                response_tx,
            } => {
                self.dispatch(WorkerCommand::Start {
                    stream_name,
                    response_tx,
                });
                true
            }
            LoggerCommand::GetStreamHandle(response_tx) => {
                self.dispatch(WorkerCommand::GetStreamHandle(response_tx));
                true
            }
            LoggerCommand::Shutdown(done_tx) => {
                self.shutdown_waiters.push(done_tx);
                false
            }
        }
    }

    fn enqueue(&mut self, records: Vec<LogRecord>, resolver: Resolver<SharedResult>) {
        if self.deadline.is_none() {
            let now = Instant::now();
            let deadline = match self.last_flush_start.checked_add(self.window) {
                Some(deadline) => deadline.max(now),
                None => {
                    warn!("Window of {:?} is out of range, flushing immediately", self.window);
                    now
                }
            };
            debug!(
                "Opening batch window, flushing in {:?}",
                deadline.saturating_duration_since(now)
            );
            self.deadline = Some(deadline);
        }
        self.pending.push(records, resolver);
    }

    /// Closes the open window and hands its batch to the worker.
    fn seal(&mut self) {
        self.deadline = None;
        if self.pending.is_empty() {
            return;
        }

        self.last_flush_start = Instant::now();
        let batch = mem::take(&mut self.pending);
        debug!(
            "Flushing {} records from {} submissions",
            batch.records.len(),
            batch.waiters.len()
        );
        self.dispatch(WorkerCommand::Append(batch));
    }

    fn dispatch(&self, command: WorkerCommand) {
        let Err(mpsc::error::SendError(command)) = self.worker_tx.send(command) else {
            return;
        };

        error!("Append worker is not running");
        match command {
            WorkerCommand::Append(batch) => batch.fail(&self.group_name, LoggerError::ServiceStopped),
            WorkerCommand::Start { response_tx, .. } => {
                let _ = response_tx.send(Err(LoggerError::ServiceStopped));
            }
            // Dropping the sender reports the service as stopped.
            WorkerCommand::GetStreamHandle(_) => {}
        }
    }
}

/// Owns the stream position; runs appends and stream selection one at a time.
struct AppendWorker {
    engine: AppendEngine,
    stream: StreamHandle,
    rx: mpsc::UnboundedReceiver<WorkerCommand>,
}

impl AppendWorker {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                WorkerCommand::Append(PendingBatch { records, waiters }) => {
                    let result = Arc::new(self.engine.append(&mut self.stream, records).await);
                    if let Some(e) = &result.error {
                        error!(
                            "Failed to append {} log records to {}: {e}",
                            result.records.len(),
                            self.engine.group_name()
                        );
                    }

                    for waiter in waiters.into_iter().filter(Resolver::is_waiting) {
                        waiter.resolve(Arc::clone(&result));
                    }
                }
                WorkerCommand::Start {
                    stream_name,
                    response_tx,
                } => {
                    let result = self
                        .engine
                        .start(&mut self.stream, stream_name.as_deref())
                        .await;
                    if response_tx.send(result).is_err() {
                        debug!("Start caller dropped before the stream was selected");
                    }
                }
                WorkerCommand::GetStreamHandle(response_tx) => {
                    if response_tx.send(self.stream.clone()).is_err() {
                        debug!("Stream handle caller dropped");
                    }
                }
            }
        }
        debug!("Append worker stopped");
    }
}

/// Resumes the configured stream when both its name and token are known;
/// otherwise the stream is selected lazily on the first append.
fn initial_stream(client: &dyn LogStreamClient, config: &LoggerConfig) -> StreamHandle {
    match (&config.stream_name, &config.sequence_token) {
        (Some(stream_name), Some(sequence_token)) => {
            StreamHandle::resume(client.sanitize(stream_name), Some(sequence_token.clone()))
        }
        _ => StreamHandle::default(),
    }
}

async fn window_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
