use super::collaborators::{AdvertisingIdProvider, Clock, Collaborators, Connectivity};
use super::config::QueueConfig;
use super::drain::scan_batch;
use super::error::CoordinatorError;
use super::shared_store::SharedStore;
use super::stats::{Stats, StatsSnapshot};
use crate::codec::{PayloadCodec, check_record_size};
use crate::domain::EventRecord;
use crate::sender::{TransportError, UploadTransport};
use crate::storage::{RecordStore, StoreKind};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Requests the dispatcher may hold before new events are dropped.
pub(crate) const DISPATCH_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Draining,
    /// Terminal.
    ShutDown,
}

/// Why a flush cycle stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The queue is empty.
    #[default]
    Drained,
    Offline,
    /// Transient upload or storage failure; records were kept.
    Failed,
    ShutDown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub batches_sent: usize,
    pub records_uploaded: usize,
    pub records_rejected: usize,
    pub records_discarded: usize,
    pub remaining: usize,
    pub outcome: FlushOutcome,
}

enum DispatchMessage {
    Enqueue(EventRecord),
    Flush,
    Barrier(oneshot::Sender<()>),
}

enum UploadRequest {
    Flush,
    Barrier(oneshot::Sender<()>),
}

/// State shared by the coordinator handle and its tasks.
pub(crate) struct QueueCore {
    config: QueueConfig,
    store: SharedStore,
    codec: PayloadCodec,
    transport: Arc<dyn UploadTransport>,
    connectivity: Arc<dyn Connectivity>,
    clock: Arc<dyn Clock>,
    advertising_id: Option<Arc<dyn AdvertisingIdProvider>>,
    stats: Stats,
    /// Serializes drains and evictions. Appends only go through the store.
    flush_lock: tokio::sync::Mutex<()>,
    state: Mutex<CoordinatorState>,
    flush_pending: AtomicBool,
}

impl QueueCore {
    fn state(&self) -> CoordinatorState {
        *self.state.lock()
    }

    fn is_shut_down(&self) -> bool {
        self.state() == CoordinatorState::ShutDown
    }

    fn set_state(&self, next: CoordinatorState) {
        let mut state = self.state.lock();
        if *state != CoordinatorState::ShutDown {
            *state = next;
        }
    }

    fn size(&self) -> usize {
        self.store.len()
    }

    fn should_flush(&self) -> bool {
        !self.is_shut_down() && self.size() > 0 && self.connectivity.is_connected()
    }

    /// Encodes and appends one event. Returns whether the queue reached the
    /// flush threshold.
    async fn perform_enqueue(&self, event: EventRecord) -> bool {
        if self.is_shut_down() {
            return false;
        }

        let event = match self
            .advertising_id
            .as_ref()
            .and_then(|provider| provider.advertising_id())
        {
            Some(id) => event.with_advertising_id(&id),
            None => event,
        };

        let record = match self.codec.encode(&event).and_then(|record| {
            check_record_size(record.len(), self.config.max_payload_size).map(|()| record)
        }) {
            Ok(record) => record,
            Err(e) => {
                error!(
                    "Could not serialize event {}: {}",
                    event.message_id().unwrap_or("<no id>"),
                    e
                );
                self.stats.record_dropped();
                return false;
            }
        };

        let max = self.config.max_queue_size;
        if self.size() >= max {
            let _flush_guard = self.flush_lock.lock().await;
            let evicted = self
                .store
                .run(move |store| {
                    if store.size() < max {
                        return Ok(false);
                    }
                    store.remove_first(1).map(|()| true)
                })
                .await;
            match evicted {
                Ok(true) => {
                    warn!("Queue is at max capacity ({}), removed oldest event", max);
                    self.stats.record_eviction();
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Unable to remove oldest event from full queue: {}", e);
                    self.stats.record_dropped();
                    return false;
                }
            }
        }

        let len = record.len();
        let size = match self
            .store
            .run(move |store| store.append(&record).map(|()| store.size()))
            .await
        {
            Ok(size) => size,
            Err(e) => {
                error!("Could not add event to queue: {}", e);
                self.stats.record_dropped();
                return false;
            }
        };
        debug!("Enqueued event ({} bytes), queue size {}", len, size);
        size >= self.config.flush_queue_size
    }

    fn submit_flush(&self, upload_tx: &mpsc::UnboundedSender<UploadRequest>) {
        if !self.should_flush() {
            return;
        }
        // One queued flush is enough; the uploader clears the flag when it starts
        if self.flush_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        if upload_tx.send(UploadRequest::Flush).is_err() {
            self.flush_pending.store(false, Ordering::Release);
        }
    }

    /// Uploads batches until the queue is empty, the device goes offline or
    /// an upload fails.
    async fn drain_until_empty(&self) -> FlushReport {
        let _flush_guard = self.flush_lock.lock().await;
        let mut report = FlushReport::default();
        if self.is_shut_down() {
            report.outcome = FlushOutcome::ShutDown;
            report.remaining = self.size();
            return report;
        }

        self.set_state(CoordinatorState::Draining);
        let start = Instant::now();

        let outcome = loop {
            if self.is_shut_down() {
                break FlushOutcome::ShutDown;
            }
            if self.size() == 0 {
                break FlushOutcome::Drained;
            }
            if !self.connectivity.is_connected() {
                break FlushOutcome::Offline;
            }
            if let Some(outcome) = self.drain_once(&mut report).await {
                break outcome;
            }
        };

        report.outcome = outcome;
        report.remaining = self.size();
        if report.records_uploaded > 0 {
            self.stats
                .record_flush(report.records_uploaded, start.elapsed());
            info!(
                "Flushed {} events in {} batches ({} remaining)",
                report.records_uploaded, report.batches_sent, report.remaining
            );
        }
        self.set_state(CoordinatorState::Idle);
        report
    }

    /// One "scan, upload, remove" step. Returns `Some` when the cycle should
    /// stop. Caller holds the flush lock.
    async fn drain_once(&self, report: &mut FlushReport) -> Option<FlushOutcome> {
        let sent_at = self.clock.now();
        let codec = self.codec.clone();
        let max_batch_size = self.config.max_batch_size;
        let scanned = self
            .store
            .run(move |store| scan_batch(store, &codec, max_batch_size, sent_at))
            .await;
        let scanned = match scanned {
            Ok(scanned) => scanned,
            Err(e) => {
                error!("Unable to read queued events: {}", e);
                return Some(FlushOutcome::Failed);
            }
        };

        let Some(body) = scanned.body else {
            if scanned.consumed > 0 {
                if !self.remove_consumed(scanned.consumed).await {
                    return Some(FlushOutcome::Failed);
                }
                warn!("Discarded {} undecodable records", scanned.consumed);
                report.records_discarded += scanned.consumed;
                self.stats.record_discarded(scanned.consumed);
                return None;
            }
            if scanned.oversized_head {
                // Can never be uploaded under the current limit
                error!(
                    "Oldest queued event exceeds the batch limit of {} bytes, discarding it",
                    self.config.max_batch_size
                );
                if !self.remove_consumed(1).await {
                    return Some(FlushOutcome::Failed);
                }
                report.records_discarded += 1;
                self.stats.record_discarded(1);
                return None;
            }
            return Some(FlushOutcome::Drained);
        };

        report.batches_sent += 1;
        match self.upload(&body).await {
            Ok(()) => {
                if !self.remove_consumed(scanned.consumed).await {
                    return Some(FlushOutcome::Failed);
                }
                debug!(
                    "Uploaded batch of {} events ({} bytes)",
                    scanned.payloads,
                    body.len()
                );
                report.records_uploaded += scanned.payloads;
            }
            Err(e) if e.is_client_rejection() => {
                error!(
                    "Collector rejected batch of {} events, discarding: {}",
                    scanned.payloads, e
                );
                if !self.remove_consumed(scanned.consumed).await {
                    return Some(FlushOutcome::Failed);
                }
                report.records_rejected += scanned.payloads;
                self.stats.record_rejection(scanned.payloads);
            }
            Err(e) => {
                error!("Unable to upload batch: {}", e);
                self.stats.record_failure();
                return Some(FlushOutcome::Failed);
            }
        }

        if scanned.skipped > 0 {
            report.records_discarded += scanned.skipped;
            self.stats.record_discarded(scanned.skipped);
        }
        None
    }

    async fn upload(&self, body: &[u8]) -> Result<(), TransportError> {
        let mut connection = self.transport.open(&self.config.api_host)?;
        connection.write_all(body)?;
        connection.close().await
    }

    async fn remove_consumed(&self, count: usize) -> bool {
        match self.store.run(move |store| store.remove_first(count)).await {
            Ok(()) => true,
            Err(e) => {
                error!("Unable to remove {} records from queue: {}", count, e);
                false
            }
        }
    }
}

/// Owns the record store and the tasks that fill and drain it.
///
/// Three tasks run per coordinator: a dispatcher that serializes enqueue and
/// flush requests, a single uploader, and the flush timer. Store I/O runs on
/// the blocking pool. Must be started inside a Tokio runtime.
///
/// The dispatcher backlog is bounded: while it is full (a slow upload holding
/// the flush lock during an eviction), new events are logged and dropped.
pub struct FlushCoordinator {
    core: Arc<QueueCore>,
    dispatch_tx: mpsc::Sender<DispatchMessage>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl FlushCoordinator {
    pub fn start(
        config: QueueConfig,
        store: Box<dyn RecordStore>,
        transport: Arc<dyn UploadTransport>,
        collaborators: Collaborators,
    ) -> Result<Self, CoordinatorError> {
        config.validate()?;

        let initial_delay = if store.size() >= config.flush_queue_size {
            Duration::ZERO
        } else {
            config.flush_interval
        };
        let flush_interval = config.flush_interval;
        info!(
            "Starting flush coordinator ({:?} store, {} queued, flush every {:?} or at {} events)",
            store.kind(),
            store.size(),
            flush_interval,
            config.flush_queue_size
        );

        let core = Arc::new(QueueCore {
            config,
            store: SharedStore::new(store),
            codec: collaborators.codec,
            transport,
            connectivity: collaborators.connectivity,
            clock: collaborators.clock,
            advertising_id: collaborators.advertising_id,
            stats: Stats::new(),
            flush_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(CoordinatorState::Idle),
            flush_pending: AtomicBool::new(false),
        });

        let cancel = CancellationToken::new();
        let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_CAPACITY);
        let (upload_tx, upload_rx) = mpsc::unbounded_channel();

        let tasks = vec![
            tokio::spawn(run_dispatcher(
                core.clone(),
                dispatch_rx,
                upload_tx,
                cancel.clone(),
            )),
            tokio::spawn(run_uploader(core.clone(), upload_rx, cancel.clone())),
            tokio::spawn(run_timer(
                dispatch_tx.clone(),
                cancel.clone(),
                initial_delay,
                flush_interval,
            )),
        ];

        Ok(Self {
            core,
            dispatch_tx,
            cancel,
            tasks: Mutex::new(tasks),
        })
    }

    /// Queues an event for persistence. Returns immediately; encoding and
    /// storage happen on the dispatcher task.
    pub fn enqueue(&self, event: EventRecord) -> Result<(), CoordinatorError> {
        self.dispatch(DispatchMessage::Enqueue(event))
    }

    /// Requests an asynchronous flush. A no-op when the queue is empty or
    /// the device is offline.
    pub fn flush(&self) -> Result<(), CoordinatorError> {
        self.dispatch(DispatchMessage::Flush)
    }

    pub fn connectivity_changed(&self, connected: bool) {
        if connected {
            debug!("Connectivity regained, requesting flush");
            let _ = self.flush();
        }
    }

    /// Runs one flush cycle on the caller's task and reports what happened.
    pub async fn flush_now(&self) -> Result<FlushReport, CoordinatorError> {
        if self.core.is_shut_down() {
            return Err(CoordinatorError::ShutDown);
        }
        Ok(self.core.drain_until_empty().await)
    }

    /// Waits until every request submitted before this call, including the
    /// flushes they triggered, has been processed.
    pub async fn sync(&self) -> Result<(), CoordinatorError> {
        if self.core.is_shut_down() {
            return Err(CoordinatorError::ShutDown);
        }
        let (done_tx, done_rx) = oneshot::channel();
        self.dispatch_tx
            .send(DispatchMessage::Barrier(done_tx))
            .await
            .map_err(|_| CoordinatorError::ShutDown)?;
        done_rx.await.map_err(|_| CoordinatorError::ShutDown)
    }

    pub fn size(&self) -> usize {
        self.core.size()
    }

    pub fn state(&self) -> CoordinatorState {
        self.core.state()
    }

    pub fn store_kind(&self) -> StoreKind {
        self.core.store.kind()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.core.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot(self.core.clock.now())
    }

    /// Stops the tasks, lets an in-flight upload finish and closes the
    /// store. Queued records stay on disk. Idempotent.
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        {
            let mut state = self.core.state.lock();
            if *state == CoordinatorState::ShutDown {
                return Ok(());
            }
            *state = CoordinatorState::ShutDown;
        }
        info!("Shutting down flush coordinator");
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Coordinator task ended abnormally: {}", e);
            }
        }

        let _flush_guard = self.core.flush_lock.lock().await;
        self.core.store.run(|store| store.close()).await?;
        info!(
            "Flush coordinator stopped with {} events queued",
            self.core.size()
        );
        Ok(())
    }

    fn dispatch(&self, message: DispatchMessage) -> Result<(), CoordinatorError> {
        if self.core.is_shut_down() {
            return Err(CoordinatorError::ShutDown);
        }
        match self.dispatch_tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(DispatchMessage::Enqueue(event))) => {
                warn!(
                    "Dispatcher backlog full ({} pending), dropping event {}",
                    DISPATCH_CAPACITY,
                    event.message_id().unwrap_or("<no id>")
                );
                self.core.stats.record_dropped();
                Ok(())
            }
            // Dropped flush requests are covered by the next trigger
            Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(CoordinatorError::ShutDown),
        }
    }
}

impl Drop for FlushCoordinator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_dispatcher(
    core: Arc<QueueCore>,
    mut rx: mpsc::Receiver<DispatchMessage>,
    upload_tx: mpsc::UnboundedSender<UploadRequest>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        match message {
            DispatchMessage::Enqueue(event) => {
                if core.perform_enqueue(event).await {
                    core.submit_flush(&upload_tx);
                }
            }
            DispatchMessage::Flush => core.submit_flush(&upload_tx),
            DispatchMessage::Barrier(done) => {
                // A closed uploader drops `done`, which the waiter sees as shutdown
                let _ = upload_tx.send(UploadRequest::Barrier(done));
            }
        }
    }
    debug!("Dispatcher stopped");
}

async fn run_uploader(
    core: Arc<QueueCore>,
    mut rx: mpsc::UnboundedReceiver<UploadRequest>,
    cancel: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        match request {
            UploadRequest::Flush => {
                core.flush_pending.store(false, Ordering::Release);
                let report = core.drain_until_empty().await;
                debug!("Flush finished: {:?}", report);
            }
            UploadRequest::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Uploader stopped");
}

async fn run_timer(
    dispatch_tx: mpsc::Sender<DispatchMessage>,
    cancel: CancellationToken,
    initial_delay: Duration,
    period: Duration,
) {
    let mut ticker = interval_at(tokio::time::Instant::now() + initial_delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                // Skipped while the backlog is full; the next tick retries
                if let Err(TrySendError::Closed(_)) = dispatch_tx.try_send(DispatchMessage::Flush) {
                    break;
                }
            }
        }
    }
    debug!("Flush timer stopped");
}
