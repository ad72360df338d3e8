#![allow(clippy::disallowed_types, reason = "Pending-map and handle state lock for short synchronous sections, never across awaits")]

//! Caller-side worker handle.
//!
//! Owns the isolated engine thread and correlates request/response pairs
//! across the boundary. Many calls may be outstanding at once; each carries
//! its own deadline, and a timed-out call simply stops waiting locally while
//! the engine may still finish the work.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use bookseal_engine::SessionExpiredNotice;
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::WorkerError,
    protocol::{
        AppointmentData, AuthData, LogoutData, NotificationEvent, OpOutput, Operation,
        StatusReport, WireError, WorkerMessage, WorkerRequest,
    },
    runtime,
};

pub use bookseal_engine::SessionConfig;

/// RPC deadline applied to every call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound of the request and response channels.
const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Bound of the notification channel; notices beyond it are dropped rather
/// than allowed to stall response dispatch.
const NOTIFICATION_CAPACITY: usize = 8;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Session engine configuration (key domain and lifetime).
    pub session: SessionConfig,
    /// Per-call deadline.
    pub call_timeout: Duration,
    /// Bound of the request/response channels.
    pub channel_capacity: usize,
}

impl WorkerConfig {
    /// Configuration for the staff dashboard worker.
    pub fn staff() -> Self {
        Self {
            session: SessionConfig::staff(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Configuration for the public booking-flow worker.
    pub fn client() -> Self {
        Self { session: SessionConfig::client(), ..Self::staff() }
    }
}

/// Calls waiting for a correlated response.
type PendingMap = Mutex<HashMap<u64, oneshot::Sender<Result<OpOutput, WireError>>>>;

/// Handle to the isolated crypto worker.
///
/// One handle per application session; construct it explicitly and pass it
/// to consumers. All methods take `&self`, so calls may run concurrently
/// from independent tasks.
pub struct Worker {
    requests: Mutex<Option<mpsc::Sender<WorkerRequest>>>,
    pending: Arc<PendingMap>,
    next_id: AtomicU64,
    call_timeout: Duration,
    engine_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Worker {
    /// Start the engine thread and the caller-side dispatcher.
    ///
    /// Must be called from within a tokio runtime. Returns the handle plus
    /// the stream of unsolicited session-expired notices.
    ///
    /// # Errors
    ///
    /// - `WorkerError::Unavailable` if the engine thread fails to start
    pub fn spawn(
        config: WorkerConfig,
    ) -> Result<(Self, mpsc::Receiver<SessionExpiredNotice>), WorkerError> {
        let (request_tx, request_rx) = mpsc::channel(config.channel_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.channel_capacity);

        let handle = runtime::spawn_engine_thread(config.session, request_rx, outbound_tx)
            .map_err(|e| WorkerError::Unavailable {
                reason: format!("failed to start worker thread: {e}"),
            })?;

        let pending: Arc<PendingMap> = Arc::new(Mutex::new(HashMap::new()));
        let (notice_tx, notice_rx) = mpsc::channel(NOTIFICATION_CAPACITY);
        tokio::spawn(dispatch(outbound_rx, Arc::clone(&pending), notice_tx));

        let worker = Self {
            requests: Mutex::new(Some(request_tx)),
            pending,
            next_id: AtomicU64::new(1),
            call_timeout: config.call_timeout,
            engine_thread: Mutex::new(Some(handle)),
        };
        Ok((worker, notice_rx))
    }

    /// Dispatch one operation and await its correlated response.
    ///
    /// Resolves on the first of: a matching response, or the configured
    /// deadline. A response arriving after the deadline is discarded by
    /// correlation-id absence, never delivered.
    ///
    /// # Errors
    ///
    /// - `WorkerError::Timeout` when the deadline elapses first
    /// - `WorkerError::Unavailable` when the worker is gone or shut down
    /// - `WorkerError::Engine` for operation failures
    pub async fn call(&self, op: Operation) -> Result<OpOutput, WorkerError> {
        let sender = match lock(&self.requests).as_ref() {
            Some(sender) => sender.clone(),
            None => {
                return Err(WorkerError::Unavailable { reason: "worker is shut down".to_string() });
            },
        };

        let correlation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (response_tx, response_rx) = oneshot::channel();
        lock(&self.pending).insert(correlation_id, response_tx);

        if sender.send(WorkerRequest { correlation_id, op }).await.is_err() {
            lock(&self.pending).remove(&correlation_id);
            return Err(WorkerError::Unavailable {
                reason: "worker stopped accepting requests".to_string(),
            });
        }

        match tokio::time::timeout(self.call_timeout, response_rx).await {
            Ok(Ok(result)) => result.map_err(WorkerError::from),
            Ok(Err(_)) => Err(WorkerError::Unavailable {
                reason: "worker stopped before responding".to_string(),
            }),
            Err(_) => {
                // Abandon locally; the engine may still complete the work.
                lock(&self.pending).remove(&correlation_id);
                Err(WorkerError::Timeout { elapsed: self.call_timeout })
            },
        }
    }

    /// Derive the session key pair from an authentication secret.
    pub async fn authenticate(
        &self,
        identity: &str,
        auth_secret: &[u8],
    ) -> Result<AuthData, WorkerError> {
        let op = Operation::Authenticate {
            identity: identity.to_string(),
            auth_secret: auth_secret.to_vec(),
        };
        match self.call(op).await? {
            OpOutput::Authenticated(data) => Ok(data),
            other => Err(unexpected_output("authenticate", &other)),
        }
    }

    /// Decapsulate a key share and decrypt one appointment envelope.
    pub async fn decrypt_appointment(
        &self,
        encrypted_data: &str,
        key_share: &str,
    ) -> Result<AppointmentData, WorkerError> {
        let op = Operation::DecryptAppointment {
            encrypted_data: encrypted_data.to_string(),
            key_share: key_share.to_string(),
        };
        match self.call(op).await? {
            OpOutput::Appointment(data) => Ok(data),
            other => Err(unexpected_output("decrypt-appointment", &other)),
        }
    }

    /// Report session state.
    pub async fn status(&self) -> Result<StatusReport, WorkerError> {
        match self.call(Operation::GetStatus).await? {
            OpOutput::Status(report) => Ok(report),
            other => Err(unexpected_output("get-status", &other)),
        }
    }

    /// Clear the session. Idempotent.
    pub async fn logout(&self) -> Result<LogoutData, WorkerError> {
        match self.call(Operation::Logout).await? {
            OpOutput::LoggedOut(data) => Ok(data),
            other => Err(unexpected_output("logout", &other)),
        }
    }

    /// Tear down the worker. Safe to call repeatedly.
    ///
    /// Closes the request channel so the engine loop exits, fails every
    /// pending call with `Unavailable`, and joins the engine thread.
    /// Dropping the handle without calling this also stops the engine, just
    /// without the join.
    pub fn shutdown(&self) {
        drop(lock(&self.requests).take());

        let waiters: Vec<_> = lock(&self.pending).drain().map(|(_, tx)| tx).collect();
        drop(waiters);

        if let Some(handle) = lock(&self.engine_thread).take()
            && handle.join().is_err()
        {
            tracing::error!("worker thread panicked during shutdown");
        }
    }
}

/// Route inbound messages: correlated responses to their waiters,
/// notifications to the notice channel.
async fn dispatch(
    mut inbound: mpsc::Receiver<WorkerMessage>,
    pending: Arc<PendingMap>,
    notices: mpsc::Sender<SessionExpiredNotice>,
) {
    while let Some(message) = inbound.recv().await {
        match message {
            WorkerMessage::Response { correlation_id, result } => {
                // An id that already timed out locally has no entry; the
                // late response is dropped here without error.
                let waiter = lock(&pending).remove(&correlation_id);
                if let Some(waiter) = waiter {
                    let _ = waiter.send(result);
                }
            },
            WorkerMessage::Notification { event: NotificationEvent::SessionExpired, identity } => {
                // Non-blocking: a slow or absent subscriber never stalls
                // response dispatch.
                if notices.try_send(SessionExpiredNotice { identity }).is_err() {
                    tracing::debug!("dropping session-expired notice: subscriber unavailable");
                }
            },
        }
    }

    // Engine gone: fail every call still waiting.
    let waiters: Vec<_> = lock(&pending).drain().map(|(_, tx)| tx).collect();
    drop(waiters);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unexpected_output(operation: &str, output: &OpOutput) -> WorkerError {
    WorkerError::Protocol {
        reason: format!("unexpected output for {operation}: {output:?}"),
    }
}
