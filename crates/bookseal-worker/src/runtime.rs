//! Worker-side engine loop.
//!
//! Runs on a dedicated OS thread that owns the [`Session`] outright. Each
//! request is handled to completion before the next is dequeued, which
//! serializes all access to the session without locks. The session deadline
//! is the only autonomous timer; it is re-armed implicitly by recomputing
//! the remaining lifetime after every message.

use std::{
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bookseal_engine::{Session, SessionConfig};
use tokio::{sync::mpsc, time::Instant};

use crate::protocol::{
    AppointmentData, AuthData, LogoutData, NotificationEvent, OpOutput, StatusReport, WireError,
    WorkerMessage, WorkerRequest,
};

/// Start the engine thread.
///
/// The thread runs a single-threaded runtime for the engine loop and exits
/// when the request channel closes.
pub(crate) fn spawn_engine_thread(
    config: SessionConfig,
    requests: mpsc::Receiver<WorkerRequest>,
    outbound: mpsc::Sender<WorkerMessage>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("bookseal-worker".to_string()).spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                // Dropping `outbound` fails all pending calls upstream.
                tracing::error!(error = %e, "failed to build worker runtime");
                return;
            },
        };
        runtime.block_on(engine_loop(Session::new(config), requests, outbound));
    })
}

/// Process requests until the channel closes.
///
/// The loop checks the deadline before every request so the session-expired
/// notification is emitted exactly once and always ahead of the response
/// that would observe the lapse.
async fn engine_loop(
    mut session: Session<Instant>,
    mut requests: mpsc::Receiver<WorkerRequest>,
    outbound: mpsc::Sender<WorkerMessage>,
) {
    loop {
        if !sweep_deadline(&mut session, &outbound).await {
            break;
        }

        let request = match session.time_remaining(Instant::now()) {
            Some(remaining) => tokio::select! {
                request = requests.recv() => request,
                () = tokio::time::sleep(remaining) => continue,
            },
            None => requests.recv().await,
        };
        let Some(request) = request else {
            break;
        };

        // A request can win the select race against the deadline sleep; sweep
        // again so the expiry notification still precedes the response that
        // observes the lapse.
        if !sweep_deadline(&mut session, &outbound).await {
            break;
        }

        let response = handle_request(&mut session, request);
        if outbound.send(response).await.is_err() {
            break;
        }
    }

    tracing::debug!("engine loop stopped");
}

/// Emit the session-expired notification if the deadline has passed.
///
/// Returns false when the outbound channel is closed.
async fn sweep_deadline(
    session: &mut Session<Instant>,
    outbound: &mpsc::Sender<WorkerMessage>,
) -> bool {
    let Some(notice) = session.expire_if_due(Instant::now()) else {
        return true;
    };
    let notification = WorkerMessage::Notification {
        event: NotificationEvent::SessionExpired,
        identity: notice.identity,
    };
    outbound.send(notification).await.is_ok()
}

/// Handle one request; failures become error responses, never loop exits.
fn handle_request(session: &mut Session<Instant>, request: WorkerRequest) -> WorkerMessage {
    use crate::protocol::Operation;

    let now = Instant::now();
    let result = match request.op {
        Operation::Authenticate { identity, auth_secret } => session
            .authenticate(&identity, &auth_secret, now)
            .map(|grant| {
                OpOutput::Authenticated(AuthData {
                    authenticated: true,
                    identity: grant.identity,
                    expires_at: unix_ms_now() + grant.lifetime.as_millis() as u64,
                    public_key: grant.public_key,
                })
            }),

        Operation::DecryptAppointment { encrypted_data, key_share } => session
            .decrypt_appointment(&encrypted_data, &key_share, now)
            .map(|record| {
                OpOutput::Appointment(AppointmentData { record, decrypted_at: unix_ms_now() })
            }),

        Operation::GetStatus => Ok(OpOutput::Status(status_report(session, now))),

        Operation::Logout => {
            session.logout();
            Ok(OpOutput::LoggedOut(LogoutData { logged_out: true }))
        },
    };

    if let Err(err) = &result {
        tracing::warn!(correlation_id = request.correlation_id, %err, "operation failed");
    }

    WorkerMessage::Response {
        correlation_id: request.correlation_id,
        result: result.map_err(|err| WireError::from(&err)),
    }
}

/// Build the wire status snapshot, translating the engine's relative
/// remaining time into the absolute wall-clock deadline the wire carries.
fn status_report(session: &Session<Instant>, now: Instant) -> StatusReport {
    let status = session.status(now);
    let remaining_ms = status.time_remaining.as_millis() as u64;
    StatusReport {
        authenticated: status.authenticated,
        identity: status.identity,
        expires_at: if status.authenticated { unix_ms_now() + remaining_ms } else { 0 },
        time_remaining: remaining_ms,
    }
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
