//! Periodic liveness for a held session.

use super::{Session, SessionError, SessionRegistry};
use crate::{clock::Clock, store::RecordStore};
use std::{sync::Arc, time::Duration};
use tokio::{
    task::{JoinError, JoinHandle},
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};
use ulid::Ulid;

/// Run a registry call on the blocking pool.
///
/// Store updates wait on a file lock another process may hold, then fsync
/// and rename; none of that may stall the runtime's worker threads.
///
/// # Errors
/// Returns the join error if `call` panicked or the runtime is shutting down.
pub async fn run_blocking<S, C, R, F>(
    registry: &Arc<SessionRegistry<S, C>>,
    call: F,
) -> Result<R, JoinError>
where
    S: RecordStore<Session> + 'static,
    C: Clock + 'static,
    R: Send + 'static,
    F: FnOnce(&SessionRegistry<S, C>) -> R + Send + 'static,
{
    let registry = Arc::clone(registry);
    tokio::task::spawn_blocking(move || call(&registry)).await
}

/// Beat every `period` until the session stops being active.
///
/// The first beat happens one period after spawning. A failed write is
/// logged and retried on the next tick; the task ends with the error that
/// stopped it (`NotFound` or `Ended`). Abort the handle to stop earlier.
pub fn spawn<S, C>(
    registry: Arc<SessionRegistry<S, C>>,
    session_id: Ulid,
    period: Duration,
) -> JoinHandle<SessionError>
where
    S: RecordStore<Session> + 'static,
    C: Clock + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match run_blocking(&registry, move |r| r.heartbeat(session_id)).await {
                Ok(Ok(session)) => {
                    debug!(%session_id, at = %session.last_heartbeat_at, "heartbeat");
                }
                Ok(Err(SessionError::StorageUnavailable(err))) => {
                    warn!(%session_id, error = %err, "heartbeat not recorded");
                }
                Ok(Err(err)) => {
                    info!(%session_id, reason = %err, "heartbeat stopped");
                    return err;
                }
                Err(err) => error!(%session_id, error = %err, "heartbeat write did not complete"),
            }
        }
    })
}
