//! Background task that deletes expired sessions.
//!
//! Timers report expiry over an unbounded channel; the reaper drains it one
//! notification at a time and removes each session through the room, taking
//! the table lock like any other caller.

use std::sync::Weak;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::room::RoomInner;
use crate::table::Reaped;
use crate::timer::Expired;

/// Spawn the reaper for a room.
///
/// The task holds only a weak reference so it never keeps the room alive.
/// It exits when `shutdown` is cancelled, the room is dropped, or every
/// expiry sender is gone.
pub(crate) fn spawn_reaper(
    room: Weak<RoomInner>,
    mut expired: mpsc::UnboundedReceiver<Expired>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let notice = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                notice = expired.recv() => match notice {
                    Some(notice) => notice,
                    None => break,
                },
            };

            let Some(room) = room.upgrade() else {
                break;
            };

            match room.reap(&notice).await {
                Ok(Reaped::Removed) => {
                    debug!(
                        session_id = %notice.id,
                        generation = notice.generation,
                        "Expired session removed"
                    );
                }
                Ok(Reaped::Stale) => {
                    debug!(
                        session_id = %notice.id,
                        generation = notice.generation,
                        "Ignoring expiry for a session that was re-created"
                    );
                }
                // Deleted explicitly before the reaper got the lock
                Err(Error::NotFound(_)) => {
                    trace!(session_id = %notice.id, "Expired session already removed");
                }
                Err(Error::Closed) => {
                    debug!(session_id = %notice.id, "Room closed, dropping expiry");
                    break;
                }
                Err(e) => {
                    warn!(
                        session_id = %notice.id,
                        error = %e,
                        "Unexpected error while removing expired session"
                    );
                }
            }
        }

        debug!("Reaper stopped");
    })
}
