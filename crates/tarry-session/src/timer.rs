//! Per-session inactivity timers.
//!
//! Every live session owns exactly one timer task. The task waits on three
//! inputs: activity signals (which push the deadline back by a full
//! lifetime), its cancellation token, and the deadline itself. When the
//! deadline passes without activity the task reports an [`Expired`] to the
//! room's reaper and exits. A timer never touches the session table.

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Notification that a session went idle for a full lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Expired {
    /// Identifier of the expired session.
    pub id: String,

    /// Generation of the session the timer was started for.
    pub generation: u64,
}

/// Owner-side handle to a running timer task.
///
/// Dropping the handle closes the activity channel, which also stops the
/// task.
#[derive(Debug)]
pub(crate) struct TimerHandle {
    activity: mpsc::Sender<()>,
    cancel: CancellationToken,
    generation: u64,
}

impl TimerHandle {
    /// Signal activity, pushing the deadline back.
    ///
    /// Never waits. Returns `false` when the signal was dropped, either
    /// because a signal is already pending or because the timer has fired.
    pub fn ping(&self) -> bool {
        match self.activity.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => false,
            Err(TrySendError::Closed(())) => {
                trace!(
                    generation = self.generation,
                    "Timer already terminated, dropping activity signal"
                );
                false
            }
        }
    }

    /// Stop the timer without reporting expiry.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Generation of the session this timer watches.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the timer task has exited.
    #[cfg(test)]
    pub fn is_terminated(&self) -> bool {
        self.activity.is_closed()
    }
}

/// Start a timer task for one session.
///
/// The deadline is armed immediately at `now + lifetime`. `cancel` should be
/// a child of the room's shutdown token so closing the room stops every
/// timer.
pub(crate) fn spawn_timer(
    id: String,
    generation: u64,
    lifetime: Duration,
    buffer: usize,
    cancel: CancellationToken,
    expired: mpsc::UnboundedSender<Expired>,
) -> TimerHandle {
    let (activity_tx, activity_rx) = mpsc::channel(buffer.max(1));
    let deadline = Instant::now() + lifetime;

    tokio::spawn(run_timer(
        id,
        generation,
        lifetime,
        deadline,
        activity_rx,
        cancel.clone(),
        expired,
    ));

    TimerHandle {
        activity: activity_tx,
        cancel,
        generation,
    }
}

async fn run_timer(
    id: String,
    generation: u64,
    lifetime: Duration,
    deadline: Instant,
    mut activity: mpsc::Receiver<()>,
    cancel: CancellationToken,
    expired: mpsc::UnboundedSender<Expired>,
) {
    let sleep = sleep_until(deadline);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                trace!(session_id = %id, generation, "Timer cancelled");
                return;
            }

            signal = activity.recv() => match signal {
                Some(()) => {
                    sleep.as_mut().reset(Instant::now() + lifetime);
                }
                None => {
                    trace!(session_id = %id, generation, "Activity channel closed, stopping timer");
                    return;
                }
            },

            _ = &mut sleep => {
                debug!(session_id = %id, generation, "Session lifetime elapsed");
                if expired.send(Expired { id, generation }).is_err() {
                    trace!(generation, "Reaper gone, expiry notification dropped");
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::sleep;

    fn start(
        lifetime: Duration,
    ) -> (
        TimerHandle,
        mpsc::UnboundedReceiver<Expired>,
        CancellationToken,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let handle = spawn_timer(
            "session-1".to_string(),
            7,
            lifetime,
            1,
            token.child_token(),
            tx,
        );
        (handle, rx, token)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_lifetime() {
        let (handle, mut rx, _token) = start(Duration::from_millis(50));

        sleep(Duration::from_millis(40)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        sleep(Duration::from_millis(20)).await;
        assert_eq!(
            rx.try_recv(),
            Ok(Expired {
                id: "session-1".to_string(),
                generation: 7,
            })
        );
        assert!(handle.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_resets_deadline() {
        let (handle, mut rx, _token) = start(Duration::from_millis(50));

        for _ in 0..5 {
            sleep(Duration::from_millis(30)).await;
            assert!(handle.ping());
        }

        // 150ms since start, never idle for more than 30ms
        sleep(Duration::from_millis(30)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        sleep(Duration::from_millis(30)).await;
        assert_eq!(rx.try_recv().unwrap().id, "session-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_expiry() {
        let (handle, mut rx, _token) = start(Duration::from_millis(50));

        handle.cancel();
        sleep(Duration::from_millis(100)).await;

        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
        assert!(handle.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_stops_timer() {
        let (handle, mut rx, token) = start(Duration::from_millis(50));

        token.cancel();
        sleep(Duration::from_millis(100)).await;

        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
        assert!(handle.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_timer() {
        let (handle, mut rx, _token) = start(Duration::from_millis(50));

        drop(handle);
        sleep(Duration::from_millis(100)).await;

        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_after_fire_does_not_block() {
        let (handle, mut rx, _token) = start(Duration::from_millis(10));

        sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_ok());

        // Receiver is gone; every ping is dropped immediately
        for _ in 0..10 {
            assert!(!handle.ping());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_with_full_buffer_is_dropped() {
        let (handle, _rx, _token) = start(Duration::from_secs(60));

        // The timer task has not been polled yet, so the first signal
        // fills the single slot and the second is dropped.
        assert!(handle.ping());
        assert!(!handle.ping());
        assert_eq!(handle.generation(), 7);
    }
}
