//! The session room: keyed scratch storage with a sliding TTL per session.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::RoomConfig;
use crate::error::{Error, Result};
use crate::reaper::spawn_reaper;
use crate::table::{Reaped, SessionTable};
use crate::timer::{Expired, spawn_timer};

/// State shared between room handles and the reaper.
pub(crate) struct RoomInner {
    /// Sessions and their timers, behind the one lock every operation takes.
    table: Mutex<SessionTable>,

    config: RoomConfig,

    /// Cloned into every timer.
    expired_tx: mpsc::UnboundedSender<Expired>,

    /// Parent of every timer's token; cancelled on close or drop.
    shutdown: CancellationToken,

    reaper: SyncMutex<Option<JoinHandle<()>>>,
}

impl RoomInner {
    /// Take the table lock, failing if the room has been closed.
    async fn lock(&self) -> Result<MutexGuard<'_, SessionTable>> {
        let table = self.table.lock().await;
        if self.shutdown.is_cancelled() {
            return Err(Error::Closed);
        }
        Ok(table)
    }

    /// Remove a session whose timer fired.
    pub(crate) async fn reap(&self, expired: &Expired) -> Result<Reaped> {
        let mut table = self.lock().await?;
        table.remove_expired(&expired.id, expired.generation)
    }
}

impl Drop for RoomInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// In-memory key-value sessions that delete themselves after a period of
/// inactivity.
///
/// Each session has its own timer task. Any successful read or write on a
/// session pushes its deadline back by a full lifetime; once a session sits
/// idle for longer than that, the room's reaper removes it.
///
/// All operations serialize on a single lock, so they are linearizable
/// across every session in the room. Recording activity never waits on a
/// timer while that lock is held.
///
/// `Room` is a cheap handle; clones share the same sessions.
#[derive(Clone)]
pub struct Room {
    inner: Arc<RoomInner>,
}

impl Room {
    /// Create an empty room whose sessions live for `lifetime` without
    /// activity, and start its reaper.
    ///
    /// The lifetime is used exactly as given and is not validated. A zero
    /// lifetime makes every session expire as soon as its timer first runs;
    /// use [`with_config`](Self::with_config) to reject it instead.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(lifetime: Duration) -> Self {
        Self::build(RoomConfig::new().with_lifetime(lifetime))
    }

    /// Create an empty room from a validated configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn with_config(config: RoomConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RoomConfig) -> Self {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let inner = Arc::new(RoomInner {
            table: Mutex::new(SessionTable::new()),
            config,
            expired_tx,
            shutdown: shutdown.clone(),
            reaper: SyncMutex::new(None),
        });

        let handle = spawn_reaper(Arc::downgrade(&inner), expired_rx, shutdown);
        *inner.reaper.lock() = Some(handle);

        debug!(
            lifetime_ms = inner.config.lifetime().as_millis() as u64,
            "Session room started"
        );

        Self { inner }
    }

    /// Inactivity period after which a session is deleted.
    pub fn lifetime(&self) -> Duration {
        self.inner.config.lifetime()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.table.lock().await.len()
    }

    /// Check if the room holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Check whether a session exists. Does not count as activity.
    pub async fn contains(&self, id: &str) -> bool {
        self.inner.table.lock().await.contains(id)
    }

    /// Create an empty session and start its timer.
    pub async fn create(&self, id: &str) -> Result<()> {
        let mut table = self.inner.lock().await?;

        if table.contains(id) {
            return Err(Error::AlreadyExists(id.to_string()));
        }

        let generation = table.next_generation();
        let timer = spawn_timer(
            id.to_string(),
            generation,
            self.inner.config.lifetime(),
            self.inner.config.activity_buffer,
            self.inner.shutdown.child_token(),
            self.inner.expired_tx.clone(),
        );
        table.insert(id, timer)?;

        debug!(
            session_id = %id,
            generation,
            sessions = table.len(),
            "Session created"
        );
        Ok(())
    }

    /// Read one value from a session.
    pub async fn get(&self, id: &str, key: &str) -> Result<String> {
        let table = self.inner.lock().await?;
        let value = table.get(id, key)?;
        trace!(session_id = %id, key = %key, "Session value read");
        Ok(value)
    }

    /// Read several values from a session, in the order of `keys`.
    ///
    /// If any key is missing the whole call fails with
    /// [`Error::KeyNotFound`] and no values are returned.
    pub async fn get_many<K: AsRef<str>>(&self, id: &str, keys: &[K]) -> Result<Vec<String>> {
        let mut table = self.inner.lock().await?;
        let values = table.get_many(id, keys)?;
        trace!(session_id = %id, count = values.len(), "Session values read");
        Ok(values)
    }

    /// Insert or overwrite a value in a session.
    pub async fn set(&self, id: &str, key: &str, value: &str) -> Result<()> {
        let mut table = self.inner.lock().await?;
        table.set(id, key, value)?;
        trace!(session_id = %id, key = %key, "Session value written");
        Ok(())
    }

    /// Delete a session and stop its timer.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut table = self.inner.lock().await?;
        table.remove(id)?;
        debug!(session_id = %id, sessions = table.len(), "Session deleted");
        Ok(())
    }

    /// Stop the reaper and every timer, and drop all sessions.
    ///
    /// Every operation after this returns [`Error::Closed`]. Calling it more
    /// than once is harmless.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();

        let dropped = self.inner.table.lock().await.clear();

        let reaper = self.inner.reaper.lock().take();
        if let Some(handle) = reaper {
            if let Err(e) = handle.await {
                warn!(error = %e, "Reaper task did not shut down cleanly");
            }
            debug!(sessions = dropped, "Session room closed");
        }
    }
}
