//! Session storage and the per-session timer handles that guard it.
//!
//! The table keeps the session map and the timer map in lock-step: every
//! method that adds or removes a session does so in both maps. The table
//! itself is not synchronized; the room wraps it in a single mutex.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::timer::TimerHandle;

/// Outcome of removing a session on behalf of an expired timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reaped {
    /// The session was removed.
    Removed,
    /// The identifier now belongs to a newer session; nothing was removed.
    Stale,
}

#[derive(Debug, Default)]
pub(crate) struct SessionTable {
    sessions: HashMap<String, HashMap<String, String>>,
    timers: HashMap<String, TimerHandle>,
    generation: u64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the generation for the next session.
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id) && self.timers.contains_key(id)
    }

    /// Add an empty session watched by `timer`.
    ///
    /// On `AlreadyExists` the timer is handed back to the caller's drop,
    /// which stops it.
    pub fn insert(&mut self, id: &str, timer: TimerHandle) -> Result<()> {
        if self.sessions.contains_key(id) || self.timers.contains_key(id) {
            return Err(Error::AlreadyExists(id.to_string()));
        }
        self.sessions.insert(id.to_string(), HashMap::new());
        self.timers.insert(id.to_string(), timer);
        Ok(())
    }

    /// Look up a session and record activity on it.
    fn touch(&mut self, id: &str) -> Result<&mut HashMap<String, String>> {
        let (Some(data), Some(timer)) = (self.sessions.get_mut(id), self.timers.get(id)) else {
            return Err(Error::NotFound(id.to_string()));
        };
        timer.ping();
        Ok(data)
    }

    pub fn get(&self, id: &str, key: &str) -> Result<String> {
        let (Some(data), Some(timer)) = (self.sessions.get(id), self.timers.get(id)) else {
            return Err(Error::NotFound(id.to_string()));
        };
        let value = data.get(key).cloned().ok_or_else(|| Error::KeyNotFound {
            id: id.to_string(),
            key: key.to_string(),
        })?;
        timer.ping();
        Ok(value)
    }

    /// Fetch several values at once. Fails on the first missing key without
    /// returning any values.
    pub fn get_many<K: AsRef<str>>(&mut self, id: &str, keys: &[K]) -> Result<Vec<String>> {
        let data = self.touch(id)?;
        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                data.get(key).cloned().ok_or_else(|| Error::KeyNotFound {
                    id: id.to_string(),
                    key: key.to_string(),
                })
            })
            .collect()
    }

    pub fn set(&mut self, id: &str, key: &str, value: &str) -> Result<()> {
        let data = self.touch(id)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Remove a session and stop its timer.
    pub fn remove(&mut self, id: &str) -> Result<HashMap<String, String>> {
        if !self.contains(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        if let Some(timer) = self.timers.remove(id) {
            timer.cancel();
        }
        self.sessions
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Remove a session only if it is still the generation the expired
    /// timer was watching.
    pub fn remove_expired(&mut self, id: &str, generation: u64) -> Result<Reaped> {
        match self.timers.get(id) {
            None => Err(Error::NotFound(id.to_string())),
            Some(timer) if timer.generation() != generation => Ok(Reaped::Stale),
            Some(_) => self.remove(id).map(|_| Reaped::Removed),
        }
    }

    /// Remove every session and stop every timer. Returns how many sessions
    /// were dropped.
    pub fn clear(&mut self) -> usize {
        for timer in self.timers.values() {
            timer.cancel();
        }
        self.timers.clear();
        let count = self.sessions.len();
        self.sessions.clear();
        count
    }
}
