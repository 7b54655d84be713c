//! Test and helper mocks for evap_core.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use evap_traits::Link;

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, String>,
    failures: HashMap<String, VecDeque<String>>,
    sent: Vec<String>,
}

/// A `Link` that answers from a fixed table and records every command.
///
/// Unscripted commands get an empty reply, as a silent controller would.
/// Clones share the same script and log, so a test can keep one clone and
/// hand the other to a client.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLink {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reply to `command` (exact text, without line terminator) with `reply`.
    pub fn reply(self, command: &str, reply: &str) -> Self {
        self.script()
            .replies
            .insert(command.to_owned(), reply.to_owned());
        self
    }

    /// Make the next exchange of `command` fail with `message`.
    pub fn fail(&self, command: &str, message: &str) {
        self.script()
            .failures
            .entry(command.to_owned())
            .or_default()
            .push_back(message.to_owned());
    }

    /// Every command received so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.script().sent.clone()
    }

    /// Commands that started with `SET`.
    pub fn sets(&self) -> Vec<String> {
        self.script()
            .sent
            .iter()
            .filter(|c| c.starts_with("SET "))
            .cloned()
            .collect()
    }
}

impl Link for ScriptedLink {
    fn exchange(
        &mut self,
        command: &str,
        _settle: Duration,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.script();
        s.sent.push(command.to_owned());
        if let Some(msg) = s.failures.get_mut(command).and_then(VecDeque::pop_front) {
            return Err(Box::new(std::io::Error::other(msg)));
        }
        Ok(s.replies.get(command).cloned().unwrap_or_default())
    }
}
