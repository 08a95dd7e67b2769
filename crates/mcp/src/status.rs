//! Connection status snapshots.
//!
//! The registry never mutates an entry in place. Every state change replaces
//! the whole [`ConnectionStatus`] value, so a snapshot handed to a caller is
//! internally consistent and never observes a half-applied transition.

use std::collections::HashMap;

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::error::{ErrorKind, McpError};

/// Observable state of a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Cheap, cloneable summary of the error that put a connection into the
/// error state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&McpError> for LastError {
    fn from(error: &McpError) -> Self {
        Self {
            kind: error.kind(),
            message: error.message().to_string(),
        }
    }
}

/// Point-in-time status of one named connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub name: String,
    pub state: ConnectionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    pub last_transition: DateTime<Utc>,
}

impl ConnectionStatus {
    /// Fresh entry for a connection that has never been started.
    #[must_use]
    pub fn disconnected(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ConnectionState::Disconnected,
            last_error: None,
            last_transition: Utc::now(),
        }
    }

    /// Entry for a connection whose handle could not even be built.
    #[must_use]
    pub fn errored(name: impl Into<String>, error: LastError) -> Self {
        Self {
            name: name.into(),
            state: ConnectionState::Error,
            last_error: Some(error),
            last_transition: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// One-line rendition for status reports.
    #[must_use]
    pub fn summary_line(&self) -> String {
        match &self.last_error {
            Some(err) => format!(
                "{}: {} ({}: {})",
                self.name,
                self.state,
                err.kind.display_name(),
                err.message
            ),
            None => format!("{}: {}", self.name, self.state),
        }
    }
}

/// All known connection statuses, keyed by connection name.
#[derive(Debug, Clone, Default)]
pub struct StatusRegistry {
    entries: HashMap<String, ConnectionStatus>,
}

impl StatusRegistry {
    pub fn insert(&mut self, status: ConnectionStatus) {
        self.entries.insert(status.name.clone(), status);
    }

    /// Replace the entry for `name` with a new snapshot carrying the given
    /// state. Returns false without touching the registry when the name is
    /// unknown, so a stale transition cannot resurrect a removed connection.
    pub fn transition(
        &mut self,
        name: &str,
        state: ConnectionState,
        last_error: Option<LastError>,
    ) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                *entry = ConnectionStatus {
                    name: name.to_string(),
                    state,
                    last_error,
                    last_transition: Utc::now(),
                };
                true
            },
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConnectionStatus> {
        self.entries.get(name)
    }

    /// Clone of every entry, detached from future transitions.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, ConnectionStatus> {
        self.entries.clone()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    #[must_use]
    pub fn connected_names(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|s| s.is_connected())
            .map(|s| s.name.clone())
            .collect()
    }

    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.entries.values().filter(|s| s.is_connected()).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
