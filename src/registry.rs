// src/registry.rs
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{NfcError, NfcResult};
use crate::message::NfcMessage;

/// Opens the screen (or other consumer) registered for a message.
pub trait Launcher {
    fn launch(&mut self, destination: &str, message: &NfcMessage);
}

impl<F: FnMut(&str, &NfcMessage)> Launcher for F {
    fn launch(&mut self, destination: &str, message: &NfcMessage) {
        self(destination, message)
    }
}

/// Message id to destination table.
///
/// With a backing file the table is loaded on open and written through on
/// every registration, as a JSON object of id -> destination.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, String>,
    store: Option<PathBuf>,
}

impl HandlerRegistry {
    pub fn in_memory() -> Self {
        HandlerRegistry::default()
    }

    /// Opens a registry persisted at `path`. A missing file is an empty table;
    /// an unreadable one is logged and ignored.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let handlers = match load(&path) {
            Ok(Some(handlers)) => {
                info!("Loaded {} message handlers from {:?}", handlers.len(), path);
                handlers
            }
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Ignoring unreadable handler table: {}", e);
                HashMap::new()
            }
        };
        HandlerRegistry {
            handlers,
            store: Some(path),
        }
    }

    /// Maps `message_id` to `destination`, replacing any earlier mapping.
    ///
    /// The in-memory table is always updated; the error only reports a failed
    /// write-through.
    pub fn register(&mut self, message_id: impl Into<String>, destination: impl Into<String>) -> NfcResult<()> {
        let message_id = message_id.into();
        let destination = destination.into();
        info!("Registering handler '{}' for message '{}'", destination, message_id);
        if let Some(previous) = self.handlers.insert(message_id, destination) {
            info!("Replaced previous handler '{}'", previous);
        }
        self.persist()
    }

    pub fn destination(&self, message_id: &str) -> Option<&str> {
        self.handlers.get(message_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Launches the destination of the first message that has one. Later
    /// messages are not looked at once a match is found.
    pub fn dispatch(&self, messages: &[NfcMessage], launcher: &mut dyn Launcher) -> bool {
        for msg in messages {
            if let Some(destination) = self.handlers.get(msg.id()) {
                info!("Dispatching message '{}' to '{}'", msg.id(), destination);
                launcher.launch(destination, msg);
                return true;
            }
        }
        false
    }

    fn persist(&self) -> NfcResult<()> {
        let Some(path) = &self.store else {
            return Ok(());
        };
        let json = serde_json::to_string(&self.handlers)?;
        fs::write(path, json).map_err(|source| {
            warn!("Failed to persist handler table to {:?}: {}", path, source);
            NfcError::Persistence {
                path: path.clone(),
                source,
            }
        })
    }
}

fn load(path: &Path) -> NfcResult<Option<HashMap<String, String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| NfcError::Persistence {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(serde_json::from_str(&content)?))
}
