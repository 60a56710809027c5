// src/router.rs
use log::{debug, warn};

use crate::message::{MessageCodec, NfcMessage};
use crate::registry::{HandlerRegistry, Launcher};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteReport {
    pub parsed: usize,
    pub dropped: usize,
    pub dispatched: bool,
}

/// Turns inbound NDEF payloads into messages and hands them to the registry.
pub struct ActivityRouter<'a> {
    codec: &'a MessageCodec,
    registry: &'a HandlerRegistry,
}

impl<'a> ActivityRouter<'a> {
    pub fn new(codec: &'a MessageCodec, registry: &'a HandlerRegistry) -> Self {
        ActivityRouter { codec, registry }
    }

    /// Parses every payload, skipping the ones that fail to decode, then
    /// dispatches the batch.
    pub fn route<P: AsRef<[u8]>>(&self, payloads: &[P], launcher: &mut dyn Launcher) -> RouteReport {
        let mut messages: Vec<NfcMessage> = Vec::with_capacity(payloads.len());
        let mut dropped = 0;
        for payload in payloads {
            match self.codec.parse(payload.as_ref()) {
                Ok(message) => {
                    debug!("Parsed inbound {}", message);
                    messages.push(message);
                }
                Err(e) => {
                    warn!("Dropping inbound message: {}", e);
                    dropped += 1;
                }
            }
        }

        let dispatched = self.registry.dispatch(&messages, launcher);
        if !dispatched && !messages.is_empty() {
            debug!("No handler registered for {} inbound messages", messages.len());
        }
        RouteReport {
            parsed: messages.len(),
            dropped,
            dispatched,
        }
    }
}
