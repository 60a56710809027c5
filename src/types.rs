// src/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;

// Type Name Format values (NFC Forum NDEF 1.0, header bits 0-2)
pub const TNF_EMPTY: u8 = 0x00;
pub const TNF_WELL_KNOWN: u8 = 0x01;
pub const TNF_MIME_MEDIA: u8 = 0x02;
pub const TNF_ABSOLUTE_URI: u8 = 0x03;
pub const TNF_EXTERNAL: u8 = 0x04;
pub const TNF_UNKNOWN: u8 = 0x05;
pub const TNF_UNCHANGED: u8 = 0x06;

// Record types written by this library under TNF_WELL_KNOWN
pub const STRING_RECORD_TYPE: &[u8] = b"string";
pub const MAP_RECORD_TYPE: &[u8] = b"map";

pub const CARD_TYPE_MIFARE_1K: &str = "6a"; // MIFARE Classic 1K
pub const CARD_TYPE_NTAG: &str = "68"; // NTAG215/Ultralight

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: u8, // Type Name Format (How to interpret the type)
    pub record_type: Vec<u8>,
    pub payload: Vec<u8>,
    pub id: Option<Vec<u8>>,
}

/// What the controller is currently waiting to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    #[default]
    Sleep,
    Write,
    Push,
    Beam,
    Foreground,
}

/// Lifecycle of the host that owns the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Created,
    Resumed,
    Paused,
}

/// What kind of encounter an armed transport should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryFilter {
    /// Intercept the next tag only (write mode).
    SingleTag,
    /// Report every tag until disarmed (foreground dispatch).
    AnyTag,
    /// Offer the payload to a peer device.
    Peer,
}

/// Result of one write attempt. Exactly one is reported per write request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteOutcome {
    Written,
    TransportDisabled,
    IncompatibleFormat { reason: String },
    ReadOnlyTarget,
    CapacityExceeded { available: usize, required: usize },
    UnsupportedTag,
    TransportIoFailure { reason: String },
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Written => write!(f, "message written"),
            WriteOutcome::TransportDisabled => write!(f, "NFC transport is disabled"),
            WriteOutcome::IncompatibleFormat { reason } => {
                write!(f, "incompatible format: {}", reason)
            }
            WriteOutcome::ReadOnlyTarget => write!(f, "tag is read-only"),
            WriteOutcome::CapacityExceeded {
                available,
                required,
            } => write!(
                f,
                "tag capacity is {} bytes, message needs {} bytes",
                available, required
            ),
            WriteOutcome::UnsupportedTag => write!(f, "tag does not support NDEF"),
            WriteOutcome::TransportIoFailure { reason } => write!(f, "tag I/O failure: {}", reason),
        }
    }
}

/// JSON form of a record on the service socket.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecordJson {
    #[serde(rename = "string")]
    Text {
        id: String,
        value: String,
    },
    Map {
        id: String,
        value: std::collections::BTreeMap<String, String>,
    },
    Raw {
        id: String,
        tnf: u8,
        record_type: String, // hex
        payload: String,     // hex
    },
}

/// JSON form of a message on the service socket.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageJson {
    pub id: String,
    #[serde(default)]
    pub records: Vec<RecordJson>,
}

// Messages sent TO the WebSocket client (Frontend)
#[allow(non_camel_case_types)]
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    READER_STATUS { success: bool },
    CARD_STATUS { success: bool, message: String },
    MODE_CHANGED { mode: Mode },
    WRITE_RESULT { success: bool, outcome: WriteOutcome },
    MESSAGE_PUSHED,
    MESSAGE_RECEIVED { message: MessageJson },
    NDEF_RECEIVED { records: Vec<RecordJson> },
    MESSAGE_ROUTED { destination: String, message: MessageJson },
    HANDLER_REGISTERED { message_id: String, destination: String },
    READER_ERROR { error: String },
}

// Messages received FROM the WebSocket client
#[allow(non_camel_case_types)]
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    GET_READER_STATUS,
    WRITE_MESSAGE { message: MessageJson },
    PUSH_MESSAGE { message: MessageJson },
    BEAM_MESSAGE { message: MessageJson },
    START_FOREGROUND,
    RESET,
    REGISTER_HANDLER { message_id: String, destination: String },
}

// Internal commands sent from WS Server -> NFC Thread
#[derive(Debug)]
pub enum NfcCommand {
    Write(MessageJson),
    Push(MessageJson),
    Beam(MessageJson),
    StartForeground,
    Reset,
    RegisterHandler { message_id: String, destination: String },
    Lifecycle(LifecyclePhase),
    ClientConnected,
    ClientDisconnected,
    CheckReaderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_write_message_parses() {
        let json = r#"{"type":"WRITE_MESSAGE","message":{"id":"ping","records":[
            {"type":"string","id":"greeting","value":"hi"},
            {"type":"map","id":"meta","value":{"a":"1"}}]}}"#;
        let parsed: IncomingMessage = serde_json::from_str(json).unwrap();
        match parsed {
            IncomingMessage::WRITE_MESSAGE { message } => {
                assert_eq!(message.id, "ping");
                assert_eq!(message.records.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn outgoing_write_result_is_tagged() {
        let msg = OutgoingMessage::WRITE_RESULT {
            success: false,
            outcome: WriteOutcome::CapacityExceeded {
                available: 48,
                required: 120,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "WRITE_RESULT");
        assert_eq!(json["outcome"]["kind"], "CAPACITY_EXCEEDED");
        assert_eq!(json["outcome"]["required"], 120);
    }

    #[test]
    fn capacity_outcome_describes_sizes() {
        let outcome = WriteOutcome::CapacityExceeded {
            available: 137,
            required: 200,
        };
        assert_eq!(
            outcome.to_string(),
            "tag capacity is 137 bytes, message needs 200 bytes"
        );
        assert!(!outcome.is_success());
    }

    #[test]
    fn mode_changes_are_reported_by_name() {
        let json = serde_json::to_value(OutgoingMessage::MODE_CHANGED { mode: Mode::Foreground }).unwrap();
        assert_eq!(json["type"], "MODE_CHANGED");
        assert_eq!(json["mode"], "FOREGROUND");
    }
}
