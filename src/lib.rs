//! Simplified NFC messaging: typed records over NDEF, a lifecycle-aware
//! write/push/foreground mode controller, and message-id based routing.
//!
//! ```no_run
//! use simplenfc::{MessageCodec, NfcMessage};
//!
//! let codec = MessageCodec::new("com.example.doors");
//! let mut message = NfcMessage::new("ping");
//! message.add_text("greeting", "hi");
//! let bytes = codec.compose_message(&message).unwrap();
//! assert_eq!(codec.parse(&bytes).unwrap(), message);
//! ```

pub mod apdu;
pub mod cards;
pub mod config;
pub mod controller;
pub mod error;
pub mod message;
pub mod ndef;
pub mod reader;
pub mod record;
pub mod registry;
pub mod router;
pub mod tag;
pub mod types;

pub use config::NfcConfig;
pub use controller::{NfcController, PendingPolicy, Received, Transport};
pub use error::{DecodeError, EncodeError, NfcError, NfcResult, TagIoError};
pub use message::{MessageCodec, NfcMessage};
pub use record::{NfcRecord, RecordKind};
pub use registry::{HandlerRegistry, Launcher};
pub use router::{ActivityRouter, RouteReport};
pub use tag::{TagTarget, TagTech};
pub use types::{DiscoveryFilter, LifecyclePhase, Mode, NdefRecord, WriteOutcome};
