// src/reader.rs
//! PC/SC contactless reader as a tag source and transport.

use log::{info, warn};
use pcsc::Card;

use crate::cards::{self, CapabilityContainer};
use crate::controller::Transport;
use crate::error::TagIoError;
use crate::ndef;
use crate::tag::{TagTarget, TagTech};
use crate::types::{CARD_TYPE_MIFARE_1K, CARD_TYPE_NTAG, DiscoveryFilter, Mode};

// NTAG215 user memory
const NTAG_DEFAULT_DATA_AREA: usize = 496;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    MifareClassic1k,
    Ntag,
}

impl CardKind {
    /// Guesses the card family from the last ATR byte.
    pub fn from_atr(atr: &[u8]) -> Self {
        let card_type = atr.last().map(|last| format!("{:x}", last));
        match card_type.as_deref() {
            Some(CARD_TYPE_MIFARE_1K) => CardKind::MifareClassic1k,
            Some(CARD_TYPE_NTAG) => CardKind::Ntag,
            _ => CardKind::Ntag,
        }
    }

    pub fn detect(card: &Card) -> Self {
        let mut names_buf = [0u8; 128];
        let mut atr_buf = [0u8; 64];
        match card.status2(&mut names_buf, &mut atr_buf) {
            Ok(status) => CardKind::from_atr(status.atr()),
            Err(e) => {
                warn!("Could not read card status, assuming NTAG: {}", e);
                CardKind::Ntag
            }
        }
    }
}

/// Largest NDEF message that fits a TLV-wrapped data area.
pub fn ndef_capacity(data_area: usize) -> usize {
    let short = data_area.saturating_sub(3);
    if short < 0xFF {
        short
    } else {
        data_area.saturating_sub(5)
    }
}

/// A card on a PC/SC reader, seen as an NDEF tag.
pub struct PcscTag<'a> {
    card: &'a Card,
    kind: CardKind,
}

impl<'a> PcscTag<'a> {
    pub fn new(card: &'a Card) -> Self {
        let kind = CardKind::detect(card);
        info!("Card type: {:?}", kind);
        PcscTag { card, kind }
    }

    fn cc(&self) -> Result<Option<CapabilityContainer>, TagIoError> {
        cards::read_ntag_cc(self.card)
    }

    fn write_tlv(&mut self, message: &[u8]) -> Result<(), TagIoError> {
        let tlv_data = ndef::wrap_in_tlv(message);
        match self.kind {
            CardKind::MifareClassic1k => cards::write_mifare(self.card, &tlv_data),
            CardKind::Ntag => cards::write_ntag(self.card, &tlv_data),
        }
    }
}

impl TagTarget for PcscTag<'_> {
    fn tech(&mut self) -> Result<TagTech, TagIoError> {
        match self.kind {
            CardKind::MifareClassic1k => Ok(TagTech::Ndef {
                writable: true,
                max_size: ndef_capacity(cards::mifare_data_area()),
            }),
            CardKind::Ntag => Ok(match self.cc()? {
                Some(cc) => TagTech::Ndef {
                    writable: cc.writable,
                    max_size: ndef_capacity(cc.data_area),
                },
                None => TagTech::Formatable,
            }),
        }
    }

    fn read_ndef(&mut self) -> Result<Vec<u8>, TagIoError> {
        let raw = match self.kind {
            CardKind::MifareClassic1k => cards::read_mifare(self.card)?,
            CardKind::Ntag => {
                let area = self
                    .cc()?
                    .map(|cc| cc.data_area)
                    .ok_or_else(|| TagIoError::Format("No capability container".into()))?;
                cards::read_ntag(self.card, area)?
            }
        };
        ndef::unwrap_tlv(&raw)
            .map(<[u8]>::to_vec)
            .map_err(|e| TagIoError::Format(e.to_string()))
    }

    fn write_ndef(&mut self, message: &[u8]) -> Result<(), TagIoError> {
        self.write_tlv(message)
    }

    fn format_ndef(&mut self, message: &[u8]) -> Result<(), TagIoError> {
        if self.kind == CardKind::Ntag {
            cards::format_ntag(self.card, NTAG_DEFAULT_DATA_AREA)
                .map_err(|e| TagIoError::Format(e.to_string()))?;
        }
        self.write_tlv(message)
    }
}

/// Transport over a PC/SC reader. Readers cannot talk to peer devices, so
/// push arming is accepted but never completes.
#[derive(Debug, Default)]
pub struct PcscTransport {
    reader_present: bool,
    armed: Option<(Mode, DiscoveryFilter)>,
}

impl PcscTransport {
    pub fn set_reader_present(&mut self, present: bool) {
        if self.reader_present != present {
            info!("Reader present: {}", present);
        }
        self.reader_present = present;
    }

    pub fn armed(&self) -> Option<(Mode, DiscoveryFilter)> {
        self.armed
    }
}

impl Transport for PcscTransport {
    fn is_enabled(&self) -> bool {
        self.reader_present
    }

    fn arm(&mut self, mode: Mode, filter: DiscoveryFilter, _outbound: Option<&[u8]>) {
        if filter == DiscoveryFilter::Peer {
            warn!("PC/SC readers cannot push to peer devices; {:?} will not complete", mode);
        }
        self.armed = Some((mode, filter));
    }

    fn disarm(&mut self, mode: Mode) {
        if matches!(self.armed, Some((armed, _)) if armed == mode) {
            self.armed = None;
        }
    }
}
