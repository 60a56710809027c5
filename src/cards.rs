// src/cards.rs
use log::{debug, warn};
use pcsc::Card;

use crate::apdu;
use crate::error::TagIoError;

// Factory default and widely used transport keys
pub const COMMON_KEYS: [[u8; 6]; 8] = [
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5],
    [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5],
    [0x4D, 0x3A, 0x99, 0xC3, 0x51, 0xDD],
    [0x1A, 0x98, 0x2C, 0x7E, 0x45, 0x9A],
    [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
];

pub const NTAG_FIRST_DATA_PAGE: u8 = 4;
const NTAG_CC_PAGE: u8 = 3;
const NTAG_CC_MAGIC: u8 = 0xE1;

/// Capability container of an NFC Forum Type 2 tag (page 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityContainer {
    pub version: u8,
    /// Size of the data area in bytes.
    pub data_area: usize,
    pub writable: bool,
}

impl CapabilityContainer {
    pub fn parse(page: &[u8]) -> Option<Self> {
        if page.len() < 4 || page[0] != NTAG_CC_MAGIC {
            return None;
        }
        Some(CapabilityContainer {
            version: page[1],
            data_area: page[2] as usize * 8,
            // upper nibble of byte 3 is the write access condition, 0 = granted
            writable: page[3] & 0xF0 == 0,
        })
    }

    pub fn to_page(&self) -> [u8; 4] {
        [
            NTAG_CC_MAGIC,
            self.version,
            (self.data_area / 8) as u8,
            if self.writable { 0x00 } else { 0x0F },
        ]
    }
}

pub fn get_mifare_data_blocks() -> Vec<u8> {
    let mut blocks = Vec::new();
    // Sector 0 is usually read-only manufacturer data, so we start at Sector 1
    for sector in 1..16 {
        for block_in_sector in 0..3 {
            // 0, 1, 2 are data. 3 is the Trailer.
            blocks.push((sector * 4) + block_in_sector);
        }
    }
    blocks
}

/// Bytes available for TLV-wrapped NDEF in the MIFARE Classic data blocks.
pub fn mifare_data_area() -> usize {
    get_mifare_data_blocks().len() * 16
}

fn authenticate_sector(card: &Card, block: u8, try_key_b: bool) -> Result<(), TagIoError> {
    for key in COMMON_KEYS.iter() {
        if apdu::load_key(card, key).is_ok()
            && (apdu::authenticate(card, block, 0x60).is_ok()
                || (try_key_b && apdu::authenticate(card, block, 0x61).is_ok()))
        {
            return Ok(());
        }
    }
    Err(TagIoError::Io(format!(
        "Could not authenticate sector at block {}",
        block
    )))
}

/// Expected total TLV length once the first bytes of the NDEF TLV are known.
fn expected_tlv_len(data: &[u8]) -> Option<usize> {
    let pos = data.iter().position(|&b| b == 0x03)?;
    match *data.get(pos + 1)? {
        0xFF => {
            let hi = *data.get(pos + 2)? as usize;
            let lo = *data.get(pos + 3)? as usize;
            Some(pos + 4 + ((hi << 8) | lo) + 1)
        }
        len => Some(pos + 2 + len as usize + 1),
    }
}

pub fn read_mifare(card: &Card) -> Result<Vec<u8>, TagIoError> {
    let mut full_data = Vec::new();

    for &block in get_mifare_data_blocks().iter() {
        // We must authenticate at the start of every sector (blocks 4, 8, 12, etc.)
        if block % 4 == 0 {
            if let Err(e) = authenticate_sector(card, block, true) {
                // If we can't get into this sector, we can't read the rest of the records
                warn!("{}. Stopping.", e);
                break;
            }
        }

        match apdu::read_binary(card, block, 16) {
            Ok(data) => {
                full_data.extend_from_slice(&data);
                if let Some(len) = expected_tlv_len(&full_data) {
                    if full_data.len() >= len {
                        break;
                    }
                }
            }
            Err(_) => break,
        }
    }

    if full_data.is_empty() {
        return Err(TagIoError::Io("No data could be read from the card.".into()));
    }

    Ok(full_data)
}

pub fn write_mifare(card: &Card, data: &[u8]) -> Result<(), TagIoError> {
    let mut offset = 0;
    let mut current_block: u8 = 4;

    while offset < data.len() {
        // Skip trailers
        if (current_block + 1) % 4 == 0 {
            current_block += 1;
            continue;
        }
        if current_block >= 64 {
            return Err(TagIoError::Io("Ran out of MIFARE data blocks".into()));
        }

        if current_block % 4 == 0 {
            authenticate_sector(card, current_block, false)
                .map_err(|_| TagIoError::Io("Write Auth Failed".into()))?;
        }

        // Chunking 16 bytes
        let copy_len = std::cmp::min(16, data.len() - offset);
        let mut chunk = [0u8; 16]; // Pad with 0s
        chunk[..copy_len].copy_from_slice(&data[offset..offset + copy_len]);

        apdu::update_binary(card, current_block, &chunk)?;

        offset += 16;
        current_block += 1;
    }
    Ok(())
}

pub fn read_ntag_cc(card: &Card) -> Result<Option<CapabilityContainer>, TagIoError> {
    // READ returns 4 pages (16 bytes) starting at the requested one
    let page = apdu::read_binary(card, NTAG_CC_PAGE, 4)?;
    let cc = CapabilityContainer::parse(&page);
    debug!("NTAG capability container: {:?}", cc);
    Ok(cc)
}

/// Writes a capability container announcing `data_area` bytes.
pub fn format_ntag(card: &Card, data_area: usize) -> Result<(), TagIoError> {
    let cc = CapabilityContainer {
        version: 0x10,
        data_area,
        writable: true,
    };
    apdu::update_binary(card, NTAG_CC_PAGE, &cc.to_page())
}

pub fn read_ntag(card: &Card, data_area: usize) -> Result<Vec<u8>, TagIoError> {
    let mut full_data = Vec::new();
    let last_page = NTAG_FIRST_DATA_PAGE as usize + data_area.div_ceil(4);

    let mut page = NTAG_FIRST_DATA_PAGE as usize;
    while page < last_page {
        let data = apdu::read_binary(card, page as u8, 16)?;
        full_data.extend_from_slice(&data);
        page += 4;
        if let Some(len) = expected_tlv_len(&full_data) {
            if full_data.len() >= len {
                break;
            }
        }
    }
    full_data.truncate(data_area);
    Ok(full_data)
}

pub fn write_ntag(card: &Card, data: &[u8]) -> Result<(), TagIoError> {
    // NTAG writes 4 bytes (1 page) at a time
    let mut padded_data = data.to_vec();
    while padded_data.len() % 4 != 0 {
        padded_data.push(0x00);
    }

    let mut current_page = NTAG_FIRST_DATA_PAGE;
    for chunk in padded_data.chunks(4) {
        apdu::update_binary(card, current_page, chunk)?;
        current_page += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mifare_blocks_skip_trailers_and_sector_zero() {
        let blocks = get_mifare_data_blocks();
        assert_eq!(blocks.len(), 45);
        assert_eq!(blocks[0], 4);
        assert!(blocks.iter().all(|b| (b + 1) % 4 != 0));
        assert_eq!(mifare_data_area(), 720);
    }

    #[test]
    fn capability_container_parses_ntag215() {
        let cc = CapabilityContainer::parse(&[0xE1, 0x10, 0x3E, 0x00]).unwrap();
        assert_eq!(cc.data_area, 496);
        assert!(cc.writable);
        assert_eq!(cc.to_page(), [0xE1, 0x10, 0x3E, 0x00]);

        let locked = CapabilityContainer::parse(&[0xE1, 0x10, 0x12, 0x0F]).unwrap();
        assert!(!locked.writable);
        assert_eq!(CapabilityContainer::parse(&[0, 0, 0, 0]), None);
    }

    #[test]
    fn tlv_length_is_known_once_header_is_read() {
        assert_eq!(expected_tlv_len(&[0x03, 0x05]), Some(8));
        assert_eq!(expected_tlv_len(&[0x00, 0x03, 0xFF, 0x01, 0x00]), Some(1 + 4 + 256 + 1));
        assert_eq!(expected_tlv_len(&[0x03, 0xFF, 0x01]), None);
        assert_eq!(expected_tlv_len(&[0x00, 0x00]), None);
    }
}
