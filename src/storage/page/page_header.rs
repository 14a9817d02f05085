//! Page header and type definitions.
//!
//! Every serialized page starts with a [`PageHeader`] containing metadata:
//! - [`PageType`] discriminator
//! - CRC32 checksum of the payload
//! - payload length

use std::io;

use bytes::{Buf, BufMut};

use crate::storage::codec::ensure_remaining;

/// Type of page stored in the stream.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or corrupted page.
    #[default]
    Invalid = 0,
    /// B+Tree leaf page (followed by the right sibling offset).
    Leaf = 1,
    /// B+Tree inner page.
    Inner = 2,
    /// Index descriptor page.
    Descriptor = 3,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::Leaf,
            2 => PageType::Inner,
            3 => PageType::Descriptor,
            _ => PageType::Invalid,
        }
    }
}

/// Metadata stored in front of every serialized page.
///
/// # Layout (9 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (PageType as u8)
/// 1       4     checksum (CRC32 of the payload, little-endian)
/// 5       4     payload_len (little-endian)
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Type of this page.
    pub page_type: PageType,
    /// CRC32 checksum of the payload.
    pub checksum: u32,
    /// Number of payload bytes following the header.
    pub payload_len: u32,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 9;

    /// Build the header describing `payload`.
    pub fn for_payload(page_type: PageType, payload: &[u8]) -> Self {
        Self {
            page_type,
            checksum: Self::compute_checksum(payload),
            payload_len: payload.len() as u32,
        }
    }

    /// Read a header from the front of a buffer.
    ///
    /// # Errors
    /// Returns `InvalidData` if fewer than `PageHeader::SIZE` bytes remain.
    pub fn decode(buf: &mut impl Buf) -> io::Result<Self> {
        ensure_remaining(buf, Self::SIZE)?;

        let page_type = PageType::from_u8(buf.get_u8());
        let checksum = buf.get_u32_le();
        let payload_len = buf.get_u32_le();

        Ok(Self {
            page_type,
            checksum,
            payload_len,
        })
    }

    /// Write this header.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.page_type as u8);
        buf.put_u32_le(self.checksum);
        buf.put_u32_le(self.payload_len);
    }

    /// Compute the CRC32 checksum of a page payload.
    pub fn compute_checksum(payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        hasher.finalize()
    }

    /// Verify that the stored checksum matches the payload.
    pub fn verify_checksum(&self, payload: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(payload)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // --- PageType tests ---

    #[test]
    fn test_page_type_from_u8() {
        assert_eq!(PageType::from_u8(0), PageType::Invalid);
        assert_eq!(PageType::from_u8(1), PageType::Leaf);
        assert_eq!(PageType::from_u8(2), PageType::Inner);
        assert_eq!(PageType::from_u8(3), PageType::Descriptor);
        assert_eq!(PageType::from_u8(255), PageType::Invalid);
    }

    // --- PageHeader tests ---

    #[test]
    fn test_page_header_byte_layout() {
        let header = PageHeader {
            page_type: PageType::Inner,
            checksum: 0x04030201,    // Little-endian: 01 02 03 04
            payload_len: 0x00000110, // Little-endian: 10 01 00 00
        };

        let mut buffer = Vec::new();
        header.encode(&mut buffer);

        assert_eq!(buffer.len(), PageHeader::SIZE);
        assert_eq!(buffer[0], 2); // PageType::Inner
        assert_eq!(buffer[1], 0x01); // checksum byte 0 (LSB)
        assert_eq!(buffer[4], 0x04); // checksum byte 3 (MSB)
        assert_eq!(buffer[5], 0x10); // payload_len byte 0
        assert_eq!(buffer[6], 0x01);

        let recovered = PageHeader::decode(&mut &buffer[..]).unwrap();
        assert_eq!(header, recovered);
    }

    #[test]
    fn test_decode_short_buffer() {
        let buffer = [1u8, 2, 3];
        assert!(PageHeader::decode(&mut &buffer[..]).is_err());
    }

    // --- Checksum tests ---

    #[test]
    fn test_checksum_changes_with_data() {
        let checksum1 = PageHeader::compute_checksum(&[0xFF; 32]);
        let checksum2 = PageHeader::compute_checksum(&[0xFE; 32]);

        assert_ne!(checksum1, checksum2);
    }

    #[test]
    fn test_checksum_verify() {
        let mut payload = vec![0u8; 64];
        payload[10] = 0xAB;

        let header = PageHeader::for_payload(PageType::Leaf, &payload);
        assert_eq!(header.payload_len, 64);
        assert!(header.verify_checksum(&payload));

        // Corrupt the payload
        payload[10] = 0xFF;
        assert!(!header.verify_checksum(&payload));
    }
}
