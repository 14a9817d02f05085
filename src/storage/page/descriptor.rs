//! Descriptor page.
//!
//! One per persisted index. It records the build-time configuration and
//! where the tree starts, and is located through the offset stored in the
//! last [`OFFSET_SIZE`](crate::common::config::OFFSET_SIZE) bytes of the
//! stream rather than through the root.

use std::io;

use bytes::{Buf, BufMut};

use super::layout::StoredPage;
use super::PageType;
use crate::common::PageRef;
use crate::storage::codec::ensure_remaining;

/// Version of the persisted layout.
pub const FORMAT_VERSION: u16 = 1;

/// Metadata of a persisted index.
///
/// # Layout (35 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       2     format version
/// 2       4     page_size
/// 6       1     use_bloom_filter
/// 7       8     root offset
/// 15      8     rightmost leaf offset
/// 23      8     item count
/// 31      2     measure count
/// 33      2     reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPage {
    pub page_size: u32,
    pub use_bloom_filter: bool,
    pub root: PageRef,
    pub rightmost: PageRef,
    pub item_count: u64,
    pub measure_count: u16,
}

impl DescriptorPage {
    /// Size of the payload in bytes.
    pub const SIZE: usize = 35;

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(FORMAT_VERSION);
        buf.put_u32_le(self.page_size);
        buf.put_u8(self.use_bloom_filter as u8);
        buf.put_u64_le(self.root.offset());
        buf.put_u64_le(self.rightmost.offset());
        buf.put_u64_le(self.item_count);
        buf.put_u16_le(self.measure_count);
        buf.put_u16_le(0);
    }

    pub fn decode(buf: &mut impl Buf) -> io::Result<Self> {
        ensure_remaining(buf, Self::SIZE)?;

        let version = buf.get_u16_le();
        if version != FORMAT_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported format version {}", version),
            ));
        }

        let page_size = buf.get_u32_le();
        let use_bloom_filter = buf.get_u8() != 0;
        let root = PageRef::new(buf.get_u64_le());
        let rightmost = PageRef::new(buf.get_u64_le());
        let item_count = buf.get_u64_le();
        let measure_count = buf.get_u16_le();
        let _reserved = buf.get_u16_le();

        Ok(Self {
            page_size,
            use_bloom_filter,
            root,
            rightmost,
            item_count,
            measure_count,
        })
    }

    /// Wrap the descriptor into a stored page.
    pub fn to_stored(&self) -> StoredPage {
        let mut payload = Vec::with_capacity(Self::SIZE);
        self.encode(&mut payload);
        StoredPage {
            page_type: PageType::Descriptor,
            payload,
            right: None,
        }
    }
}
