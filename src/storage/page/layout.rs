//! On-stream layout of index pages.
//!
//! # Stored page
//! ```text
//! ┌────────────┬──────────────────┬───────────────────────────┐
//! │ PageHeader │ payload          │ right sibling (leaf only) │
//! │ 9 bytes    │ payload_len      │ u64, u64::MAX = none      │
//! └────────────┴──────────────────┴───────────────────────────┘
//! ```
//!
//! # Payloads
//! ```text
//! common  : measure_count u16 | measures i64 * measure_count
//! leaf    : common | entry_count u32 | (key, item) * entry_count
//! inner   : common | key_count u32 | child0 u64 | (key, child u64) * key_count
//! ```

use std::io::{self, Write};

use bytes::{Buf, BufMut};

use super::{PageHeader, PageType};
use crate::common::config::OFFSET_SIZE;
use crate::common::PageRef;
use crate::index::page::{InnerPage, LeafPage, Node};
use crate::storage::codec::{ensure_remaining, Codec};

/// A page as it sits in the stream: typed payload plus the leaf link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    pub page_type: PageType,
    pub payload: Vec<u8>,
    /// Right sibling of a leaf; ignored for other page types.
    pub right: Option<PageRef>,
}

impl StoredPage {
    /// Bytes this page occupies in the stream.
    pub fn stored_len(&self) -> u64 {
        let link = if self.page_type == PageType::Leaf {
            OFFSET_SIZE
        } else {
            0
        };
        (PageHeader::SIZE + self.payload.len() + link) as u64
    }

    /// Write header, payload and (for leaves) the right sibling offset.
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        let mut header = Vec::with_capacity(PageHeader::SIZE);
        PageHeader::for_payload(self.page_type, &self.payload).encode(&mut header);
        writer.write_all(&header)?;
        writer.write_all(&self.payload)?;
        if self.page_type == PageType::Leaf {
            let right = self.right.unwrap_or(PageRef::UNDEFINED);
            writer.write_all(&right.offset().to_le_bytes())?;
        }
        Ok(())
    }
}

/// Serialize a node and its accumulators.
pub fn encode_node<K: Codec, I: Codec>(node: &Node<K, I>, measures: &[i64]) -> StoredPage {
    let mut payload = Vec::new();
    payload.put_u16_le(measures.len() as u16);
    for value in measures {
        payload.put_i64_le(*value);
    }

    match node {
        Node::Leaf(leaf) => {
            payload.put_u32_le(leaf.len() as u32);
            for (key, item) in leaf.entries() {
                key.encode(&mut payload);
                item.encode(&mut payload);
            }
            StoredPage {
                page_type: PageType::Leaf,
                payload,
                right: leaf.right(),
            }
        }
        Node::Inner(inner) => {
            payload.put_u32_le(inner.len() as u32);
            payload.put_u64_le(inner.child(0).offset());
            for (key, child) in inner.keys().iter().zip(&inner.children()[1..]) {
                key.encode(&mut payload);
                payload.put_u64_le(child.offset());
            }
            StoredPage {
                page_type: PageType::Inner,
                payload,
                right: None,
            }
        }
    }
}

/// Rebuild a node from its stored form.
///
/// # Errors
/// Returns `InvalidData` for descriptor/invalid page types and malformed payloads.
pub fn decode_node<K: Codec, I: Codec>(stored: &StoredPage) -> io::Result<(Node<K, I>, Vec<i64>)> {
    let mut buf = &stored.payload[..];

    ensure_remaining(&buf, 2)?;
    let measure_count = buf.get_u16_le() as usize;
    ensure_remaining(&buf, measure_count * 8)?;
    let measures = (0..measure_count).map(|_| buf.get_i64_le()).collect();

    let node = match stored.page_type {
        PageType::Leaf => {
            let count = u32::decode(&mut buf)? as usize;
            let mut entries = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                let key = K::decode(&mut buf)?;
                let item = I::decode(&mut buf)?;
                entries.push((key, item));
            }
            Node::Leaf(LeafPage::from_entries(entries, stored.right))
        }
        PageType::Inner => {
            let count = u32::decode(&mut buf)? as usize;
            let mut keys = Vec::with_capacity(count.min(4096));
            let mut children = Vec::with_capacity(count.min(4096) + 1);
            children.push(PageRef::new(u64::decode(&mut buf)?));
            for _ in 0..count {
                keys.push(K::decode(&mut buf)?);
                children.push(PageRef::new(u64::decode(&mut buf)?));
            }
            Node::Inner(InnerPage::from_parts(keys, children))
        }
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected an index page, found {:?}", other),
            ))
        }
    };

    if buf.has_remaining() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} trailing bytes after page payload", buf.remaining()),
        ));
    }

    Ok((node, measures))
}
