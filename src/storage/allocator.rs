//! Page allocation for the write path of persisted indexes.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::common::{Error, PageRef, Result};
use crate::storage::page::{DescriptorPage, StoredPage};
use crate::storage::BloomFilter;

/// Assigns stream positions to pages and seals the stream.
///
/// Pages are appended in the order they are handed over; the offset a page
/// receives becomes its persisted [`PageRef`].
pub trait PageAllocator {
    /// Offset the next page will be written at.
    fn position(&self) -> u64;

    /// Append `page` and return the offset it was written at.
    fn assign_offset(&mut self, page: &StoredPage) -> Result<PageRef>;

    /// Write the descriptor page, the optional Bloom filter and the trailing
    /// descriptor offset. Returns the descriptor's offset.
    fn commit(&mut self, descriptor: &DescriptorPage, bloom: Option<&BloomFilter>) -> Result<PageRef>;
}

/// Appends pages to any writer.
///
/// # Durability
/// `commit` flushes the writer; the file variant also calls `sync_all()`.
pub struct StreamPageAllocator<W: Write> {
    writer: W,
    position: u64,
}

impl StreamPageAllocator<BufWriter<File>> {
    /// Create a new index file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }

    /// Commit and fsync the file.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

impl<W: Write> StreamPageAllocator<W> {
    /// Start writing at position zero of `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer, position: 0 }
    }

    /// Consume the allocator, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PageAllocator for StreamPageAllocator<W> {
    #[inline]
    fn position(&self) -> u64 {
        self.position
    }

    fn assign_offset(&mut self, page: &StoredPage) -> Result<PageRef> {
        let page_ref = PageRef::new(self.position);
        page.write_to(&mut self.writer)
            .map_err(|e| Error::persistence(page_ref, e))?;
        self.position += page.stored_len();
        Ok(page_ref)
    }

    fn commit(&mut self, descriptor: &DescriptorPage, bloom: Option<&BloomFilter>) -> Result<PageRef> {
        let offset = self.position;
        let stored = descriptor.to_stored();

        let write = |writer: &mut W| -> std::io::Result<u64> {
            stored.write_to(writer)?;
            let mut written = stored.stored_len();
            if let Some(bloom) = bloom {
                let mut bytes = Vec::with_capacity(bloom.encoded_len());
                bloom.encode(&mut bytes);
                writer.write_all(&bytes)?;
                written += bytes.len() as u64;
            }
            writer.write_all(&offset.to_le_bytes())?;
            writer.flush()?;
            Ok(written + 8)
        };

        let written = write(&mut self.writer)
            .map_err(|e| Error::persistence(PageRef::DESCRIPTOR, e))?;
        self.position += written;

        tracing::debug!(
            offset,
            root = %descriptor.root,
            items = descriptor.item_count,
            bloom = bloom.is_some(),
            "committed index descriptor"
        );
        Ok(PageRef::new(offset))
    }
}
