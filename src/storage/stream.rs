//! Page stream - low-level reads of a persisted index.
//!
//! The [`PageStream`] handles all direct reads of the backing stream:
//! - Locating and reading the descriptor page (and the Bloom filter after it)
//! - Reading individual pages by offset, checking their checksums

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::common::config::OFFSET_SIZE;
use crate::common::PageRef;
use crate::storage::page::{DescriptorPage, PageHeader, PageType, StoredPage};
use crate::storage::BloomFilter;

/// Read access to a serialized index.
///
/// # Stream Layout
/// ```text
/// ┌────────┬────────┬─────┬────────┬────────────┬─────────────┬────────────┐
/// │ Leaf 0 │ Leaf 1 │ ... │ Inner  │ Descriptor │ Bloom bytes │ desc. off. │
/// │ + link │ + link │     │ pages  │ page       │ (optional)  │ u64        │
/// └────────┴────────┴─────┴────────┴────────────┴─────────────┴────────────┘
/// ```
///
/// Pages are addressed by their byte offset. The descriptor is found by
/// reading the last eight bytes of the stream.
///
/// # Thread Safety
/// `PageStream` is single-threaded; providers keep it behind a `Mutex`.
pub struct PageStream<S> {
    inner: S,
    len: u64,
}

impl PageStream<BufReader<File>> {
    /// Open a serialized index file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<S: Read + Seek> PageStream<S> {
    /// Wrap a seekable stream.
    pub fn new(mut inner: S) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self { inner, len })
    }

    /// Total size of the stream in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the page stored at `offset`, verifying its checksum.
    ///
    /// # Errors
    /// `UnexpectedEof` if the page runs past the end of the stream,
    /// `InvalidData` on a checksum mismatch.
    pub fn read_page(&mut self, offset: u64) -> io::Result<StoredPage> {
        let (header, payload) = self.read_raw(offset)?;

        let right = if header.page_type == PageType::Leaf {
            let mut link = [0u8; OFFSET_SIZE];
            self.inner.read_exact(&mut link)?;
            PageRef::from_raw(u64::from_le_bytes(link))
        } else {
            None
        };

        Ok(StoredPage {
            page_type: header.page_type,
            payload,
            right,
        })
    }

    /// Locate and read the descriptor page and the Bloom filter following it.
    pub fn read_descriptor(&mut self) -> io::Result<(DescriptorPage, Option<BloomFilter>)> {
        if self.len < OFFSET_SIZE as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream is too short to hold a descriptor offset",
            ));
        }

        let trailer = self.len - OFFSET_SIZE as u64;
        self.inner.seek(SeekFrom::Start(trailer))?;
        let mut raw = [0u8; OFFSET_SIZE];
        self.inner.read_exact(&mut raw)?;
        let offset = u64::from_le_bytes(raw);

        let (header, payload) = self.read_raw(offset)?;
        if header.page_type != PageType::Descriptor {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected descriptor page at {}, found {:?}", offset, header.page_type),
            ));
        }
        let descriptor = DescriptorPage::decode(&mut &payload[..])?;

        let bloom = if descriptor.use_bloom_filter {
            let start = offset + (PageHeader::SIZE + payload.len()) as u64;
            let mut bytes = vec![0u8; trailer.saturating_sub(start) as usize];
            self.inner.seek(SeekFrom::Start(start))?;
            self.inner.read_exact(&mut bytes)?;
            Some(BloomFilter::decode(&mut &bytes[..])?)
        } else {
            None
        };

        Ok((descriptor, bloom))
    }

    fn read_raw(&mut self, offset: u64) -> io::Result<(PageHeader, Vec<u8>)> {
        if offset.saturating_add(PageHeader::SIZE as u64) > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("page offset {} is past the end of the stream ({})", offset, self.len),
            ));
        }

        self.inner.seek(SeekFrom::Start(offset))?;
        let mut raw = [0u8; PageHeader::SIZE];
        self.inner.read_exact(&mut raw)?;
        let header = PageHeader::decode(&mut raw.as_slice())?;

        let end = offset + PageHeader::SIZE as u64 + header.payload_len as u64;
        if end > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload of page at {} runs past the end of the stream", offset),
            ));
        }

        let mut payload = vec![0u8; header.payload_len as usize];
        self.inner.read_exact(&mut payload)?;
        if !header.verify_checksum(&payload) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("checksum mismatch for page at {}", offset),
            ));
        }

        Ok((header, payload))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::tempdir;

    use super::*;
    use crate::storage::{PageAllocator, StreamPageAllocator};

    fn leaf(payload: &[u8], right: Option<PageRef>) -> StoredPage {
        StoredPage {
            page_type: PageType::Leaf,
            payload: payload.to_vec(),
            right,
        }
    }

    fn descriptor(use_bloom_filter: bool) -> DescriptorPage {
        DescriptorPage {
            page_size: 4,
            use_bloom_filter,
            root: PageRef::new(0),
            rightmost: PageRef::new(0),
            item_count: 0,
            measure_count: 0,
        }
    }

    #[test]
    fn test_read_pages_by_offset() {
        let mut allocator = StreamPageAllocator::new(Vec::new());
        let first = allocator.assign_offset(&leaf(b"abc", None)).unwrap();
        let second = allocator.assign_offset(&leaf(b"defg", Some(first))).unwrap();
        allocator.commit(&descriptor(false), None).unwrap();

        let mut stream = PageStream::new(Cursor::new(allocator.into_inner())).unwrap();

        let page = stream.read_page(second.offset()).unwrap();
        assert_eq!(page.payload, b"defg");
        assert_eq!(page.right, Some(first));

        let page = stream.read_page(first.offset()).unwrap();
        assert_eq!(page.payload, b"abc");
        assert_eq!(page.right, None);
    }

    #[test]
    fn test_read_descriptor_with_bloom() {
        let mut bloom = BloomFilter::with_rate(10, 0.01);
        bloom.insert(&5u32);

        let mut allocator = StreamPageAllocator::new(Vec::new());
        allocator.assign_offset(&leaf(b"", None)).unwrap();
        allocator.commit(&descriptor(true), Some(&bloom)).unwrap();

        let mut stream = PageStream::new(Cursor::new(allocator.into_inner())).unwrap();
        let (read, filter) = stream.read_descriptor().unwrap();

        assert_eq!(read, descriptor(true));
        assert_eq!(filter, Some(bloom));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut allocator = StreamPageAllocator::new(Vec::new());
        allocator.assign_offset(&leaf(b"payload", None)).unwrap();
        let mut bytes = allocator.into_inner();
        bytes[PageHeader::SIZE] ^= 0xFF;

        let mut stream = PageStream::new(Cursor::new(bytes)).unwrap();
        let err = stream.read_page(0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_read_past_end() {
        let mut stream = PageStream::new(Cursor::new(vec![0u8; 4])).unwrap();
        assert!(stream.read_page(100).is_err());
        assert!(stream.read_descriptor().is_err());
    }

    #[test]
    fn test_open_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let mut allocator = StreamPageAllocator::create(&path).unwrap();
            allocator.assign_offset(&leaf(b"x", None)).unwrap();
            allocator.commit(&descriptor(false), None).unwrap();
        }

        let mut stream = PageStream::open(&path).unwrap();
        let (read, bloom) = stream.read_descriptor().unwrap();
        assert_eq!(read.page_size, 4);
        assert!(bloom.is_none());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(PageStream::open(dir.path().join("missing.db")).is_err());
    }
}
