//! Bloom filter persisted after the descriptor page.
//!
//! The filter can tell with certainty that a key is NOT in the index, which
//! lets point lookups on a stream-backed index skip every page read for
//! absent keys.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;

use bytes::{Buf, BufMut};
use siphasher::sip::SipHasher13;

use super::codec::ensure_remaining;

/// Upper bound on hash functions, keeps lookups cheap for tiny rates.
const MAX_HASHES: usize = 30;

/// A Bloom filter over index keys.
///
/// # Example
/// ```
/// use pagetree::storage::BloomFilter;
///
/// let mut filter = BloomFilter::with_rate(1000, 0.01);
/// filter.insert(&42u32);
/// assert!(filter.contains(&42u32));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: usize,
    count: usize,
}

impl BloomFilter {
    /// Creates a filter with the given number of bits and hash functions.
    pub fn new(num_bits: usize, num_hashes: usize) -> Self {
        let num_bits = num_bits.max(64);
        let num_hashes = num_hashes.clamp(1, MAX_HASHES);

        Self {
            bits: vec![0u64; num_bits.div_ceil(64)],
            num_bits,
            num_hashes,
            count: 0,
        }
    }

    /// Creates a filter sized for `expected_items` at `false_positive_rate`.
    pub fn with_rate(expected_items: usize, false_positive_rate: f64) -> Self {
        let expected_items = expected_items.max(1);
        let fp_rate = false_positive_rate.clamp(0.0001, 0.5);

        // m = -n * ln(p) / ln(2)^2
        let m = -((expected_items as f64) * fp_rate.ln() / (2.0_f64.ln().powi(2)));
        let num_bits = (m.ceil() as usize).max(64);

        // k = (m / n) * ln(2)
        let k = ((num_bits as f64 / expected_items as f64) * 2.0_f64.ln()).round() as usize;

        Self::new(num_bits, k)
    }

    pub fn insert<T: Hash + ?Sized>(&mut self, item: &T) {
        for i in 0..self.num_hashes {
            let bit = self.bit_index(item, i);
            self.bits[bit / 64] |= 1u64 << (bit % 64);
        }
        self.count += 1;
    }

    /// `false` means the item is definitely absent.
    pub fn contains<T: Hash + ?Sized>(&self, item: &T) -> bool {
        (0..self.num_hashes).all(|i| {
            let bit = self.bit_index(item, i);
            (self.bits[bit / 64] >> (bit % 64)) & 1 == 1
        })
    }

    /// Number of inserted items.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Share of bits set to one.
    pub fn fill_ratio(&self) -> f64 {
        let ones: usize = self.bits.iter().map(|w| w.count_ones() as usize).sum();
        ones as f64 / self.num_bits as f64
    }

    /// Serialized size in bytes.
    pub fn encoded_len(&self) -> usize {
        8 + 4 + 8 + self.bits.len() * 8
    }

    /// Layout: `num_bits u64 | num_hashes u32 | count u64 | words u64*`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64_le(self.num_bits as u64);
        buf.put_u32_le(self.num_hashes as u32);
        buf.put_u64_le(self.count as u64);
        for word in &self.bits {
            buf.put_u64_le(*word);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> io::Result<Self> {
        ensure_remaining(buf, 8 + 4 + 8)?;
        let num_bits = buf.get_u64_le() as usize;
        let num_hashes = buf.get_u32_le() as usize;
        let count = buf.get_u64_le() as usize;

        if num_bits < 64 || num_hashes == 0 || num_hashes > MAX_HASHES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid bloom filter shape: {} bits, {} hashes", num_bits, num_hashes),
            ));
        }

        let words = num_bits.div_ceil(64);
        ensure_remaining(buf, words * 8)?;
        let bits = (0..words).map(|_| buf.get_u64_le()).collect();

        Ok(Self {
            bits,
            num_bits,
            num_hashes,
            count,
        })
    }

    fn bit_index<T: Hash + ?Sized>(&self, item: &T, i: usize) -> usize {
        // Deterministic seeds so a persisted filter answers the same after reopening
        let seed_a = 0x517c_c1b7_2722_0a95u64.wrapping_add(i as u64);
        let seed_b = 0x0fc9_4dc6_e6eb_8a5fu64.wrapping_add(i as u64 * 2);
        let mut hasher = SipHasher13::new_with_keys(seed_a, seed_b);
        item.hash(&mut hasher);
        (hasher.finish() % self.num_bits as u64) as usize
    }
}

impl fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .field("count", &self.count)
            .field("fill_ratio", &format!("{:.2}%", self.fill_ratio() * 100.0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserted_items_are_found() {
        let mut filter = BloomFilter::new(1000, 5);
        filter.insert(&"hello");
        filter.insert(&"world");

        assert!(filter.contains(&"hello"));
        assert!(filter.contains(&"world"));
        assert_eq!(filter.count(), 2);
    }

    #[test]
    fn test_negative_lookup() {
        let mut filter = BloomFilter::with_rate(100, 0.01);
        for i in 0..100u64 {
            filter.insert(&i);
        }

        let false_positives = (1000..1100u64).filter(|i| filter.contains(i)).count();
        assert!(false_positives < 10, "too many false positives: {}", false_positives);
    }

    #[test]
    fn test_with_rate_sizing() {
        let filter = BloomFilter::with_rate(1000, 0.01);
        assert!(filter.num_bits() >= 1000);
        assert!(filter.num_hashes() >= 1);
    }

    #[test]
    fn test_encode_decode() {
        let mut filter = BloomFilter::with_rate(50, 0.05);
        for i in 0..50i64 {
            filter.insert(&i);
        }

        let mut buf = Vec::new();
        filter.encode(&mut buf);
        assert_eq!(buf.len(), filter.encoded_len());

        let decoded = BloomFilter::decode(&mut &buf[..]).unwrap();
        assert_eq!(decoded, filter);
        assert!((0..50i64).all(|i| decoded.contains(&i)));
    }

    #[test]
    fn test_decode_rejects_truncated_words() {
        let filter = BloomFilter::new(256, 3);
        let mut buf = Vec::new();
        filter.encode(&mut buf);
        buf.truncate(buf.len() - 1);

        assert!(BloomFilter::decode(&mut &buf[..]).is_err());
    }
}
