//! Binary codec for persisted keys and items.
//!
//! All integers are little-endian. Variable-length values carry a `u32`
//! length prefix.

use std::io;

use bytes::{Buf, BufMut};

/// A value that can be written into and read back from a page payload.
pub trait Codec: Sized {
    /// Append the encoded value to `buf`.
    fn encode(&self, buf: &mut impl BufMut);

    /// Read a value from the front of `buf`.
    ///
    /// # Errors
    /// Returns `InvalidData` if the buffer is truncated or malformed.
    fn decode(buf: &mut impl Buf) -> io::Result<Self>;
}

/// Fail with `InvalidData` unless `buf` still holds `needed` bytes.
pub fn ensure_remaining(buf: &impl Buf, needed: usize) -> io::Result<()> {
    if buf.remaining() < needed {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("truncated payload: {} < {}", buf.remaining(), needed),
        ));
    }
    Ok(())
}

macro_rules! impl_int_codec {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl Codec for $ty {
                #[inline]
                fn encode(&self, buf: &mut impl BufMut) {
                    buf.$put(*self);
                }

                #[inline]
                fn decode(buf: &mut impl Buf) -> io::Result<Self> {
                    ensure_remaining(buf, std::mem::size_of::<$ty>())?;
                    Ok(buf.$get())
                }
            }
        )*
    };
}

impl_int_codec! {
    u8 => put_u8, get_u8;
    i8 => put_i8, get_i8;
    u16 => put_u16_le, get_u16_le;
    i16 => put_i16_le, get_i16_le;
    u32 => put_u32_le, get_u32_le;
    i32 => put_i32_le, get_i32_le;
    u64 => put_u64_le, get_u64_le;
    i64 => put_i64_le, get_i64_le;
}

impl Codec for bool {
    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(*self as u8);
    }

    fn decode(buf: &mut impl Buf) -> io::Result<Self> {
        match u8::decode(buf)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid bool byte {}", other),
            )),
        }
    }
}

impl Codec for Vec<u8> {
    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.len() as u32);
        buf.put_slice(self);
    }

    fn decode(buf: &mut impl Buf) -> io::Result<Self> {
        let len = u32::decode(buf)? as usize;
        ensure_remaining(buf, len)?;
        let mut out = vec![0u8; len];
        buf.copy_to_slice(&mut out);
        Ok(out)
    }
}

impl Codec for String {
    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.len() as u32);
        buf.put_slice(self.as_bytes());
    }

    fn decode(buf: &mut impl Buf) -> io::Result<Self> {
        let bytes = Vec::<u8>::decode(buf)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl<A: Codec, B: Codec> Codec for (A, B) {
    fn encode(&self, buf: &mut impl BufMut) {
        self.0.encode(buf);
        self.1.encode(buf);
    }

    fn decode(buf: &mut impl Buf) -> io::Result<Self> {
        Ok((A::decode(buf)?, B::decode(buf)?))
    }
}
