use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DatagramError, Result};

/// Width of the length field in front of every length-prefixed string.
pub const STRING_LEN_WIDTH: usize = 2;

/// Largest byte string a uint16 length prefix can describe.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width integer field, encoded little-endian on the wire.
///
/// Implemented for the eight protocol widths: `u8`/`i8` through `u64`/`i64`.
pub trait WireInt: Copy + sealed::Sealed {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Append the little-endian encoding to `dst`.
    fn put(self, dst: &mut BytesMut);

    /// Decode from the first `WIDTH` bytes of `src`.
    ///
    /// Callers guarantee `src.len() >= WIDTH`.
    fn get(src: &[u8]) -> Self;
}

macro_rules! wire_int {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl WireInt for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn put(self, dst: &mut BytesMut) {
                    dst.$put(self);
                }

                fn get(mut src: &[u8]) -> Self {
                    src.$get()
                }
            }
        )*
    };
}

wire_int! {
    u8 => put_u8, get_u8;
    i8 => put_i8, get_i8;
    u16 => put_u16_le, get_u16_le;
    i16 => put_i16_le, get_i16_le;
    u32 => put_u32_le, get_u32_le;
    i32 => put_i32_le, get_i32_le;
    u64 => put_u64_le, get_u64_le;
    i64 => put_i64_le, get_i64_le;
}

/// Decode one integer field at `offset`.
pub fn decode_int<T: WireInt>(src: &[u8], offset: usize) -> Result<T> {
    let field = take(src, offset, T::WIDTH)?;
    Ok(T::get(field))
}

/// Append a uint16 byte length followed by the raw bytes.
pub fn encode_string(bytes: &[u8], dst: &mut BytesMut) -> Result<()> {
    if bytes.len() > MAX_STRING_LEN {
        return Err(DatagramError::OversizeString { len: bytes.len() });
    }
    dst.reserve(STRING_LEN_WIDTH + bytes.len());
    dst.put_u16_le(bytes.len() as u16);
    dst.put_slice(bytes);
    Ok(())
}

/// Decode a length-prefixed byte string at `offset`.
///
/// The field occupies `STRING_LEN_WIDTH + returned.len()` bytes.
pub fn decode_string(src: &[u8], offset: usize) -> Result<&[u8]> {
    let len = decode_int::<u16>(src, offset)? as usize;
    take(src, offset + STRING_LEN_WIDTH, len)
}

fn take(src: &[u8], offset: usize, width: usize) -> Result<&[u8]> {
    let available = src.len().saturating_sub(offset);
    if available < width {
        return Err(DatagramError::EndOfData {
            offset,
            needed: width,
            available,
        });
    }
    Ok(&src[offset..offset + width])
}
