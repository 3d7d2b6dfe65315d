//! Sequential reader over an immutable byte buffer.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Byte order applied to every multi-byte read of a [`ByteCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endian {
    Little,
    Big,
}

/// A bounds-checked, forward-only reader.
///
/// The cursor borrows the buffer and never copies it; only string and array reads
/// allocate. A failed read leaves the offset where it was.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
    endian: Endian,
}

/// A fixed-width value that can be read from a [`ByteCursor`].
pub trait Primitive: Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self>;
}

macro_rules! read_fixed {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $read:ident) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.take(std::mem::size_of::<$ty>())?;
            Ok(match self.endian {
                Endian::Little => LittleEndian::$read(bytes),
                Endian::Big => BigEndian::$read(bytes),
            })
        }
    };
}

macro_rules! primitive {
    ($ty:ty, $size:expr, $read:ident, $array:ident) => {
        impl Primitive for $ty {
            const SIZE: usize = $size;

            fn read(cursor: &mut ByteCursor<'_>) -> Result<$ty> {
                cursor.$read()
            }
        }

        impl<'a> ByteCursor<'a> {
            #[doc = concat!("Reads `count` consecutive `", stringify!($ty), "` values.")]
            pub fn $array(&mut self, count: usize) -> Result<Vec<$ty>> {
                self.read_array::<$ty>(count)
            }
        }
    };
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> ByteCursor<'a> {
        ByteCursor { data, offset: 0, endian }
    }

    /// Current read offset from the start of the buffer.
    pub fn tell(&self) -> usize {
        self.offset
    }

    /// Total size of the underlying buffer.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    fn ensure(&self, wanted: usize) -> Result<()> {
        if wanted > self.remaining() {
            return Err(Error::OutOfBounds {
                offset: self.offset,
                wanted,
                len: self.data.len(),
            });
        }
        Ok(())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        self.ensure(count)?;
        let bytes = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(bytes)
    }

    /// Advances the offset by `count` bytes without decoding them.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Reads one byte and returns whether its lowest bit is set.
    ///
    /// Exporters disagree on the encoding of booleans (`0`/`1`, `'T'`/`'Y'`),
    /// bit 0 is the only thing they agree on.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? & 1 == 1)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    read_fixed!(read_i16, i16, read_i16);
    read_fixed!(read_u16, u16, read_u16);
    read_fixed!(read_i32, i32, read_i32);
    read_fixed!(read_u32, u32, read_u32);
    read_fixed!(read_f32, f32, read_f32);
    read_fixed!(read_f64, f64, read_f64);

    /// Reads a 64-bit unsigned integer as two 32-bit words.
    ///
    /// The low word comes first in little endian buffers and the high word first in
    /// big endian ones.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        let (low, high) = match self.endian {
            Endian::Little => {
                let low = self.read_u32()?;
                (low, self.read_u32()?)
            }
            Endian::Big => {
                let high = self.read_u32()?;
                (self.read_u32()?, high)
            }
        };
        Ok((u64::from(high) << 32) | u64::from(low))
    }

    /// Reads a 64-bit two's complement integer, see [`ByteCursor::read_u64`].
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Borrows the next `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }

    /// Decodes the next `count` bytes as text, embedded NULs included.
    pub fn read_string(&mut self, count: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.take(count)?).into_owned())
    }

    /// Reads `count` consecutive values of `T`.
    ///
    /// The whole array is bounds-checked before the first element is decoded, so a
    /// bogus count fails fast instead of allocating.
    pub fn read_array<T: Primitive>(&mut self, count: usize) -> Result<Vec<T>> {
        let wanted = count.checked_mul(T::SIZE).ok_or(Error::OutOfBounds {
            offset: self.offset,
            wanted: usize::MAX,
            len: self.data.len(),
        })?;
        self.ensure(wanted)?;
        let mut array = Vec::with_capacity(count);
        for _ in 0..count {
            array.push(T::read(self)?);
        }
        Ok(array)
    }
}

primitive!(bool, 1, read_bool, read_bool_array);
primitive!(u8, 1, read_u8, read_u8_array);
primitive!(i16, 2, read_i16, read_i16_array);
primitive!(u16, 2, read_u16, read_u16_array);
primitive!(i32, 4, read_i32, read_i32_array);
primitive!(u32, 4, read_u32, read_u32_array);
primitive!(i64, 8, read_i64, read_i64_array);
primitive!(u64, 8, read_u64, read_u64_array);
primitive!(f32, 4, read_f32, read_f32_array);
primitive!(f64, 8, read_f64, read_f64_array);
