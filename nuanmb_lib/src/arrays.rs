use binrw::{
    io::{Read, Seek, SeekFrom},
    BinRead, BinResult, ReadOptions,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::absolute_offset_checked;

// Group, node, and track tables are small.
// Larger counts are still read but grow the allocation as elements are read.
const MAX_INITIAL_TABLE_LEN: usize = 1024;

// 100 MB
const MAX_INITIAL_BUFFER_LEN: usize = 104857600;

/// The shared sample buffer for every track in the archive.
/// This reads the bytes in a single call instead of element by element like `SsbhArray<u8>`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct SsbhByteBuffer {
    pub elements: Vec<u8>,
}

impl SsbhByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(elements: Vec<u8>) -> Self {
        Self { elements }
    }
}

impl From<Vec<u8>> for SsbhByteBuffer {
    fn from(elements: Vec<u8>) -> Self {
        Self { elements }
    }
}

impl BinRead for SsbhByteBuffer {
    type Args = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        options: &ReadOptions,
        _args: Self::Args,
    ) -> BinResult<Self> {
        with_table(reader, options, |reader, _, size| {
            let mut elements = Vec::with_capacity((size as usize).min(MAX_INITIAL_BUFFER_LEN));
            let bytes_read = reader.take(size).read_to_end(&mut elements)?;
            if bytes_read as u64 == size {
                Ok(Self { elements })
            } else {
                Err(binrw::Error::AssertFail {
                    pos: reader.stream_position()?,
                    message: format!(
                        "Expected a buffer of {size} bytes but only {bytes_read} bytes remain."
                    ),
                })
            }
        })
    }
}

/// A table stored as a self-relative offset followed by a u64 element count.
/// Every group, node, and track table in an archive uses this layout.
/**
```rust
use binrw::BinRead;
use nuanmb_lib::{SsbhArray, Vector3};

#[derive(BinRead)]
struct Keys {
    positions: SsbhArray<Vector3>,
}
```
 */
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SsbhArray<T> {
    pub elements: Vec<T>,
}

impl<T> Default for SsbhArray<T> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
        }
    }
}

impl<T> SsbhArray<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /**
    ```rust
    # use nuanmb_lib::SsbhArray;
    let array = SsbhArray::from_vec(vec![1u64, 2u64]);
    assert_eq!(2, array.elements.len());
    ```
    */
    pub fn from_vec(elements: Vec<T>) -> Self {
        Self { elements }
    }
}

impl<T> From<Vec<T>> for SsbhArray<T> {
    fn from(elements: Vec<T>) -> Self {
        Self { elements }
    }
}

impl<T> FromIterator<T> for SsbhArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<T: BinRead<Args = ()>> BinRead for SsbhArray<T> {
    type Args = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        options: &ReadOptions,
        _args: Self::Args,
    ) -> BinResult<Self> {
        with_table(reader, options, |reader, options, count| {
            let mut elements = Vec::with_capacity((count as usize).min(MAX_INITIAL_TABLE_LEN));
            for _ in 0..count {
                elements.push(T::read_options(reader, options, ())?);
            }
            Ok(Self { elements })
        })
    }
}

/// Reads the offset and count at the current position, calls `read` at the resolved offset,
/// and continues after the count field.
fn with_table<R, F, T>(reader: &mut R, options: &ReadOptions, read: F) -> BinResult<T>
where
    R: Read + Seek,
    F: FnOnce(&mut R, &ReadOptions, u64) -> BinResult<T>,
{
    let field_pos = reader.stream_position()?;
    let relative_offset = u64::read_options(reader, options, ())?;
    let count = u64::read_options(reader, options, ())?;
    let end_pos = reader.stream_position()?;

    reader.seek(SeekFrom::Start(absolute_offset_checked(
        field_pos,
        relative_offset,
    )?))?;
    let result = read(reader, options, count);
    reader.seek(SeekFrom::Start(end_pos))?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use binrw::io::Cursor;
    use binrw::BinReaderExt;
    use hexlit::hex;

    #[test]
    fn collect_ssbh_array() {
        let array: SsbhArray<u64> = (1..=3).collect();
        assert_eq!(vec![1, 2, 3], array.elements);
    }

    #[test]
    fn read_group_types() {
        let mut reader = Cursor::new(hex!(
            10000000 00000000 02000000 00000000 // offset, count
            01000000 00000000 05000000 00000000 // elements
        ));
        let value = reader.read_le::<SsbhArray<u64>>().unwrap();
        assert_eq!(vec![1u64, 5u64], value.elements);

        // Reading continues after the count.
        assert_eq!(16, reader.position());
    }

    #[test]
    fn read_empty_table() {
        let mut reader = Cursor::new(hex!(
            10000000 00000000 00000000 00000000 // offset, count
            AABBCCDD
        ));
        let value = reader.read_le::<SsbhArray<u32>>().unwrap();
        assert!(value.elements.is_empty());
        assert_eq!(0xDDCCBBAAu32, reader.read_le::<u32>().unwrap());
    }

    #[test]
    fn read_table_count_past_end() {
        let mut reader = Cursor::new(hex!(
            10000000 00000000 FFFFFFFF FFFFFFFF // offset, count
            01000000
        ));
        assert!(reader.read_le::<SsbhArray<u32>>().is_err());
    }

    #[test]
    fn read_table_offset_overflow() {
        let mut reader = Cursor::new(hex!(
            FFFFFFFF FFFFFFFF 01000000 00000000 // offset, count
        ));
        assert!(reader.read_le::<SsbhArray<u8>>().is_err());
    }

    #[test]
    fn read_sample_buffer() {
        let mut reader = Cursor::new(hex!(
            10000000 00000000 05000000 00000000 // offset, size
            01000001 01
        ));
        let value = reader.read_le::<SsbhByteBuffer>().unwrap();
        assert_eq!(vec![1u8, 0u8, 0u8, 1u8, 1u8], value.elements);
        assert_eq!(16, reader.position());
    }

    #[test]
    fn read_sample_buffer_size_past_end() {
        let mut reader = Cursor::new(hex!(
            10000000 00000000 08000000 00000000 // offset, size
            01020304
        ));
        let result = reader.read_le::<SsbhByteBuffer>();
        assert!(matches!(
            result,
            Err(binrw::Error::AssertFail { pos: 20, message })
                if message == "Expected a buffer of 8 bytes but only 4 bytes remain."
        ));
    }
}
