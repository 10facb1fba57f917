//! # nuanmb_lib
//!
//! nuanmb_lib reads and writes the SSBH animation archive format (`.nuanmb`, magic `MINA`).
//!
//! The types in [anim] fully represent the descriptor tables stored in the file.
//! Strongly typed wrappers such as [RelPtr64], [SsbhString], and [SsbhArray] replace
//! the raw [u64] offsets so every offset is resolved relative to its own position.
//!
//! Decoding and encoding the sample buffer is handled by the `nuanmb_data` crate.
/*!
```no_run
use nuanmb_lib::anim::Anim;

# fn main() -> Result<(), Box<dyn std::error::Error>> {
let anim = Anim::from_file("a00wait1.nuanmb")?;
for group in &anim.groups.elements {
    println!("{:?}: {} nodes", group.group_type, group.nodes.elements.len());
}
anim.write_to_file("a00wait1_new.nuanmb")?;
# Ok(())
# }
```
 */
pub mod anim;
mod arrays;
mod export;
mod strings;
mod vectors;

pub use arrays::{SsbhArray, SsbhByteBuffer};
pub use strings::SsbhString;
pub use vectors::{Vector3, Vector4};

use binrw::{
    io::{Read, Seek, SeekFrom},
    BinRead, BinResult, ReadOptions,
};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors while reading an animation archive.
#[derive(Debug, Error)]
pub enum ReadAnimError {
    /// The data did not match the expected layout.
    /// This includes invalid magic, unsupported versions, and offsets outside the file.
    #[error(transparent)]
    BinRead(#[from] binrw::Error),

    /// An error occurred while trying to read the file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A 64 bit file pointer relative to the start of the pointer type.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone)]
#[repr(transparent)]
pub struct RelPtr64<T>(Option<T>);

impl<T> RelPtr64<T> {
    /// Creates a relative offset for `value` that is not null.
    pub fn new(value: T) -> Self {
        Self(Some(value))
    }

    /// Creates a relative offset for a null value.
    pub fn null() -> Self {
        Self(None)
    }
}

impl<T> From<Option<T>> for RelPtr64<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Self::new(v),
            None => Self::null(),
        }
    }
}

impl<T: BinRead<Args = ()>> BinRead for RelPtr64<T> {
    type Args = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        options: &ReadOptions,
        _args: Self::Args,
    ) -> BinResult<Self> {
        let pos_before_read = reader.stream_position()?;

        let relative_offset = u64::read_options(reader, options, ())?;
        if relative_offset == 0 {
            return Ok(Self(None));
        }

        let saved_pos = reader.stream_position()?;

        let seek_pos = absolute_offset_checked(pos_before_read, relative_offset)?;
        reader.seek(SeekFrom::Start(seek_pos))?;
        let value = T::read_options(reader, options, ())?;

        reader.seek(SeekFrom::Start(saved_pos))?;

        Ok(Self(Some(value)))
    }
}

impl<T> core::ops::Deref for RelPtr64<T> {
    type Target = Option<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Resolves a self-relative offset stored at `position`.
pub(crate) fn absolute_offset_checked(position: u64, relative_offset: u64) -> BinResult<u64> {
    position
        .checked_add(relative_offset)
        .ok_or_else(|| binrw::Error::AssertFail {
            pos: position,
            message: format!(
                "Overflow occurred while computing relative offset {relative_offset} at position {position}."
            ),
        })
}

pub(crate) fn round_up(value: u64, n: u64) -> u64 {
    // Find the next largest multiple of n.
    ((value + n - 1) / n) * n
}
