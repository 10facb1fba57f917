//! # nuanmb_data
//!
//! nuanmb_data provides a more intuitive and minimal API for animation archives built on nuanmb_lib.
//!
//! ## Features
//! - Automatic decoding and encoding of track data and compressed transforms
//! - Usage of standard Rust types like [Vec] and [String]
//! - Errors for invalid data such as out of range track offsets
//! - Configurable compression error tolerance with warnings collected in an [ArchiveContext](crate::anim_data::ArchiveContext)
//!
//! ## Getting Started
//! The easiest way to access important items like [AnimData](crate::anim_data::AnimData) is to import the [prelude].
//! For additional reading and writing options, see the [SsbhData] trait.
/*!
```no_run
use nuanmb_data::prelude::*;

# fn main() -> Result<(), Box<dyn std::error::Error>> {
// Read the file from disk.
let mut data = AnimData::from_file("a00wait1.nuanmb")?;
// Make some edits.
data.final_frame_index += 10.0;
// Save the changes.
data.write_to_file("a00wait1_new.nuanmb")?;
# Ok(())
# }
```
 */
//!
//! ## File Differences
//! Decoding and reencoding the track data means that an unmodified file
//! is not guaranteed to be binary identical after saving.
//! Compressed values are requantized, and storage modes are chosen from the values.
//! Applications needing all data preserved should use nuanmb_lib instead.
pub mod anim_data;

use std::error::Error;
use std::io::{Read, Seek, Write};
use std::path::Path;

/// Functions for reading and writing supported formats.
pub trait SsbhData: Sized {
    type Error: Error;

    /// Tries to read and convert the data from `path`.
    /// The entire file is buffered for performance.
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error>;

    /// Tries to read and convert the data from `reader`.
    /// For best performance when opening from a file, use [SsbhData::from_file] instead.
    fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, Self::Error>;

    /// Converts the data and writes to the given `writer`.
    /// For best performance when writing to a file, use [SsbhData::write_to_file] instead.
    fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<(), Self::Error>;

    /// Converts the data and writes to the given `path`.
    /// The entire file is buffered for performance.
    fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Self::Error>;
}

/// Common imports for top level types and important traits.
pub mod prelude {
    pub use crate::anim_data::{AnimData, ArchiveContext, EncodeSettings};
    pub use crate::SsbhData;
}

#[cfg(test)]
pub(crate) fn group_hex(a: &str, words_per_line: usize) -> String {
    use itertools::Itertools;

    // ex: "FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF..."
    let words = a
        .chars()
        .collect::<Vec<char>>()
        .chunks(8)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<String>>();

    words.chunks(words_per_line).map(|c| c.join(" ")).join("\n")
}

#[cfg(test)]
macro_rules! assert_hex_eq {
    ($a:expr, $b:expr) => {
        assert!(
            $a == $b,
            "\n{} !=\n{}",
            crate::group_hex(&hex::encode($a), 8),
            crate::group_hex(&hex::encode($b), 8)
        )
    };
}

#[cfg(test)]
pub(crate) use assert_hex_eq;
