//! Skeletal, visibility, material, and camera animation.
//!
//! Only version 2.0 archives are supported.
//! The sample data for every track is stored in a single shared [SsbhByteBuffer],
//! and each [AnimTrack] describes the byte range and encoding of its samples.
use binrw::{BinRead, BinReaderExt, BinResult, BinWrite};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ReadAnimError, SsbhArray, SsbhByteBuffer, SsbhString};

/// The descriptor for a single track of sample data.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, PartialEq)]
pub struct AnimTrack {
    /// The property name such as "Transform", "Visibility", or "CustomVector8".
    pub name: SsbhString,
    pub flags: TrackFlags,
    /// The number of frames stored in the sample buffer.
    pub frame_count: u32,
    pub unk3: u32,
    /// The offset in bytes into [buffer](struct.Anim.html#structfield.buffer).
    pub data_offset: u32,
    /// The size in bytes of the track data, excluding any padding.
    pub data_size: u64,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, PartialEq)]
pub struct AnimNode {
    /// The name of the bone, material, or camera being animated.
    pub name: SsbhString,
    /// Transform and visibility nodes always contain a single track.
    pub tracks: SsbhArray<AnimTrack>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, PartialEq)]
pub struct AnimGroup {
    pub group_type: GroupType,
    pub nodes: SsbhArray<AnimNode>,
}

/// A version 2.0 animation archive.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, PartialEq)]
#[br(magic = b"MINA")]
pub struct Anim {
    pub major_version: u16,
    #[br(assert(major_version == 2 && minor_version == 0))]
    pub minor_version: u16,
    /// The index of the last frame in the animation,
    /// which is calculated as `(frame_count - 1) as f32`.
    pub final_frame_index: f32,
    pub unk1: u16, // always 1
    pub unk2: u16, // always 3
    pub name: SsbhString,
    pub groups: SsbhArray<AnimGroup>,
    pub buffer: SsbhByteBuffer,
}

// The container header shared by all SSBH formats.
#[derive(BinRead, Debug)]
#[br(magic = b"HBSS")]
struct Ssbh {
    #[br(align_before = 0x10)]
    anim: Anim,
}

impl Anim {
    /// Tries to read the archive from `path`.
    /// The entire file is buffered for performance.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReadAnimError> {
        let mut file = Cursor::new(std::fs::read(path)?);
        Self::read(&mut file)
    }

    /// Tries to read the archive from `reader`.
    /// For best performance when opening from a file, use `from_file` instead.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, ReadAnimError> {
        let ssbh = reader.read_le::<Ssbh>()?;
        Ok(ssbh.anim)
    }

    /// Writes the archive to `writer`.
    /// For best performance when writing to a file, use `write_to_file` instead.
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> BinResult<()> {
        crate::export::write_anim(writer, self)
    }

    /// Writes the archive to `path`.
    /// The entire file is buffered for performance.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> BinResult<()> {
        let mut file = std::fs::File::create(path)?;
        crate::export::write_buffered(&mut file, |c| crate::export::write_anim(c, self))
    }
}

/// The data type and storage mode packed into a track's 32 bit flags.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFlags {
    pub track_type: TrackType,
    #[brw(pad_after = 2)]
    pub compression_type: CompressionType,
}

impl TrackFlags {
    /// The on disk representation with the type in the low byte and the compression in the second byte.
    /**
    ```rust
    # use nuanmb_lib::anim::{TrackFlags, TrackType, CompressionType};
    let flags = TrackFlags {
        track_type: TrackType::Transform,
        compression_type: CompressionType::Compressed,
    };
    assert_eq!(0x0401, flags.to_u32());
    ```
    */
    pub fn to_u32(self) -> u32 {
        self.track_type as u32 | (self.compression_type as u32) << 8
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(repr(u8))]
pub enum TrackType {
    Transform = 1,
    /// UV transforms for texture animations.
    Texture = 2,
    Float = 3,
    PatternIndex = 5,
    Boolean = 8,
    Vector4 = 9,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(repr(u8))]
pub enum CompressionType {
    /// Uncompressed values for every frame.
    Direct = 1,
    /// A single uncompressed transform.
    ConstTransform = 2,
    /// Quantized values packed into a bit stream.
    Compressed = 4,
    /// A single uncompressed value.
    Constant = 5,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(repr(u64))]
pub enum GroupType {
    Transform = 1,
    Visibility = 2,
    Material = 4,
    Camera = 5,
}

impl GroupType {
    /// `true` if each node stores a list of named tracks instead of exactly one track.
    pub fn has_multiple_tracks(self) -> bool {
        matches!(self, GroupType::Material | GroupType::Camera)
    }
}
