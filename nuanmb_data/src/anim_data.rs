//! Types for working with [Anim] data in .nuanmb files.
//!
//! # Examples
//! Animation data is organized into groups of nodes, and each node contains named tracks.
//! Transform and visibility nodes always have exactly one track.
/*!
```rust no_run
# fn main() -> Result<(), Box<dyn std::error::Error>> {
use nuanmb_data::prelude::*;

let data = AnimData::from_file("model.nuanmb")?;

for group in &data.groups {
    for node in &group.nodes {
        for track in &node.tracks {
            println!("{:?} {} {} {}", group.group_type, node.name, track.name, track.values.len());
        }
    }
}
# Ok(()) }
```
 */
//!
//! # File Differences
//! Track values are decoded into frames when reading and reencoded when saving.
//! Compressed transforms are quantized using an error tolerance,
//! so saving a file may change values by up to [EncodeSettings::epsilon].
//! The storage mode for each track is chosen from the values instead of preserved from the file.
use binrw::io::{Seek, Write};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;

use nuanmb_lib::anim::{Anim, AnimGroup, AnimNode, AnimTrack, TrackFlags, TrackType};
use nuanmb_lib::ReadAnimError;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use nuanmb_lib::{anim::GroupType, Vector3, Vector4};

mod bitutils;
mod buffers;
mod compression;
mod quantize;

pub use bitutils::BitReadError;
pub use quantize::{ChannelQuantizer, QuantizeError, DEFAULT_EPSILON};

use buffers::read_track_values;

use crate::SsbhData;

// Each track's data starts at a multiple of this many bytes in the buffer.
const TRACK_DATA_ALIGNMENT: u64 = 0x64;

/// The data associated with an [Anim] file.
/// Only version 2.0 is supported.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AnimData {
    /// The name stored in the file header.
    pub name: String,
    /// The index of the last frame in the animation,
    /// which is calculated as `(frame_count - 1) as f32`.
    ///
    /// Constant tracks will repeat their value for final_frame_index + 1 many frames.
    pub final_frame_index: f32,
    pub groups: Vec<GroupData>,
}

impl SsbhData for AnimData {
    type Error = AnimError;

    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AnimError> {
        Anim::from_file(path)?.try_into()
    }

    fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, AnimError> {
        Anim::read(reader)?.try_into()
    }

    fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<(), AnimError> {
        self.write_with_context(writer, &mut ArchiveContext::default())
    }

    fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), AnimError> {
        self.write_to_file_with_context(path, &mut ArchiveContext::default())
    }
}

impl AnimData {
    /// Converts the data and writes to the given `writer` using the settings in `ctx`.
    /// Any warnings while encoding tracks are added to `ctx`.
    /**
    ```rust
    # use nuanmb_data::anim_data::{AnimData, ArchiveContext, EncodeSettings};
    let data = AnimData {
        name: "wait.nuanmb".to_string(),
        final_frame_index: 0.0,
        groups: Vec::new(),
    };

    let mut ctx = ArchiveContext::new(EncodeSettings {
        compress_transforms: false,
        ..Default::default()
    });
    let mut writer = std::io::Cursor::new(Vec::new());
    data.write_with_context(&mut writer, &mut ctx).unwrap();
    assert!(ctx.warnings().is_empty());
    ```
     */
    pub fn write_with_context<W: Write + Seek>(
        &self,
        writer: &mut W,
        ctx: &mut ArchiveContext,
    ) -> Result<(), AnimError> {
        create_anim(self, ctx)?.write(writer)?;
        Ok(())
    }

    /// Converts the data and writes to the given `path` using the settings in `ctx`.
    /// The entire file is buffered for performance.
    pub fn write_to_file_with_context<P: AsRef<Path>>(
        &self,
        path: P,
        ctx: &mut ArchiveContext,
    ) -> Result<(), AnimError> {
        create_anim(self, ctx)?.write_to_file(path)?;
        Ok(())
    }
}

impl TryFrom<Anim> for AnimData {
    type Error = AnimError;

    fn try_from(anim: Anim) -> Result<Self, Self::Error> {
        (&anim).try_into()
    }
}

impl TryFrom<&Anim> for AnimData {
    type Error = AnimError;

    fn try_from(anim: &Anim) -> Result<Self, Self::Error> {
        Ok(Self {
            name: anim.name.to_string_lossy(),
            final_frame_index: anim.final_frame_index,
            groups: read_anim_groups(anim)?,
        })
    }
}

impl TryFrom<&AnimData> for Anim {
    type Error = AnimError;

    fn try_from(data: &AnimData) -> Result<Self, Self::Error> {
        create_anim(data, &mut ArchiveContext::default())
    }
}

/// Errors while converting between [Anim] and [AnimData].
#[derive(Error, Debug)]
pub enum AnimError {
    /// The track's type can't be decoded or encoded.
    #[error(
        "Tracks of type {:?} with compression {:?} are not supported.",
        flags.track_type,
        flags.compression_type
    )]
    UnsupportedTrack { flags: TrackFlags },

    /// A node in a transform or visibility group doesn't have exactly one track.
    #[error(
        "Node {:?} in a {:?} group has {} tracks but must have exactly 1 track.",
        node_name,
        group_type,
        track_count
    )]
    InvalidTrackCount {
        node_name: String,
        group_type: GroupType,
        track_count: usize,
    },

    /// The final frame index is negative or smaller than the
    /// index of the final frame in the longest track.
    #[error(
        "Final frame index {} must be non negative and at least as large as the index of the final frame in the longest track.",
        final_frame_index
    )]
    InvalidFinalFrameIndex { final_frame_index: f32 },

    /// A track or compressed data range extends past the end of its buffer.
    #[error(
        "Data of size {} at offset {} is out of range for a buffer of size {}.",
        size,
        offset,
        buffer_size
    )]
    DataOutOfRange {
        offset: usize,
        size: usize,
        buffer_size: usize,
    },

    /// The track's frame count differs from the frame count in its compressed header.
    #[error(
        "Expected {} frames but the compressed header has {} frames.",
        frame_count,
        compressed_frame_count
    )]
    FrameCountMismatch {
        frame_count: usize,
        compressed_frame_count: u32,
    },

    /// A track has more frames than the animation.
    #[error(
        "Track {:?} has {} frames but the final frame index is {}.",
        track_name,
        frame_count,
        final_frame_index
    )]
    FrameCountOutOfRange {
        track_name: String,
        frame_count: u32,
        final_frame_index: f32,
    },

    /// A count or offset is too large for its 32 bit field.
    #[error("The {} {} does not fit in 32 bits.", field, value)]
    FieldOverflow { field: &'static str, value: u64 },

    /// An error occurred while reading compressed data from a buffer.
    #[error(transparent)]
    BitRead(#[from] BitReadError),

    /// An error occurred while writing data to a buffer.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error occurred while reading or writing binary data.
    #[error(transparent)]
    BinRead(#[from] binrw::Error),
}

impl From<ReadAnimError> for AnimError {
    fn from(e: ReadAnimError) -> Self {
        match e {
            ReadAnimError::BinRead(e) => Self::BinRead(e),
            ReadAnimError::Io(e) => Self::Io(e),
        }
    }
}

/// Options for encoding track values.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeSettings {
    /// Quantize transform tracks into a compressed bit stream when `true`.
    /// Transform tracks are stored uncompressed when `false`.
    pub compress_transforms: bool,
    /// The largest allowed difference between a compressed value and the original value.
    pub epsilon: f64,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            compress_transforms: true,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// A recoverable issue encountered while encoding a track.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeWarning {
    /// NaN values were replaced with 0.0 before compressing.
    NanSubstituted {
        /// The node and track name such as `"ArmL/Transform"`.
        track: String,
        count: usize,
    },
    /// The values couldn't be compressed within the error tolerance and were stored uncompressed.
    CompressionFallback { track: String, reason: String },
}

impl fmt::Display for EncodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeWarning::NanSubstituted { track, count } => {
                write!(f, "Replaced {count} NaN values with 0.0 in track {track:?}.")
            }
            EncodeWarning::CompressionFallback { track, reason } => {
                write!(f, "Track {track:?} was written uncompressed. {reason}")
            }
        }
    }
}

/// The settings and collected warnings for a single encoding operation.
#[derive(Debug, Default)]
pub struct ArchiveContext {
    pub settings: EncodeSettings,
    warnings: Vec<EncodeWarning>,
}

impl ArchiveContext {
    pub fn new(settings: EncodeSettings) -> Self {
        Self {
            settings,
            warnings: Vec::new(),
        }
    }

    /// The warnings from all encoding operations using this context in order.
    pub fn warnings(&self) -> &[EncodeWarning] {
        &self.warnings
    }

    pub(crate) fn warn(&mut self, warning: EncodeWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Converts a count or offset to its 32 bit field.
pub(crate) fn u32_field(field: &'static str, value: u64) -> Result<u32, AnimError> {
    u32::try_from(value).map_err(|_| AnimError::FieldOverflow { field, value })
}

fn create_anim(data: &AnimData, ctx: &mut ArchiveContext) -> Result<Anim, AnimError> {
    let max_frame_count = data
        .groups
        .iter()
        .flat_map(|g| g.nodes.iter())
        .flat_map(|n| n.tracks.iter())
        .map(|t| t.values.len())
        .max()
        .unwrap_or(0);

    // Make sure the final frame index is at least as large as the final frame of the longest track.
    if !(data.final_frame_index >= 0.0
        && data.final_frame_index >= max_frame_count as f32 - 1.0)
    {
        return Err(AnimError::InvalidFinalFrameIndex {
            final_frame_index: data.final_frame_index,
        });
    }

    // Tracks are encoded in group, node, track order into a single buffer.
    let mut buffer = Cursor::new(Vec::new());

    let groups = data
        .groups
        .iter()
        .map(|g| create_anim_group(g, &mut buffer, ctx))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Anim {
        major_version: 2,
        minor_version: 0,
        final_frame_index: data.final_frame_index,
        unk1: 1,
        unk2: 3,
        name: data.name.as_str().into(),
        groups: groups.into(),
        buffer: buffer.into_inner().into(),
    })
}

fn create_anim_group(
    g: &GroupData,
    buffer: &mut Cursor<Vec<u8>>,
    ctx: &mut ArchiveContext,
) -> Result<AnimGroup, AnimError> {
    Ok(AnimGroup {
        group_type: g.group_type,
        nodes: g
            .nodes
            .iter()
            .map(|n| create_anim_node(n, g.group_type, buffer, ctx))
            .collect::<Result<Vec<_>, _>>()?
            .into(),
    })
}

fn create_anim_node(
    n: &NodeData,
    group_type: GroupType,
    buffer: &mut Cursor<Vec<u8>>,
    ctx: &mut ArchiveContext,
) -> Result<AnimNode, AnimError> {
    if !group_type.has_multiple_tracks() && n.tracks.len() != 1 {
        return Err(AnimError::InvalidTrackCount {
            node_name: n.name.clone(),
            group_type,
            track_count: n.tracks.len(),
        });
    }

    Ok(AnimNode {
        name: n.name.as_str().into(),
        tracks: n
            .tracks
            .iter()
            .map(|t| create_anim_track(buffer, &n.name, t, ctx))
            .collect::<Result<Vec<_>, _>>()?
            .into(),
    })
}

fn create_anim_track(
    buffer: &mut Cursor<Vec<u8>>,
    node_name: &str,
    t: &TrackData,
    ctx: &mut ArchiveContext,
) -> Result<AnimTrack, AnimError> {
    // The offsets assume the hierarchy (group -> node -> track) is traversed in order.
    let pos_before = buffer.stream_position()?;

    let encoded = t
        .values
        .write(buffer, &format!("{}/{}", node_name, t.name), ctx)?;

    let pos_after = buffer.stream_position()?;

    // The padding isn't included in the track's data size.
    let padding = (TRACK_DATA_ALIGNMENT - pos_after % TRACK_DATA_ALIGNMENT) % TRACK_DATA_ALIGNMENT;
    buffer.write_all(&vec![0u8; padding as usize])?;

    Ok(AnimTrack {
        name: t.name.as_str().into(),
        flags: TrackFlags {
            track_type: t.values.track_type(),
            compression_type: encoded.compression_type,
        },
        frame_count: encoded.frame_count,
        unk3: 0,
        data_offset: u32_field("data offset", pos_before)?,
        data_size: pos_after - pos_before,
    })
}

fn read_anim_groups(anim: &Anim) -> Result<Vec<GroupData>, AnimError> {
    anim.groups
        .elements
        .iter()
        .map(|g| read_group_data(g, anim))
        .collect()
}

fn read_group_data(g: &AnimGroup, anim: &Anim) -> Result<GroupData, AnimError> {
    Ok(GroupData {
        group_type: g.group_type,
        nodes: g
            .nodes
            .elements
            .iter()
            .map(|n| read_node_data(n, anim))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

fn read_node_data(n: &AnimNode, anim: &Anim) -> Result<NodeData, AnimError> {
    Ok(NodeData {
        name: n.name.to_string_lossy(),
        tracks: n
            .tracks
            .elements
            .iter()
            .map(|t| create_track_data(t, anim))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

fn create_track_data(anim_track: &AnimTrack, anim: &Anim) -> Result<TrackData, AnimError> {
    // Tracks can't have more frames than the animation.
    let final_frame_index = anim.final_frame_index;
    if !(anim_track.frame_count as f64 <= final_frame_index as f64 + 1.0) {
        return Err(AnimError::FrameCountOutOfRange {
            track_name: anim_track.name.to_string_lossy(),
            frame_count: anim_track.frame_count,
            final_frame_index,
        });
    }

    let anim_buffer = &anim.buffer.elements;
    let offset = anim_track.data_offset as usize;
    let size = anim_track.data_size as usize;

    let out_of_range = || AnimError::DataOutOfRange {
        offset,
        size,
        buffer_size: anim_buffer.len(),
    };
    let end = offset.checked_add(size).ok_or_else(out_of_range)?;
    let buffer = anim_buffer.get(offset..end).ok_or_else(out_of_range)?;

    let values = read_track_values(buffer, anim_track.flags, anim_track.frame_count as usize)?;
    Ok(TrackData {
        name: anim_track.name.to_string_lossy(),
        values,
    })
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GroupData {
    /// The usage type for all the [NodeData] in [nodes](#structfield.nodes)
    pub group_type: GroupType,
    pub nodes: Vec<NodeData>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// The name of the bone, material, or camera to animate.
    pub name: String,
    /// Transform and visibility nodes have exactly one track.
    /// Material and camera nodes have a track for each animated property.
    pub tracks: Vec<TrackData>,
}

/// The data associated with an [AnimTrack].
///
/// # Examples
/**
```rust
use nuanmb_data::anim_data::{TrackData, TrackValues, Transform};

let track = TrackData {
    name: "Transform".to_string(),
    values: TrackValues::Transform(vec![Transform::IDENTITY]),
};
```
 */
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TrackData {
    /// The name of the property to animate.
    pub name: String,

    /// The frame values for the property specified by [name](#structfield.name).
    ///
    /// Each element in the [TrackValues] provides the value for a single frame.
    /// If the [TrackValues] contains a single element, this track will be considered constant
    /// and repeat that element for each frame in the animation
    /// up to and including [final_frame_index](struct.AnimData.html#structfield.final_frame_index).
    pub values: TrackValues,
}

/// A decomposed transformation consisting of a scale, rotation, and translation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Transform {
    /// XYZ scale
    pub scale: Vector3,
    /// An XYZW unit quaternion where XYZ represent the axis component
    /// and w represents the angle component.
    pub rotation: Vector4,
    /// XYZ translation
    pub translation: Vector3,
}

impl Transform {
    /// An identity transformation representing no scale, rotation, or translation.
    pub const IDENTITY: Transform = Transform {
        scale: Vector3::new(1.0, 1.0, 1.0),
        rotation: Vector4::new(0.0, 0.0, 0.0, 1.0),
        translation: Vector3::ZERO,
    };
}

/// A value collection with an element for each frame of the animation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum TrackValues {
    /// Transformations used for camera or skeletal animations.
    Transform(Vec<Transform>),
    /// Animated scalar parameter values.
    Float(Vec<f32>),
    /// Visibility animations or animated boolean parameters.
    Boolean(Vec<bool>),
    /// Material animations or animated vector parameters.
    Vector4(Vec<Vector4>),
}

impl TrackValues {
    /// Returns the number of elements, which is equivalent to the number of frames.
    /// # Examples
    /**
    ```rust
    # use nuanmb_data::anim_data::TrackValues;
    assert_eq!(3, TrackValues::Boolean(vec![true, false, true]).len());
    ```
     */
    pub fn len(&self) -> usize {
        match self {
            TrackValues::Transform(v) => v.len(),
            TrackValues::Float(v) => v.len(),
            TrackValues::Boolean(v) => v.len(),
            TrackValues::Vector4(v) => v.len(),
        }
    }

    /// Returns `true` there are no elements.
    /**
    ```rust
    # use nuanmb_data::anim_data::TrackValues;
    assert!(TrackValues::Transform(Vec::new()).is_empty());
    ```
     */
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn track_type(&self) -> TrackType {
        match self {
            TrackValues::Transform(_) => TrackType::Transform,
            TrackValues::Float(_) => TrackType::Float,
            TrackValues::Boolean(_) => TrackType::Boolean,
            TrackValues::Vector4(_) => TrackType::Vector4,
        }
    }
}
