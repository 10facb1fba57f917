use binrw::{BinRead, BinReaderExt, BinResult, BinWriterExt};
use itertools::Itertools;
use std::io::{Cursor, Read, Seek, Write};

use nuanmb_lib::anim::{CompressionType, TrackFlags, TrackType};
use nuanmb_lib::Vector4;

use super::compression::{
    nan_count, read_compressed, replace_nan, write_compressed_transforms, TransformQuantizers,
    UncompressedTransform,
};
use super::{u32_field, AnimError, ArchiveContext, EncodeWarning, TrackValues, Transform};

/// The storage mode and frame count chosen when encoding a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EncodedTrack {
    pub compression_type: CompressionType,
    pub frame_count: u32,
}

impl EncodedTrack {
    fn new(compression_type: CompressionType, frame_count: usize) -> Result<Self, AnimError> {
        Ok(Self {
            compression_type,
            frame_count: u32_field("frame count", frame_count as u64)?,
        })
    }
}

impl TrackValues {
    /// Encodes the values to `writer` using the storage mode determined by the values and settings in `ctx`.
    /// Compressed tracks that can't meet the error tolerance are written uncompressed instead.
    pub(crate) fn write<W: Write + Seek>(
        &self,
        writer: &mut W,
        track_name: &str,
        ctx: &mut ArchiveContext,
    ) -> Result<EncodedTrack, AnimError> {
        let compression_type = infer_compression_type(self, ctx.settings.compress_transforms);

        let encoded = match self {
            TrackValues::Transform(values) => match compression_type {
                CompressionType::ConstTransform => {
                    // Identical frames only need a single record.
                    let values: Vec<_> = values
                        .iter()
                        .take(1)
                        .map(UncompressedTransform::from)
                        .collect();
                    writer.write_le(&values)?;
                    EncodedTrack::new(compression_type, values.len())?
                }
                CompressionType::Compressed => {
                    write_transforms_compressed(writer, values, track_name, ctx)?
                }
                _ => {
                    write_transforms(writer, values)?;
                    EncodedTrack::new(compression_type, values.len())?
                }
            },
            TrackValues::Float(values) => {
                writer.write_le(values)?;
                EncodedTrack::new(compression_type, values.len())?
            }
            TrackValues::Boolean(values) => {
                let bytes: Vec<u8> = values.iter().map(|v| u8::from(*v)).collect();
                writer.write_le(&bytes)?;
                EncodedTrack::new(compression_type, values.len())?
            }
            TrackValues::Vector4(values) => {
                writer.write_le(values)?;
                EncodedTrack::new(compression_type, values.len())?
            }
        };

        log::debug!(
            "Encoded track {:?} as {:?} with {} frames.",
            track_name,
            encoded.compression_type,
            encoded.frame_count
        );

        Ok(encoded)
    }
}

/// Chooses the storage mode for `values`.
/// The mode depends only on the values and whether transform compression is enabled.
pub(crate) fn infer_compression_type(
    values: &TrackValues,
    compress_transforms: bool,
) -> CompressionType {
    match values {
        // Tracks with identical frames use a special compression type.
        TrackValues::Transform(values) => {
            if values.iter().all_equal() {
                CompressionType::ConstTransform
            } else if compress_transforms {
                CompressionType::Compressed
            } else {
                CompressionType::Direct
            }
        }
        _ => {
            if values.len() <= 1 {
                CompressionType::Constant
            } else {
                CompressionType::Direct
            }
        }
    }
}

fn write_transforms<W: Write + Seek>(writer: &mut W, values: &[Transform]) -> BinResult<()> {
    let values: Vec<_> = values.iter().map(UncompressedTransform::from).collect();
    writer.write_le(&values)
}

fn write_transforms_compressed<W: Write + Seek>(
    writer: &mut W,
    values: &[Transform],
    track_name: &str,
    ctx: &mut ArchiveContext,
) -> Result<EncodedTrack, AnimError> {
    // NaN is replaced with 0.0 whether or not compression succeeds.
    let count = nan_count(values);
    if count > 0 {
        ctx.warn(EncodeWarning::NanSubstituted {
            track: track_name.to_string(),
            count,
        });
    }

    match TransformQuantizers::fit(values, ctx.settings.epsilon) {
        Ok(quantizers) => {
            write_compressed_transforms(writer, values, &quantizers)?;
            EncodedTrack::new(CompressionType::Compressed, values.len())
        }
        Err(e) => {
            ctx.warn(EncodeWarning::CompressionFallback {
                track: track_name.to_string(),
                reason: e.to_string(),
            });

            let values = values.iter().map(replace_nan).collect_vec();
            write_transforms(writer, &values)?;
            EncodedTrack::new(CompressionType::Direct, values.len())
        }
    }
}

fn read_uncompressed<R: Read + Seek, T: BinRead<Args = ()>>(
    reader: &mut R,
    frame_count: usize,
) -> BinResult<Vec<T>> {
    let mut values = Vec::new();
    for _ in 0..frame_count {
        let value: T = reader.read_le()?;
        values.push(value);
    }
    Ok(values)
}

/// Decodes `count` many frames from `track_data` based on the type and compression in `flags`.
pub(crate) fn read_track_values(
    track_data: &[u8],
    flags: TrackFlags,
    count: usize,
) -> Result<TrackValues, AnimError> {
    let mut reader = Cursor::new(track_data);

    let values = match flags.compression_type {
        CompressionType::Compressed => match flags.track_type {
            TrackType::Transform => TrackValues::Transform(read_compressed(track_data, count)?),
            TrackType::Float => TrackValues::Float(read_compressed(track_data, count)?),
            TrackType::Boolean => TrackValues::Boolean(read_compressed(track_data, count)?),
            TrackType::Vector4 => TrackValues::Vector4(read_compressed(track_data, count)?),
            TrackType::Texture | TrackType::PatternIndex => {
                return Err(AnimError::UnsupportedTrack { flags })
            }
        },
        _ => match flags.track_type {
            TrackType::Transform => {
                let values: Vec<UncompressedTransform> = read_uncompressed(&mut reader, count)?;
                TrackValues::Transform(values.iter().map(Transform::from).collect())
            }
            TrackType::Float => TrackValues::Float(read_uncompressed(&mut reader, count)?),
            TrackType::Boolean => {
                let values: Vec<u8> = read_uncompressed(&mut reader, count)?;
                // Values other than 0 or 1 are false.
                TrackValues::Boolean(values.iter().map(|v| *v == 1).collect())
            }
            TrackType::Vector4 => {
                TrackValues::Vector4(read_uncompressed::<_, Vector4>(&mut reader, count)?)
            }
            TrackType::Texture | TrackType::PatternIndex => {
                return Err(AnimError::UnsupportedTrack { flags })
            }
        },
    };

    Ok(values)
}
