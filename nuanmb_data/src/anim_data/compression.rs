use binrw::{BinRead, BinReaderExt, BinResult, BinWrite, BinWriterExt, WriteOptions};
use modular_bitfield::prelude::*;
use std::io::{Cursor, Seek, SeekFrom, Write};

use nuanmb_lib::{Vector3, Vector4};

use super::bitutils::{BitReadError, BitReader, BitWriter};
use super::quantize::{dequantize, ChannelQuantizer, QuantizeError};
use super::{u32_field, AnimError, Transform};

// Header plus 9 ranges of 16 bytes each.
// These offsets are identical for every compressed transform track.
const TRANSFORM_DEFAULT_OFFSET: u16 = 160;
const TRANSFORM_COMPRESSED_DATA_OFFSET: u32 = 204;

// The bit count written for the ranges of components that aren't stored.
const ABSENT_BIT_COUNT: u64 = 16;

/// The 16 byte header at the start of every compressed track.
#[derive(Debug, BinRead, BinWrite, Clone, Copy, PartialEq)]
pub struct CompressedHeader {
    pub unk_4: u16, // always 4
    pub flags: CompressionFlags,
    /// The offset in bytes from the start of the track data to the default values.
    pub default_offset: u16,
    /// The number of bits used for each frame in the compressed data.
    pub bits_per_entry: u16,
    /// The offset in bytes from the start of the track data to the compressed data.
    pub compressed_data_offset: u32,
    pub frame_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[bits = 2]
pub enum ScaleType {
    Unset = 0,
    /// Scale is stored for each axis.
    Scale = 1,
    /// Scale uses the default value for every frame.
    ConstScale = 2,
    /// A single scale value is stored and used for all axes.
    UniformScale = 3,
}

// Determines what values are stored in the compressed bit buffer.
// Components that aren't stored use the default values.
#[bitfield(bits = 16)]
#[derive(Debug, BinRead, Clone, Copy, PartialEq, Eq)]
#[br(map = Self::from_bytes)]
pub struct CompressionFlags {
    #[bits = 2]
    pub scale_type: ScaleType,
    pub has_rotation: bool,
    pub has_translation: bool,
    #[skip]
    __: B12,
}

impl CompressionFlags {
    fn has_scale(&self) -> bool {
        matches!(self.scale_type(), ScaleType::Scale | ScaleType::UniformScale)
    }
}

impl BinWrite for CompressionFlags {
    type Args = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        options: &WriteOptions,
        args: Self::Args,
    ) -> BinResult<()> {
        self.into_bytes().write_options(writer, options, args)
    }
}

/// The value range and bit count for a single compressed channel.
#[derive(Debug, BinRead, BinWrite, Clone, Copy, PartialEq, Default)]
pub struct F32Range {
    pub min: f32,
    pub max: f32,
    // Larger values don't fit in the decompressed u32 codes.
    #[br(assert(bit_count <= 32))]
    pub bit_count: u64,
}

impl F32Range {
    fn read_value(&self, reader: &mut BitReader, default: f32) -> Result<f32, BitReadError> {
        if self.bit_count == 0 {
            return Ok(default);
        }

        let bit_count = self.bit_count as u32;
        let code = reader.read_u32(bit_count as usize)?;
        Ok(dequantize(code, bit_count, self.min, self.max) as f32)
    }
}

#[derive(Debug, BinRead, BinWrite, Default)]
pub struct Vector3Range {
    pub x: F32Range,
    pub y: F32Range,
    pub z: F32Range,
}

#[derive(Debug, BinRead, BinWrite, Default)]
pub struct Vector4Range {
    pub x: F32Range,
    pub y: F32Range,
    pub z: F32Range,
    pub w: F32Range,
}

#[derive(Debug, BinRead, BinWrite, Default)]
pub struct TransformRange {
    // The x component is used for uniform scale.
    pub scale: Vector3Range,
    // The w component for rotation is calculated from xyz.
    pub rotation: Vector3Range,
    pub translation: Vector3Range,
}

/// A transform as stored for direct and constant tracks and for compressed defaults.
#[derive(Debug, BinRead, BinWrite, PartialEq, Clone, Copy, Default)]
pub struct UncompressedTransform {
    pub scale: Vector3,
    pub rotation: Vector4,
    pub translation: Vector3,
    pub reserved: u32,
}

impl From<&Transform> for UncompressedTransform {
    fn from(t: &Transform) -> Self {
        Self {
            scale: t.scale,
            rotation: t.rotation,
            translation: t.translation,
            reserved: 0,
        }
    }
}

impl From<&UncompressedTransform> for Transform {
    fn from(t: &UncompressedTransform) -> Self {
        Self {
            scale: t.scale,
            rotation: t.rotation,
            translation: t.translation,
        }
    }
}

// Shared logic for decompressing each frame from bits.
pub trait CompressedData: Sized {
    type Compression: BinRead<Args = ()>;
    type Default: BinRead<Args = ()>;

    fn decompress(
        reader: &mut BitReader,
        compression: &Self::Compression,
        default: &Self::Default,
        header: &CompressedHeader,
    ) -> Result<Self, BitReadError>;
}

impl CompressedData for Transform {
    type Compression = TransformRange;
    type Default = UncompressedTransform;

    fn decompress(
        reader: &mut BitReader,
        compression: &Self::Compression,
        default: &Self::Default,
        header: &CompressedHeader,
    ) -> Result<Self, BitReadError> {
        let flags = header.flags;

        let scale = match flags.scale_type() {
            ScaleType::Scale => Vector3::new(
                compression.scale.x.read_value(reader, default.scale.x)?,
                compression.scale.y.read_value(reader, default.scale.y)?,
                compression.scale.z.read_value(reader, default.scale.z)?,
            ),
            ScaleType::UniformScale => {
                let value = compression.scale.x.read_value(reader, default.scale.x)?;
                Vector3::new(value, value, value)
            }
            _ => default.scale,
        };

        let rotation = if flags.has_rotation() {
            Vector4::new(
                compression.rotation.x.read_value(reader, default.rotation.x)?,
                compression.rotation.y.read_value(reader, default.rotation.y)?,
                compression.rotation.z.read_value(reader, default.rotation.z)?,
                0.0,
            )
        } else {
            default.rotation
        };

        let translation = if flags.has_translation() {
            Vector3::new(
                compression.translation.x.read_value(reader, default.translation.x)?,
                compression.translation.y.read_value(reader, default.translation.y)?,
                compression.translation.z.read_value(reader, default.translation.z)?,
            )
        } else {
            default.translation
        };

        // The sign bit comes after all the stored components.
        let rotation = if flags.has_rotation() {
            let flip_w = reader.read_bit()?;
            let w = rotation_w(rotation.x as f64, rotation.y as f64, rotation.z as f64) as f32;
            Vector4 {
                w: if flip_w { -w } else { w },
                ..rotation
            }
        } else {
            rotation
        };

        Ok(Transform {
            scale,
            rotation,
            translation,
        })
    }
}

impl CompressedData for f32 {
    type Compression = F32Range;
    type Default = f32;

    fn decompress(
        reader: &mut BitReader,
        compression: &Self::Compression,
        default: &Self::Default,
        _: &CompressedHeader,
    ) -> Result<Self, BitReadError> {
        compression.read_value(reader, *default)
    }
}

impl CompressedData for Vector4 {
    type Compression = Vector4Range;
    type Default = Vector4;

    fn decompress(
        reader: &mut BitReader,
        compression: &Self::Compression,
        default: &Self::Default,
        _: &CompressedHeader,
    ) -> Result<Self, BitReadError> {
        Ok(Vector4::new(
            compression.x.read_value(reader, default.x)?,
            compression.y.read_value(reader, default.y)?,
            compression.z.read_value(reader, default.z)?,
            compression.w.read_value(reader, default.w)?,
        ))
    }
}

impl CompressedData for bool {
    // Booleans have an unused 16 byte block in place of ranges.
    type Compression = u128;
    type Default = ();

    fn decompress(
        reader: &mut BitReader,
        _: &Self::Compression,
        _: &Self::Default,
        header: &CompressedHeader,
    ) -> Result<Self, BitReadError> {
        let value = reader.read_u32(header.bits_per_entry as usize)?;
        Ok(value == 1)
    }
}

/// Decompresses `frame_count` many values from the compressed track data in `data`.
/// All offsets in the compressed header are relative to the start of `data`.
///
/// The frame count must match the compressed header,
/// and the compressed data must have enough bits for every frame.
pub fn read_compressed<T: CompressedData>(
    data: &[u8],
    frame_count: usize,
) -> Result<Vec<T>, AnimError> {
    let mut reader = Cursor::new(data);
    let header: CompressedHeader = reader.read_le()?;
    if frame_count != header.frame_count as usize {
        return Err(AnimError::FrameCountMismatch {
            frame_count,
            compressed_frame_count: header.frame_count,
        });
    }

    let compression: T::Compression = reader.read_le()?;

    reader.seek(SeekFrom::Start(header.default_offset as u64))?;
    let default: T::Default = reader.read_le()?;

    let compressed_data = data
        .get(header.compressed_data_offset as usize..)
        .ok_or(AnimError::DataOutOfRange {
            offset: header.compressed_data_offset as usize,
            size: 0,
            buffer_size: data.len(),
        })?;

    // Check the size before decoding any frames.
    let required_bits = header.bits_per_entry as u64 * frame_count as u64;
    if required_bits > compressed_data.len() as u64 * 8 {
        return Err(AnimError::BitRead(BitReadError::NotEnoughBits));
    }

    let mut bit_reader = BitReader::from_slice(compressed_data);
    let mut values = Vec::new();
    for _ in 0..frame_count {
        let value = T::decompress(&mut bit_reader, &compression, &default, &header)?;
        values.push(value);
    }
    Ok(values)
}

/// The quantizer for each compressed transform channel
/// in the order scale xyz, rotation xyz, and translation xyz.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformQuantizers {
    channels: Vec<ChannelQuantizer>,
}

const CHANNEL_COUNT: usize = 9;

fn channel_values(t: &Transform) -> [f32; CHANNEL_COUNT] {
    [
        t.scale.x,
        t.scale.y,
        t.scale.z,
        t.rotation.x,
        t.rotation.y,
        t.rotation.z,
        t.translation.x,
        t.translation.y,
        t.translation.z,
    ]
}

impl TransformQuantizers {
    /// Fits a quantizer for each channel of `values`.
    /// The rotation w component is never stored and has no quantizer.
    pub fn fit(values: &[Transform], epsilon: f64) -> Result<Self, QuantizeError> {
        let channels = (0..CHANNEL_COUNT)
            .map(|i| {
                let samples: Vec<f32> = values.iter().map(|t| channel_values(t)[i]).collect();
                ChannelQuantizer::fit(&samples, epsilon)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { channels })
    }

    pub fn scale(&self) -> &[ChannelQuantizer] {
        &self.channels[0..3]
    }

    pub fn rotation(&self) -> &[ChannelQuantizer] {
        &self.channels[3..6]
    }

    pub fn translation(&self) -> &[ChannelQuantizer] {
        &self.channels[6..9]
    }

    /// Determines which components need to be stored for every frame.
    /// A component is omitted when all of its channels are constant.
    pub fn flags(&self, values: &[Transform]) -> CompressionFlags {
        let has_scale = !self.scale().iter().all(ChannelQuantizer::is_constant);
        let has_rotation = !self.rotation().iter().all(ChannelQuantizer::is_constant);
        let has_translation = !self.translation().iter().all(ChannelQuantizer::is_constant);

        let scale_type = if !has_scale {
            ScaleType::ConstScale
        } else if values
            .iter()
            .all(|t| t.scale.x == t.scale.y && t.scale.x == t.scale.z)
        {
            ScaleType::UniformScale
        } else {
            ScaleType::Scale
        };

        CompressionFlags::new()
            .with_scale_type(scale_type)
            .with_has_rotation(has_rotation)
            .with_has_translation(has_translation)
    }

    /// The indices of the channels stored for each frame in order.
    fn stored_channels(&self, flags: CompressionFlags) -> Vec<usize> {
        let mut indices = match flags.scale_type() {
            ScaleType::Scale => vec![0, 1, 2],
            ScaleType::UniformScale => vec![0],
            _ => Vec::new(),
        };
        if flags.has_rotation() {
            indices.extend([3, 4, 5]);
        }
        if flags.has_translation() {
            indices.extend([6, 7, 8]);
        }
        indices
    }

    /// The number of bits for each frame including the sign bit for rotation.
    pub fn bits_per_entry(&self, flags: CompressionFlags) -> u32 {
        let channel_bits: u32 = self
            .stored_channels(flags)
            .into_iter()
            .map(|i| self.channels[i].bit_count)
            .sum();
        channel_bits + u32::from(flags.has_rotation())
    }

    fn ranges(&self, flags: CompressionFlags) -> TransformRange {
        let range = |i| self.range(i, flags);
        TransformRange {
            scale: Vector3Range {
                x: range(0),
                y: range(1),
                z: range(2),
            },
            rotation: Vector3Range {
                x: range(3),
                y: range(4),
                z: range(5),
            },
            translation: Vector3Range {
                x: range(6),
                y: range(7),
                z: range(8),
            },
        }
    }

    fn range(&self, index: usize, flags: CompressionFlags) -> F32Range {
        let channel = &self.channels[index];
        let is_stored = match index {
            0..=2 => flags.has_scale(),
            3..=5 => flags.has_rotation(),
            _ => flags.has_translation(),
        };
        F32Range {
            min: channel.min,
            max: channel.max,
            bit_count: if is_stored {
                channel.bit_count as u64
            } else {
                ABSENT_BIT_COUNT
            },
        }
    }
}

/// The number of NaN samples in the channels that are quantized.
/// The rotation w component is never quantized and isn't counted.
pub fn nan_count(values: &[Transform]) -> usize {
    values
        .iter()
        .flat_map(channel_values)
        .filter(|v| v.is_nan())
        .count()
}

/// Replaces NaN in the quantized channels with 0.0.
pub fn replace_nan(t: &Transform) -> Transform {
    let value = |v: f32| if v.is_nan() { 0.0 } else { v };
    Transform {
        scale: Vector3::new(value(t.scale.x), value(t.scale.y), value(t.scale.z)),
        rotation: Vector4::new(
            value(t.rotation.x),
            value(t.rotation.y),
            value(t.rotation.z),
            t.rotation.w,
        ),
        translation: Vector3::new(
            value(t.translation.x),
            value(t.translation.y),
            value(t.translation.z),
        ),
    }
}

/// Writes the header, ranges, default transform, and compressed frames for `values`.
/// The first frame is used as the default.
pub fn write_compressed_transforms<W: Write + Seek>(
    writer: &mut W,
    values: &[Transform],
    quantizers: &TransformQuantizers,
) -> Result<(), AnimError> {
    let flags = quantizers.flags(values);
    let default = values
        .first()
        .map(UncompressedTransform::from)
        .unwrap_or_default();

    let header = CompressedHeader {
        unk_4: 4,
        flags,
        default_offset: TRANSFORM_DEFAULT_OFFSET,
        // The largest possible value is 9 * 30 + 1.
        bits_per_entry: quantizers.bits_per_entry(flags) as u16,
        compressed_data_offset: TRANSFORM_COMPRESSED_DATA_OFFSET,
        frame_count: u32_field("frame count", values.len() as u64)?,
    };
    writer.write_le(&header)?;
    writer.write_le(&quantizers.ranges(flags))?;
    writer.write_le(&default)?;

    let compressed_data = compress_transforms(values, quantizers, flags, &default);
    writer.write_le(&compressed_data)?;
    Ok(())
}

fn compress_transforms(
    values: &[Transform],
    quantizers: &TransformQuantizers,
    flags: CompressionFlags,
    default: &UncompressedTransform,
) -> Vec<u8> {
    let stored_channels = quantizers.stored_channels(flags);
    let default_rotation = [default.rotation.x, default.rotation.y, default.rotation.z];

    let mut writer = BitWriter::new();
    for t in values {
        let channels = channel_values(t);
        for i in &stored_channels {
            let quantizer = &quantizers.channels[*i];
            let value = if channels[*i].is_nan() {
                0.0
            } else {
                channels[*i] as f64
            };
            let code = quantizer.quantize(value, quantizer.bit_count);
            writer.write(code, quantizer.bit_count as usize);
        }

        if flags.has_rotation() {
            // Match the w value the reader calculates from the decompressed xyz.
            let mut rotation = [0.0f64; 3];
            for (i, (quantizer, value)) in quantizers
                .rotation()
                .iter()
                .zip(&channels[3..6])
                .enumerate()
            {
                let bit_count = quantizer.bit_count;
                rotation[i] = if bit_count == 0 {
                    default_rotation[i] as f64
                } else {
                    let value = if value.is_nan() { 0.0 } else { *value as f64 };
                    quantizer.dequantize(quantizer.quantize(value, bit_count), bit_count)
                };
            }

            let w = rotation_w(rotation[0], rotation[1], rotation[2]);
            let flip_w = (t.rotation.w < 0.0) != (w < 0.0);
            writer.write_bit(flip_w);
        }
    }

    writer.into_bytes()
}

fn rotation_w(x: f64, y: f64, z: f64) -> f64 {
    // For a unit quaternion, x^2 + y^2 + z^2 + w^2 = 1.
    // Only the sign of w needs to be stored.
    (1.0 - (x * x + y * y + z * z)).abs().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use hexlit::hex;

    use super::super::quantize::DEFAULT_EPSILON;

    fn transform(scale: f32, rotation: [f32; 4], translation: [f32; 3]) -> Transform {
        Transform {
            scale: Vector3::new(scale, scale, scale),
            rotation: rotation.into(),
            translation: translation.into(),
        }
    }

    #[test]
    fn compression_flags_bits() {
        let flags = CompressionFlags::new()
            .with_scale_type(ScaleType::ConstScale)
            .with_has_rotation(true)
            .with_has_translation(false);
        assert_eq!([0b0110, 0], flags.into_bytes());

        let flags = CompressionFlags::from_bytes([0b1101, 0]);
        assert_eq!(ScaleType::Scale, flags.scale_type());
        assert!(flags.has_rotation());
        assert!(flags.has_translation());
    }

    #[test]
    fn read_compressed_header() {
        let mut reader = Cursor::new(hex!(
            "04000600 A0001900 CC000000 1E000000"
        ));
        let header: CompressedHeader = reader.read_le().unwrap();
        assert_eq!(
            CompressedHeader {
                unk_4: 4,
                flags: CompressionFlags::new()
                    .with_scale_type(ScaleType::ConstScale)
                    .with_has_rotation(true),
                default_offset: 160,
                bits_per_entry: 25,
                compressed_data_offset: 204,
                frame_count: 30,
            },
            header
        );
    }

    #[test]
    fn write_compressed_header() {
        let header = CompressedHeader {
            unk_4: 4,
            flags: CompressionFlags::new()
                .with_scale_type(ScaleType::ConstScale)
                .with_has_rotation(true),
            default_offset: 160,
            bits_per_entry: 25,
            compressed_data_offset: 204,
            frame_count: 30,
        };

        let mut writer = Cursor::new(Vec::new());
        writer.write_le(&header).unwrap();
        assert_eq!(
            &hex!("04000600 A0001900 CC000000 1E000000"),
            &writer.into_inner()[..]
        );
    }

    #[test]
    fn write_f32_range() {
        let mut writer = Cursor::new(Vec::new());
        writer
            .write_le(&F32Range {
                min: 0.0,
                max: 1.0,
                bit_count: 2,
            })
            .unwrap();
        assert_eq!(
            &hex!("00000000 0000803F 02000000 00000000"),
            &writer.into_inner()[..]
        );
    }

    #[test]
    fn read_f32_range_invalid_bit_count() {
        let mut reader = Cursor::new(hex!("00000000 0000803F 21000000 00000000"));
        assert!(reader.read_le::<F32Range>().is_err());
    }

    #[test]
    fn write_uncompressed_transform() {
        let mut writer = Cursor::new(Vec::new());
        writer
            .write_le(&UncompressedTransform::from(&Transform::IDENTITY))
            .unwrap();

        assert_eq!(
            hex!(
                0000803F 0000803F 0000803F          // scale
                00000000 00000000 00000000 0000803F // rotation
                00000000 00000000 00000000          // translation
                00000000                            // reserved
            )
            .to_vec(),
            writer.into_inner()
        );
    }

    #[test]
    fn read_compressed_floats() {
        let data = hex!(
            04000000 20000200 24000000 03000000 // header
            00000000 0000803F 02000000 00000000 // compression
            0000003F                            // default value
            34                                  // compressed values
        );
        let values: Vec<f32> = read_compressed(&data, 3).unwrap();
        assert_eq!(3, values.len());
        assert_eq!(0.0, values[0]);
        assert_relative_eq!(1.0 / 3.0, values[1]);
        assert_eq!(1.0, values[2]);
    }

    #[test]
    fn read_compressed_floats_zero_bits_uses_default() {
        let data = hex!(
            04000000 20000000 24000000 02000000 // header
            0000803F 0000803F 00000000 00000000 // compression
            0000003F                            // default value
        );
        let values: Vec<f32> = read_compressed(&data, 2).unwrap();
        assert_eq!(vec![0.5, 0.5], values);
    }

    #[test]
    fn read_compressed_vector4() {
        // Only x and z are stored.
        let data = hex!(
            04000000 50000300 60000000 02000000 // header
            00000000 00000041 01000000 00000000 // x compression
            0000803F 0000803F 00000000 00000000 // y compression
            00000000 0000403F 02000000 00000000 // z compression
            00000000 00000000 00000000 00000000 // w compression
            0000803F 0000803F 0000803F 000080BF // default value
            35                                  // compressed values
        );
        let values: Vec<Vector4> = read_compressed(&data, 2).unwrap();
        assert_eq!(
            vec![
                Vector4::new(8.0, 1.0, 0.5, -1.0),
                Vector4::new(0.0, 1.0, 0.75, -1.0)
            ],
            values
        );
    }

    #[test]
    fn read_compressed_booleans() {
        let data = hex!(
            04000000 20000100 21000000 05000000 // header
            00000000 00000000 00000000 00000000 // bool compression (always 0's)
            00                                  // default value
            19                                  // compressed values (bits)
        );
        let values: Vec<bool> = read_compressed(&data, 5).unwrap();
        assert_eq!(vec![true, false, false, true, true], values);
    }

    #[test]
    fn read_compressed_booleans_too_many_bits() {
        let data = hex!(
            04000000 20002800 21000000 01000000 // header
            00000000 00000000 00000000 00000000 // bool compression (always 0's)
            00                                  // default value
            FFFFFFFF FFFFFFFF                   // compressed values (bits)
        );
        let result = read_compressed::<bool>(&data, 1);
        assert!(matches!(
            result,
            Err(AnimError::BitRead(BitReadError::InvalidBitCount { bit_count: 40 }))
        ));
    }

    #[test]
    fn read_compressed_frame_count_mismatch() {
        let data = hex!(
            04000000 20000000 24000000 02000000 // header
            0000803F 0000803F 00000000 00000000 // compression
            0000003F                            // default value
        );
        let result = read_compressed::<f32>(&data, u32::MAX as usize);
        assert!(matches!(
            result,
            Err(AnimError::FrameCountMismatch {
                frame_count,
                compressed_frame_count: 2
            }) if frame_count == u32::MAX as usize
        ));
    }

    #[test]
    fn read_compressed_frame_count_exceeds_data() {
        // The size is checked before decoding any frames.
        let data = hex!(
            04000000 20000800 24000000 FFFFFFFF // header
            00000000 0000803F 08000000 00000000 // compression
            0000003F                            // default value
            FF                                  // compressed values
        );
        let result = read_compressed::<f32>(&data, u32::MAX as usize);
        assert!(matches!(
            result,
            Err(AnimError::BitRead(BitReadError::NotEnoughBits))
        ));
    }

    #[test]
    fn read_compressed_not_enough_bits() {
        let data = hex!(
            04000000 20000800 24000000 03000000 // header
            00000000 0000803F 08000000 00000000 // compression
            0000003F                            // default value
            FF                                  // compressed values
        );
        let result = read_compressed::<f32>(&data, 3);
        assert!(matches!(result, Err(AnimError::BitRead(_))));
    }

    #[test]
    fn read_compressed_data_offset_out_of_range() {
        let data = hex!(
            04000000 20000200 FF000000 03000000 // header
            00000000 0000803F 02000000 00000000 // compression
            0000003F                            // default value
        );
        let result = read_compressed::<f32>(&data, 3);
        assert!(matches!(
            result,
            Err(AnimError::DataOutOfRange {
                offset: 255,
                size: 0,
                buffer_size: 36
            })
        ));
    }

    #[test]
    fn nan_count_quantized_channels() {
        let mut values = vec![Transform::IDENTITY; 3];
        values[0].scale.x = f32::NAN;
        values[1].translation.z = f32::NAN;
        // The w component isn't quantized.
        values[2].rotation.w = f32::NAN;
        assert_eq!(2, nan_count(&values));

        let t = replace_nan(&values[0]);
        assert_eq!(0.0, t.scale.x);
        assert!(replace_nan(&values[2]).rotation.w.is_nan());
    }

    #[test]
    fn rotation_only_flags() {
        let values: Vec<_> = (0..30)
            .map(|i| {
                let angle = i as f32 * 0.1;
                transform(
                    1.0,
                    [(angle / 2.0).sin(), 0.0, 0.0, (angle / 2.0).cos()],
                    [1.0, 2.0, 3.0],
                )
            })
            .collect();

        let quantizers = TransformQuantizers::fit(&values, DEFAULT_EPSILON).unwrap();
        let flags = quantizers.flags(&values);
        assert_eq!(ScaleType::ConstScale, flags.scale_type());
        assert!(flags.has_rotation());
        assert!(!flags.has_translation());

        // Only the rotation x channel varies.
        let rotation_bits = quantizers.rotation()[0].bit_count;
        assert!(rotation_bits > 0);
        assert_eq!(0, quantizers.rotation()[1].bit_count);
        assert_eq!(0, quantizers.rotation()[2].bit_count);
        assert_eq!(rotation_bits + 1, quantizers.bits_per_entry(flags));

        let mut writer = Cursor::new(Vec::new());
        write_compressed_transforms(&mut writer, &values, &quantizers).unwrap();
        let data = writer.into_inner();

        let mut reader = Cursor::new(&data);
        let header: CompressedHeader = reader.read_le().unwrap();
        assert_eq!(4, header.unk_4);
        assert_eq!([0b0110, 0], header.flags.into_bytes());
        assert_eq!(160, header.default_offset);
        assert_eq!(rotation_bits as u16 + 1, header.bits_per_entry);
        assert_eq!(204, header.compressed_data_offset);
        assert_eq!(30, header.frame_count);

        let ranges: TransformRange = reader.read_le().unwrap();
        assert_eq!(16, ranges.scale.x.bit_count);
        assert_eq!(16, ranges.scale.y.bit_count);
        assert_eq!(16, ranges.scale.z.bit_count);
        assert_eq!(rotation_bits as u64, ranges.rotation.x.bit_count);
        assert_eq!(0, ranges.rotation.y.bit_count);
        assert_eq!(0, ranges.rotation.z.bit_count);
        assert_eq!(16, ranges.translation.x.bit_count);
        assert_eq!(16, ranges.translation.y.bit_count);
        assert_eq!(16, ranges.translation.z.bit_count);

        let expected_bits = 30 * (rotation_bits as usize + 1);
        assert_eq!(204 + (expected_bits + 7) / 8, data.len());
    }

    #[test]
    fn uniform_scale_flags() {
        let values = vec![
            transform(1.0, [0.0, 0.0, 0.0, 1.0], [0.0; 3]),
            transform(2.0, [0.0, 0.0, 0.0, 1.0], [0.0; 3]),
        ];
        let quantizers = TransformQuantizers::fit(&values, DEFAULT_EPSILON).unwrap();
        let flags = quantizers.flags(&values);
        assert_eq!(ScaleType::UniformScale, flags.scale_type());
        assert!(!flags.has_rotation());
        assert!(!flags.has_translation());

        // A single value is stored for all axes.
        assert_eq!(1, quantizers.bits_per_entry(flags));
    }

    #[test]
    fn write_read_compressed_transforms() {
        let values: Vec<_> = (0..30)
            .map(|i| {
                let angle = i as f32 * 0.25;
                let half = angle / 2.0;
                Transform {
                    scale: Vector3::new(1.0 + i as f32 * 0.1, 1.0, 0.5),
                    // The w component changes sign partway through the track.
                    rotation: Vector4::new(0.0, half.sin(), 0.0, half.cos()),
                    translation: Vector3::new(i as f32, -2.0, i as f32 * -0.5),
                }
            })
            .collect();

        let quantizers = TransformQuantizers::fit(&values, DEFAULT_EPSILON).unwrap();
        let mut writer = Cursor::new(Vec::new());
        write_compressed_transforms(&mut writer, &values, &quantizers).unwrap();

        let data = writer.into_inner();
        let decoded: Vec<Transform> = read_compressed(&data, values.len()).unwrap();

        assert_eq!(values.len(), decoded.len());
        for (expected, actual) in values.iter().zip(decoded.iter()) {
            assert_relative_eq!(expected.scale.x, actual.scale.x, epsilon = 0.0001);
            assert_eq!(expected.scale.y, actual.scale.y);
            assert_eq!(expected.scale.z, actual.scale.z);

            assert_eq!(expected.rotation.x, actual.rotation.x);
            assert_relative_eq!(expected.rotation.y, actual.rotation.y, epsilon = 0.0001);
            assert_eq!(expected.rotation.z, actual.rotation.z);
            assert_relative_eq!(expected.rotation.w, actual.rotation.w, epsilon = 0.001);

            assert_relative_eq!(expected.translation.x, actual.translation.x, epsilon = 0.0001);
            assert_eq!(expected.translation.y, actual.translation.y);
            assert_relative_eq!(expected.translation.z, actual.translation.z, epsilon = 0.0001);
        }
    }
}
