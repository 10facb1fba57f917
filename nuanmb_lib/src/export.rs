use binrw::{BinResult, BinWriterExt};
use std::io::{Cursor, Seek, SeekFrom, Write};

use crate::{
    anim::{Anim, AnimGroup, AnimNode, AnimTrack},
    round_up, SsbhString,
};

// Offsets are written in a single pass.
// Each offset field is reserved as zero and patched once the position of its data is known.

/// Writes a zero placeholder offset and returns the position of the field.
fn reserve_offset<W: Write + Seek>(writer: &mut W) -> BinResult<u64> {
    let field_pos = writer.stream_position()?;
    writer.write_le(&0u64)?;
    Ok(field_pos)
}

/// Points the offset field at `field_pos` to the current position.
fn patch_offset<W: Write + Seek>(writer: &mut W, field_pos: u64) -> BinResult<()> {
    let data_pos = writer.stream_position()?;
    writer.seek(SeekFrom::Start(field_pos))?;
    writer.write_le(&(data_pos - field_pos))?;
    writer.seek(SeekFrom::Start(data_pos))?;
    Ok(())
}

fn pad<W: Write + Seek>(writer: &mut W, alignment: u64) -> BinResult<()> {
    let pos = writer.stream_position()?;
    let padding = round_up(pos, alignment) - pos;
    writer.write_all(&vec![0u8; padding as usize])?;
    Ok(())
}

fn write_string<W: Write + Seek>(
    writer: &mut W,
    field_pos: u64,
    text: &SsbhString,
) -> BinResult<()> {
    // Strings are 4 byte aligned and null terminated.
    pad(writer, 4)?;
    patch_offset(writer, field_pos)?;
    writer.write_all(text.to_bytes().unwrap_or_default())?;
    writer.write_le(&0u8)?;
    Ok(())
}

fn write_ssbh_header<W: Write + Seek>(writer: &mut W, magic: &[u8; 4]) -> BinResult<()> {
    // Hardcode the header because this is shared for all SSBH formats.
    writer.write_le(b"HBSS")?;
    writer.write_le(&64u64)?;
    writer.write_le(&0u32)?;
    writer.write_le(magic)?;
    Ok(())
}

pub(crate) fn write_anim<W: Write + Seek>(writer: &mut W, anim: &Anim) -> BinResult<()> {
    write_ssbh_header(writer, b"MINA")?;
    writer.write_le(&anim.major_version)?;
    writer.write_le(&anim.minor_version)?;
    writer.write_le(&anim.final_frame_index)?;
    writer.write_le(&anim.unk1)?;
    writer.write_le(&anim.unk2)?;

    let name_ptr = reserve_offset(writer)?;
    let groups_ptr = reserve_offset(writer)?;
    writer.write_le(&(anim.groups.elements.len() as u64))?;
    let buffer_ptr = reserve_offset(writer)?;
    writer.write_le(&(anim.buffer.elements.len() as u64))?;
    pad(writer, 8)?;

    write_string(writer, name_ptr, &anim.name)?;
    pad(writer, 4)?;

    pad(writer, 8)?;
    patch_offset(writer, groups_ptr)?;
    write_groups(writer, &anim.groups.elements)?;

    pad(writer, 8)?;
    patch_offset(writer, buffer_ptr)?;
    writer.write_le(&anim.buffer.elements)?;
    Ok(())
}

fn write_groups<W: Write + Seek>(writer: &mut W, groups: &[AnimGroup]) -> BinResult<()> {
    let mut node_ptrs = Vec::with_capacity(groups.len());
    for group in groups {
        writer.write_le(&group.group_type)?;
        node_ptrs.push(reserve_offset(writer)?);
        writer.write_le(&(group.nodes.elements.len() as u64))?;
    }

    for (group, node_ptr) in groups.iter().zip(node_ptrs) {
        pad(writer, 8)?;
        patch_offset(writer, node_ptr)?;
        write_nodes(writer, &group.nodes.elements)?;
    }
    Ok(())
}

fn write_nodes<W: Write + Seek>(writer: &mut W, nodes: &[AnimNode]) -> BinResult<()> {
    let mut ptrs = Vec::with_capacity(nodes.len());
    for node in nodes {
        let name_ptr = reserve_offset(writer)?;
        let tracks_ptr = reserve_offset(writer)?;
        writer.write_le(&(node.tracks.elements.len() as u64))?;
        ptrs.push((name_ptr, tracks_ptr));
    }

    for (node, (name_ptr, tracks_ptr)) in nodes.iter().zip(ptrs) {
        write_string(writer, name_ptr, &node.name)?;
        pad(writer, 8)?;
        patch_offset(writer, tracks_ptr)?;
        write_tracks(writer, &node.tracks.elements)?;
    }
    Ok(())
}

fn write_tracks<W: Write + Seek>(writer: &mut W, tracks: &[AnimTrack]) -> BinResult<()> {
    // Material and camera nodes store all headers before the names.
    let mut name_ptrs = Vec::with_capacity(tracks.len());
    for track in tracks {
        name_ptrs.push(reserve_offset(writer)?);
        writer.write_le(&track.flags)?;
        writer.write_le(&track.frame_count)?;
        writer.write_le(&track.unk3)?;
        writer.write_le(&track.data_offset)?;
        writer.write_le(&track.data_size)?;
    }

    for (track, name_ptr) in tracks.iter().zip(name_ptrs) {
        write_string(writer, name_ptr, &track.name)?;
    }
    Ok(())
}

pub(crate) fn write_buffered<W: Write, F: Fn(&mut Cursor<Vec<u8>>) -> BinResult<()>>(
    writer: &mut W,
    write_data: F,
) -> BinResult<()> {
    // Buffer the entire write operation into memory to improve performance.
    // The seeks used to patch relative offsets cause flushes for BufWriter.
    let mut cursor = Cursor::new(Vec::new());
    write_data(&mut cursor)?;

    writer.write_all(cursor.get_ref())?;
    Ok(())
}
