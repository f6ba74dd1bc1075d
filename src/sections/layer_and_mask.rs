//! The layer-and-mask information section: the most heuristic-laden part of the format.
//!
//! Grounded on the teacher crate's two-pass `LayerAndMaskInformationSection::from_bytes` (all
//! layer records read first, then every layer's channel image blobs read in a second pass), with
//! the large-format length-width disambiguation rules and the channel-length ambiguity
//! resolution added on top -- the teacher's snapshot only supports the standard format and
//! assumes channel lengths are always payload-only.

use crate::compression::Compression;
use crate::container::NamedContainer;
use crate::cursor::PsdCursor;
use crate::error::PsdResult;
use crate::layer::channel::Channel;
use crate::layer::record::{self, LayerRecord};
use crate::layer::Layer;
use crate::sections::file_header::Format;

/// The layer-and-mask information section.
pub struct LayerAndMaskInformationSection {
    pub layers: NamedContainer<Layer>,
    pub has_transparency_layer: bool,
}

impl LayerAndMaskInformationSection {
    /// Parse the section starting at the cursor's current position.
    pub fn from_cursor(cursor: &mut PsdCursor, format: Format) -> PsdResult<Self> {
        let section_len = cursor.read_length(format.is_large())?;
        let section_start = cursor.position();
        let section_end = section_start + section_len;

        // Step 2: for large-format documents, try an 8-byte layer-info length first, rolling
        // back to 4 bytes if that would overrun the outer section.
        let layer_info_len = if format.is_large() {
            let candidate_pos = cursor.position();
            let candidate = cursor.read_u64()?;
            if cursor.position() + candidate > section_end {
                cursor.set_position(candidate_pos)?;
                cursor.read_u32()? as u64
            } else {
                candidate
            }
        } else {
            cursor.read_u32()? as u64
        };
        let layer_info_end = cursor.position() + layer_info_len;

        let raw_count = cursor.read_i16()?;
        let has_transparency_layer = raw_count < 0;
        let layer_count = raw_count.unsigned_abs() as usize;

        let mut records: Vec<LayerRecord> = Vec::with_capacity(layer_count);
        for _ in 0..layer_count {
            let record = record::read(cursor, format.is_large(), layer_info_end)?;
            records.push(record);
        }

        // Channel-length-includes-compression-field ambiguity: resolved once for the whole
        // section, by comparing the sum of every layer's declared channel lengths (plus the
        // 2-byte compression-kind prefix each channel carries) against the bytes actually left
        // in the layer-info subsection at this point.
        let total_declared_sum: u64 = records.iter().flat_map(|r| &r.channels).map(|c| c.length).sum();
        let total_channel_count: u64 = records.iter().map(|r| r.channels.len() as u64).sum();
        let bytes_remaining = layer_info_end.saturating_sub(cursor.position());
        let lengths_include_prefix =
            total_declared_sum + 2 * total_channel_count != bytes_remaining;

        // Second pass: each layer's channel image data, in the same layer order.
        let mut layers = NamedContainer::new();
        for record in records {
            let layer = read_layer_channels(cursor, record, layer_info_end, lengths_include_prefix)?;
            let name = layer.name.clone();
            layers.push(name, layer);
        }

        if cursor.position() < layer_info_end {
            cursor.set_position(layer_info_end)?;
        }

        // Global layer mask info: 4-byte length, contents skipped.
        if cursor.position() + 4 <= section_end {
            let global_mask_len = cursor.read_u32()?;
            cursor.skip(global_mask_len.min((section_end - cursor.position()) as u32))?;
        }

        cursor.set_position(section_end)?;

        Ok(LayerAndMaskInformationSection {
            layers,
            has_transparency_layer,
        })
    }
}

fn read_layer_channels(
    cursor: &mut PsdCursor,
    record: LayerRecord,
    subsection_end: u64,
    lengths_include_prefix: bool,
) -> PsdResult<Layer> {
    let width = record.width();
    let height = record.height();

    let mut channels = std::collections::HashMap::new();
    for descriptor in &record.channels {
        if cursor.position() + 2 > subsection_end {
            break;
        }
        let compression_kind = cursor.read_u16()?;
        let compression = Compression::new(compression_kind)?;

        let payload_len = if lengths_include_prefix {
            descriptor.length.saturating_sub(2)
        } else {
            descriptor.length
        };
        let payload_len = payload_len.min(subsection_end.saturating_sub(cursor.position()));
        let payload = cursor.read(payload_len as u32)?.to_vec();

        let channel = if record.bounds_invalid || width == 0 || height == 0 {
            Channel::unavailable(descriptor.id)
        } else {
            Channel::new(descriptor.id, compression, payload)
        };
        channels.insert(descriptor.id, channel);
    }

    Ok(Layer {
        name: record.name,
        top: record.top,
        left: record.left,
        bottom: record.bottom,
        right: record.right,
        opacity: record.opacity,
        clipping: record.clipping,
        flags: record.flags,
        bounds_invalid: record.bounds_invalid,
        features: record.features,
        mask_data_len: record.extra.mask_data_len,
        text_block: record.extra.text_block,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer_record_bytes(name: &str, channel_count: u16, channel_len: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(0i32.to_be_bytes());
        bytes.extend(0i32.to_be_bytes());
        bytes.extend(2i32.to_be_bytes());
        bytes.extend(2i32.to_be_bytes());
        bytes.extend(channel_count.to_be_bytes());
        for id in 0..channel_count {
            bytes.extend((id as i16).to_be_bytes());
            bytes.extend(channel_len.to_be_bytes());
        }
        bytes.extend(b"8BIM");
        bytes.extend(b"norm");
        bytes.push(255);
        bytes.push(0);
        bytes.push(0);
        bytes.push(0);

        let mut extra = Vec::new();
        extra.extend(0u32.to_be_bytes());
        extra.extend(0u32.to_be_bytes());
        extra.push(name.len() as u8);
        extra.extend(name.as_bytes());
        let consumed = 1 + name.len();
        let padding = (4 - (consumed % 4)) % 4;
        extra.extend(vec![0u8; padding]);
        bytes.extend((extra.len() as u32).to_be_bytes());
        bytes.extend(extra);
        bytes
    }

    #[test]
    fn parses_a_single_layer_with_one_raw_channel() {
        // One 2x2 RGB-ish layer with a single channel, raw-compressed, 4 payload bytes.
        // The declared channel length (6) includes the 2-byte compression-kind prefix.
        let mut record_bytes = layer_record_bytes("bg", 1, 4 + 2);

        // Second-pass channel data: compression kind (raw=0) + 4 bytes of pixel data.
        record_bytes.extend(0u16.to_be_bytes());
        record_bytes.extend([1u8, 2, 3, 4]);

        let mut bytes = Vec::new();
        bytes.extend(1i16.to_be_bytes()); // layer count (positive: no transparency layer)
        bytes.extend(record_bytes);

        let layer_info_len = bytes.len() as u32;
        let mut full = Vec::new();
        full.extend(layer_info_len.to_be_bytes());
        full.extend(bytes);
        full.extend(0u32.to_be_bytes()); // global layer mask info length

        let section_len = full.len() as u32;
        let mut section_bytes = Vec::new();
        section_bytes.extend(section_len.to_be_bytes());
        section_bytes.extend(full);

        let mut cursor = PsdCursor::new(&section_bytes);
        let section =
            LayerAndMaskInformationSection::from_cursor(&mut cursor, Format::Standard).unwrap();

        assert_eq!(section.layers.len(), 1);
        assert!(!section.has_transparency_layer);
        let layer = section.layers.by_name("bg").unwrap();
        assert_eq!(layer.width(), 2);
        assert_eq!(layer.height(), 2);
    }

    #[test]
    fn negative_layer_count_sets_transparency_flag() {
        let mut bytes = Vec::new();
        bytes.extend((-1i16).to_be_bytes());
        // zero layers follow (abs(-1) = 1, but we provide a minimal empty record-less stream to
        // keep this test focused on the sign bit; a truncated stream after the count is fine
        // because the loop would try to read one record and fail -- so give it one with no
        // channels instead).
        bytes.extend(layer_record_bytes("only", 0, 0));

        let layer_info_len = bytes.len() as u32;
        let mut full = Vec::new();
        full.extend(layer_info_len.to_be_bytes());
        full.extend(bytes);
        full.extend(0u32.to_be_bytes());

        let section_len = full.len() as u32;
        let mut section_bytes = Vec::new();
        section_bytes.extend(section_len.to_be_bytes());
        section_bytes.extend(full);

        let mut cursor = PsdCursor::new(&section_bytes);
        let section =
            LayerAndMaskInformationSection::from_cursor(&mut cursor, Format::Standard).unwrap();

        assert!(section.has_transparency_layer);
        assert_eq!(section.layers.len(), 1);
    }
}
