//! Parsing of a layer's *extra-data* blob: layer mask data, blending ranges, the layer name, and
//! the tagged "additional layer information" blocks that follow it.
//!
//! The teacher crate's `layer_and_mask_information_section/mod.rs` reads the mask-data and
//! blending-range lengths only to skip them, reads the Pascal name, and then skips every tagged
//! block by signature without recognizing any of them. This module keeps that skeleton but adds
//! recognition of the keys the specification names, and the `luni` Unicode-name-override rule.

use crate::cursor::PsdCursor;
use crate::error::PsdResult;
use crate::num_ext::SignedInteger;

/// Boolean facts about a layer, derived from which tagged blocks its extra-data contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerFeatures {
    pub has_text: bool,
    pub has_vector_mask: bool,
    pub is_smart_object: bool,
    pub is_adjustment: bool,
    pub has_effects: bool,
    pub has_fill: bool,
    pub has_3d: bool,
    pub has_video: bool,
    pub is_group_start: bool,
    pub is_group_end: bool,
}

/// A single layer type, derived as a total function of [`LayerFeatures`] and channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerType {
    GroupEnd,
    GroupStart,
    Text,
    SmartObject,
    Adjustment,
    Fill,
    Effects,
    ThreeD,
    Video,
    Pixel,
    Empty,
}

impl LayerFeatures {
    /// The derived layer type: a total function of this layer's features plus its channel
    /// count, in the priority order §4.5 specifies (group markers first, then the
    /// special-purpose kinds, falling back to whether the layer carries any pixel channels).
    pub fn layer_type(&self, channel_count: usize) -> LayerType {
        if self.is_group_end {
            LayerType::GroupEnd
        } else if self.is_group_start {
            LayerType::GroupStart
        } else if self.has_text {
            LayerType::Text
        } else if self.is_smart_object {
            LayerType::SmartObject
        } else if self.is_adjustment {
            LayerType::Adjustment
        } else if self.has_fill {
            LayerType::Fill
        } else if self.has_effects {
            LayerType::Effects
        } else if self.has_3d {
            LayerType::ThreeD
        } else if self.has_video {
            LayerType::Video
        } else if channel_count > 0 {
            LayerType::Pixel
        } else {
            LayerType::Empty
        }
    }
}

/// One recognized tagged block relevant to the text-layer index: the raw payload of a `TySh`
/// or `tySh` block, kept for lazy descriptor parsing later.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub legacy: bool,
    pub payload: Vec<u8>,
}

/// Everything this crate extracts from a layer's extra-data blob.
#[derive(Debug, Clone, Default)]
pub struct ExtraData {
    pub name: String,
    pub features: LayerFeatures,
    pub text_block: Option<TextBlock>,
    /// The length of the layer mask data sub-block, used by the background-layer predicate
    /// (§4.5: a background layer has no layer mask data at all).
    pub mask_data_len: u32,
}

fn is_adjustment_key(key: &[u8; 4]) -> bool {
    const ADJUSTMENT_KEYS: &[&[u8; 4]] = &[
        b"brit", b"brtC", b"levl", b"curv", b"hue ", b"hue2", b"blnc", b"vibA", b"expA", b"mixr",
        b"selc", b"thrs", b"post", b"phfl", b"grdm", b"clrL",
    ];
    ADJUSTMENT_KEYS.contains(&key) || key.starts_with(b"adj")
}

/// Parse the extra-data blob starting at the cursor's current position and ending at
/// `extra_data_end`.
pub fn parse(cursor: &mut PsdCursor, extra_data_end: u64) -> PsdResult<ExtraData> {
    let mut extra = ExtraData::default();

    // Layer mask data: 4-byte length + payload, not otherwise interpreted.
    let mask_len = cursor.read_u32()?;
    cursor.skip(mask_len)?;
    extra.mask_data_len = mask_len;

    // Layer blending ranges: 4-byte length + payload, not otherwise interpreted.
    let blending_len = cursor.read_u32()?;
    cursor.skip(blending_len)?;

    // Layer name: Pascal string padded so the total (including the length byte) is a multiple
    // of four.
    let (name, consumed) = cursor.read_pascal_string()?;
    let padding = (4 - (consumed % 4)) % 4;
    cursor.skip(padding as u32)?;
    extra.name = name;

    while cursor.position() + 12 <= extra_data_end {
        let signature = cursor.read(4)?;
        if signature != b"8BIM" && signature != b"8B64" {
            // Not a well-formed tagged block; stop here and let the caller reposition.
            break;
        }
        let mut key = [0u8; 4];
        key.copy_from_slice(cursor.read(4)?);
        let len = cursor.read_u32()?.to_usize_or_zero();
        let block_start = cursor.position();
        let block_end = block_start + len as u64;
        if block_end > extra_data_end {
            break;
        }

        match &key {
            b"TySh" => {
                extra.features.has_text = true;
                extra.text_block = Some(TextBlock {
                    legacy: false,
                    payload: cursor.read(len as u32)?.to_vec(),
                });
            }
            b"tySh" => {
                extra.features.has_text = true;
                extra.text_block = Some(TextBlock {
                    legacy: true,
                    payload: cursor.read(len as u32)?.to_vec(),
                });
            }
            b"SoLd" | b"SoLE" => {
                extra.features.is_smart_object = true;
                cursor.skip(len as u32)?;
            }
            b"lfx2" => {
                extra.features.has_effects = true;
                cursor.skip(len as u32)?;
            }
            b"vmsk" | b"vmns" => {
                extra.features.has_vector_mask = true;
                cursor.skip(len as u32)?;
            }
            b"lsct" => {
                let marker = cursor.read_u32()?;
                match marker {
                    1 | 2 => extra.features.is_group_start = true,
                    3 => extra.features.is_group_end = true,
                    _ => {}
                }
                let consumed_for_marker = 4u64;
                let remaining = len as u64 - consumed_for_marker.min(len as u64);
                cursor.skip(remaining as u32)?;
            }
            b"SoCo" | b"GdFl" | b"PtFl" => {
                extra.features.has_fill = true;
                cursor.skip(len as u32)?;
            }
            b"vtrk" => {
                extra.features.has_video = true;
                cursor.skip(len as u32)?;
            }
            b"luni" => {
                let char_count = cursor.read_u32()?;
                let bytes = cursor.read((char_count as usize * 2) as u32)?;
                extra.name = crate::text::utf16be_to_utf8(bytes);
                let consumed_for_name = 4 + char_count as u64 * 2;
                let remaining = len as u64 - consumed_for_name.min(len as u64);
                cursor.skip(remaining as u32)?;
            }
            _ if key.starts_with(b"3dL") || is_adjustment_key(&key) => {
                extra.features.is_adjustment = is_adjustment_key(&key);
                extra.features.has_3d = key.starts_with(b"3dL");
                cursor.skip(len as u32)?;
            }
            _ => {
                cursor.skip(len as u32)?;
            }
        }

        // Every tagged block's payload is padded to an even length.
        if len % 2 != 0 {
            cursor.skip(1)?;
        }
    }

    cursor.set_position(extra_data_end)?;
    Ok(extra)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged_block(key: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = b"8BIM".to_vec();
        out.extend(key);
        out.extend((payload.len() as u32).to_be_bytes());
        out.extend(payload);
        if payload.len() % 2 != 0 {
            out.push(0);
        }
        out
    }

    fn extra_data_bytes(name: &str, blocks: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(0u32.to_be_bytes()); // mask data length
        out.extend(0u32.to_be_bytes()); // blending ranges length
        out.push(name.len() as u8);
        out.extend(name.as_bytes());
        let consumed = 1 + name.len();
        let padding = (4 - (consumed % 4)) % 4;
        out.extend(vec![0u8; padding]);
        out.extend(blocks);
        out
    }

    #[test]
    fn recognizes_text_block_and_sets_feature() {
        let block = tagged_block(b"TySh", &[1, 2, 3]);
        let bytes = extra_data_bytes("Hello", &block);
        let end = bytes.len() as u64;
        let mut cursor = PsdCursor::new(&bytes);
        let extra = parse(&mut cursor, end).unwrap();

        assert_eq!(extra.name, "Hello");
        assert!(extra.features.has_text);
        assert_eq!(extra.text_block.unwrap().payload, vec![1, 2, 3]);
    }

    #[test]
    fn luni_block_replaces_the_macroman_name() {
        let utf16_name: Vec<u8> = "café"
            .encode_utf16()
            .flat_map(|u| u.to_be_bytes())
            .collect();
        let mut payload = (4u32).to_be_bytes().to_vec();
        payload.extend(&utf16_name);
        let block = tagged_block(b"luni", &payload);
        let bytes = extra_data_bytes("legacy", &block);
        let end = bytes.len() as u64;
        let mut cursor = PsdCursor::new(&bytes);
        let extra = parse(&mut cursor, end).unwrap();

        assert_eq!(extra.name, "café");
    }

    #[test]
    fn group_start_marker_is_recognized() {
        let mut payload = 1u32.to_be_bytes().to_vec();
        payload.extend(b"norm"); // blend mode signature + key padding not modeled precisely here
        let block = tagged_block(b"lsct", &payload);
        let bytes = extra_data_bytes("Group 1", &block);
        let end = bytes.len() as u64;
        let mut cursor = PsdCursor::new(&bytes);
        let extra = parse(&mut cursor, end).unwrap();

        assert!(extra.features.is_group_start);
        assert_eq!(extra.features.layer_type(0), LayerType::GroupStart);
    }
}
