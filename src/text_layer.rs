//! The derived text-layer index: one record per layer whose extra-data carries a `TySh`
//! or `tySh` tagged block, with eager geometry fields and a lazily-parsed action descriptor.
//!
//! Built as a document-scoped index derived from already-parsed layer extra-data, using the
//! descriptor parser in [`crate::descriptor`] for the lazy half of this module.

use crate::cursor::PsdCursor;
use crate::descriptor::{Descriptor, DescriptorValue};
use crate::error::{PsdError, PsdResult};
use crate::layer::extra_data::TextBlock;
use crate::text::utf16be_to_utf8;

/// Which tagged block a [`TextLayer`] was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    /// The modern `TySh` block.
    Modern,
    /// The legacy `tySh` block.
    Legacy,
}

/// Text justification, as read from the text descriptor's `Justification` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justification {
    Left,
    Right,
    Center,
    Full,
}

impl Justification {
    fn from_i32(value: i32) -> Self {
        match value {
            1 => Justification::Right,
            2 => Justification::Center,
            3 => Justification::Full,
            _ => Justification::Left,
        }
    }
}

/// The default character style extracted from a text layer's `EngineData`.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultStyle {
    pub font_name: String,
    pub font_size: f64,
    pub tracking: f64,
    pub leading: f64,
    pub justification: Justification,
    pub fill_color: (u8, u8, u8, u8),
}

/// One derived text layer: the layer it belongs to, its eagerly-extracted geometry, and its
/// lazily-parsed text/warp descriptors.
#[derive(Debug, Clone)]
pub struct TextLayer {
    pub layer_index: usize,
    pub source: TextSource,
    /// The six doubles of the 2D affine transform (xx, xy, yx, yy, tx, ty).
    pub transform: [f64; 6],
    /// The text bounds, as (left, top, right, bottom).
    pub bounds: (f64, f64, f64, f64),
    raw_payload: Vec<u8>,
    text_descriptor: Option<Descriptor>,
    warp_descriptor: Option<Descriptor>,
    descriptor_parse_attempted: bool,
}

impl TextLayer {
    /// Build a text-layer record from a layer's retained `TySh`/`tySh` payload, extracting the
    /// eager fields: TySh version, the affine transform, the text descriptor version
    /// fields, and -- from the last 32 bytes of the payload -- the text bounds.
    pub fn from_tagged_block(layer_index: usize, block: &TextBlock) -> PsdResult<TextLayer> {
        let source = if block.legacy {
            TextSource::Legacy
        } else {
            TextSource::Modern
        };

        let mut cursor = PsdCursor::new(&block.payload);
        cursor.skip(2)?; // TySh version, not retained beyond this read.
        let mut transform = [0.0f64; 6];
        for slot in &mut transform {
            *slot = cursor.read_f64()?;
        }
        cursor.skip(2)?; // text version
        cursor.skip(4)?; // text descriptor version

        let payload_len = block.payload.len();
        if payload_len < 32 {
            return Err(PsdError::InvalidStructure(
                "TySh payload is too short to contain a text bounds rectangle".into(),
            ));
        }
        let mut bounds_cursor = PsdCursor::new(&block.payload[payload_len - 32..]);
        let left = bounds_cursor.read_f64()?;
        let top = bounds_cursor.read_f64()?;
        let right = bounds_cursor.read_f64()?;
        let bottom = bounds_cursor.read_f64()?;

        Ok(TextLayer {
            layer_index,
            source,
            transform,
            bounds: (left, top, right, bottom),
            raw_payload: block.payload.clone(),
            text_descriptor: None,
            warp_descriptor: None,
            descriptor_parse_attempted: false,
        })
    }

    /// Parse (if not already parsed) the full text and warp descriptors from the retained raw
    /// payload: 16-bit TySh version, 48 skipped bytes, 16-bit text version, 32-bit
    /// text-descriptor version, the text descriptor, then optionally a warp version + warp
    /// descriptor version + warp descriptor. Missing warp data is non-fatal.
    ///
    /// Idempotent: a second call does not re-read the payload.
    fn ensure_descriptor_parsed(&mut self) -> PsdResult<()> {
        if self.descriptor_parse_attempted {
            return Ok(());
        }
        self.descriptor_parse_attempted = true;

        let payload = self.raw_payload.clone();
        let mut cursor = PsdCursor::new(&payload);
        cursor.skip(2)?; // TySh version
        cursor.skip(48)?;
        cursor.skip(2)?; // text version
        cursor.skip(4)?; // text descriptor version

        let text_descriptor = crate::descriptor::parse_top_level(&mut cursor)?;
        self.text_descriptor = Some(text_descriptor);

        // Warp data is optional; any failure to read it is swallowed, matching the
        // specification's "missing warp data is non-fatal" rule.
        let warp_attempt = (|| -> PsdResult<Descriptor> {
            cursor.skip(2)?; // warp version
            cursor.skip(4)?; // warp descriptor version
            crate::descriptor::parse_top_level(&mut cursor)
        })();
        if let Ok(warp) = warp_attempt {
            self.warp_descriptor = Some(warp);
        }

        Ok(())
    }

    /// The text descriptor, parsing it from the raw payload on first access.
    pub fn text_descriptor(&mut self) -> PsdResult<&Descriptor> {
        self.ensure_descriptor_parsed()?;
        self.text_descriptor
            .as_ref()
            .ok_or_else(|| PsdError::InvalidStructure("text descriptor failed to parse".into()))
    }

    /// The warp descriptor, if this text layer carries one.
    pub fn warp_descriptor(&mut self) -> PsdResult<Option<&Descriptor>> {
        self.ensure_descriptor_parsed()?;
        Ok(self.warp_descriptor.as_ref())
    }

    /// The layer's literal text content: the `Txt ` property of the text descriptor.
    pub fn get_text(&mut self) -> PsdResult<String> {
        let descriptor = self.text_descriptor()?;
        find_string(descriptor, "Txt ")
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PsdError::InvalidStructure("text descriptor has no 'Txt ' property".into())
            })
    }

    /// The layer's default character style, parsed out of its `EngineData` raw payload.
    pub fn get_default_style(&mut self) -> PsdResult<DefaultStyle> {
        let descriptor = self.text_descriptor()?;
        let engine_data = find_raw(descriptor, "EngineData").ok_or_else(|| {
            PsdError::InvalidStructure("text descriptor has no 'EngineData' property".into())
        })?;
        parse_engine_data(engine_data)
    }
}

/// Recursively search a descriptor (and any nested descriptors/lists) for a `TEXT`-typed
/// property keyed `key`.
fn find_string<'a>(descriptor: &'a Descriptor, key: &str) -> Option<&'a str> {
    if let Some(DescriptorValue::String(s)) = descriptor.fields.get(key) {
        return Some(s);
    }
    for value in descriptor.fields.values() {
        if let Some(found) = find_string_in_value(value, key) {
            return Some(found);
        }
    }
    None
}

fn find_string_in_value<'a>(value: &'a DescriptorValue, key: &str) -> Option<&'a str> {
    match value {
        DescriptorValue::Descriptor(d) => find_string(d, key),
        DescriptorValue::List(items) => items.iter().find_map(|v| find_string_in_value(v, key)),
        _ => None,
    }
}

/// Recursively search a descriptor (and any nested descriptors/lists) for a raw (`tdta`)
/// property keyed `key`.
fn find_raw<'a>(descriptor: &'a Descriptor, key: &str) -> Option<&'a [u8]> {
    if let Some(DescriptorValue::Raw(bytes)) = descriptor.fields.get(key) {
        return Some(bytes);
    }
    for value in descriptor.fields.values() {
        if let Some(found) = find_raw_in_value(value, key) {
            return Some(found);
        }
    }
    None
}

fn find_raw_in_value<'a>(value: &'a DescriptorValue, key: &str) -> Option<&'a [u8]> {
    match value {
        DescriptorValue::Descriptor(d) => find_raw(d, key),
        DescriptorValue::List(items) => items.iter().find_map(|v| find_raw_in_value(v, key)),
        _ => None,
    }
}

/// Decode one PostScript-style parenthesised string from `EngineData`: recognizes a leading
/// `0xFE 0xFF` (UTF-16BE) or `0xFF 0xFE` (UTF-16LE) byte-order mark; everything else is copied
/// byte-for-byte (the format's non-Unicode strings are plain ASCII).
fn decode_engine_data_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        utf16be_to_utf8(&bytes[2..])
    } else if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        let swapped: Vec<u8> = bytes[2..]
            .chunks(2)
            .flat_map(|pair| if pair.len() == 2 { vec![pair[1], pair[0]] } else { vec![pair[0]] })
            .collect();
        utf16be_to_utf8(&swapped)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Sentinel markers used to splice decoded parenthesised strings back into the masked text
/// without re-tokenizing raw bytes; chosen from the Unicode private-use area so they can never
/// collide with real EngineData content.
const STRING_OPEN: char = '\u{E000}';
const STRING_CLOSE: char = '\u{E001}';

/// Strip every top-level parenthesised string out of `data`, decoding it per
/// [`decode_engine_data_string`] and replacing it in the output text with a
/// `STRING_OPEN index STRING_CLOSE` marker, so the remaining PostScript-like structure (keys,
/// numbers, brackets) can be scanned with plain substring search.
fn mask_parenthesized_strings(data: &[u8]) -> (String, Vec<String>) {
    let mut out = String::with_capacity(data.len());
    let mut strings = Vec::new();
    let mut i = 0;

    while i < data.len() {
        if data[i] == b'(' {
            let mut depth = 1usize;
            let mut inner = Vec::new();
            let mut j = i + 1;
            while j < data.len() && depth > 0 {
                match data[j] {
                    b'\\' if j + 1 < data.len() => {
                        inner.push(data[j + 1]);
                        j += 2;
                        continue;
                    }
                    b'(' => {
                        depth += 1;
                        inner.push(b'(');
                    }
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                        inner.push(b')');
                    }
                    other => inner.push(other),
                }
                j += 1;
            }
            let idx = strings.len();
            strings.push(decode_engine_data_string(&inner));
            out.push(STRING_OPEN);
            out.push_str(&idx.to_string());
            out.push(STRING_CLOSE);
            i = j + 1;
        } else {
            out.push(data[i] as char);
            i += 1;
        }
    }

    (out, strings)
}

fn string_after<'a>(text: &str, key: &str, strings: &'a [String]) -> Option<&'a str> {
    let pos = text.find(key)?;
    let rest = &text[pos + key.len()..];
    let open = rest.find(STRING_OPEN)?;
    let after_open = &rest[open + STRING_OPEN.len_utf8()..];
    let close = after_open.find(STRING_CLOSE)?;
    let idx: usize = after_open[..close].parse().ok()?;
    strings.get(idx).map(|s| s.as_str())
}

fn number_after(text: &str, key: &str) -> Option<f64> {
    let pos = text.find(key)?;
    let rest = text[pos + key.len()..].trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '-' || c == '.' || c == '+'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

fn int_after(text: &str, key: &str) -> Option<i32> {
    number_after(text, key).map(|v| v as i32)
}

/// Collect every `/Name (...)` occurrence inside the `/FontSet [ ... ]` array, in declared
/// order, for font-index lookups.
fn font_set_names(text: &str, strings: &[String]) -> Vec<String> {
    let Some(start) = text.find("/FontSet") else {
        return Vec::new();
    };
    let Some(bracket_start) = text[start..].find('[') else {
        return Vec::new();
    };
    let array_start = start + bracket_start;

    let mut depth = 0i32;
    let mut array_end = text.len();
    for (offset, ch) in text[array_start..].char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    array_end = array_start + offset + 1;
                    break;
                }
            }
            _ => {}
        }
    }
    let array_text = &text[array_start..array_end];

    let mut names = Vec::new();
    let mut search_from = 0;
    while let Some(rel) = array_text[search_from..].find("/Name") {
        let abs = search_from + rel;
        if let Some(name) = string_after(&array_text[abs..], "/Name", strings) {
            names.push(name.to_string());
        }
        search_from = abs + "/Name".len();
    }
    names
}

/// Parse the RGB fill color out of the `/FillColor ... /Values [ r g b ]` block, clamping each
/// component to `[0, 1]` and scaling to 0-255 with a fixed alpha of 255.
fn fill_color(text: &str) -> (u8, u8, u8, u8) {
    let Some(fill_start) = text.find("/FillColor") else {
        return (0, 0, 0, 255);
    };
    let region = &text[fill_start..];
    let Some(values_start) = region.find("/Values") else {
        return (0, 0, 0, 255);
    };
    let values_region = &region[values_start..];
    let Some(bracket_start) = values_region.find('[') else {
        return (0, 0, 0, 255);
    };
    let Some(bracket_end) = values_region[bracket_start..].find(']') else {
        return (0, 0, 0, 255);
    };
    let inner = &values_region[bracket_start + 1..bracket_start + bracket_end];
    let components: Vec<f64> = inner
        .split_whitespace()
        .filter_map(|tok| tok.parse::<f64>().ok())
        .collect();

    let to_byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match components.as_slice() {
        [r, g, b, ..] => (to_byte(*r), to_byte(*g), to_byte(*b), 255),
        _ => (0, 0, 0, 255),
    }
}

/// Parse a text layer's `EngineData` raw payload: a textual, PostScript-flavored
/// serialization of Photoshop's text-rendering state.
fn parse_engine_data(bytes: &[u8]) -> PsdResult<DefaultStyle> {
    let (text, strings) = mask_parenthesized_strings(bytes);

    let font_index = int_after(&text, "/Font").unwrap_or(0).max(0) as usize;
    let font_set = font_set_names(&text, &strings);
    let font_name = font_set
        .get(font_index)
        .cloned()
        .or_else(|| string_after(&text, "/Name", &strings).map(|s| s.to_string()))
        .unwrap_or_default();

    let font_size = number_after(&text, "/FontSize").unwrap_or(0.0);
    let tracking = number_after(&text, "/Tracking").unwrap_or(0.0);
    let leading = number_after(&text, "/Leading").unwrap_or_else(|| {
        number_after(&text, "/AutoLeading")
            .map(|auto| auto * font_size)
            .unwrap_or(0.0)
    });
    let justification = Justification::from_i32(int_after(&text, "/Justification").unwrap_or(0));
    let fill_color = fill_color(&text);

    if font_name.is_empty() || font_size <= 0.0 {
        return Err(PsdError::InvalidStructure(
            "engine data has no usable font name or a non-positive font size".into(),
        ));
    }

    Ok(DefaultStyle {
        font_name,
        font_size,
        tracking,
        leading,
        justification,
        fill_color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tysh_payload(text_descriptor_bytes: &[u8]) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend(1u16.to_be_bytes()); // TySh version
        for v in [1.0, 0.0, 0.0, 1.0, 0.0, 0.0] {
            payload.extend((v as f64).to_be_bytes());
        }
        payload.extend(50u16.to_be_bytes()); // text version
        payload.extend(16u32.to_be_bytes()); // text descriptor version
        payload.extend(text_descriptor_bytes);
        // Bounds rectangle: last 32 bytes.
        for v in [1.0f64, 2.0, 100.0, 40.0] {
            payload.extend(v.to_be_bytes());
        }
        payload
    }

    fn descriptor_with_text(value: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(0u32.to_be_bytes()); // no name
        out.extend(0u32.to_be_bytes());
        out.extend(b"TxLr");
        out.extend(1u32.to_be_bytes()); // one field
        out.extend(0u32.to_be_bytes());
        out.extend(b"Txt ");
        out.extend(b"TEXT");
        let units: Vec<u16> = value.encode_utf16().collect();
        out.extend((units.len() as u32).to_be_bytes());
        for u in units {
            out.extend(u.to_be_bytes());
        }
        out
    }

    #[test]
    fn extracts_eager_transform_and_bounds() {
        let descriptor_bytes = descriptor_with_text("hi");
        let payload = tysh_payload(&descriptor_bytes);
        let block = TextBlock {
            legacy: false,
            payload,
        };
        let text_layer = TextLayer::from_tagged_block(0, &block).unwrap();

        assert_eq!(text_layer.source, TextSource::Modern);
        assert_eq!(text_layer.transform, [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(text_layer.bounds, (1.0, 2.0, 100.0, 40.0));
    }

    #[test]
    fn get_text_round_trips_unicode_content() {
        let descriptor_bytes = descriptor_with_text("Hello, 世界");
        let payload = tysh_payload(&descriptor_bytes);
        let block = TextBlock {
            legacy: false,
            payload,
        };
        let mut text_layer = TextLayer::from_tagged_block(0, &block).unwrap();

        assert_eq!(text_layer.get_text().unwrap(), "Hello, 世界");
        // Second call re-uses the cached descriptor rather than re-parsing.
        assert!(text_layer.text_descriptor.is_some());
        assert_eq!(text_layer.get_text().unwrap(), "Hello, 世界");
    }

    #[test]
    fn masks_parenthesized_strings_and_respects_escapes() {
        let data = br"/Name (Ari\(al\)) /FontSize 12.0".to_vec();
        let (masked, strings) = mask_parenthesized_strings(&data);
        assert_eq!(strings, vec!["Ari(al)".to_string()]);
        assert!(masked.contains("/FontSize 12.0"));
    }

    #[test]
    fn parses_engine_data_font_and_size() {
        let data = b"<< /Font 0 /FontSet [ << /Name (Helvetica) >> ] /FontSize 24.0 \
            /Tracking 0.0 /Justification 2 /FillColor << /Values [ 1.0 0.0 0.0 ] >> >>";
        let style = parse_engine_data(data).unwrap();
        assert_eq!(style.font_name, "Helvetica");
        assert_eq!(style.font_size, 24.0);
        assert_eq!(style.justification, Justification::Center);
        assert_eq!(style.fill_color, (255, 0, 0, 255));
    }

    #[test]
    fn engine_data_with_empty_font_name_is_invalid() {
        let data = b"/FontSize 12.0";
        let err = parse_engine_data(data).unwrap_err();
        assert!(matches!(err, PsdError::InvalidStructure(_)));
    }
}
