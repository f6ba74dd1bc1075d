//! Legacy-text decoding: MacRoman bytes and UTF-16BE code units, both converted to UTF-8.
//!
//! Photoshop writes layer names as Pascal strings in the legacy MacRoman repertoire, and
//! everything else text-shaped (Unicode layer names, `TEXT` descriptor values) as UTF-16BE. This
//! module is the single place that repertoire conversion happens.

/// The upper 128 code points of the MacRoman (Mac OS Roman, codepage 10000) repertoire, indexed
/// by `byte - 0x80`. Bytes below `0x80` map identically to their ASCII/Unicode code point.
const MACROMAN_HIGH: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è', // 0x80-0x8F
    'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü', // 0x90-0x9F
    '†', '°', '¢', '£', '§', '•', '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø', // 0xA0-0xAF
    '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏', 'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø', // 0xB0-0xBF
    '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{00A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ', // 0xC0-0xCF
    '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '€', '‹', '›', '\u{FB01}', '\u{FB02}', // 0xD0-0xDF
    '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô', // 0xE0-0xEF
    '\u{F8FF}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ', // 0xF0-0xFF
];

/// Convert a MacRoman byte sequence to a UTF-8 `String`.
///
/// Bytes `< 0x80` map identically to Unicode; bytes `>= 0x80` are looked up in [`MACROMAN_HIGH`].
pub fn macroman_to_utf8(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b < 0x80 {
            out.push(b as char);
        } else {
            out.push(MACROMAN_HIGH[(b - 0x80) as usize]);
        }
    }
    out
}

/// Convert a UTF-16BE byte sequence to a UTF-8 `String`, honoring surrogate pairs.
///
/// Lone or mispaired surrogates decode to U+FFFD (the replacement character). A trailing odd
/// byte (not a full code unit) is ignored.
pub fn utf16be_to_utf8(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    let mut out = String::with_capacity(units.len());
    let mut i = 0;
    while i < units.len() {
        let unit = units[i];
        match char::decode_utf16(std::iter::once(unit)).next() {
            Some(Ok(c)) => {
                out.push(c);
                i += 1;
            }
            Some(Err(_)) => {
                // `unit` is a surrogate. Try to pair it with the next unit.
                if (0xD800..=0xDBFF).contains(&unit) && i + 1 < units.len() {
                    let low = units[i + 1];
                    if (0xDC00..=0xDFFF).contains(&low) {
                        match char::decode_utf16([unit, low].iter().copied()).next() {
                            Some(Ok(c)) => {
                                out.push(c);
                                i += 2;
                                continue;
                            }
                            _ => {
                                out.push('\u{FFFD}');
                                i += 1;
                                continue;
                            }
                        }
                    }
                }
                out.push('\u{FFFD}');
                i += 1;
            }
            None => {
                i += 1;
            }
        }
    }
    out
}
