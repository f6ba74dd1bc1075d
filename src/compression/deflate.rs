//! DEFLATE/zlib inflation and PNG-style per-scanline prediction reversal.
//!
//! The teacher crate's `ZipWithoutPrediction`/`ZipWithPrediction` compression kinds are both
//! `unimplemented!()`; this module is new code, grounded on the wider example corpus's
//! near-universal choice of `flate2` for DEFLATE, and on the PNG filter algorithms for
//! prediction reversal (Photoshop reuses them, but resets the predictor state at every scanline
//! instead of carrying it across the whole image).

use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};

use crate::error::{PsdError, PsdResult};

/// Inflate a DEFLATE stream, trying raw (headerless) framing first and falling back to
/// zlib-wrapped framing.
///
/// Real-world Photoshop writers use both; this crate does not try to infer which from a header
/// byte, it simply attempts the one writers use far more often first and falls back.
pub fn inflate(input: &[u8], expected_output_len: usize) -> PsdResult<Vec<u8>> {
    if let Some(out) = try_inflate_raw(input, expected_output_len) {
        return Ok(out);
    }
    if let Some(out) = try_inflate_zlib(input, expected_output_len) {
        return Ok(out);
    }
    Err(PsdError::CorruptData(
        "deflate stream did not inflate as raw or zlib-framed data".into(),
    ))
}

fn try_inflate_raw(input: &[u8], expected_output_len: usize) -> Option<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(input);
    let mut out = Vec::with_capacity(expected_output_len);
    match decoder.read_to_end(&mut out) {
        Ok(_) if out.len() == expected_output_len => Some(out),
        _ => None,
    }
}

fn try_inflate_zlib(input: &[u8], expected_output_len: usize) -> Option<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(input);
    let mut out = Vec::with_capacity(expected_output_len);
    match decoder.read_to_end(&mut out) {
        Ok(_) if out.len() == expected_output_len => Some(out),
        _ => None,
    }
}

/// Reverse PNG-style per-scanline prediction over an already-inflated buffer.
///
/// `buffer` is laid out as repeating `(1 filter-type byte) + scanline_width` regions. Because
/// Photoshop resets the predictor at every scanline, the "above" and "upper-left" neighbors used
/// by the Up, Average, and Paeth filters are always taken as zero -- there is no cross-scanline
/// state to carry.
pub fn reverse_scanline_prediction(
    buffer: &[u8],
    scanline_width: usize,
    bytes_per_pixel: usize,
) -> PsdResult<Vec<u8>> {
    if scanline_width == 0 {
        return Ok(Vec::new());
    }
    let stride = scanline_width + 1;
    if buffer.len() % stride != 0 {
        return Err(PsdError::CorruptData(format!(
            "predicted buffer of {} bytes is not a multiple of the {}-byte scanline stride",
            buffer.len(),
            stride
        )));
    }

    let mut out = Vec::with_capacity(buffer.len() / stride * scanline_width);
    for scanline in buffer.chunks_exact(stride) {
        let filter = scanline[0];
        let filtered = &scanline[1..];
        let mut row = vec![0u8; scanline_width];

        for x in 0..scanline_width {
            let left = if x >= bytes_per_pixel {
                row[x - bytes_per_pixel]
            } else {
                0
            };
            let raw = match filter {
                0 => filtered[x],
                1 => filtered[x].wrapping_add(left),
                2 => filtered[x], // "above" is always zero.
                3 => filtered[x].wrapping_add((left as u16 / 2) as u8),
                4 => filtered[x].wrapping_add(paeth(left, 0, 0)),
                other => {
                    return Err(PsdError::CorruptData(format!(
                        "unrecognized scanline filter type {other}"
                    )))
                }
            };
            row[x] = raw;
        }
        out.extend_from_slice(&row);
    }
    Ok(out)
}

/// The standard PNG Paeth predictor over (left, above, upper-left).
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (a, b, c) = (a as i32, b as i32, c as i32);
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

/// Inflate a ZIP-with-prediction channel or composite plane and reverse its per-scanline
/// prediction in one step.
pub fn zip_with_prediction_decompress(
    input: &[u8],
    expected_output_size: usize,
    scanline_width: usize,
    bytes_per_pixel: usize,
) -> PsdResult<Vec<u8>> {
    if scanline_width == 0 {
        return Ok(Vec::new());
    }
    let rows = expected_output_size / scanline_width;
    let predicted_len = rows * (scanline_width + 1);
    let predicted = inflate(input, predicted_len)?;
    reverse_scanline_prediction(&predicted, scanline_width, bytes_per_pixel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn inflate_round_trips_zlib_framed_data() {
        let original = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = inflate(&compressed, original.len()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn none_filter_is_identity() {
        // One scanline, width 3, filter type 0 (None).
        let buffer = [0u8, 10, 20, 30];
        let out = reverse_scanline_prediction(&buffer, 3, 1).unwrap();
        assert_eq!(out, vec![10, 20, 30]);
    }

    #[test]
    fn sub_filter_accumulates_across_the_row() {
        // filter=1 (Sub), bytes_per_pixel=1: each byte is the delta from its left neighbor.
        let buffer = [1u8, 10, 5, 5];
        let out = reverse_scanline_prediction(&buffer, 3, 1).unwrap();
        assert_eq!(out, vec![10, 15, 20]);
    }

    #[test]
    fn up_filter_is_identity_because_above_is_zero() {
        let buffer = [2u8, 7, 8, 9];
        let out = reverse_scanline_prediction(&buffer, 3, 1).unwrap();
        assert_eq!(out, vec![7, 8, 9]);
    }
}
