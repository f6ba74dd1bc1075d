//! The composite image data section: the final section of the file, with no length prefix.
//!
//! Grounded on the teacher crate's `ImageDataSection::from_bytes`, given working ZIP and
//! ZIP+predict paths (the teacher's snapshot leaves both `unimplemented!()`) and the
//! two-byte-vs-four-byte row-count-table disambiguation the RLE branch needs for large-format
//! documents.

use crate::compression::{deflate, packbits, Compression};
use crate::cursor::PsdCursor;
use crate::error::PsdResult;
use crate::scanline::{predictor_bytes_per_pixel, scanline_bytes};

/// The composite image: one decoded plane per channel, plus the compression kind it was stored
/// under.
#[derive(Debug, Clone)]
pub struct CompositeImageSection {
    pub compression: Compression,
    /// Decoded bytes, channel-major: channel 0's full plane, then channel 1's, and so on.
    pub planes: Vec<u8>,
}

impl CompositeImageSection {
    /// Parse the composite image data: a 2-byte compression kind, then planar pixel data for
    /// `channel_count` channels of `width` x `height` pixels at the document's declared `depth`.
    ///
    /// Returns `Ok(None)` rather than failing outright when the composite is simply absent
    /// (the cursor has no bytes left), matching the specification's "composite absent" case for
    /// a minimal document.
    pub fn from_cursor(
        cursor: &mut PsdCursor,
        channel_count: usize,
        width: usize,
        height: usize,
        depth: u16,
    ) -> PsdResult<Option<Self>> {
        if cursor.position() >= cursor.len() {
            return Ok(None);
        }

        let compression = Compression::new(cursor.read_u16()?)?;
        let row_width = scanline_bytes(width, depth);
        let plane_len = row_width * height;
        let total_len = plane_len * channel_count;

        let planes = match compression {
            Compression::Raw => cursor.read(total_len as u32)?.to_vec(),
            Compression::Rle => {
                let remaining = (cursor.len() - cursor.position()) as u32;
                let bytes = cursor.read(remaining)?;
                decode_rle_planes(bytes, channel_count, height, row_width)?
            }
            Compression::Zip => {
                let remaining = (cursor.len() - cursor.position()) as u32;
                let bytes = cursor.read(remaining)?;
                deflate::inflate(bytes, total_len)?
            }
            Compression::ZipWithPrediction => {
                let remaining = (cursor.len() - cursor.position()) as u32;
                let bytes = cursor.read(remaining)?;
                deflate::zip_with_prediction_decompress(
                    bytes,
                    total_len,
                    row_width,
                    predictor_bytes_per_pixel(depth),
                )?
            }
        };

        Ok(Some(CompositeImageSection {
            compression,
            planes,
        }))
    }
}

/// Decode every channel's RLE-compressed plane out of `buffer`, which holds a single row-count
/// table of `channel_count * height` entries (one entry per scanline, in channel-major order)
/// followed immediately by all of that row data, in the same order as the table.
///
/// Because the composite image data is the last section in the file, `buffer` is exactly sized
/// to hold this data and nothing more; the row-count width (2 or 4 bytes) is therefore
/// disambiguated once, for the whole buffer, by checking which width lets the combined table and
/// row data exactly tile the buffer with nothing left over (§4.2/§4.5).
fn decode_rle_planes(
    buffer: &[u8],
    channel_count: usize,
    height: usize,
    row_width: usize,
) -> PsdResult<Vec<u8>> {
    let row_count = channel_count * height;
    let table_len_2 = row_count * 2;
    let table_len_4 = row_count * 4;

    let sum_as_u16: Option<usize> = buffer.get(..table_len_2).map(|table| {
        table
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]) as usize)
            .sum()
    });
    let total2 = sum_as_u16.map(|sum| table_len_2 + sum);

    let sum_as_u32: Option<usize> = buffer.get(..table_len_4).map(|table| {
        table
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]) as usize)
            .sum()
    });
    let total4 = sum_as_u32.map(|sum| table_len_4 + sum);

    let use_four_byte = match (total2, total4) {
        (Some(t2), _) if t2 == buffer.len() => false, // prefer 2 on tie
        (_, Some(t4)) if t4 == buffer.len() => true,
        _ => {
            return Err(crate::error::PsdError::CorruptData(
                "composite rle data matches neither 2-byte nor 4-byte row-count tables".into(),
            ))
        }
    };

    let table_len = if use_four_byte { table_len_4 } else { table_len_2 };
    let (row_table, row_data) = buffer.split_at(table_len);
    packbits::decode_rows(row_table, row_data, row_count, row_width, use_four_byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_composite_returns_none() {
        let bytes: [u8; 0] = [];
        let mut cursor = PsdCursor::new(&bytes);
        let result = CompositeImageSection::from_cursor(&mut cursor, 3, 2, 2, 8).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn raw_composite_decodes_verbatim() {
        let mut bytes = 0u16.to_be_bytes().to_vec(); // compression = raw
        bytes.extend(vec![9u8; 2 * 2]); // 1 channel, 2x2, depth 8
        let mut cursor = PsdCursor::new(&bytes);
        let result = CompositeImageSection::from_cursor(&mut cursor, 1, 2, 2, 8)
            .unwrap()
            .unwrap();
        assert_eq!(result.compression, Compression::Raw);
        assert_eq!(result.planes, vec![9u8; 4]);
    }

    #[test]
    fn depth_one_composite_uses_packed_scanline_bytes() {
        let mut bytes = 0u16.to_be_bytes().to_vec(); // compression = raw
        bytes.extend([0b1111_0000u8]); // 1 channel, width 5 packs into a single byte per row
        let mut cursor = PsdCursor::new(&bytes);
        let result = CompositeImageSection::from_cursor(&mut cursor, 1, 5, 1, 1)
            .unwrap()
            .unwrap();
        assert_eq!(result.planes, vec![0b1111_0000]);
    }

    #[test]
    fn multi_channel_rle_composite_shares_one_row_count_table() {
        // 2 channels, 2 rows each, row width 3. The row-count table covers all 4 scanlines
        // (channel-major: channel 0's rows, then channel 1's), followed by all row data in the
        // same order -- not a separate table per channel.
        let mut bytes = 1u16.to_be_bytes().to_vec(); // compression = RLE
        let rows: [[u8; 3]; 4] = [[1, 1, 1], [2, 2, 2], [3, 3, 3], [4, 4, 4]];
        let mut row_table = Vec::new();
        let mut row_data = Vec::new();
        for row in &rows {
            row_table.extend(4u16.to_be_bytes()); // literal-run header + 3 bytes = 4
            row_data.push(0x02); // literal run: 3 bytes follow
            row_data.extend(row);
        }
        bytes.extend(row_table);
        bytes.extend(row_data);

        let mut cursor = PsdCursor::new(&bytes);
        let result = CompositeImageSection::from_cursor(&mut cursor, 2, 3, 2, 8)
            .unwrap()
            .unwrap();
        assert_eq!(
            result.planes,
            vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]
        );
    }
}
