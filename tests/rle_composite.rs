use anyhow::Result;
use psd_reader::{Compression, Document};

/// Builds a standard-format, single-channel grayscale document whose composite image is
/// RLE-compressed: 10 rows, each packed as a single PackBits literal run of 5 bytes (a `0x04`
/// header followed by the 5 literal bytes), so every row's compressed size is 6 bytes.
///
/// With a 2-byte row-count table that's `10 * 2 = 20` bytes of table plus `10 * 6 = 60` bytes of
/// row data, 80 bytes total; with a 4-byte table it would be `40 + 60 = 100`. This exercises the
/// width disambiguation in `decode_rle_planes` end to end through `Document::from_bytes`.
fn document_with_rle_composite() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend(b"8BPS");
    bytes.extend(1u16.to_be_bytes()); // version: standard
    bytes.extend([0u8; 6]);
    bytes.extend(1u16.to_be_bytes()); // channel count
    bytes.extend(10u32.to_be_bytes()); // height
    bytes.extend(5u32.to_be_bytes()); // width
    bytes.extend(8u16.to_be_bytes()); // depth
    bytes.extend(1u16.to_be_bytes()); // color mode: grayscale

    bytes.extend(0u32.to_be_bytes()); // color mode data length
    bytes.extend(0u32.to_be_bytes()); // image resources length

    let mut layer_info = Vec::new();
    layer_info.extend(0i16.to_be_bytes());
    let mut layer_and_mask = Vec::new();
    layer_and_mask.extend((layer_info.len() as u32).to_be_bytes());
    layer_and_mask.extend(layer_info);
    layer_and_mask.extend(0u32.to_be_bytes());
    bytes.extend((layer_and_mask.len() as u32).to_be_bytes());
    bytes.extend(layer_and_mask);

    bytes.extend(1u16.to_be_bytes()); // compression: RLE

    let row_count: usize = 10;
    let mut row_table = Vec::with_capacity(row_count * 2);
    let mut row_data = Vec::with_capacity(row_count * 6);
    for row in 0..row_count {
        row_table.extend(6u16.to_be_bytes());
        row_data.push(0x04); // literal run header: 5 bytes follow
        row_data.extend([row as u8; 5]);
    }
    bytes.extend(row_table);
    bytes.extend(row_data);

    bytes
}

#[test]
fn rle_composite_picks_the_two_byte_row_count_table() -> Result<()> {
    let bytes = document_with_rle_composite();
    let document = Document::from_bytes(&bytes)?;

    assert_eq!(document.composite_compression(), Some(Compression::Rle));
    let planes = document.composite_planes().expect("composite should decode");
    assert_eq!(planes.len(), 5 * 10);
    // Row 3 (zero-based) was packed as five repetitions of the byte 3.
    assert_eq!(&planes[3 * 5..3 * 5 + 5], &[3, 3, 3, 3, 3]);

    Ok(())
}
