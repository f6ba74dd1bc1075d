//! Data structures and methods for reading Adobe Photoshop PSD and PSB documents.
//!
//! This crate is read-only: it parses a document already held in memory (or behind a
//! caller-supplied [`ByteSource`]) into a [`Document`], and exposes query and rendering
//! operations over it. It does not write PSD/PSB files.
//!
//! psd spec: https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/

#![warn(missing_docs)]

pub mod byte_source;
pub mod compression;
pub mod container;
pub mod cursor;
pub mod descriptor;
pub mod error;
pub mod layer;
pub mod num_ext;
pub mod render;
pub mod scanline;
pub mod sections;
pub mod text;
pub mod text_layer;

pub use crate::compression::Compression;
pub use crate::error::{PsdError, PsdResult};
pub use crate::layer::channel::ChannelId;
pub use crate::layer::extra_data::LayerType;
pub use crate::layer::Layer;
pub use crate::sections::file_header::ColorMode;
pub use crate::sections::image_resources::ImageResource;
pub use crate::text_layer::{DefaultStyle, Justification, TextLayer, TextSource};

use crate::byte_source::{ByteSource, DynByteSource};
use crate::container::NamedContainer;
use crate::cursor::PsdCursor;
use crate::sections::color_mode_data::ColorModeDataSection;
use crate::sections::composite_image::CompositeImageSection;
use crate::sections::file_header::{FileHeaderSection, Format};
use crate::sections::image_resources::ImageResourcesSection;
use crate::sections::layer_and_mask::LayerAndMaskInformationSection;

/// The composite image's native format metadata, returned alongside its rendered RGBA8 bytes by
/// the extended composite-rendering query.
#[derive(Debug, Clone, Copy)]
pub struct CompositeInfo {
    pub color_mode: ColorMode,
    pub depth: u16,
    pub channel_count: u16,
    pub compression: Compression,
}

/// A fully parsed Photoshop document: its header metadata, color-mode data, image resources,
/// layers, composite image, and the derived text-layer index.
///
/// All references this type hands out borrow from the document and cannot outlive it; this is
/// enforced by the Rust borrow checker rather than by any runtime bookkeeping.
pub struct Document {
    format: Format,
    channel_count: u16,
    width: u32,
    height: u32,
    depth: u16,
    color_mode: ColorMode,
    color_mode_data: ColorModeDataSection,
    resources: ImageResourcesSection,
    layers: NamedContainer<Layer>,
    has_transparency_layer: bool,
    composite: Option<CompositeImageSection>,
    text_layers: Vec<TextLayer>,
}

impl Document {
    /// Parse a document from an in-memory byte slice.
    ///
    /// Parses the five major sections in file order: header, color-mode data, image resources,
    /// layer-and-mask information, and composite image data. Two classes of failure are soft: a
    /// composite-image parse failure of kind stream-eof, stream-invalid, or
    /// unsupported-compression leaves the document without a composite rather than aborting;
    /// a text layer that fails to parse is simply absent from the text-layer index rather than
    /// aborting the whole document.
    pub fn from_bytes(bytes: &[u8]) -> PsdResult<Document> {
        let mut cursor = PsdCursor::new(bytes);

        let header = FileHeaderSection::from_cursor(&mut cursor)?;
        let color_mode_data = ColorModeDataSection::from_cursor(&mut cursor)?;
        let resources = ImageResourcesSection::from_cursor(&mut cursor)?;
        let layer_and_mask =
            LayerAndMaskInformationSection::from_cursor(&mut cursor, header.format)?;

        let composite = match CompositeImageSection::from_cursor(
            &mut cursor,
            header.channel_count as usize,
            header.width as usize,
            header.height as usize,
            header.depth,
        ) {
            Ok(composite) => composite,
            Err(PsdError::StreamEof { .. })
            | Err(PsdError::StreamInvalid(_))
            | Err(PsdError::UnsupportedCompression(_)) => None,
            Err(other) => return Err(other),
        };

        let mut text_layers = Vec::new();
        for (index, layer) in layer_and_mask.layers.items().iter().enumerate() {
            if let Some(block) = &layer.text_block {
                if let Ok(text_layer) = TextLayer::from_tagged_block(index, block) {
                    text_layers.push(text_layer);
                }
            }
        }

        Ok(Document {
            format: header.format,
            channel_count: header.channel_count,
            width: header.width,
            height: header.height,
            depth: header.depth,
            color_mode: header.color_mode,
            color_mode_data,
            resources,
            layers: layer_and_mask.layers,
            has_transparency_layer: layer_and_mask.has_transparency_layer,
            composite,
            text_layers,
        })
    }

    /// Parse a document from a caller-supplied [`ByteSource`].
    ///
    /// This crate's parser assumes random access over the whole document (the format requires
    /// it); a `ByteSource` that isn't already an in-memory slice is read into one up front.
    pub fn from_source(source: Box<dyn ByteSource>) -> PsdResult<Document> {
        let mut source = DynByteSource::new(source);
        let len = source.len() as usize;
        source.seek(0)?;
        let mut buf = vec![0u8; len];
        source.read_exact(&mut buf)?;
        source.close();
        Document::from_bytes(&buf)
    }

    /// Whether this build of the crate can decode DEFLATE-compressed (ZIP / ZIP+predict)
    /// channel and composite data. Always `true`: this crate always depends on `flate2`.
    pub const fn deflate_available() -> bool {
        true
    }

    // -- Document metadata ------------------------------------------------

    /// The document's width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The document's height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The document's color mode.
    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// The document's bit depth per channel: one of 1, 8, 16, or 32.
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// The number of channels declared in the file header.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Whether this document uses the large-document (PSB) format.
    pub fn is_large(&self) -> bool {
        self.format.is_large()
    }

    /// The color-mode data section's raw bytes (for indexed-mode documents, a 768-byte RGB
    /// palette; for all other modes, typically empty).
    pub fn color_mode_data(&self) -> &[u8] {
        &self.color_mode_data.data
    }

    /// Every image resource, in file order.
    pub fn resources(&self) -> &[ImageResource] {
        self.resources.resources()
    }

    /// The first image resource with the given id, if any.
    pub fn resource_by_id(&self, id: u16) -> Option<&ImageResource> {
        self.resources.by_id(id)
    }

    /// The first image resource with the given name, if any.
    pub fn resource_by_name(&self, name: &str) -> Option<&ImageResource> {
        self.resources.by_name(name)
    }

    /// The number of layers in the document.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Whether the layer-and-mask section declared a transparency layer (a negative layer
    /// count in the on-disk format).
    pub fn has_transparency_layer(&self) -> bool {
        self.has_transparency_layer
    }

    /// The composite image's compression kind, if a composite is present.
    pub fn composite_compression(&self) -> Option<Compression> {
        self.composite.as_ref().map(|c| c.compression)
    }

    /// The composite image's decoded, channel-major planar bytes, if a composite is present.
    pub fn composite_planes(&self) -> Option<&[u8]> {
        self.composite.as_ref().map(|c| c.planes.as_slice())
    }

    /// The composite image's native format metadata (color mode, depth, channel count, and
    /// compression kind), if a composite is present.
    pub fn composite_info(&self) -> Option<CompositeInfo> {
        self.composite.as_ref().map(|c| CompositeInfo {
            color_mode: self.color_mode,
            depth: self.depth,
            channel_count: self.channel_count,
            compression: c.compression,
        })
    }

    // -- Per-layer ----------------------------------------------------------

    /// Every layer, in file order.
    pub fn layers(&self) -> &[Layer] {
        self.layers.items()
    }

    /// Borrow a layer by its zero-based index.
    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.by_index(index)
    }

    /// Borrow the first layer with the given name.
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.by_name(name)
    }

    /// Whether Photoshop marked the layer at `index` as the document's background layer
    /// (§4.5), using the document's color mode to derive the base channel count the predicate
    /// needs.
    pub fn is_background_layer(&self, index: usize) -> bool {
        let base_channel_count = self.color_mode.base_channel_count();
        let is_last_layer = index + 1 == self.layers.len();
        match self.layers.by_index(index) {
            Some(layer) => layer.is_background_layer(is_last_layer, base_channel_count),
            None => false,
        }
    }

    /// Decode (if necessary) and return one channel's raw pixel plane for the layer at `index`.
    pub fn decode_layer_channel(
        &mut self,
        index: usize,
        channel_id: ChannelId,
    ) -> PsdResult<&[u8]> {
        let depth = self.depth;
        let layer = self
            .layers
            .by_index_mut(index)
            .ok_or_else(|| PsdError::InvalidArgument(format!("no layer at index {index}")))?;
        let width = layer.width();
        let height = layer.height();
        let channel = layer.channel_mut(channel_id).ok_or_else(|| {
            PsdError::InvalidArgument(format!("layer {index} has no channel {channel_id:?}"))
        })?;
        channel.decode(width, height, depth)
    }

    // -- Rendering ------------------------------------------------------------

    /// The number of bytes [`render_composite_into`](Document::render_composite_into) requires,
    /// if a composite image is present.
    pub fn render_composite_required_size(&self) -> PsdResult<usize> {
        if self.composite.is_none() {
            return Err(PsdError::InvalidArgument(
                "document has no composite image data to render".into(),
            ));
        }
        Ok(render::required_size(self.width as usize, self.height as usize))
    }

    /// Render the composite image to interleaved RGBA8, writing into the first
    /// `required_size()` bytes of `buffer`.
    pub fn render_composite_into(&self, buffer: &mut [u8]) -> PsdResult<()> {
        let required = self.render_composite_required_size()?;
        if buffer.len() < required {
            return Err(PsdError::BufferTooSmall {
                required_size: required,
                provided_size: buffer.len(),
            });
        }
        let composite = self.composite.as_ref().expect("checked by required_size");
        let palette = self.color_mode_data.indexed_palette();
        let rgba = render::render_rgba(
            &composite.planes,
            self.channel_count as usize,
            self.width as usize,
            self.height as usize,
            self.depth,
            self.color_mode,
            palette,
        )?;
        buffer[..required].copy_from_slice(&rgba);
        Ok(())
    }

    /// The number of bytes
    /// [`render_layer_into`](Document::render_layer_into) requires for the layer at `index`.
    pub fn render_layer_required_size(&self, index: usize) -> PsdResult<usize> {
        let layer = self
            .layers
            .by_index(index)
            .ok_or_else(|| PsdError::InvalidArgument(format!("no layer at index {index}")))?;
        Ok(render::required_size(layer.width(), layer.height()))
    }

    /// Render one layer to interleaved RGBA8, writing into the first `required_size()` bytes of
    /// `buffer`. Decodes every color channel the layer has (plus its transparency channel, if
    /// present) as a side effect.
    pub fn render_layer_into(&mut self, index: usize, buffer: &mut [u8]) -> PsdResult<()> {
        let required = self.render_layer_required_size(index)?;
        if buffer.len() < required {
            return Err(PsdError::BufferTooSmall {
                required_size: required,
                provided_size: buffer.len(),
            });
        }

        let depth = self.depth;
        let color_mode = self.color_mode;
        let base_channel_count = color_mode.base_channel_count();
        let palette: Option<Vec<u8>> =
            self.color_mode_data.indexed_palette().map(|p| p.to_vec());

        let layer = self
            .layers
            .by_index_mut(index)
            .ok_or_else(|| PsdError::InvalidArgument(format!("no layer at index {index}")))?;
        let width = layer.width();
        let height = layer.height();
        let (planes, channel_count) =
            decode_layer_planes(layer, width, height, depth, base_channel_count)?;

        let rgba = render::render_rgba(
            &planes,
            channel_count,
            width,
            height,
            depth,
            color_mode,
            palette.as_deref(),
        )?;
        buffer[..required].copy_from_slice(&rgba);
        Ok(())
    }

    // -- Text layers ----------------------------------------------------------

    /// Borrow the text-layer record for the layer at `index`, if it carries one.
    pub fn text_layer(&mut self, index: usize) -> Option<&mut TextLayer> {
        self.text_layers.iter_mut().find(|t| t.layer_index == index)
    }

    /// The literal text content of the layer at `index`.
    pub fn get_text(&mut self, index: usize) -> PsdResult<String> {
        self.text_layer(index)
            .ok_or_else(|| {
                PsdError::InvalidArgument(format!("layer {index} has no text descriptor"))
            })?
            .get_text()
    }

    /// The default character style of the layer at `index`, parsed out of its engine data.
    pub fn get_default_style(&mut self, index: usize) -> PsdResult<DefaultStyle> {
        self.text_layer(index)
            .ok_or_else(|| {
                PsdError::InvalidArgument(format!("layer {index} has no text descriptor"))
            })?
            .get_default_style()
    }

    /// The 2D affine transform of the text layer at `index`, if it has one.
    pub fn text_transform(&self, index: usize) -> Option<[f64; 6]> {
        self.text_layers
            .iter()
            .find(|t| t.layer_index == index)
            .map(|t| t.transform)
    }

    /// The rectangular text bounds (left, top, right, bottom) of the text layer at `index`, if
    /// it has one.
    pub fn text_bounds(&self, index: usize) -> Option<(f64, f64, f64, f64)> {
        self.text_layers
            .iter()
            .find(|t| t.layer_index == index)
            .map(|t| t.bounds)
    }
}

/// Decode every color channel a layer declares (up to `base_channel_count`), plus its
/// transparency channel if present, into one channel-major `Vec<u8>` ready for
/// [`render::render_rgba`]. Returns the decoded plane count alongside the bytes, since a layer
/// with no transparency channel contributes one fewer plane than `base_channel_count + 1`.
fn decode_layer_planes(
    layer: &mut Layer,
    width: usize,
    height: usize,
    depth: u16,
    base_channel_count: usize,
) -> PsdResult<(Vec<u8>, usize)> {
    let mut planes = Vec::new();
    for component in 0..base_channel_count {
        let channel = layer
            .channel_mut(ChannelId::Color(component as u16))
            .ok_or_else(|| {
                PsdError::InvalidStructure(format!(
                    "layer is missing color channel {component} for its color mode"
                ))
            })?;
        planes.extend_from_slice(channel.decode(width, height, depth)?);
    }

    let mut channel_count = base_channel_count;
    if let Some(alpha) = layer.channel_mut(ChannelId::TransparencyMask) {
        planes.extend_from_slice(alpha.decode(width, height, depth)?);
        channel_count += 1;
    }

    Ok((planes, channel_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_rgb_document() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(b"8BPS");
        bytes.extend(1u16.to_be_bytes()); // version: standard
        bytes.extend([0u8; 6]); // reserved
        bytes.extend(3u16.to_be_bytes()); // channel count
        bytes.extend(2u32.to_be_bytes()); // height
        bytes.extend(2u32.to_be_bytes()); // width
        bytes.extend(8u16.to_be_bytes()); // depth
        bytes.extend(3u16.to_be_bytes()); // color mode: RGB

        bytes.extend(0u32.to_be_bytes()); // color mode data length
        bytes.extend(0u32.to_be_bytes()); // image resources length

        // Layer and mask info: length, layer info length, 0 layers, no global mask.
        let mut layer_info = Vec::new();
        layer_info.extend(0i16.to_be_bytes()); // layer count
        let mut layer_and_mask = Vec::new();
        layer_and_mask.extend((layer_info.len() as u32).to_be_bytes());
        layer_and_mask.extend(layer_info);
        layer_and_mask.extend(0u32.to_be_bytes()); // global layer mask info length
        bytes.extend((layer_and_mask.len() as u32).to_be_bytes());
        bytes.extend(layer_and_mask);

        // Composite image data: raw, 3 channels of 2x2 depth-8 pixels.
        bytes.extend(0u16.to_be_bytes()); // compression: raw
        bytes.extend([255u8; 4]); // R plane
        bytes.extend([0u8; 4]); // G plane
        bytes.extend([0u8; 4]); // B plane

        bytes
    }

    #[test]
    fn parses_a_minimal_document_and_renders_its_composite() {
        let bytes = minimal_rgb_document();
        let document = Document::from_bytes(&bytes).unwrap();

        assert_eq!(document.width(), 2);
        assert_eq!(document.height(), 2);
        assert_eq!(document.color_mode(), ColorMode::Rgb);
        assert_eq!(document.depth(), 8);
        assert_eq!(document.layer_count(), 0);
        assert!(!document.has_transparency_layer());
        assert_eq!(document.composite_compression(), Some(Compression::Raw));

        let required = document.render_composite_required_size().unwrap();
        assert_eq!(required, 2 * 2 * 4);
        let mut buffer = vec![0u8; required];
        document.render_composite_into(&mut buffer).unwrap();
        assert_eq!(buffer, vec![255, 0, 0, 255, 255, 0, 0, 255, 255, 0, 0, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn document_with_no_composite_reports_required_size_as_invalid_argument() {
        let mut bytes = minimal_rgb_document();
        // Truncate off the composite image data entirely.
        bytes.truncate(bytes.len() - (2 + 12));
        let document = Document::from_bytes(&bytes).unwrap();

        assert!(document.composite_compression().is_none());
        let err = document.render_composite_required_size().unwrap_err();
        assert!(matches!(err, PsdError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = minimal_rgb_document();
        bytes[0] = b'X';
        let err = Document::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, PsdError::InvalidFileFormat));
    }

    #[test]
    fn deflate_is_always_available() {
        assert!(Document::deflate_available());
    }
}
