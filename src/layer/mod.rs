//! Parsed layers: records, their channel data, and the features/type derived from their
//! extra-data.

pub mod channel;
pub mod extra_data;
pub mod record;

use std::collections::HashMap;

use crate::layer::channel::{Channel, ChannelId};
use crate::layer::extra_data::{LayerFeatures, LayerType, TextBlock};

/// One fully parsed layer: its bounds, name, derived features, and its channels' (lazily
/// decoded) pixel data.
pub struct Layer {
    pub name: String,
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    pub opacity: u8,
    pub clipping: u8,
    pub flags: u8,
    pub bounds_invalid: bool,
    pub features: LayerFeatures,
    pub mask_data_len: u32,
    pub(crate) text_block: Option<TextBlock>,
    pub(crate) channels: HashMap<ChannelId, Channel>,
}

impl Layer {
    /// The layer's width in pixels.
    ///
    /// Widens to `i64` before subtracting: a `bounds_invalid` layer's coordinates are retained
    /// verbatim rather than reset (§4.5 step 5), and `right - left` in raw `i32` can overflow
    /// when the stored bounds are far outside the sanity range this never rejects.
    pub fn width(&self) -> usize {
        use crate::num_ext::SignedInteger;
        (self.right as i64 - self.left as i64).to_usize_or_zero()
    }

    /// The layer's height in pixels.
    pub fn height(&self) -> usize {
        use crate::num_ext::SignedInteger;
        (self.bottom as i64 - self.top as i64).to_usize_or_zero()
    }

    /// The number of channels this layer declares.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// The layer's derived type (text, group marker, smart object, and so on).
    pub fn layer_type(&self) -> LayerType {
        self.features.layer_type(self.channel_count())
    }

    /// Whether Photoshop marked this layer as a background layer (§4.5): true only for a
    /// layer that is last in file order, has flags bit 2 set, carries no transparency
    /// channel, no layer mask data, no vector mask tagged block, and whose channel count
    /// equals the caller-supplied base channel count for the document's color mode (3 for
    /// RGB, 4 for CMYK, 1 for grayscale).
    pub fn is_background_layer(&self, is_last_layer: bool, base_channel_count: usize) -> bool {
        is_last_layer
            && self.flags & 0b100 != 0
            && !self.channels.contains_key(&ChannelId::TransparencyMask)
            && self.mask_data_len == 0
            && !self.features.has_vector_mask
            && self.channel_count() == base_channel_count
    }

    /// Borrow a channel by id, if the layer has one.
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    /// Mutably borrow a channel by id, for lazy decoding.
    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    /// The raw bytes of this layer's `TySh`/`tySh` tagged block, or an empty slice if the layer
    /// carries no text descriptor.
    pub fn text_block_bytes(&self) -> &[u8] {
        self.text_block.as_ref().map(|b| b.payload.as_slice()).unwrap_or(&[])
    }
}
