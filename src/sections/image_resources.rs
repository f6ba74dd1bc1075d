//! Image resources: an ordered sequence of id-tagged resource blocks.
//!
//! Grounded on the teacher crate's `image_resources_section.rs` block loop. Unlike the teacher,
//! which special-cases the slices resource (id 1050) and routes it through a stubbed descriptor
//! reader, this crate retains every resource's raw bytes and leaves interpretation to callers --
//! consistent with the specification's "all successfully parsed blocks are retained" rule and
//! the stated non-goal of interpreting resource-specific payloads.

use crate::container::NamedContainer;
use crate::cursor::PsdCursor;
use crate::error::PsdResult;

const SIGNATURE: &[u8; 4] = b"8BIM";
const SIGNATURE_8B64: &[u8; 4] = b"8B64";

/// One image resource block.
#[derive(Debug, Clone)]
pub struct ImageResource {
    pub id: u16,
    pub name: String,
    pub data: Vec<u8>,
}

/// The image resources section.
#[derive(Debug, Clone, Default)]
pub struct ImageResourcesSection {
    resources: NamedContainer<ImageResource>,
}

impl ImageResourcesSection {
    /// Parse the section: a 4-byte length, then blocks until that many bytes are consumed.
    ///
    /// An unknown block signature stops parsing but repositions the cursor to the declared
    /// section end, so later sections stay aligned.
    pub fn from_cursor(cursor: &mut PsdCursor) -> PsdResult<Self> {
        let section_len = cursor.read_u32()? as u64;
        let section_end = cursor.position() + section_len;

        let mut resources = NamedContainer::new();
        while cursor.position() < section_end {
            let signature = match cursor.peek_4() {
                Ok(s) => s,
                Err(_) => break,
            };
            if signature != SIGNATURE && signature != SIGNATURE_8B64 {
                break;
            }
            match Self::read_block(cursor) {
                Ok((name, resource)) => resources.push(name, resource),
                Err(_) => break,
            }
        }

        cursor.set_position(section_end)?;
        Ok(ImageResourcesSection { resources })
    }

    fn read_block(cursor: &mut PsdCursor) -> PsdResult<(String, ImageResource)> {
        cursor.skip(4)?; // signature, already checked by the caller.
        let id = cursor.read_u16()?;
        let (name, consumed) = cursor.read_pascal_string()?;
        if consumed % 2 != 0 {
            cursor.skip(1)?;
        }
        let data_len = cursor.read_u32()?;
        let data = cursor.read(data_len)?.to_vec();
        if data_len % 2 != 0 {
            cursor.skip(1)?;
        }
        Ok((
            name.clone(),
            ImageResource { id, name, data },
        ))
    }

    /// All resources, in file order.
    pub fn resources(&self) -> &[ImageResource] {
        self.resources.items()
    }

    /// Find the first resource with the given id.
    pub fn by_id(&self, id: u16) -> Option<&ImageResource> {
        self.resources.items().iter().find(|r| r.id == id)
    }

    /// Find a resource by name (first match, per [`NamedContainer`]'s duplicate-name rule).
    pub fn by_name(&self, name: &str) -> Option<&ImageResource> {
        self.resources.by_name(name)
    }
}
