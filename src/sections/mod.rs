//! The five major sections of a Photoshop document, parsed in file order from a shared cursor.
//!
//! The teacher crate splits the document up front into five raw byte ranges
//! (`MajorSections::from_bytes`) before parsing any of them. This crate instead parses each
//! section directly off one shared [`PsdCursor`](crate::cursor::PsdCursor) in sequence, since
//! every section's own length prefix (or, for the composite image, the end of the file) already
//! tells the cursor where the next section begins -- an up-front split would just be re-deriving
//! the same boundaries a second time.

pub mod color_mode_data;
pub mod composite_image;
pub mod file_header;
pub mod image_resources;
pub mod layer_and_mask;
