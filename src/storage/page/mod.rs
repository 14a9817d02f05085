//! Page formats.
//!
//! This module contains:
//! - [`PageHeader`] - Metadata in front of every stored page
//! - [`PageType`] - Discriminator for the different payloads
//! - [`StoredPage`] with [`encode_node`] / [`decode_node`] - leaf and inner payloads
//! - [`DescriptorPage`] - Index metadata located from the end of the stream

mod descriptor;
mod layout;
mod page_header;

pub use descriptor::{DescriptorPage, FORMAT_VERSION};
pub use layout::{decode_node, encode_node, StoredPage};
pub use page_header::{PageHeader, PageType};
