//! Readers and writers for dictionary containers.

pub mod binary;
pub mod load;
pub mod xml;

pub use binary::{BinaryWriter, FormatVersion};
pub use load::{DictionaryLoader, DictionarySource, LoadTask};
pub use xml::decode_xml;
