//! Error type shared by the loaders, writers and the search service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DictError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The container declares a format version newer than this build understands.
    #[error("unsupported dictionary version {found}; newest readable version is {max}")]
    UnsupportedVersion { found: u32, max: u32 },

    /// A read ran past the end of a part or of the index block.
    #[error("truncated {context}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        context: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("part sizes declare {declared} bytes but the container holds {available}")]
    PartSizeMismatch { declared: u64, available: u64 },

    #[error("invalid dictionary format: {0}")]
    InvalidFormat(String),

    #[error("XML import failed: {0}")]
    Xml(String),

    /// A list or string does not fit the compact record layout.
    #[error("{field} has {length} items, the record layout allows {max}")]
    FieldTooLong {
        field: &'static str,
        length: usize,
        max: usize,
    },

    #[error("no dictionary has been loaded")]
    NoDictionary,

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("search service is {0}")]
    ServiceState(&'static str),
}

pub type Result<T> = std::result::Result<T, DictError>;

impl From<quick_xml::Error> for DictError {
    fn from(err: quick_xml::Error) -> Self {
        DictError::Xml(err.to_string())
    }
}
