use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssocError>;

#[derive(Debug, Error)]
pub enum AssocError {
    /// The input stream itself failed; passed through as-is.
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    #[error("IO error reading {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("document ends at byte {position} with {open} element(s) still open")]
    UnexpectedEof { position: u64, open: usize },

    #[error("association rejected: {0}")]
    Build(#[from] BuildError),

    #[error("TOML parse error in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl AssocError {
    /// Wraps a tokenizer error, pulling stream failures back out as `Io`.
    pub(crate) fn from_xml(source: quick_xml::Error, position: u64) -> Self {
        match source {
            quick_xml::Error::Io(shared) => AssocError::Io(
                Arc::try_unwrap(shared)
                    .unwrap_or_else(|e| std::io::Error::new(e.kind(), e.to_string())),
            ),
            other => AssocError::Xml { position, source: other },
        }
    }
}

/// Errors raised by an `AssociationBuilder` while it receives declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("command identifier must not be empty")]
    EmptyCommand,

    #[error("association for '{current}' is still open when '{next}' starts")]
    NestedAssociation { current: String, next: String },

    #[error("<{0}> declared outside of an association")]
    OutsideAssociation(&'static str),

    #[error("association for '{command}' declares no mask")]
    MissingMask { command: String },

    #[error("invalid mask '{mask}': {reason}")]
    InvalidMask { mask: String, reason: String },
}
