/// Errors raised while opening or saving a document package.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The bytes are not a readable zip package.
    #[error("not a readable document package: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A package part is not well-formed XML.
    #[error("malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    /// A part the document cannot do without is absent from the package.
    #[error("document package has no {0} part")]
    MissingPart(String),
}

impl DocumentError {
    pub(crate) fn xml(part: &str, err: impl std::fmt::Display) -> Self {
        DocumentError::Xml {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

/// Errors raised while reading a rewrite responses payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("responses payload is empty")]
    Empty,

    /// Neither the strict nor the lenient parser accepted the payload.
    #[error("responses payload could not be parsed: {0}")]
    Malformed(String),
}

/// Errors raised by the rewriter. No output is produced when one occurs.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Strict ordered mode only: the number of supplied values differs from
    /// the number of placeholders found on re-scan.
    #[error("{supplied} values supplied but the document has {found} placeholders")]
    SlotMismatch { supplied: usize, found: usize },
}
