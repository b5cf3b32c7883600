use std::path::PathBuf;

use crate::xml::XmlError;

/// All errors raised by the RSpec layer.
#[derive(Debug, thiserror::Error)]
pub enum RSpecError {
    /// Malformed input, or a document that does not satisfy a dialect
    /// constraint (wrong root element, missing sliver declarations, ...).
    #[error("invalid rspec: {0}")]
    InvalidRSpec(String),

    /// No adapter is registered for the requested dialect.
    #[error("unknown rspec version: {type_name} {version} ({content_type})")]
    UnknownRSpecVersion {
        type_name: String,
        version: String,
        content_type: String,
    },

    /// The document source could not be read from disk.
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// XML syntax error in the document body.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// `generated`/`expires` timestamp could not be produced or parsed.
    #[error("timestamp error: {0}")]
    Timestamp(String),
}

impl RSpecError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRSpec(message.into())
    }

    pub fn unknown_version(
        type_name: impl Into<String>,
        version: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self::UnknownRSpecVersion {
            type_name: type_name.into(),
            version: version.into(),
            content_type: content_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_version_display() {
        let err = RSpecError::unknown_version("GENI", "9", "request");
        assert_eq!(err.to_string(), "unknown rspec version: GENI 9 (request)");
    }

    #[test]
    fn xml_errors_convert() {
        let err: RSpecError = XmlError::Empty.into();
        assert!(matches!(err, RSpecError::Xml(XmlError::Empty)));
    }
}
