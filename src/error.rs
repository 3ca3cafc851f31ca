use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkerError {
    #[error("configuration invalid or unavailable: {0}")]
    Configuration(String),
    #[error("bill-session cache {path} is corrupt: {reason}")]
    CorruptCache { path: String, reason: String },
    #[error("malformed event record: {0}")]
    MalformedRecord(String),
    #[error("event placement failed: {0}")]
    Placement(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkerErrorCode {
    E000Unexpected,
    E001Configuration,
    E002CorruptCache,
    E003MalformedRecord,
    E004Placement,
}

impl LinkerErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E000Unexpected => "E000_UNEXPECTED",
            Self::E001Configuration => "E001_CONFIGURATION",
            Self::E002CorruptCache => "E002_CORRUPT_CACHE",
            Self::E003MalformedRecord => "E003_MALFORMED_RECORD",
            Self::E004Placement => "E004_PLACEMENT",
        }
    }
}

impl LinkerError {
    pub fn code(&self) -> LinkerErrorCode {
        match self {
            Self::Configuration(_) => LinkerErrorCode::E001Configuration,
            Self::CorruptCache { .. } => LinkerErrorCode::E002CorruptCache,
            Self::MalformedRecord(_) => LinkerErrorCode::E003MalformedRecord,
            Self::Placement(_) => LinkerErrorCode::E004Placement,
        }
    }
}

/// Finds the typed linker error inside an `anyhow` chain, if there is one.
pub fn linker_error(err: &anyhow::Error) -> Option<&LinkerError> {
    err.chain().find_map(|cause| cause.downcast_ref::<LinkerError>())
}

/// Stable code for any error. Failures with no typed cause (raw I/O, JSON
/// decoding) get `E000_UNEXPECTED`.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    linker_error(err)
        .map(LinkerError::code)
        .unwrap_or(LinkerErrorCode::E000Unexpected)
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn linker_error_is_found_through_context_layers() {
        let err = Err::<(), _>(LinkerError::Placement("disk".to_string()))
            .context("placing event_1.json")
            .unwrap_err();
        let found = linker_error(&err).expect("typed error");
        assert!(matches!(found, LinkerError::Placement(_)));
        assert_eq!(error_code(&err), "E004_PLACEMENT");
    }

    #[test]
    fn untyped_errors_get_the_unexpected_code() {
        let err = anyhow::anyhow!("boom");
        assert!(linker_error(&err).is_none());
        assert_eq!(error_code(&err), "E000_UNEXPECTED");

        let io = std::fs::read("/nonexistent/openstates-linker/event.json")
            .context("failed to read event")
            .unwrap_err();
        assert_eq!(error_code(&io), "E000_UNEXPECTED");
    }

    #[test]
    fn typed_configuration_errors_keep_their_code() {
        let err = anyhow::Error::new(LinkerError::Configuration("no state".to_string()))
            .context("loading config");
        assert_eq!(error_code(&err), "E001_CONFIGURATION");
    }
}
