use thiserror::Error;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("configuration invalid: {0}")]
    InvalidConfig(String),
    #[error("remote request failed after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },
    #[error("remote request rejected with status {status}: {url}")]
    RemoteRejected { status: u16, url: String },
    #[error("malformed payload in {origin}: {reason}")]
    MalformedPayload { origin: String, reason: String },
    #[error("state file corrupt: {0}")]
    StateCorrupt(String),
    #[error("another run holds the lock: {0}")]
    Locked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorErrorCode {
    E001Config,
    E002RetriesExhausted,
    E003RemoteRejected,
    E004MalformedPayload,
    E005StateCorrupt,
    E006Locked,
}

impl MirrorErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001Config => "E001_CONFIG",
            Self::E002RetriesExhausted => "E002_RETRIES_EXHAUSTED",
            Self::E003RemoteRejected => "E003_REMOTE_REJECTED",
            Self::E004MalformedPayload => "E004_MALFORMED_PAYLOAD",
            Self::E005StateCorrupt => "E005_STATE_CORRUPT",
            Self::E006Locked => "E006_LOCKED",
        }
    }
}

impl MirrorError {
    pub fn code(&self) -> MirrorErrorCode {
        match self {
            Self::InvalidConfig(_) => MirrorErrorCode::E001Config,
            Self::RetriesExhausted { .. } => MirrorErrorCode::E002RetriesExhausted,
            Self::RemoteRejected { .. } => MirrorErrorCode::E003RemoteRejected,
            Self::MalformedPayload { .. } => MirrorErrorCode::E004MalformedPayload,
            Self::StateCorrupt(_) => MirrorErrorCode::E005StateCorrupt,
            Self::Locked(_) => MirrorErrorCode::E006Locked,
        }
    }
}

/// Stable code for any error chain, `E000_UNCLASSIFIED` when no
/// `MirrorError` is found in it.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<MirrorError>())
        .map(|e| e.code().as_str())
        .unwrap_or("E000_UNCLASSIFIED")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn error_code_is_found_through_context_layers() {
        let err = Err::<(), _>(MirrorError::MalformedPayload {
            origin: "page 3".into(),
            reason: "missing id".into(),
        })
        .context("failed to fetch page")
        .unwrap_err();
        assert_eq!(error_code(&err), "E004_MALFORMED_PAYLOAD");
    }

    #[test]
    fn unclassified_errors_get_fallback_code() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(error_code(&err), "E000_UNCLASSIFIED");
    }
}
