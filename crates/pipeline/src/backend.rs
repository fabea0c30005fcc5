//! HTTP plumbing shared by the speech backends

use serde::Deserialize;
use std::time::Duration;

use crate::PipelineError;

/// Which side of the pipeline a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Recognition,
    Synthesis,
}

impl Stage {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Stage::Recognition => "recognition",
            Stage::Synthesis => "synthesis",
        }
    }

    pub(crate) fn error(&self, message: String) -> PipelineError {
        match self {
            Stage::Recognition => PipelineError::Recognition(message),
            Stage::Synthesis => PipelineError::Synthesis(message),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Self-hosted servers send `{"error": "msg"}`, Google sends `{"error": {"message"}}`
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Text(String),
    Google { message: String },
}

/// Pull a readable message out of an error body
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: ErrorDetail::Text(message),
        })
        | Ok(ErrorBody {
            error: ErrorDetail::Google { message },
        }) => message,
        Err(_) => body.trim().to_string(),
    }
}

/// Map a non-2xx response onto the pipeline taxonomy
pub(crate) fn status_error(stage: Stage, status: reqwest::StatusCode, body: &str) -> PipelineError {
    let message = error_message(body);
    match status.as_u16() {
        401 | 403 => PipelineError::Authentication(message),
        _ => stage.error(format!("{} backend returned {}: {}", stage.name(), status, message)),
    }
}

pub(crate) fn transport_error(stage: Stage, timeout: Duration, err: reqwest::Error) -> PipelineError {
    if err.is_timeout() {
        PipelineError::Timeout {
            stage: stage.name(),
            ms: timeout.as_millis() as u64,
        }
    } else {
        stage.error(format!("{} request failed: {}", stage.name(), err))
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PipelineError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(r#"{"error": "Unauthorized"}"#), "Unauthorized");
        assert_eq!(
            error_message(r#"{"error": {"code": 400, "message": "Invalid audio"}}"#),
            "Invalid audio"
        );
        assert_eq!(error_message("bad gateway\n"), "bad gateway");
    }

    #[test]
    fn test_status_mapping() {
        let err = status_error(Stage::Recognition, reqwest::StatusCode::UNAUTHORIZED, "{}");
        assert!(matches!(err, PipelineError::Authentication(_)));

        let err = status_error(
            Stage::Synthesis,
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "model crashed"}"#,
        );
        match err {
            PipelineError::Synthesis(msg) => assert!(msg.contains("model crashed")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
