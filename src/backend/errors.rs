use reqwest::StatusCode;

#[derive(Debug)]
pub enum BackendError {
    ConfigNotFound(String),
    Request(reqwest::Error),
    Api {
        status: StatusCode,
        detail: String,
    },
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },
    Timeout {
        operation: String,
        duration_ms: u64,
    },
}

impl BackendError {
    /// Build an API error from a non-success response body.
    ///
    /// The backend reports failures as `{"detail": "..."}`; anything else is
    /// kept verbatim so nothing is lost when it is shown to the operator.
    pub fn from_response_body(status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| match value.get("detail") {
                Some(serde_json::Value::String(detail)) => Some(detail.clone()),
                Some(other) => Some(other.to_string()),
                None => None,
            })
            .unwrap_or_else(|| body.trim().to_string());

        BackendError::Api { status, detail }
    }

    /// Whether the failure is transient and an idempotent request may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Request(err) => err.is_timeout() || err.is_connect(),
            BackendError::Api { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            BackendError::Timeout { .. } => true,
            BackendError::ConfigNotFound(_) | BackendError::Decode { .. } => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            BackendError::Request(err) => err.status(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Request(err)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::ConfigNotFound(msg) => {
                writeln!(f, "Backend Configuration Error")?;
                writeln!(f, "───────────────────────────")?;
                write!(f, "📂 {msg}\n\n")?;
                writeln!(f, "🔧 QUICK FIXES:")?;
                writeln!(f, "   → Set the backend URL: export WORKFLOW_RUNNER_BACKEND__BASE_URL=http://localhost:8000")?;
                write!(f, "   → Or add [backend] base_url to workflow-runner.toml")
            }
            BackendError::Request(err) => {
                writeln!(f, "Backend Network Error")?;
                writeln!(f, "─────────────────────")?;
                write!(f, "🌐 {err}\n\n")?;
                if err.is_timeout() {
                    writeln!(f, "🔧 REQUEST TIMED OUT:")?;
                    writeln!(f, "   → The backend may still be processing the step")?;
                    write!(f, "   → Refresh the session list before retrying")
                } else {
                    writeln!(f, "🔧 TROUBLESHOOTING:")?;
                    writeln!(f, "   → Check that the backend is running")?;
                    write!(f, "   → Verify backend.base_url in your configuration")
                }
            }
            BackendError::Api { status, detail } => {
                writeln!(f, "Backend API Error")?;
                writeln!(f, "─────────────────")?;
                writeln!(f, "🌐 HTTP {}: {}", status.as_u16(), detail)?;
                writeln!(f)?;
                match status.as_u16() {
                    401 | 403 => {
                        writeln!(f, "🔧 AUTHENTICATION FAILED:")?;
                        write!(f, "   → Check backend.api_token or WORKFLOW_RUNNER_BACKEND__API_TOKEN")
                    }
                    404 => {
                        writeln!(f, "🔧 RESOURCE NOT FOUND:")?;
                        write!(f, "   → Verify the workflow, session or conflict id")
                    }
                    422 => {
                        writeln!(f, "🔧 VALIDATION ERROR:")?;
                        write!(f, "   → The backend rejected the request payload")
                    }
                    _ => {
                        writeln!(f, "🔧 TROUBLESHOOTING:")?;
                        write!(f, "   → Check the backend logs for this request")
                    }
                }
            }
            BackendError::Decode { endpoint, source } => {
                writeln!(f, "Backend Response Error")?;
                writeln!(f, "──────────────────────")?;
                write!(f, "📦 Unexpected response from {endpoint}: {source}")
            }
            BackendError::Timeout {
                operation,
                duration_ms,
            } => {
                writeln!(f, "Backend Operation Timeout")?;
                writeln!(f, "─────────────────────────")?;
                write!(
                    f,
                    "⏰ Operation '{operation}' timed out after {duration_ms}ms\n\n"
                )?;
                writeln!(f, "🔧 RECOMMENDED ACTIONS:")?;
                writeln!(f, "   → Check network connectivity")?;
                write!(f, "   → Retry the operation")
            }
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Request(err) => Some(err),
            BackendError::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}
