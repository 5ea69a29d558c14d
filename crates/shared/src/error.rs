use serde::{Deserialize, Serialize};

const FALLBACK_MESSAGE: &str = "Request failed";

/// Error body returned by the gallery API on non-2xx responses.
///
/// Older endpoints report the message under `err` instead of `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ok: Some(false),
            error: Some(message.into()),
            err: None,
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn message(&self) -> String {
        self.error
            .as_deref()
            .or(self.err.as_deref())
            .unwrap_or(FALLBACK_MESSAGE)
            .to_string()
    }

    pub fn fallback_message() -> &'static str {
        FALLBACK_MESSAGE
    }
}
