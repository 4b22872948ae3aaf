use serde::{Deserialize, Serialize};

/// Callable request envelope: `{"data": {...}}`
#[derive(Debug, Deserialize)]
pub struct CallableRequest<T> {
    pub data: T,
}

/// Callable success envelope: `{"result": {...}}`
#[derive(Debug, Serialize)]
pub struct CallableResponse<T> {
    pub result: T,
}

impl<T> CallableResponse<T> {
    pub fn new(result: T) -> Self {
        Self { result }
    }
}

/// Error response structure (paired with non-2xx HTTP status codes)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

impl ErrorResponse {
    pub fn new(
        status: impl Into<String>,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            error: ErrorObject {
                status: status.into(),
                message: message.into(),
                details,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorObject {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Store platform a purchase was verified against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

/// Identity of the caller, as established by the auth middleware
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub uid: Option<String>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self { uid: None }
    }

    pub fn authenticated(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
        }
    }

    /// User a purchase is attributed to: explicit id first, then the caller's uid
    pub fn resolve_user_id<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit.or(self.uid.as_deref())
    }
}
