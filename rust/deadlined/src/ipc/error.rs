use crate::error::DomainError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<DomainError> for HandlerErr {
    fn from(e: DomainError) -> Self {
        let details = match &e {
            DomainError::Validation { field, .. } => Some(json!({ "field": field })),
            DomainError::DuplicateIdentity { field } => Some(json!({ "field": field })),
            DomainError::NotFound { entity } => Some(json!({ "entity": entity })),
            DomainError::Store(inner) => {
                log::warn!("store error: {}", inner);
                None
            }
            DomainError::Internal(inner) => {
                log::error!("internal error: {:#}", inner);
                None
            }
            _ => None,
        };
        let message = match &e {
            // Never echo internals back to the client.
            DomainError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        Self {
            code: e.code(),
            message,
            details,
        }
    }
}

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::from(e).into()
    }
}
