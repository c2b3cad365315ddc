use std::error::Error;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::{ErrorCause, ErrorResponse};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Backend")]
    Backend(#[source] Box<dyn Error + Send + Sync + 'static>),
    #[error("Lock: {0}")]
    Lock(String),
    #[error("InvalidConfig: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        use StoreError::*;
        match self {
            Backend(_) => "StoreBackendError",
            Lock(_) => "StoreLockError",
            InvalidConfig(_) => "StoreConfigError",
        }
    }
}

impl From<libsql::Error> for StoreError {
    fn from(error: libsql::Error) -> Self {
        StoreError::Backend(Box::new(error))
    }
}

/// Which operation a store failure happened in; picks the client-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Like,
    Unlike,
    List,
}

impl Operation {
    pub fn failure_message(&self) -> &'static str {
        match self {
            Operation::Like => "Could not like mod",
            Operation::Unlike => "Could not unlike mod",
            Operation::List => "Could not list mods",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("InvalidRequest: {0}")]
    InvalidRequest(String),
    #[error("StoreUnavailable")]
    StoreUnavailable {
        op: Operation,
        #[source]
        source: StoreError,
    },
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::StoreUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_body(&self) -> ErrorResponse {
        match self {
            ServiceError::InvalidRequest(_) => ErrorResponse {
                message: "Invalid request body".to_string(),
                err: None,
            },
            ServiceError::StoreUnavailable { op, source } => ErrorResponse {
                message: op.failure_message().to_string(),
                err: Some(ErrorCause {
                    code: source.code().to_string(),
                    message: crate::unpack_error(source),
                }),
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::InvalidRequest(_) => crate::bad_request(self.to_body()),
            ServiceError::StoreUnavailable { .. } => crate::server_error(self.to_body()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_maps_to_400_without_cause() {
        let err = ServiceError::InvalidRequest("userId missing".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let body = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "Invalid request body" }));
    }

    #[test]
    fn store_failure_carries_cause() {
        let err = ServiceError::StoreUnavailable {
            op: Operation::Unlike,
            source: StoreError::Lock("poisoned".into()),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(body["message"], "Could not unlike mod");
        assert_eq!(body["err"]["code"], "StoreLockError");
        assert_eq!(body["err"]["message"], "Lock: poisoned");
    }

    #[test]
    fn backend_cause_chain_is_flattened() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = StoreError::Backend(Box::new(io));
        assert_eq!(crate::unpack_error(&err), "Backend: refused");
    }
}
