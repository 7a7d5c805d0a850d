use axum::{
    extract::rejection::FormRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

/// Failures of a chat request. Authorization and validation are checked
/// before anything is written, so none of these leave partial effects.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Authenticated, but not a participant of the chat.
    #[error("Sorry, you can't access this chat.")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    /// A non-empty body that is not the expected form.
    #[error(transparent)]
    Form(#[from] FormRejection),
    #[error("Invalid email or password.")]
    Unauthorized,
    #[error("{0}")]
    Conflict(&'static str),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Form(rejection) => rejection.status(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Store(e) => {
                error!("Store failure: {:#}", e);
                status.into_response()
            }
            Self::Form(rejection) => rejection.into_response(),
            other => (status, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_not_found() {
        assert_eq!(ChatError::NotFound("chat").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn forbidden_is_distinct_from_not_found() {
        assert_eq!(ChatError::Forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn validation_carries_reason() {
        let err = ChatError::Validation("Message content is empty.".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Message content is empty.");
    }

    #[test]
    fn auth_failures_map_to_their_statuses() {
        assert_eq!(ChatError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ChatError::Conflict("taken").status(), StatusCode::CONFLICT);
    }

    #[test]
    fn store_errors_are_generic_server_errors() {
        let err = ChatError::from(anyhow::anyhow!("disk I/O error"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
