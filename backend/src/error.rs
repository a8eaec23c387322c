use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use missions_core::{ErrorKind, GameError};
use serde_json::json;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("admin agent required")]
    Unauthorized,
    #[error("could not save round: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Game(GameError::NoActiveRound) => StatusCode::CONFLICT,
            AppError::Game(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::InvalidAgent => StatusCode::UNAUTHORIZED,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::NoCapacity | ErrorKind::DuplicateName | ErrorKind::Conflict => {
                    StatusCode::CONFLICT
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
