use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Erreurs des opérations d'écriture du registre
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Node already exists: {0}")]
    DuplicateNode(String),
    #[error("Invalid node: {0}")]
    InvalidNode(String),
}

/// Erreurs de chargement de la configuration kernel
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Erreurs renvoyées par l'API REST, toujours sous la forme `{ "error": ... }`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::DuplicateNode(_) => ApiError::Conflict(e.to_string()),
            RegistryError::InvalidNode(_) => ApiError::Unprocessable(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
