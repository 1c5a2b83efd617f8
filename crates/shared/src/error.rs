use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use utoipa::{PartialSchema, ToSchema};

use crate::adapters::openapi::Envelope;

#[derive(Error, Debug, Serialize)]
pub enum CommonError {
    #[error("could not find resource")]
    NotFound {
        msg: String,
        lookup_id: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("resource already exists")]
    Conflict {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("invalid request")]
    InvalidRequest {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("repository error")]
    Repository {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("unknown error")]
    Unknown(
        #[serde(skip)]
        #[from]
        anyhow::Error,
    ),
    #[error("sqlite database error")]
    SqliteError {
        #[serde(skip)]
        #[from]
        #[source]
        source: libsql::Error,
    },
    #[error("io error")]
    IoError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::io::Error,
    },
    #[error("url parse error")]
    UrlParseError {
        #[serde(skip)]
        #[from]
        #[source]
        source: url::ParseError,
    },
    #[error("serde json error")]
    SerdeSerializationError {
        #[serde(skip)]
        #[from]
        #[source]
        source: serde_json::Error,
    },
    #[error("address parse error")]
    AddrParseError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("libsql migration error")]
    LibsqlMigrationError {
        #[serde(skip)]
        #[from]
        #[source]
        source: libsql_migration::errors::LibsqlDirMigratorError,
    },
}

impl CommonError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CommonError::NotFound { .. } => StatusCode::NOT_FOUND,
            CommonError::Conflict { .. } => StatusCode::CONFLICT,
            CommonError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            CommonError::Repository { .. }
            | CommonError::Unknown(_)
            | CommonError::SqliteError { .. }
            | CommonError::IoError { .. }
            | CommonError::UrlParseError { .. }
            | CommonError::SerdeSerializationError { .. }
            | CommonError::AddrParseError { .. }
            | CommonError::LibsqlMigrationError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Detailed, caller-facing description carried in the envelope `error` field.
    pub fn detail(&self) -> String {
        match self {
            CommonError::NotFound { msg, .. }
            | CommonError::Conflict { msg, .. }
            | CommonError::InvalidRequest { msg, .. }
            | CommonError::Repository { msg, .. } => msg.clone(),
            CommonError::Unknown(e) => format!("{e:#}"),
            CommonError::SqliteError { source } => source.to_string(),
            CommonError::IoError { source } => source.to_string(),
            CommonError::UrlParseError { source } => source.to_string(),
            CommonError::SerdeSerializationError { source } => source.to_string(),
            CommonError::AddrParseError { source } => source.to_string(),
            CommonError::LibsqlMigrationError { source } => source.to_string(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        CommonError::InvalidRequest {
            msg: msg.into(),
            source: None,
        }
    }

    pub fn not_found(msg: impl Into<String>, lookup_id: impl ToString) -> Self {
        CommonError::NotFound {
            msg: msg.into(),
            lookup_id: lookup_id.to_string(),
            source: None,
        }
    }
}

impl ToSchema for CommonError {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("Error")
    }

    fn schemas(
        _schemas: &mut Vec<(
            String,
            utoipa::openapi::RefOr<utoipa::openapi::schema::Schema>,
        )>,
    ) {
        // nothing by default
    }
}

impl PartialSchema for CommonError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::ObjectBuilder::new()
            .property(
                "code",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::Integer),
            )
            .required("code")
            .property(
                "message",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String),
            )
            .required("message")
            .property(
                "error",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String),
            )
            .required("error")
            .into()
    }
}

impl IntoResponse for CommonError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body: Envelope<()> = Envelope::failure(status, self.to_string(), self.detail());

        (status, Json(body)).into_response()
    }
}
