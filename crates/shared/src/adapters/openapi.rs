use std::{borrow::Cow, fmt::Debug};

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

pub const API_VERSION_TAG: &str = "v1";

/// Uniform wire shape of every response.
///
/// Exactly one of `data` and `error` is present: successes always carry a
/// `data` key (possibly `null`), failures always carry a non-empty `error`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Envelope<T> {
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            data: Some(data),
            code: status.as_u16(),
            message: message.into(),
            error: None,
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            data: None,
            code: status.as_u16(),
            message: message.into(),
            error: Some(if error.is_empty() {
                status.canonical_reason().unwrap_or("error").to_string()
            } else {
                error
            }),
        }
    }
}

pub struct JsonResponse<T: Serialize, E: Serialize> {
    result: Result<T, E>,
    status: StatusCode,
    message: Cow<'static, str>,
}

impl<T: Serialize, E: Serialize + IntoResponse> JsonResponse<T, E> {
    pub fn new_error(error: E) -> Self {
        Self {
            result: Err(error),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: Cow::Borrowed(""),
        }
    }

    pub fn new_ok(value: T, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            result: Ok(value),
            status: StatusCode::OK,
            message: message.into(),
        }
    }

    /// Wraps a handler result; `message` is only used on success.
    pub fn from_result(result: Result<T, E>, message: impl Into<Cow<'static, str>>) -> Self {
        match result {
            Ok(value) => Self::new_ok(value, message),
            Err(error) => Self::new_error(error),
        }
    }

    /// Overrides the success status (e.g. `201 Created`).
    pub fn with_status(mut self, status: StatusCode) -> Self {
        if self.result.is_ok() {
            self.status = status;
        }
        self
    }
}

impl<T: Serialize, E: Serialize + IntoResponse + Debug> IntoResponse for JsonResponse<T, E> {
    fn into_response(self) -> Response {
        match self.result {
            Ok(value) => (
                self.status,
                Json(Envelope::success(self.status, self.message, value)),
            )
                .into_response(),
            Err(error) => {
                error!("Error: {:?}", error);

                error.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommonError;

    #[test]
    fn success_envelope_keeps_null_data_and_omits_error() {
        let envelope = Envelope::success(StatusCode::OK, "Environment deleted", ());
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["code"], 200);
        assert_eq!(json["message"], "Environment deleted");
        assert!(json.as_object().unwrap().contains_key("data"));
        assert!(json["data"].is_null());
        assert!(!json.as_object().unwrap().contains_key("error"));
    }

    #[test]
    fn failure_envelope_omits_data() {
        let envelope: Envelope<Vec<String>> =
            Envelope::failure(StatusCode::NOT_FOUND, "could not find resource", "");
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["code"], 404);
        assert_eq!(json["error"], "Not Found");
        assert!(!json.as_object().unwrap().contains_key("data"));
    }

    #[test]
    fn created_status_is_mirrored_into_body() {
        let response = JsonResponse::<_, CommonError>::new_ok(vec![1, 2], "Environment created")
            .with_status(StatusCode::CREATED)
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
