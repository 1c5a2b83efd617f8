pub mod environment;
pub mod run;
pub mod start;

use envhub_client::ClientError;
use shared::error::CommonError;

/// Maps client failures onto the error type the CLI reports.
pub(crate) fn client_error(error: ClientError) -> CommonError {
    match &error {
        ClientError::NotFound { name, .. } => CommonError::NotFound {
            msg: error.to_string(),
            lookup_id: name.clone(),
            source: None,
        },
        ClientError::KeyNotFound { key, .. } => CommonError::NotFound {
            msg: error.to_string(),
            lookup_id: key.clone(),
            source: None,
        },
        _ => CommonError::Unknown(error.into()),
    }
}
