use serde::{Deserialize, Serialize};
use shared::{error::CommonError, primitives::WrappedChronoDateTime};
use utoipa::ToSchema;

use crate::logic::finish_transaction;
use crate::repository::{EnvironmentRepositoryLike, RepositoryLike, ValueRepositoryLike};

// Domain model for Value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Value {
    pub id: i64,
    pub environment_id: i64,
    pub key: String,
    pub value: String,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

/// A key/value pair as submitted by callers. An `id` sent alongside is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Rejects keys that could never be exported into a process environment.
pub fn validate_key_value(kv: &KeyValue) -> Result<(), CommonError> {
    if kv.key.trim().is_empty() {
        return Err(CommonError::invalid_request("value key must not be empty"));
    }
    if kv.key.contains('=') || kv.key.contains('\0') {
        return Err(CommonError::invalid_request(format!(
            "value key '{}' must not contain '=' or NUL",
            kv.key.escape_default()
        )));
    }
    if kv.value.contains('\0') {
        return Err(CommonError::invalid_request(format!(
            "value for key '{}' must not contain NUL",
            kv.key
        )));
    }
    Ok(())
}

/// Validates a batch and rejects keys repeated within it.
pub fn validate_key_values(values: &[KeyValue]) -> Result<(), CommonError> {
    let mut seen = std::collections::HashSet::new();
    for kv in values {
        validate_key_value(kv)?;
        if !seen.insert(kv.key.as_str()) {
            return Err(CommonError::invalid_request(format!(
                "key '{}' appears more than once",
                kv.key
            )));
        }
    }
    Ok(())
}

pub type DeleteValueResponse = ();

async fn remove_value<T>(tx: &T, environment_id: i64, value_id: i64) -> Result<(), CommonError>
where
    T: EnvironmentRepositoryLike + ValueRepositoryLike,
{
    tx.get_environment_by_id(environment_id).await?;
    tx.delete_value_in_environment(environment_id, value_id)
        .await
}

/// Deletes one value of an environment. The value must belong to that environment.
pub async fn delete_value<R: RepositoryLike>(
    repository: &R,
    environment_id: i64,
    value_id: i64,
) -> Result<DeleteValueResponse, CommonError> {
    let tx = repository.begin().await?;
    let result = remove_value(&tx, environment_id, value_id).await;
    finish_transaction(tx, result).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::environment::{
        CreateEnvironmentRequest, create_environment, get_environment,
    };
    use crate::logic::test_support::setup_test_repository;

    #[test]
    fn test_validate_key_value() {
        assert!(validate_key_value(&KeyValue::new("PATH", "/bin")).is_ok());
        assert!(validate_key_value(&KeyValue::new("EMPTY", "")).is_ok());
        assert!(validate_key_value(&KeyValue::new("  ", "x")).is_err());
        assert!(validate_key_value(&KeyValue::new("A=B", "x")).is_err());
        assert!(validate_key_value(&KeyValue::new("A", "x\0y")).is_err());
    }

    #[test]
    fn test_validate_key_values_rejects_repeats() {
        let values = vec![KeyValue::new("A", "1"), KeyValue::new("A", "2")];
        let err = validate_key_values(&values).unwrap_err();
        assert!(matches!(err, CommonError::InvalidRequest { .. }));
    }

    #[test]
    fn test_key_value_ignores_submitted_id() {
        let kv: KeyValue =
            serde_json::from_str(r#"{"id": 7, "key": "A", "value": "1"}"#).unwrap();
        assert_eq!(kv, KeyValue::new("A", "1"));
    }

    #[tokio::test]
    async fn test_delete_value() {
        let repository = setup_test_repository().await;
        let env = create_environment(
            &repository,
            CreateEnvironmentRequest {
                name: "dev".to_string(),
                values: vec![KeyValue::new("A", "1"), KeyValue::new("B", "2")],
            },
        )
        .await
        .unwrap();

        delete_value(&repository, env.id, env.values[0].id)
            .await
            .unwrap();

        let env = get_environment(&repository, env.id).await.unwrap();
        assert_eq!(env.values.len(), 1);
        assert_eq!(env.values[0].key, "B");
    }

    #[tokio::test]
    async fn test_delete_value_from_other_environment_is_not_found() {
        let repository = setup_test_repository().await;
        let dev = create_environment(
            &repository,
            CreateEnvironmentRequest {
                name: "dev".to_string(),
                values: vec![KeyValue::new("A", "1")],
            },
        )
        .await
        .unwrap();
        let prod = create_environment(
            &repository,
            CreateEnvironmentRequest {
                name: "prod".to_string(),
                values: vec![],
            },
        )
        .await
        .unwrap();

        let err = delete_value(&repository, prod.id, dev.values[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, CommonError::NotFound { .. }));

        let err = delete_value(&repository, 999, dev.values[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, CommonError::NotFound { .. }));

        let dev = get_environment(&repository, dev.id).await.unwrap();
        assert_eq!(dev.values.len(), 1);
    }
}
