use std::time::Duration;

use clap::{Args, Subcommand};
use comfy_table::{Cell, Table};
use envhub_client::{EnvhubClient, KeyValue, config::DEFAULT_BASE_URL};
use shared::error::CommonError;
use tracing::debug;

use crate::commands::client_error;

#[derive(Args, Debug, Clone)]
pub struct EnvironmentParams {
    #[command(subcommand)]
    pub command: EnvironmentCommands,

    #[arg(long, env = "ENVHUB_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub api_url: String,

    #[arg(long, env = "ENVHUB_TIMEOUT_SECS", default_value_t = 10, global = true)]
    pub timeout_secs: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EnvironmentCommands {
    /// List all environments
    List,
    /// Show the values of an environment
    Show {
        /// The environment name
        name: String,
    },
    /// Create an environment, optionally with initial values
    Create {
        /// The environment name
        name: String,
        /// Initial values as KEY=VALUE
        #[arg(value_parser = parse_key_value)]
        values: Vec<KeyValue>,
    },
    /// Set values on an environment (creates or overwrites each key)
    Set {
        /// The environment name
        name: String,
        /// Values as KEY=VALUE
        #[arg(value_parser = parse_key_value, required = true)]
        values: Vec<KeyValue>,
    },
    /// Remove a single value from an environment
    #[command(name = "rm")]
    Remove {
        /// The environment name
        name: String,
        /// The key to delete
        key: String,
    },
    /// Delete an environment and all of its values
    Delete {
        /// The environment name
        name: String,
    },
}

/// Parses `KEY=VALUE`; only the first `=` separates key from value.
pub fn parse_key_value(raw: &str) -> Result<KeyValue, String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok(KeyValue::new(key, value)),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

pub(crate) fn build_client(api_url: &str, timeout_secs: u64) -> Result<EnvhubClient, CommonError> {
    EnvhubClient::builder()
        .base_url(api_url)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(client_error)
}

pub async fn cmd_environment(params: EnvironmentParams) -> Result<(), CommonError> {
    let client = build_client(&params.api_url, params.timeout_secs)?;

    match params.command {
        EnvironmentCommands::List => cmd_env_list(&client).await,
        EnvironmentCommands::Show { name } => cmd_env_show(&client, &name).await,
        EnvironmentCommands::Create { name, values } => {
            cmd_env_create(&client, &name, &values).await
        }
        EnvironmentCommands::Set { name, values } => cmd_env_set(&client, &name, &values).await,
        EnvironmentCommands::Remove { name, key } => cmd_env_rm(&client, &name, &key).await,
        EnvironmentCommands::Delete { name } => cmd_env_delete(&client, &name).await,
    }
}

pub async fn cmd_env_list(client: &EnvhubClient) -> Result<(), CommonError> {
    let environments = client.fetch_all().await.map_err(client_error)?;

    if environments.is_empty() {
        println!("No environments found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Values"),
        Cell::new("Updated"),
    ]);

    for env in environments {
        table.add_row(vec![
            Cell::new(env.id),
            Cell::new(&env.name),
            Cell::new(env.values.len()),
            Cell::new(env.updated_at.as_deref().unwrap_or("-")),
        ]);
    }

    println!("{table}");

    Ok(())
}

pub async fn cmd_env_show(client: &EnvhubClient, name: &str) -> Result<(), CommonError> {
    let env = client.fetch_by_name(name).await.map_err(client_error)?;

    if env.values.is_empty() {
        println!("Environment '{}' has no values.", env.name);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![Cell::new("ID"), Cell::new("Key"), Cell::new("Value")]);

    for value in &env.values {
        table.add_row(vec![
            Cell::new(value.id),
            Cell::new(&value.key),
            Cell::new(&value.value),
        ]);
    }

    println!("{table}");

    Ok(())
}

pub async fn cmd_env_create(
    client: &EnvhubClient,
    name: &str,
    values: &[KeyValue],
) -> Result<(), CommonError> {
    debug!("Creating environment: {}", name);
    let env = client
        .create_environment(name, values)
        .await
        .map_err(client_error)?;
    println!(
        "Created environment '{}' (id {}) with {} value(s)",
        env.name,
        env.id,
        env.values.len()
    );
    Ok(())
}

pub async fn cmd_env_set(
    client: &EnvhubClient,
    name: &str,
    values: &[KeyValue],
) -> Result<(), CommonError> {
    let env = client.fetch_by_name(name).await.map_err(client_error)?;

    debug!("Setting {} value(s) on environment: {}", values.len(), name);
    client
        .set_values(env.id, values)
        .await
        .map_err(client_error)?;

    for kv in values {
        println!("Set {} on '{}'", kv.key, env.name);
    }
    Ok(())
}

pub async fn cmd_env_rm(client: &EnvhubClient, name: &str, key: &str) -> Result<(), CommonError> {
    let env = client.fetch_by_name(name).await.map_err(client_error)?;

    let Some(value) = env.values.iter().find(|v| v.key == key) else {
        return Err(CommonError::NotFound {
            msg: format!("Key '{key}' not found in environment '{name}'"),
            lookup_id: key.to_string(),
            source: None,
        });
    };

    debug!("Deleting value {} from environment {}", value.id, env.id);
    client
        .delete_value(env.id, value.id)
        .await
        .map_err(client_error)?;
    println!("Removed {key} from '{name}'");
    Ok(())
}

pub async fn cmd_env_delete(client: &EnvhubClient, name: &str) -> Result<(), CommonError> {
    let env = client.fetch_by_name(name).await.map_err(client_error)?;

    client
        .delete_environment(env.id)
        .await
        .map_err(client_error)?;
    println!("Deleted environment '{name}'");
    Ok(())
}
