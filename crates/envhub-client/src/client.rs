use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::models::{
    CreateEnvironmentRequest, Envelope, Environment, KeyValue, UpdateEnvironmentRequest,
};

/// Builder for [`EnvhubClient`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, http: None }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Use a caller-provided HTTP client. The configured timeout still applies per request.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<EnvhubClient, ClientError> {
        const OPERATION: &str = "build client";

        let base_url = Url::parse(&self.config.base_url).map_err(|e| ClientError::InvalidUrl {
            operation: OPERATION,
            url: self.config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                operation: OPERATION,
                url: self.config.base_url,
                reason: "not a base url".to_string(),
            });
        }

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .user_agent(format!(
                    "{}/{}",
                    env!("CARGO_PKG_NAME"),
                    env!("CARGO_PKG_VERSION")
                ))
                .build()
                .map_err(|source| ClientError::Transport {
                    operation: OPERATION,
                    source,
                })?,
        };

        Ok(EnvhubClient {
            http,
            base_url,
            timeout: self.config.timeout,
            cache: RwLock::new(None),
        })
    }
}

/// HTTP client for the envhub API.
///
/// The listing fetched by [`EnvhubClient::get`] is cached for the lifetime of
/// the instance and never invalidated on its own; call
/// [`EnvhubClient::refresh`] or build a new client to see newer data.
pub struct EnvhubClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    cache: RwLock<Option<Vec<Environment>>>,
}

impl EnvhubClient {
    /// A client with the default configuration.
    pub fn new() -> Result<Self, ClientError> {
        Self::builder().build()
    }

    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        ClientBuilder::new(config).build()
    }

    /// A client configured from `ENVHUB_URL` / `ENVHUB_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_config(ClientConfig::from_env())
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base urls are rejected in ClientBuilder::build
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn prepare(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .timeout(self.timeout)
            .header("Accept", "application/json")
    }

    /// Sends the request and unwraps the envelope of a successful response.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, Option<T>), ClientError> {
        let response = request
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        debug!(operation, status = status.as_u16(), "Response received");

        if !status.is_success() {
            let error = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.error)
                .filter(|error| !error.is_empty())
                .unwrap_or_else(|| {
                    if body.trim().is_empty() {
                        status.canonical_reason().unwrap_or("error").to_string()
                    } else {
                        body.clone()
                    }
                });
            return Err(ClientError::Status {
                operation,
                status: status.as_u16(),
                error,
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|source| ClientError::Decode { operation, source })?;
        debug!(operation, code = envelope.code, message = %envelope.message, "Envelope decoded");
        Ok((status, envelope.data))
    }

    async fn send_for_data<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let (_, data) = self.send(operation, request).await?;
        data.ok_or_else(|| ClientError::Decode {
            operation,
            source: <serde_json::Error as serde::de::Error>::missing_field("data"),
        })
    }

    /// Every environment with its values, in server order. An empty store yields an empty list.
    pub async fn fetch_all(&self) -> Result<Vec<Environment>, ClientError> {
        let request = self.prepare(Method::GET, self.endpoint(&["env"]));
        self.send_for_data("fetch all environments", request).await
    }

    /// The environment with exactly this name.
    ///
    /// A blank name never matches. The server treats it as "no filter", so it
    /// is rejected before any request is sent.
    pub async fn fetch_by_name(&self, name: &str) -> Result<Environment, ClientError> {
        const OPERATION: &str = "fetch environment by name";

        let not_found = || ClientError::NotFound {
            operation: OPERATION,
            name: name.to_string(),
        };

        let wanted = name.trim();
        if wanted.is_empty() {
            return Err(not_found());
        }

        let request = self
            .prepare(Method::GET, self.endpoint(&["env"]))
            .query(&[("name", wanted)]);
        let environments: Vec<Environment> =
            match self.send_for_data(OPERATION, request).await {
                Ok(environments) => environments,
                Err(ClientError::Status { status: 404, .. }) => Vec::new(),
                Err(e) => return Err(e),
            };

        environments
            .into_iter()
            .find(|env| env.name == wanted)
            .ok_or_else(not_found)
    }

    pub async fn fetch(&self, id: i64) -> Result<Environment, ClientError> {
        let request = self.prepare(Method::GET, self.endpoint(&["env", &id.to_string()]));
        self.send_for_data("fetch environment", request).await
    }

    /// Replaces the cached listing with a fresh one and returns it.
    pub async fn refresh(&self) -> Result<Vec<Environment>, ClientError> {
        let environments = self.fetch_all().await?;
        *self.cache.write().await = Some(environments.clone());
        Ok(environments)
    }

    async fn cached<R>(&self, lookup: impl Fn(&[Environment]) -> R) -> Result<R, ClientError> {
        if let Some(environments) = self.cache.read().await.as_deref() {
            return Ok(lookup(environments));
        }
        let environments = self.refresh().await?;
        Ok(lookup(&environments))
    }

    /// Looks `key` up across all cached environments; the first environment
    /// in listing order that defines it wins. Fetches the listing on first use.
    pub async fn get(&self, key: &str) -> Result<String, ClientError> {
        let found = self
            .cached(|environments| {
                environments
                    .iter()
                    .find_map(|env| env.get(key).map(str::to_string))
            })
            .await?;

        found.ok_or_else(|| ClientError::KeyNotFound {
            operation: "get value",
            key: key.to_string(),
        })
    }

    /// Like [`EnvhubClient::get`] but only within the named environment.
    pub async fn get_in(&self, environment: &str, key: &str) -> Result<String, ClientError> {
        const OPERATION: &str = "get value in environment";

        let found = self
            .cached(|environments| {
                environments
                    .iter()
                    .find(|env| env.name == environment)
                    .map(|env| env.get(key).map(str::to_string))
            })
            .await?;

        match found {
            None => Err(ClientError::NotFound {
                operation: OPERATION,
                name: environment.to_string(),
            }),
            Some(None) => Err(ClientError::KeyNotFound {
                operation: OPERATION,
                key: key.to_string(),
            }),
            Some(Some(value)) => Ok(value),
        }
    }

    /// The named environment as a key/value map. Always hits the server.
    pub async fn resolve(&self, name: &str) -> Result<BTreeMap<String, String>, ClientError> {
        Ok(self.fetch_by_name(name).await?.to_map())
    }

    /// Fetches the named environment and sets each of its values as a variable
    /// of the current process, returning what was applied.
    ///
    /// The variables stay set until the process exits; nothing is tracked or
    /// undone. Prefer [`EnvhubClient::resolve`] and pass the map to a child
    /// process when possible.
    ///
    /// # Safety
    ///
    /// Mutates the process environment through [`std::env::set_var`]. The caller
    /// must ensure no other thread reads or writes the environment concurrently.
    pub async unsafe fn load_into_process(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, String>, ClientError> {
        let variables = self.resolve(name).await?;

        // Check everything first so a bad key leaves the environment untouched.
        if let Some(bad) = variables
            .iter()
            .find(|(key, value)| !is_exportable(key, value))
        {
            return Err(ClientError::InvalidVariable {
                operation: "load environment into process",
                key: bad.0.clone(),
            });
        }

        for (key, value) in &variables {
            // SAFETY: upheld by the caller, see the function contract.
            unsafe { std::env::set_var(key, value) };
        }
        debug!(environment = name, count = variables.len(), "Loaded variables into process");

        Ok(variables)
    }

    /// Creates an environment with its initial values.
    pub async fn create_environment(
        &self,
        name: &str,
        values: &[KeyValue],
    ) -> Result<Environment, ClientError> {
        let request = self
            .prepare(Method::POST, self.endpoint(&["env"]))
            .json(&CreateEnvironmentRequest { name, values });
        self.send_for_data("create environment", request).await
    }

    /// Inserts or overwrites the given keys of an environment.
    pub async fn set_values(&self, id: i64, values: &[KeyValue]) -> Result<(), ClientError> {
        let request = self
            .prepare(Method::PUT, self.endpoint(&["env", &id.to_string()]))
            .json(&UpdateEnvironmentRequest {
                environment_id: id,
                values,
            });
        self.send::<serde_json::Value>("set values", request)
            .await
            .map(|_| ())
    }

    pub async fn delete_environment(&self, id: i64) -> Result<(), ClientError> {
        let request = self.prepare(Method::DELETE, self.endpoint(&["env", &id.to_string()]));
        self.send::<serde_json::Value>("delete environment", request)
            .await
            .map(|_| ())
    }

    pub async fn delete_value(&self, environment_id: i64, value_id: i64) -> Result<(), ClientError> {
        let request = self.prepare(
            Method::DELETE,
            self.endpoint(&[
                "env",
                &environment_id.to_string(),
                "value",
                &value_id.to_string(),
            ]),
        );
        self.send::<serde_json::Value>("delete value", request)
            .await
            .map(|_| ())
    }
}

fn is_exportable(key: &str, value: &str) -> bool {
    !key.is_empty() && !key.contains('=') && !key.contains('\0') && !value.contains('\0')
}
