//! HTTP client for interface translator management interfaces.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::wire::{CheckTargetsRequest, CheckTargetsResponse};
use crate::bridge::{
    domain::{BridgeId, Metadata, OperationName, ServiceInstance, ServiceInterface},
    ports::{
        BridgeInitializationRequest, InterfaceTranslatorClient, TranslatorAccess,
        TranslatorClientError, TranslatorClientResult,
        translator::{ABORT_BRIDGE_OPERATION, CHECK_TARGETS_OPERATION, INITIALIZE_BRIDGE_OPERATION},
    },
};
use crate::config::BrokerConfig;

/// Resolved location of one translator operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorEndpoint {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
}

fn default_method(operation: &str) -> Method {
    if operation == ABORT_BRIDGE_OPERATION {
        Method::DELETE
    } else {
        Method::POST
    }
}

/// Resolves where `operation` is served from the translator's management
/// interface properties.
///
/// The first access address and the access port form the authority; the
/// base path and the operation path follow. Per-operation overrides under
/// `operations` replace the default method and path. `suffix` is appended
/// as a trailing path segment.
///
/// # Errors
///
/// Returns a description of the missing property when no address or port
/// is declared.
pub fn resolve_endpoint(
    properties: &Metadata,
    operation: &str,
    suffix: Option<&str>,
    ssl_enabled: bool,
) -> Result<TranslatorEndpoint, String> {
    let addresses = properties.access_addresses();
    let host = addresses
        .first()
        .ok_or_else(|| "no access address declared".to_owned())?;
    let port = properties
        .access_port()
        .ok_or_else(|| "no valid access port declared".to_owned())?;
    let overrides = properties.operation_override(operation).unwrap_or_default();
    let method = overrides.method.map_or_else(
        || default_method(operation),
        |declared| {
            Method::from_bytes(declared.to_ascii_uppercase().as_bytes()).unwrap_or_else(|_| {
                warn!(operation, method = %declared, "ignoring invalid method override");
                default_method(operation)
            })
        },
    );
    let path = overrides
        .path
        .unwrap_or_else(|| format!("/{operation}"));
    let scheme = if ssl_enabled { "https" } else { "http" };
    let base = properties.base_path().unwrap_or_default();
    let mut url = format!("{scheme}://{host}:{port}{base}{path}");
    if let Some(segment) = suffix {
        url.push('/');
        url.push_str(segment);
    }
    Ok(TranslatorEndpoint { method, url })
}

/// [`InterfaceTranslatorClient`] speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTranslatorClient {
    client: Client,
    ssl_enabled: bool,
}

impl HttpTranslatorClient {
    /// Creates a client reusing `client`.
    #[must_use]
    pub const fn new(client: Client, ssl_enabled: bool) -> Self {
        Self {
            client,
            ssl_enabled,
        }
    }

    /// Creates a client with the configured timeout and transport.
    ///
    /// # Errors
    ///
    /// Returns the builder error when the TLS backend cannot be set up.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.http_timeout()).build()?;
        Ok(Self::new(client, config.ssl_enabled))
    }

    fn request(
        &self,
        access: &TranslatorAccess,
        operation: &str,
        suffix: Option<&str>,
    ) -> TranslatorClientResult<RequestBuilder> {
        let endpoint = resolve_endpoint(&access.properties, operation, suffix, self.ssl_enabled)
            .map_err(|reason| TranslatorClientError::InvalidEndpoint {
                translator: access.name.clone(),
                reason,
            })?;
        debug!(
            translator = %access.name,
            method = %endpoint.method,
            url = %endpoint.url,
            "calling interface translator"
        );
        let mut builder = self.client.request(endpoint.method, endpoint.url);
        if let Some(token) = &access.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn dispatch(
        access: &TranslatorAccess,
        builder: RequestBuilder,
    ) -> TranslatorClientResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|err| TranslatorClientError::Unreachable {
                translator: access.name.clone(),
                reason: err.to_string(),
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(TranslatorClientError::Rejected {
            translator: access.name.clone(),
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(
        access: &TranslatorAccess,
        response: Response,
    ) -> TranslatorClientResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|err| TranslatorClientError::InvalidResponse {
                translator: access.name.clone(),
                reason: err.to_string(),
            })
    }
}

#[async_trait]
impl InterfaceTranslatorClient for HttpTranslatorClient {
    async fn check_targets(
        &self,
        access: &TranslatorAccess,
        operation: &OperationName,
        targets: &[ServiceInstance],
    ) -> TranslatorClientResult<Vec<ServiceInstance>> {
        let payload = CheckTargetsRequest::new(operation, targets);
        let builder = self
            .request(access, CHECK_TARGETS_OPERATION, None)?
            .json(&payload);
        let response = Self::dispatch(access, builder).await?;
        let checked: CheckTargetsResponse = Self::decode(access, response).await?;
        Ok(checked.confirmed(targets))
    }

    async fn initialize_bridge(
        &self,
        access: &TranslatorAccess,
        request: &BridgeInitializationRequest,
    ) -> TranslatorClientResult<ServiceInterface> {
        let builder = self
            .request(access, INITIALIZE_BRIDGE_OPERATION, None)?
            .json(request);
        let response = Self::dispatch(access, builder).await?;
        Self::decode(access, response).await
    }

    async fn abort_bridge(
        &self,
        access: &TranslatorAccess,
        bridge_id: BridgeId,
    ) -> TranslatorClientResult<()> {
        let segment = bridge_id.to_string();
        let builder = self.request(access, ABORT_BRIDGE_OPERATION, Some(&segment))?;
        Self::dispatch(access, builder).await?;
        Ok(())
    }
}
