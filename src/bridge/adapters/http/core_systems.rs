//! HTTP client for the blacklist, authorization and service registry
//! services.

use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::{Clock, DefaultClock};
use reqwest::{Client, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::wire::{
    BlacklistQueryRequest, BlacklistQueryResponse, LOCAL_CLOUD, LookupRequest, LookupResponse,
    PageDto, SERVICE_DEF_TARGET_TYPE, TokenGenerationEntry, TokenGenerationRequest,
    TokenGenerationResponse, UNBOUND_QUERY, VerifyEntry, VerifyRequest, VerifyResponse,
    authorized_providers,
};
use crate::bridge::{
    domain::{
        InterfaceTemplateName, OperationName, ServiceDefinitionName, ServiceInstance, SystemName,
        TranslationDiscoveryModel,
    },
    ports::{
        BlacklistPolicy, CoreSystems, CoreSystemsError, CoreSystemsResult, TargetTokenRequest,
        TranslatorLookup,
        core_systems::{
            INTERFACE_BRIDGE_MANAGEMENT_SERVICE, MANAGEMENT_TOKEN_HOURS,
            MANAGEMENT_TOKEN_USAGE_LIMIT, token_requiring_translators,
        },
    },
};
use crate::config::{BrokerConfig, CoreSystemsEndpoints};

/// Maps an unsuccessful status to the matching [`CoreSystemsError`].
fn status_error(status: StatusCode, message: String) -> CoreSystemsError {
    match status {
        StatusCode::UNAUTHORIZED => CoreSystemsError::Unauthorized(message),
        StatusCode::FORBIDDEN => CoreSystemsError::Forbidden(message),
        _ => CoreSystemsError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

/// [`CoreSystems`] backed by the blacklist, authorization and service
/// registry HTTP interfaces.
pub struct HttpCoreSystems<C = DefaultClock> {
    client: Client,
    endpoints: CoreSystemsEndpoints,
    system_name: SystemName,
    blacklist_enabled: bool,
    blacklist_policy: BlacklistPolicy,
    ssl_enabled: bool,
    certificate_authentication: bool,
    min_availability_minutes: u32,
    custom_configurations: HashMap<SystemName, Map<String, Value>>,
    clock: Arc<C>,
}

impl<C> Clone for HttpCoreSystems<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
            system_name: self.system_name.clone(),
            blacklist_enabled: self.blacklist_enabled,
            blacklist_policy: self.blacklist_policy.clone(),
            ssl_enabled: self.ssl_enabled,
            certificate_authentication: self.certificate_authentication,
            min_availability_minutes: self.min_availability_minutes,
            custom_configurations: self.custom_configurations.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl HttpCoreSystems<DefaultClock> {
    /// Creates a client for the configured core services.
    ///
    /// # Errors
    ///
    /// Returns the builder error when the TLS backend cannot be set up.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, reqwest::Error> {
        Self::with_clock(config, Arc::new(DefaultClock))
    }
}

impl<C> HttpCoreSystems<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a client using `clock` for availability windows and token
    /// expiry.
    ///
    /// # Errors
    ///
    /// Returns the builder error when the TLS backend cannot be set up.
    pub fn with_clock(config: &BrokerConfig, clock: Arc<C>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.http_timeout()).build()?;
        Ok(Self {
            client,
            endpoints: config.core_systems.clone(),
            system_name: config.system_name.clone(),
            blacklist_enabled: config.blacklist.enabled,
            blacklist_policy: config.blacklist.policy(),
            ssl_enabled: config.ssl_enabled,
            certificate_authentication: config.certificate_authentication(),
            min_availability_minutes: config.translator_min_availability_minutes,
            custom_configurations: config.custom_configurations.clone(),
            clock,
        })
    }

    async fn post<B, R>(&self, url: String, query: &[(&str, &str)], body: &B) -> CoreSystemsResult<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        debug!(%url, "calling core system");
        let response = self
            .client
            .post(&url)
            .query(query)
            .json(body)
            .send()
            .await
            .map_err(|err| CoreSystemsError::Unavailable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, message));
        }
        response
            .json::<R>()
            .await
            .map_err(|err| CoreSystemsError::InvalidResponse(err.to_string()))
    }

    async fn blacklisted_among(&self, names: &[SystemName]) -> CoreSystemsResult<HashSet<SystemName>> {
        let url = join(
            &self.endpoints.blacklist_url,
            &self.endpoints.blacklist_query_path,
        );
        let alives_at = self.clock.utc().to_rfc3339();
        let system_names: Vec<&str> = names.iter().map(SystemName::as_str).collect();
        let mut blacklisted = HashSet::new();
        let mut page = 0_usize;
        let mut size: Option<usize> = None;
        let mut seen = 0_usize;
        loop {
            let request = BlacklistQueryRequest {
                pagination: PageDto {
                    page: (page > 0).then_some(page),
                    size,
                },
                system_names: system_names.clone(),
                alives_at: alives_at.clone(),
            };
            let response: BlacklistQueryResponse = self.post(url.clone(), &[], &request).await?;
            let fetched = response.entries.len();
            seen = seen.saturating_add(fetched);
            blacklisted.extend(
                response
                    .entries
                    .into_iter()
                    .filter_map(|entry| SystemName::new(entry.system_name).ok()),
            );
            if fetched == 0 || seen >= response.count {
                break;
            }
            page = page.saturating_add(1);
            size = size.or(Some(fetched));
        }
        Ok(blacklisted)
    }

    fn alives_at(&self) -> Option<String> {
        if self.min_availability_minutes == 0 {
            return None;
        }
        let window = TimeDelta::try_minutes(i64::from(self.min_availability_minutes))?;
        self.clock
            .utc()
            .checked_add_signed(window)
            .map(|instant| instant.to_rfc3339())
    }

    async fn lookup(&self, lookup: TranslatorLookup) -> CoreSystemsResult<Vec<ServiceInstance>> {
        if lookup.is_void() {
            return Ok(Vec::new());
        }
        let narrowed = lookup.for_transport(self.ssl_enabled);
        let request = LookupRequest {
            service_definition_names: [narrowed.service_definition],
            interface_template_names: &narrowed.interface_templates,
            policies: &narrowed.policies,
            metadata_requirements_list: &narrowed.requirements,
            alives_at: self.alives_at(),
        };
        let url = join(
            &self.endpoints.service_registry_url,
            &self.endpoints.lookup_path,
        );
        let response: LookupResponse = self.post(url, &[], &request).await?;
        debug!(
            service_definition = narrowed.service_definition,
            found = response.entries.len(),
            "registry lookup finished"
        );
        Ok(response.entries)
    }

    async fn generate_tokens(
        &self,
        entries: Vec<TokenGenerationEntry<'_>>,
    ) -> CoreSystemsResult<TokenGenerationResponse> {
        let url = join(
            &self.endpoints.authorization_url,
            &self.endpoints.token_generation_path,
        );
        self.post(url, &UNBOUND_QUERY, &TokenGenerationRequest { entries })
            .await
    }
}

#[async_trait]
impl<C> CoreSystems for HttpCoreSystems<C>
where
    C: Clock + Send + Sync,
{
    async fn filter_out_blacklisted(
        &self,
        names: &[SystemName],
    ) -> CoreSystemsResult<Vec<SystemName>> {
        if !self.blacklist_enabled {
            return Ok(names.to_vec());
        }
        let to_check = self.blacklist_policy.names_to_check(names);
        if to_check.is_empty() {
            return Ok(names.to_vec());
        }
        self.blacklisted_among(&to_check).await.map_or_else(
            |err| self.blacklist_policy.on_failure(names, err),
            |blacklisted| Ok(BlacklistPolicy::retain_allowed(names, &blacklisted)),
        )
    }

    async fn filter_unauthorized_providers(
        &self,
        providers: &[SystemName],
        consumer: &SystemName,
        service_definition: &ServiceDefinitionName,
        operation: Option<&OperationName>,
    ) -> CoreSystemsResult<Vec<SystemName>> {
        if providers.is_empty() {
            return Ok(Vec::new());
        }
        let request = VerifyRequest {
            entries: providers
                .iter()
                .map(|provider| VerifyEntry {
                    provider: provider.as_str(),
                    consumer: consumer.as_str(),
                    cloud: None,
                    target_type: SERVICE_DEF_TARGET_TYPE,
                    target: service_definition.as_str(),
                    scope: operation.map(OperationName::as_str),
                })
                .collect(),
        };
        let url = join(
            &self.endpoints.authorization_url,
            &self.endpoints.verify_path,
        );
        let response: VerifyResponse = self.post(url, &[], &request).await?;
        Ok(authorized_providers(providers, &response.entries))
    }

    async fn generate_management_tokens(
        &self,
        translators: &[ServiceInstance],
    ) -> CoreSystemsResult<HashMap<SystemName, String>> {
        let needed = token_requiring_translators(translators);
        if needed.is_empty() {
            return Ok(HashMap::new());
        }
        let expires_at = TimeDelta::try_hours(MANAGEMENT_TOKEN_HOURS)
            .and_then(|lifetime| self.clock.utc().checked_add_signed(lifetime))
            .map(|instant| instant.to_rfc3339());
        let entries = needed
            .iter()
            .map(|(translator, policy)| TokenGenerationEntry {
                token_variant: *policy,
                target_type: SERVICE_DEF_TARGET_TYPE,
                cloud: LOCAL_CLOUD,
                consumer: self.system_name.as_str(),
                provider: translator.as_str(),
                target: INTERFACE_BRIDGE_MANAGEMENT_SERVICE,
                scope: None,
                expires_at: expires_at.clone(),
                usage_limit: Some(MANAGEMENT_TOKEN_USAGE_LIMIT),
            })
            .collect();
        let response = self.generate_tokens(entries).await?;
        Ok(response
            .entries
            .into_iter()
            .filter_map(|issued| {
                SystemName::new(&issued.provider)
                    .ok()
                    .map(|name| (name, issued.token))
            })
            .collect())
    }

    async fn generate_target_token(
        &self,
        request: &TargetTokenRequest,
    ) -> CoreSystemsResult<Option<String>> {
        if !request.policy.requires_token() {
            return Ok(None);
        }
        let entry = TokenGenerationEntry {
            token_variant: request.policy,
            target_type: SERVICE_DEF_TARGET_TYPE,
            cloud: LOCAL_CLOUD,
            consumer: request.consumer.as_str(),
            provider: request.provider.as_str(),
            target: request.service_definition.as_str(),
            scope: Some(request.operation.as_str()),
            expires_at: None,
            usage_limit: None,
        };
        let response = self.generate_tokens(vec![entry]).await?;
        let issued = response.entries.into_iter().next().ok_or_else(|| {
            CoreSystemsError::InvalidResponse(format!(
                "no token issued for provider {}",
                request.provider
            ))
        })?;
        Ok(Some(issued.token))
    }

    async fn lookup_interface_translators(
        &self,
        consumer_templates: &[InterfaceTemplateName],
        targets: &[ServiceInstance],
    ) -> CoreSystemsResult<Vec<ServiceInstance>> {
        self.lookup(TranslatorLookup::interface_translators(
            consumer_templates,
            targets,
        ))
        .await
    }

    async fn lookup_data_model_translators(
        &self,
        models: &[TranslationDiscoveryModel],
    ) -> CoreSystemsResult<Vec<ServiceInstance>> {
        self.lookup(TranslatorLookup::data_model_translators(
            models,
            self.certificate_authentication,
        ))
        .await
    }

    async fn custom_configuration(
        &self,
        system: &SystemName,
    ) -> CoreSystemsResult<Option<Map<String, Value>>> {
        let configuration = self.custom_configurations.get(system).cloned();
        if configuration.is_none() {
            debug!(%system, "no custom configuration for translator");
        }
        Ok(configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::unauthorized(StatusCode::UNAUTHORIZED, CoreSystemsError::Unauthorized("no".to_owned()))]
    #[case::forbidden(StatusCode::FORBIDDEN, CoreSystemsError::Forbidden("no".to_owned()))]
    #[case::other(
        StatusCode::SERVICE_UNAVAILABLE,
        CoreSystemsError::Rejected { status: 503, message: "no".to_owned() }
    )]
    fn statuses_map_to_core_system_errors(
        #[case] status: StatusCode,
        #[case] expected: CoreSystemsError,
    ) {
        assert_eq!(status_error(status, "no".to_owned()), expected);
    }

    #[rstest]
    #[case::plain("http://localhost:8443/serviceregistry", "http://localhost:8443/serviceregistry/lookup")]
    #[case::trailing_slash("http://localhost:8443/serviceregistry/", "http://localhost:8443/serviceregistry/lookup")]
    fn urls_join_without_doubled_slashes(#[case] base: &str, #[case] expected: &str) {
        assert_eq!(join(base, "/lookup"), expected);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn disabled_blacklist_allows_everyone_without_calls() {
        let config = BrokerConfig {
            blacklist: crate::config::BlacklistConfig {
                enabled: false,
                ..crate::config::BlacklistConfig::default()
            },
            ..BrokerConfig::default()
        };
        let core = HttpCoreSystems::from_config(&config).expect("client builds");
        let names = vec![SystemName::new("Consumer").expect("valid system name")];
        let allowed = core
            .filter_out_blacklisted(&names)
            .await
            .expect("filtering succeeds");
        assert_eq!(allowed, names);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_custom_configuration_is_absent() {
        let core = HttpCoreSystems::from_config(&BrokerConfig::default()).expect("client builds");
        let system = SystemName::new("TranslatorA").expect("valid system name");
        let configuration = core
            .custom_configuration(&system)
            .await
            .expect("lookup succeeds");
        assert!(configuration.is_none());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            let bytes = self.0.lock().expect("log buffer is not poisoned");
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .expect("log buffer is not poisoned")
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn configuration_misses_stay_below_info() {
        let logs = CapturedLogs::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || sink.clone())
            .finish();
        let _logging = tracing::subscriber::set_default(subscriber);
        let core = HttpCoreSystems::from_config(&BrokerConfig::default()).expect("client builds");
        let system = SystemName::new("TranslatorB").expect("valid system name");

        let configuration = core
            .custom_configuration(&system)
            .await
            .expect("lookup succeeds");

        assert!(configuration.is_none());
        assert!(logs.text().is_empty(), "unexpected log output: {}", logs.text());
    }
}
