//! HTTP implementation of [`OrchestrationApi`] on a blocking `reqwest` client.

use corral_common::config::ClientConfig;
use corral_common::constants::APP_NAME;
use corral_common::error::{CorralError, Result};
use corral_common::types::{ConsumeMapId, EnvironmentId, ServiceId};
use corral_compose::LogicalService;
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{
    ConsumeMap, Environment, OrchestrationApi, Operation, ServiceRecord, create_payload,
    update_payload,
};

/// Collection envelope: `{"data": [...], "pagination": {"next": ...}}`.
#[derive(Debug, Deserialize)]
struct Collection<T> {
    data: Vec<T>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

/// Link to the following page, absent on the last one.
#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<String>,
}

/// Orchestration API reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    config: ClientConfig,
}

impl HttpApi {
    /// Builds a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::Config`] if the configuration is invalid and
    /// [`CorralError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("corral/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CorralError::transport("build HTTP client", e))?;
        tracing::debug!(url = %config.base_url(), app = APP_NAME, "HTTP API client ready");
        Ok(Self { client, config })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{path}", self.config.base_url());
        self.authorize(self.client.request(method, url))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match (&self.config.access_key, &self.config.secret_key) {
            (Some(access), Some(secret)) => builder.basic_auth(access, Some(secret)),
            _ => builder,
        }
    }

    fn execute(
        &self,
        operation: Operation,
        builder: RequestBuilder,
    ) -> Result<reqwest::blocking::Response> {
        tracing::debug!(operation = %operation, "API call");
        let response = builder
            .send()
            .map_err(|e| CorralError::transport(operation.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CorralError::transport(
                operation.as_str(),
                format!("HTTP {status}: {body}"),
            ));
        }
        Ok(response)
    }

    fn send<T: DeserializeOwned>(
        &self,
        operation: Operation,
        builder: RequestBuilder,
    ) -> Result<T> {
        self.execute(operation, builder)?
            .json()
            .map_err(|e| CorralError::transport(operation.as_str(), e))
    }

    /// Fetches every page of a collection, following `pagination.next`.
    fn list<T: DeserializeOwned>(
        &self,
        operation: Operation,
        builder: RequestBuilder,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut builder = builder;
        loop {
            let page: Collection<T> = self.send(operation, builder)?;
            items.extend(page.data);
            match page.pagination.and_then(|p| p.next) {
                Some(next) => {
                    tracing::debug!(operation = %operation, next = %next, "following next page");
                    builder = self.authorize(self.client.get(next));
                }
                None => return Ok(items),
            }
        }
    }
}

impl OrchestrationApi for HttpApi {
    fn create_environment(&self, name: &str) -> Result<Environment> {
        let builder = self
            .request(Method::POST, "environments")
            .json(&json!({ "name": name }));
        self.send(Operation::CreateEnvironment, builder)
    }

    fn list_environments(&self, name: Option<&str>) -> Result<Vec<Environment>> {
        let mut builder = self.request(Method::GET, "environments");
        if let Some(name) = name {
            builder = builder.query(&[("name", name)]);
        }
        self.list(Operation::ListEnvironments, builder)
    }

    fn create_service(
        &self,
        environment: &EnvironmentId,
        service: &LogicalService,
    ) -> Result<ServiceRecord> {
        let payload = create_payload(environment, service)?;
        let builder = self
            .request(Method::POST, service.kind.collection())
            .json(&payload);
        self.send(Operation::CreateService, builder)
    }

    fn update_service(&self, id: &ServiceId, service: &LogicalService) -> Result<ServiceRecord> {
        let payload = update_payload(service)?;
        let builder = self
            .request(Method::PUT, &format!("services/{id}"))
            .json(&payload);
        self.send(Operation::UpdateService, builder)
    }

    fn list_services(&self, environment: &EnvironmentId) -> Result<Vec<ServiceRecord>> {
        let builder = self
            .request(Method::GET, "services")
            .query(&[("environmentId", environment.as_str())]);
        self.list(Operation::ListServices, builder)
    }

    fn create_consume_map(
        &self,
        service: &ServiceId,
        consumed: &ServiceId,
        alias: &str,
    ) -> Result<ConsumeMap> {
        let builder = self.request(Method::POST, "serviceconsumemaps").json(&json!({
            "serviceId": service,
            "consumedServiceId": consumed,
            "name": alias,
        }));
        self.send(Operation::CreateConsumeMap, builder)
    }

    fn list_consume_maps(&self, service: &ServiceId) -> Result<Vec<ConsumeMap>> {
        let builder = self
            .request(Method::GET, "serviceconsumemaps")
            .query(&[("serviceId", service.as_str())]);
        self.list(Operation::ListConsumeMaps, builder)
    }

    fn delete_consume_map(&self, id: &ConsumeMapId) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("serviceconsumemaps/{id}"));
        let _ = self.execute(Operation::DeleteConsumeMap, builder)?;
        Ok(())
    }

    fn delete_environment(&self, id: &EnvironmentId) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("environments/{id}"));
        let _ = self.execute(Operation::DeleteEnvironment, builder)?;
        Ok(())
    }
}
