//! Azure Resource Manager client.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::query::QueryResponse;
use crate::{
    ArmCredential, AzureError, DateRange, GroupBy, QueryDefinition, QueryResult, Record,
    RetryPolicy, Scope,
};

/// Public cloud ARM endpoint.
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
const RESOURCE_GROUPS_API_VERSION: &str = "2021-04-01";
const COST_MANAGEMENT_API_VERSION: &str = "2023-03-01";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct AzureClientConfig {
    /// ARM base URL.
    pub endpoint: String,
    /// Backoff applied to rate-limited cost queries.
    pub retry: RetryPolicy,
}

impl Default for AzureClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Subscription summary returned to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription id (GUID).
    pub id: String,
    /// Display name.
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionResource {
    subscription_id: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ResourceGroupResource {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the ARM subscription, resource-group and Cost Management APIs.
///
/// Safe to share across requests; holds no per-request state.
pub struct AzureClient {
    http: reqwest::Client,
    endpoint: String,
    credential: Arc<ArmCredential>,
    retry: RetryPolicy,
}

impl AzureClient {
    /// Creates a client with its own HTTP client.
    pub fn new(config: AzureClientConfig, credential: Arc<ArmCredential>) -> Self {
        Self::with_client(config, credential, reqwest::Client::new())
    }

    /// Creates a client over an existing HTTP client.
    pub fn with_client(
        config: AzureClientConfig,
        credential: Arc<ArmCredential>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            credential,
            retry: config.retry,
        }
    }

    /// Lists the subscriptions visible to the credential.
    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>, AzureError> {
        let url = format!(
            "{}/subscriptions?api-version={}",
            self.endpoint, SUBSCRIPTIONS_API_VERSION
        );

        let subscriptions: Vec<SubscriptionResource> = self.get_all_pages(url).await?;

        Ok(subscriptions
            .into_iter()
            .map(|s| Subscription {
                id: s.subscription_id,
                name: s.display_name,
            })
            .collect())
    }

    /// Lists the resource-group names of a subscription.
    pub async fn list_resource_groups(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<String>, AzureError> {
        let url = format!(
            "{}{}/resourcegroups?api-version={}",
            self.endpoint,
            Scope::subscription(subscription_id)?,
            RESOURCE_GROUPS_API_VERSION
        );

        let groups: Vec<ResourceGroupResource> = self.get_all_pages(url).await?;

        Ok(groups.into_iter().map(|g| g.name).collect())
    }

    /// Issues one Cost Management query, without retry.
    pub async fn query_usage(
        &self,
        scope: &Scope,
        definition: &QueryDefinition,
    ) -> Result<QueryResult, AzureError> {
        let url = format!(
            "{}{}/providers/Microsoft.CostManagement/query?api-version={}",
            self.endpoint, scope, COST_MANAGEMENT_API_VERSION
        );

        let response = self.send(self.http.post(&url).json(definition)).await?;
        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| AzureError::InvalidResponse(format!("cost query result: {}", e)))?;

        Ok(body.properties)
    }

    /// Total cost over `range` within `scope`, one record per `group_by`
    /// value. Rate-limited attempts are retried per the client's policy.
    pub async fn query_costs(
        &self,
        scope: &Scope,
        range: DateRange,
        group_by: GroupBy,
    ) -> Result<Vec<Record>, AzureError> {
        let definition = QueryDefinition::usage(range, group_by);
        debug!(
            scope = %scope,
            from = %range.from,
            to = %range.to,
            group_by = group_by.dimension(),
            "Querying costs"
        );

        let result = self
            .retry
            .run("cost_query", || self.query_usage(scope, &definition))
            .await?;

        let records = result.into_records();
        info!(scope = %scope, rows = records.len(), "Cost query completed");

        Ok(records)
    }

    async fn get_all_pages<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, AzureError> {
        let mut items = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next {
            let response = self.send(self.http.get(&url)).await?;
            let page: Page<T> = response
                .json()
                .await
                .map_err(|e| AzureError::InvalidResponse(format!("list page: {}", e)))?;

            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(items)
    }

    /// Authorizes and sends a request, mapping error statuses.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, AzureError> {
        let token = self.credential.token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AzureError::RateLimited);
        }
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => (
                envelope.error.code,
                envelope
                    .error
                    .message
                    .unwrap_or_else(|| status.to_string()),
            ),
            Err(_) if text.trim().is_empty() => (None, status.to_string()),
            Err(_) => (None, text.trim().to_string()),
        };

        Err(AzureError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }
}
