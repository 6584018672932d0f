//! Route handlers.
//!
//! Each handler runs after [`crate::middleware::require_auth`] and issues at
//! most one Azure operation.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use costlens_auth::AuthContext;
use costlens_azure::{DateRange, GroupBy, Record, Scope, Subscription};
use serde::Deserialize;
use tracing::debug;

use crate::{ApiError, AppState};

/// Query string of `GET /api/resource-groups`.
#[derive(Debug, Deserialize)]
pub struct ResourceGroupsQuery {
    /// Subscription to list.
    pub subscription_id: String,
}

/// Query string of `GET /api/costs`.
#[derive(Debug, Deserialize)]
pub struct CostsQuery {
    /// Subscription to query.
    pub subscription_id: String,
    /// First day, `YYYY-MM-DD`.
    pub from_date: String,
    /// Last day, `YYYY-MM-DD`.
    pub to_date: String,
    /// Narrows the query to one resource group when non-blank.
    #[serde(default)]
    pub resource_group: Option<String>,
}

/// Query string of `GET /api/resources`.
#[derive(Debug, Deserialize)]
pub struct ResourcesQuery {
    /// Subscription to query.
    pub subscription: String,
    /// Resource group to query.
    pub rg: String,
    /// First day, `YYYY-MM-DD`.
    pub from_date: String,
    /// Last day, `YYYY-MM-DD`.
    pub to_date: String,
}

/// `GET /api/subscriptions`
pub async fn subscriptions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthContext>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    debug!(user = user.label(), "Listing subscriptions");

    let subscriptions = state.azure.list_subscriptions().await?;
    Ok(Json(subscriptions))
}

/// `GET /api/resource-groups?subscription_id=`
pub async fn resource_groups(
    State(state): State<AppState>,
    Extension(user): Extension<AuthContext>,
    Query(query): Query<ResourceGroupsQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    debug!(
        user = user.label(),
        subscription_id = %query.subscription_id,
        "Listing resource groups"
    );

    let groups = state
        .azure
        .list_resource_groups(&query.subscription_id)
        .await?;
    Ok(Json(groups))
}

/// `GET /api/costs?subscription_id=&from_date=&to_date=&resource_group=`
///
/// One record per resource group.
pub async fn costs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthContext>,
    Query(query): Query<CostsQuery>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let range = DateRange::parse(&query.from_date, &query.to_date)?;
    let scope = Scope::for_request(&query.subscription_id, query.resource_group.as_deref())?;

    debug!(user = user.label(), scope = %scope, "Fetching cost data");

    let records = state
        .azure
        .query_costs(&scope, range, GroupBy::ResourceGroupName)
        .await?;
    Ok(Json(records))
}

/// `GET /api/resources?subscription=&rg=&from_date=&to_date=`
///
/// One record per resource in the resource group.
pub async fn resources(
    State(state): State<AppState>,
    Extension(user): Extension<AuthContext>,
    Query(query): Query<ResourcesQuery>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let range = DateRange::parse(&query.from_date, &query.to_date)?;

    let rg = query.rg.trim();
    if rg.is_empty() {
        return Err(ApiError::BadRequest("rg must not be empty".to_string()));
    }
    let scope = Scope::subscription(&query.subscription)?.with_resource_group(rg)?;

    debug!(user = user.label(), scope = %scope, "Fetching resource data");

    let records = state
        .azure
        .query_costs(&scope, range, GroupBy::ResourceId)
        .await?;
    Ok(Json(records))
}
