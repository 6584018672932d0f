//! Cost Management query model.
//!
//! Builds the scope path and usage query definition sent to the
//! `Microsoft.CostManagement/query` endpoint, and flattens its tabular result
//! into one JSON object per row.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::AzureError;

/// One flattened result row: column name to value, in column order.
pub type Record = Map<String, Value>;

/// Resource path a query applies to.
///
/// Built only from identifiers that pass [`path_segment`], so caller input
/// can never add segments, a query string or a fragment to the ARM URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope(String);

impl Scope {
    /// Whole subscription.
    pub fn subscription(subscription_id: &str) -> Result<Self, AzureError> {
        let id = path_segment("subscription id", subscription_id)?;
        Ok(Self(format!("/subscriptions/{}", id)))
    }

    /// Narrows the scope to one resource group.
    pub fn with_resource_group(self, resource_group: &str) -> Result<Self, AzureError> {
        let rg = path_segment("resource group", resource_group)?;
        Ok(Self(format!("{}/resourceGroups/{}", self.0, rg)))
    }

    /// Subscription scope, narrowed when `resource_group` is non-blank.
    pub fn for_request(
        subscription_id: &str,
        resource_group: Option<&str>,
    ) -> Result<Self, AzureError> {
        let scope = Self::subscription(subscription_id)?;
        match resource_group.map(str::trim).filter(|rg| !rg.is_empty()) {
            Some(rg) => scope.with_resource_group(rg),
            None => Ok(scope),
        }
    }

    /// The scope path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// First day included.
    pub from: NaiveDate,
    /// Last day included.
    pub to: NaiveDate,
}

impl DateRange {
    /// Parses two `YYYY-MM-DD` dates. `from` must not be after `to`.
    pub fn parse(from: &str, to: &str) -> Result<Self, AzureError> {
        let from = parse_date(from)?;
        let to = parse_date(to)?;
        Self::new(from, to)
    }

    /// Builds a range, rejecting inverted bounds.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, AzureError> {
        if from > to {
            return Err(AzureError::InvalidRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(Self { from, to })
    }
}

/// Accepts one ARM path segment: letters, digits, `-`, `_`, `.`, `(` and
/// `)`, and not only dots. Subscription GUIDs and resource group names fit.
pub(crate) fn path_segment<'a>(kind: &'static str, value: &'a str) -> Result<&'a str, AzureError> {
    let allowed = value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')'));

    if value.is_empty() || !allowed || value.chars().all(|c| c == '.') {
        return Err(AzureError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn parse_date(value: &str) -> Result<NaiveDate, AzureError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AzureError::InvalidDate(value.to_string()))
}

/// Dimension cost rows are bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// One row per resource group.
    ResourceGroupName,
    /// One row per resource.
    ResourceId,
}

impl GroupBy {
    /// Dimension name as understood by Cost Management.
    pub fn dimension(&self) -> &'static str {
        match self {
            GroupBy::ResourceGroupName => "ResourceGroupName",
            GroupBy::ResourceId => "ResourceId",
        }
    }
}

/// Body of a Cost Management query request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDefinition {
    #[serde(rename = "type")]
    query_type: String,
    timeframe: String,
    time_period: TimePeriod,
    dataset: Dataset,
}

#[derive(Debug, Clone, Serialize)]
struct TimePeriod {
    from: String,
    to: String,
}

#[derive(Debug, Clone, Serialize)]
struct Dataset {
    granularity: String,
    aggregation: BTreeMap<String, Aggregation>,
    grouping: Vec<Grouping>,
}

#[derive(Debug, Clone, Serialize)]
struct Aggregation {
    name: String,
    function: String,
}

#[derive(Debug, Clone, Serialize)]
struct Grouping {
    #[serde(rename = "type")]
    grouping_type: String,
    name: String,
}

impl QueryDefinition {
    /// Total pre-tax cost over `range`, one row per `group_by` value.
    ///
    /// The time period runs from the start of `range.from` to the last
    /// second of `range.to`, so both days are included.
    pub fn usage(range: DateRange, group_by: GroupBy) -> Self {
        let mut aggregation = BTreeMap::new();
        aggregation.insert(
            "PreTaxCost".to_string(),
            Aggregation {
                name: "PreTaxCost".to_string(),
                function: "Sum".to_string(),
            },
        );

        Self {
            query_type: "Usage".to_string(),
            timeframe: "Custom".to_string(),
            time_period: TimePeriod {
                from: format!("{}T00:00:00Z", range.from.format("%Y-%m-%d")),
                to: format!("{}T23:59:59Z", range.to.format("%Y-%m-%d")),
            },
            dataset: Dataset {
                granularity: "None".to_string(),
                aggregation,
                grouping: vec![Grouping {
                    grouping_type: "Dimension".to_string(),
                    name: group_by.dimension().to_string(),
                }],
            },
        }
    }
}

/// Column metadata of a query result.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryColumn {
    /// Column name.
    pub name: String,
    /// Column type (`Number`, `String`, ...).
    #[serde(rename = "type", default)]
    pub column_type: Option<String>,
}

/// Tabular result of a Cost Management query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Columns, in row value order.
    #[serde(default)]
    pub columns: Vec<QueryColumn>,
    /// Rows of positional values.
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    /// Link to the next page, if any.
    #[serde(default)]
    pub next_link: Option<String>,
}

impl QueryResult {
    /// Zips column names with each row's values, keeping row order.
    ///
    /// A row shorter or longer than the column list yields only the pairs
    /// both sides have.
    pub fn into_records(self) -> Vec<Record> {
        let names: Vec<String> = self.columns.into_iter().map(|c| c.name).collect();

        self.rows
            .into_iter()
            .map(|row| names.iter().cloned().zip(row).collect())
            .collect()
    }
}

/// ARM envelope around a query result.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) properties: QueryResult,
}
