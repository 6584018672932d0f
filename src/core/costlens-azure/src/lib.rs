//! # Costlens Azure
//!
//! Thin client for the Azure Resource Manager APIs the dashboard needs.
//!
//! ## Features
//!
//! - Subscription and resource-group listing (follows `nextLink` paging)
//! - Cost Management usage queries grouped by one dimension
//! - Exponential backoff on 429 for cost queries
//! - Credential chain over `azure_identity`: client secret, managed identity,
//!   Azure CLI

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod credential;
pub mod error;
pub mod query;
pub mod retry;

pub use client::{AzureClient, AzureClientConfig, Subscription, DEFAULT_ARM_ENDPOINT};
pub use credential::{ArmCredential, NamedCredential, ARM_SCOPE};
pub use error::AzureError;
pub use query::{DateRange, GroupBy, QueryDefinition, QueryResult, Record, Scope};
pub use retry::RetryPolicy;
