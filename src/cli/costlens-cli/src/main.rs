//! Costlens CLI - Command line interface.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Days covered when no date range is given.
const DEFAULT_WINDOW_DAYS: i64 = 30;

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "costlens")]
#[command(about = "Costlens CLI - Query Azure costs through a Costlens server")]
#[command(version)]
struct Cli {
    /// Costlens server address
    #[arg(long, default_value = "http://localhost:8000", env = "COSTLENS_ADDR")]
    addr: String,

    /// Entra ID access token
    #[arg(long, env = "COSTLENS_TOKEN")]
    token: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Table, global = true)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List subscriptions visible to the server
    Subscriptions,
    /// List resource groups of a subscription
    ResourceGroups {
        /// Subscription id
        #[arg(long)]
        subscription: String,
    },
    /// Cost per resource group
    Costs {
        /// Subscription id
        #[arg(long)]
        subscription: String,
        /// Restrict to one resource group
        #[arg(long)]
        resource_group: Option<String>,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Cost per resource within a resource group
    Resources {
        /// Subscription id
        #[arg(long)]
        subscription: String,
        /// Resource group
        #[arg(long)]
        resource_group: String,
        #[command(flatten)]
        range: RangeArgs,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// First day (YYYY-MM-DD), defaults to 30 days ago
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day (YYYY-MM-DD), defaults to today
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl RangeArgs {
    fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let to = self.to.unwrap_or(today);
        let from = self
            .from
            .unwrap_or_else(|| to - chrono::Duration::days(DEFAULT_WINDOW_DAYS));
        (from, to)
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
struct Subscription {
    id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    detail: Option<String>,
}

impl ErrorResponse {
    fn message(self) -> String {
        self.error
            .or(self.detail)
            .unwrap_or_else(|| "Unknown error".into())
    }
}

type Record = Map<String, Value>;

// ============================================================================
// HTTP Client
// ============================================================================

struct CostlensClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl CostlensClient {
    fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let token = self
            .token
            .as_ref()
            .context("Authentication token required. Set COSTLENS_TOKEN or use --token")?;

        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .context("Failed to connect to server")?;

        let status = resp.status();
        if !status.is_success() {
            let error: ErrorResponse = resp.json().await.unwrap_or_default();
            bail!("Request failed ({}): {}", status, error.message());
        }

        resp.json().await.context("Failed to parse response")
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        self.get("/api/subscriptions", &[]).await
    }

    async fn resource_groups(&self, subscription: &str) -> Result<Vec<String>> {
        self.get(
            "/api/resource-groups",
            &[("subscription_id", subscription.to_string())],
        )
        .await
    }

    async fn costs(
        &self,
        subscription: &str,
        resource_group: Option<&str>,
        (from, to): (NaiveDate, NaiveDate),
    ) -> Result<Vec<Record>> {
        let mut query = vec![
            ("subscription_id", subscription.to_string()),
            ("from_date", from.to_string()),
            ("to_date", to.to_string()),
        ];
        if let Some(rg) = resource_group {
            query.push(("resource_group", rg.to_string()));
        }

        self.get("/api/costs", &query).await
    }

    async fn resources(
        &self,
        subscription: &str,
        resource_group: &str,
        (from, to): (NaiveDate, NaiveDate),
    ) -> Result<Vec<Record>> {
        let query = [
            ("subscription", subscription.to_string()),
            ("rg", resource_group.to_string()),
            ("from_date", from.to_string()),
            ("to_date", to.to_string()),
        ];

        self.get("/api/resources", &query).await
    }
}

// ============================================================================
// Output
// ============================================================================

fn cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Renders cost records as `label  cost  currency` rows followed by a total.
fn render_cost_table(records: &[Record], label_column: &str) -> String {
    let rows: Vec<(String, f64, String)> = records
        .iter()
        .map(|r| {
            (
                cell(r.get(label_column)),
                r.get("PreTaxCost").and_then(Value::as_f64).unwrap_or(0.0),
                cell(r.get("Currency")),
            )
        })
        .collect();

    let width = rows
        .iter()
        .map(|(label, _, _)| label.len())
        .chain([label_column.len(), "Total".len()])
        .max()
        .unwrap_or(0);

    let mut out = format!("{:<width$}  {:>12}  Currency\n", label_column, "PreTaxCost");
    for (label, cost, currency) in &rows {
        out.push_str(&format!("{:<width$}  {:>12.2}  {}\n", label, cost, currency));
    }

    let total: f64 = rows.iter().map(|(_, cost, _)| cost).sum();
    let currency = rows
        .first()
        .map(|(_, _, c)| c.as_str())
        .filter(|c| rows.iter().all(|(_, _, other)| other == c))
        .unwrap_or("");
    out.push_str(&format!("{:<width$}  {:>12.2}  {}\n", "Total", total, currency));

    out
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn cmd_subscriptions(client: &CostlensClient, format: Format) -> Result<()> {
    let subscriptions = client.subscriptions().await?;

    if format == Format::Json {
        return print_json(&subscriptions);
    }

    if subscriptions.is_empty() {
        println!("No subscriptions found");
    } else {
        for s in &subscriptions {
            println!("{}  {}", s.id, s.name);
        }
    }

    Ok(())
}

async fn cmd_resource_groups(
    client: &CostlensClient,
    subscription: &str,
    format: Format,
) -> Result<()> {
    let groups = client.resource_groups(subscription).await?;

    if format == Format::Json {
        return print_json(&groups);
    }

    if groups.is_empty() {
        println!("No resource groups found");
    } else {
        for group in &groups {
            println!("{}", group);
        }
    }

    Ok(())
}

fn print_costs(records: &[Record], label_column: &str, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(records),
        Format::Table => {
            print!("{}", render_cost_table(records, label_column));
            Ok(())
        },
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = CostlensClient::new(&cli.addr, cli.token)?;
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Subscriptions => cmd_subscriptions(&client, cli.format).await,
        Commands::ResourceGroups { subscription } => {
            cmd_resource_groups(&client, &subscription, cli.format).await
        },
        Commands::Costs {
            subscription,
            resource_group,
            range,
        } => {
            let records = client
                .costs(&subscription, resource_group.as_deref(), range.resolve(today))
                .await?;
            print_costs(&records, "ResourceGroupName", cli.format)
        },
        Commands::Resources {
            subscription,
            resource_group,
            range,
        } => {
            let records = client
                .resources(&subscription, &resource_group, range.resolve(today))
                .await?;
            print_costs(&records, "ResourceId", cli.format)
        },
    }
}
