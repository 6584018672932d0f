//! Integration tests for the Costlens server.
//!
//! These tests run the server binary against a mock identity provider and a
//! mock Azure Resource Manager, then drive it over HTTP with signed tokens.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use costlens_auth::testing;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// ARM token the server presents when it calls the mock.
pub const ARM_TOKEN: &str = "integration-arm-token";

// ============================================================================
// Mock Upstreams
// ============================================================================

/// Starts a mock that serves both the tenant's signing keys and ARM.
pub async fn start_upstream() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/{}/discovery/v2.0/keys",
            testing::TEST_TENANT_ID
        )))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(testing::JWKS_JSON, "application/json"),
        )
        .mount(&server)
        .await;

    server
}

// ============================================================================
// Test Server
// ============================================================================

/// A running server process wired to a mock upstream.
pub struct TestServer {
    process: Child,
    pub base_url: String,
    pub port: u16,
}

impl TestServer {
    /// Start a new test server on the specified port.
    pub async fn start(port: u16, upstream: &MockServer) -> Result<Self> {
        let mut process = spawn_server(port, upstream)?;
        let base_url = format!("http://127.0.0.1:{}", port);

        if let Err(e) = wait_for_ready(&mut process, &base_url).await {
            let _ = process.kill();
            let _ = process.wait();
            return Err(e);
        }

        Ok(Self {
            process,
            base_url,
            port,
        })
    }

    /// Get a configured HTTP client for this server.
    pub fn client(&self) -> CostlensClient {
        CostlensClient::new(&self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Spawns the server binary pointed at `upstream` for both identity and ARM.
pub fn spawn_server(port: u16, upstream: &MockServer) -> Result<Child> {
    let server_binary = find_server_binary()?;

    Command::new(&server_binary)
        .arg("--bind")
        .arg(format!("127.0.0.1:{}", port))
        .arg("--tenant-id")
        .arg(testing::TEST_TENANT_ID)
        .arg("--client-id")
        .arg(testing::TEST_CLIENT_ID)
        .arg("--authority")
        .arg(upstream.uri())
        .arg("--arm-endpoint")
        .arg(upstream.uri())
        .arg("--retry-base-delay-secs")
        .arg("0")
        .env("AZURE_ACCESS_TOKEN", ARM_TOKEN)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to start server: {:?}", server_binary))
}

/// Polls until the server answers. An unauthenticated request returning 401
/// means the listener and auth layer are up.
async fn wait_for_ready(process: &mut Child, base_url: &str) -> Result<()> {
    let client = Client::new();
    let url = format!("{}/api/subscriptions", base_url);

    for _ in 0..100 {
        if let Some(status) = process.try_wait()? {
            bail!("Server exited during startup: {}", status);
        }
        match client.get(&url).send().await {
            Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }

    bail!("Server failed to start within 10 seconds")
}

/// Waits for a process that is expected to exit on its own.
pub async fn wait_for_exit(process: &mut Child, timeout: Duration) -> Result<ExitStatus> {
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if let Some(status) = process.try_wait()? {
            return Ok(status);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let _ = process.kill();
    let _ = process.wait();
    bail!("Process still running after {:?}", timeout)
}

/// Find the server binary in the target directory.
fn find_server_binary() -> Result<std::path::PathBuf> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());

    // Try debug build first, then release
    let candidates = [
        std::path::Path::new(&manifest_dir).join("../../target/debug/costlens-server"),
        std::path::Path::new(&manifest_dir).join("../../target/debug/costlens-server.exe"),
        std::path::Path::new(&manifest_dir).join("../../target/release/costlens-server"),
        std::path::Path::new(&manifest_dir).join("../../target/release/costlens-server.exe"),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.canonicalize()?);
        }
    }

    bail!(
        "Could not find costlens-server binary. Run 'cargo build -p costlens-server' first. Searched in: {:?}",
        candidates
    )
}

// ============================================================================
// Test Client
// ============================================================================

/// HTTP client for testing the Costlens API.
pub struct CostlensClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl CostlensClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Issues a GET and returns the status with the JSON body (`Null` if the
    /// body is not JSON).
    pub async fn get(&self, path_and_query: &str) -> Result<(StatusCode, Value)> {
        let mut req = self
            .client
            .get(format!("{}{}", self.base_url, path_and_query));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        Ok((status, serde_json::from_slice(&bytes).unwrap_or(Value::Null)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU16, Ordering};
    use costlens_auth::EntraIdConfig;
    use testing::TokenBuilder;
    use wiremock::matchers::{body_partial_json, header, query_param};

    // Port counter to avoid conflicts between parallel tests
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18400);

    fn next_port() -> u16 {
        PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
    }

    /// Identity settings the spawned server runs with.
    fn server_config(upstream: &MockServer) -> EntraIdConfig {
        EntraIdConfig {
            authority: upstream.uri(),
            ..testing::test_config()
        }
    }

    fn token(upstream: &MockServer) -> String {
        TokenBuilder::new(&server_config(upstream)).sign()
    }

    #[test]
    fn test_tokens_match_server_issuer() {
        let upstream_uri = "http://127.0.0.1:9999";
        let config = EntraIdConfig {
            authority: upstream_uri.to_string(),
            ..testing::test_config()
        };
        let claims = TokenBuilder::new(&config).claims();

        assert_eq!(
            claims["iss"],
            format!("{}/{}/v2.0", upstream_uri, testing::TEST_TENANT_ID)
        );
    }

    #[tokio::test]
    async fn test_rejects_unauthenticated_requests() {
        let upstream = start_upstream().await;
        let server = TestServer::start(next_port(), &upstream).await.unwrap();

        let (status, body) = server.client().get("/api/subscriptions").await.unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "detail": "Not authenticated" }));

        let expired = TokenBuilder::new(&server_config(&upstream))
            .expires_in(-600)
            .sign();
        let (status, body) = server
            .client()
            .with_token(&expired)
            .get("/api/subscriptions")
            .await
            .unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            json!({ "detail": "Could not validate credentials: token expired" })
        );
    }

    #[tokio::test]
    async fn test_dashboard_flow() {
        let upstream = start_upstream().await;

        Mock::given(method("GET"))
            .and(path("/subscriptions"))
            .and(header("authorization", format!("Bearer {}", ARM_TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "subscriptionId": "sub-1", "displayName": "Production" }]
            })))
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/sub-1/resourcegroups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "name": "rg1" }]
            })))
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/providers/Microsoft.CostManagement/query",
            ))
            .and(query_param("api-version", "2023-03-01"))
            .and(body_partial_json(json!({
                "timePeriod": { "from": "2024-01-01T00:00:00Z", "to": "2024-01-31T23:59:59Z" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {
                    "columns": [
                        { "name": "PreTaxCost", "type": "Number" },
                        { "name": "ResourceGroupName", "type": "String" },
                        { "name": "Currency", "type": "String" }
                    ],
                    "rows": [[12.5, "rg1", "USD"]]
                }
            })))
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/resourceGroups/rg1/providers/Microsoft.CostManagement/query",
            ))
            .and(body_partial_json(json!({
                "dataset": { "grouping": [{ "type": "Dimension", "name": "ResourceId" }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {
                    "columns": [{ "name": "PreTaxCost" }, { "name": "ResourceId" }],
                    "rows": [[4.0, "/subscriptions/sub-1/resourcegroups/rg1/providers/x/y/vm1"]]
                }
            })))
            .expect(1)
            .mount(&upstream)
            .await;

        let server = TestServer::start(next_port(), &upstream).await.unwrap();
        let client = server.client().with_token(&token(&upstream));

        let (status, body) = client.get("/api/subscriptions").await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{ "id": "sub-1", "name": "Production" }]));

        let (status, body) = client
            .get("/api/resource-groups?subscription_id=sub-1")
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["rg1"]));

        let (status, body) = client
            .get("/api/costs?subscription_id=sub-1&from_date=2024-01-01&to_date=2024-01-31")
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{ "PreTaxCost": 12.5, "ResourceGroupName": "rg1", "Currency": "USD" }])
        );

        let (status, body) = client
            .get("/api/resources?subscription=sub-1&rg=rg1&from_date=2024-01-01&to_date=2024-01-31")
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["PreTaxCost"], 4.0);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausted() {
        let upstream = start_upstream().await;
        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/providers/Microsoft.CostManagement/query",
            ))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&upstream)
            .await;

        let server = TestServer::start(next_port(), &upstream).await.unwrap();
        let (status, body) = server
            .client()
            .with_token(&token(&upstream))
            .get("/api/costs?subscription_id=sub-1&from_date=2024-01-01&to_date=2024-01-31")
            .await
            .unwrap();

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body,
            json!({ "error": "Azure API rate limit exceeded. Please try again later." })
        );
    }

    #[tokio::test]
    async fn test_startup_fails_without_signing_keys() {
        // No key endpoint mounted: discovery returns 404.
        let upstream = MockServer::start().await;

        let mut process = spawn_server(next_port(), &upstream).unwrap();
        let status = wait_for_exit(&mut process, Duration::from_secs(10))
            .await
            .unwrap();

        assert!(!status.success());
    }
}
