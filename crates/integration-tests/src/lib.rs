//! Live integration tests for the Toko storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and seed a database, then start the server
//! toko-cli migrate
//! toko-cli seed products -f crates/cli/seed/products.yaml
//! cargo run -p toko-storefront
//!
//! # Run the ignored live tests
//! cargo test -p toko-integration-tests -- --ignored
//! ```
//!
//! Tests expect products `P1`, `P2` and `P3` from the demo seed file.
//! Router-level tests that need no server live in `crates/storefront/tests`.

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

/// Base URL for the storefront (configurable via `STOREFRONT_URL`).
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// One browser: a cookie jar pointed at the storefront.
pub struct Browser {
    client: Client,
    base_url: String,
}

impl Browser {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .cookie_store(true)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: storefront_url(),
        }
    }

    /// Send a request and decode the JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the server is unreachable or the body is not JSON.
    #[allow(clippy::expect_used)]
    pub async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request.send().await.expect("Failed to reach storefront");
        let status = resp.status();
        let body = resp.json().await.expect("Failed to decode response");
        (status, body)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::DELETE, path, None).await
    }

    /// Sign in and return the status body.
    ///
    /// # Panics
    ///
    /// Panics if sign-in does not answer 200.
    pub async fn sign_in(&self, email: &str) -> Value {
        let (status, body) = self.post("/auth/sign-in", json!({ "email": email })).await;
        assert_eq!(status, StatusCode::OK, "sign-in failed: {body}");
        body
    }
}

impl Default for Browser {
    fn default() -> Self {
        Self::new()
    }
}

/// A fresh address so runs never share remote rows.
#[must_use]
pub fn unique_email() -> String {
    format!("integration-{}@toko.test", uuid::Uuid::new_v4())
}
