//! Google Analytics proxy module.
//!
//! Fetches a GA4 `runReport` for the admin dashboard without a client library:
//! - Signs an RS256 service-account JWT
//! - Exchanges it for an OAuth access token
//! - Runs a 30-day report (active users, page views, session duration,
//!   bounce rate, by date)
//!
//! When no credentials are configured the service stays disabled and the API
//! answers with a mock payload instead.

use std::path::Path;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Errors that can occur while talking to Google Analytics
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Analytics is not configured")]
    NotConfigured,

    #[error("Unreadable service account key: {0}")]
    InvalidKey(String),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Google API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Google API returned status {0}: {1}")]
    Upstream(u16, String),
}

/// Result type for analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const ANALYTICS_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Service account key fields needed for signing
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    OAUTH_TOKEN_URL.to_string()
}

/// Configuration for the analytics proxy
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// GA4 property the report runs against
    pub property_id: String,
    /// Parsed service account key
    pub key: ServiceAccountKey,
}

impl AnalyticsConfig {
    /// Load from optional settings, reading and parsing the key file
    pub fn load(
        property_id: Option<String>,
        credentials_path: Option<&Path>,
    ) -> AnalyticsResult<Self> {
        let property_id = property_id
            .filter(|p| !p.is_empty())
            .ok_or(AnalyticsError::NotConfigured)?;
        let path = credentials_path.ok_or(AnalyticsError::NotConfigured)?;

        let raw = std::fs::read_to_string(path)
            .map_err(|e| AnalyticsError::InvalidKey(format!("{}: {}", path.display(), e)))?;
        let key: ServiceAccountKey =
            serde_json::from_str(&raw).map_err(|e| AnalyticsError::InvalidKey(e.to_string()))?;

        Ok(Self { property_id, key })
    }
}

/// OAuth claims for the service-account JWT
#[derive(Debug, Serialize)]
struct TokenClaims {
    iss: String,
    scope: String,
    aud: String,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// GA4 reporting proxy
pub struct AnalyticsService {
    config: Option<AnalyticsConfig>,
    http: reqwest::Client,
}

impl AnalyticsService {
    /// Create a new service from a loaded config
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config: Some(config),
            http: reqwest::Client::new(),
        }
    }

    /// Create without credentials (reports fall back to the mock payload)
    pub fn unconfigured() -> Self {
        Self {
            config: None,
            http: reqwest::Client::new(),
        }
    }

    /// Check if the service has credentials to sign with
    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Report payload served when no credentials are configured
    pub fn mock_report() -> Value {
        json!({
            "status": "mock_mode",
            "error": "Analytics credentials not configured"
        })
    }

    /// Fetch the 30-day report from the GA4 Data API
    pub async fn fetch_report(&self) -> AnalyticsResult<Value> {
        let config = self.config.as_ref().ok_or(AnalyticsError::NotConfigured)?;
        let access_token = self.fetch_access_token(&config.key).await?;

        let url = format!(
            "https://analyticsdata.googleapis.com/v1beta/properties/{}:runReport",
            config.property_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&report_request())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Upstream(status, body));
        }
        Ok(response.json().await?)
    }

    /// Sign the service-account JWT and exchange it for an access token
    async fn fetch_access_token(&self, key: &ServiceAccountKey) -> AnalyticsResult<String> {
        let assertion = sign_claims(key)?;
        let response = self
            .http
            .post(&key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Upstream(status, body));
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

fn sign_claims(key: &ServiceAccountKey) -> AnalyticsResult<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = TokenClaims {
        iss: key.client_email.clone(),
        scope: ANALYTICS_SCOPE.to_string(),
        aud: key.token_uri.clone(),
        exp: now + 3600,
        iat: now,
    };

    let header = Header::new(Algorithm::RS256);
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(encode(&header, &claims, &encoding_key)?)
}

/// Last 30 days, keyed by date
fn report_request() -> Value {
    json!({
        "dateRanges": [{"startDate": "30daysAgo", "endDate": "today"}],
        "metrics": [
            {"name": "activeUsers"},
            {"name": "screenPageViews"},
            {"name": "averageSessionDuration"},
            {"name": "bounceRate"}
        ],
        "dimensions": [
            {"name": "date"}
        ]
    })
}
