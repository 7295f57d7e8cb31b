//! Graph API client. Every call to the social platform goes through here.
//!
//! Calls are plain GETs with query-string credentials. The platform reports
//! failures as an `error` object in the body (often with a 4xx status), so each
//! response is parsed as JSON and inspected before being decoded.

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod exchange;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api {
        message: String,
        kind: Option<String>,
        code: Option<i64>,
    },

    #[error("unexpected response (status {status}): {source}")]
    Parse {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("response is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: Option<String>,
    /// Seconds until expiry; absent for tokens that never expire.
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    pub name: Option<String>,
    pub access_token: Option<String>,
    pub instagram_business_account: Option<AccountRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(default)]
    data: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct UsernameResponse {
    username: Option<String>,
}

#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
    app_id: String,
    app_secret: String,
}

impl GraphClient {
    pub fn new(base_url: String, app_id: String, app_secret: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            app_id,
            app_secret,
        }
    }

    /// Trades a one-time authorization code for a short-lived user token.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessTokenResponse, GraphError> {
        self.get(
            "oauth/access_token",
            &[
                ("client_id", self.app_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("client_secret", self.app_secret.as_str()),
                ("code", code),
            ],
        )
        .await
    }

    /// Lists the pages the token's owner administers, with their linked
    /// Instagram business account when there is one.
    pub async fn list_pages(&self, user_token: &str) -> Result<Vec<Page>, GraphError> {
        let pages: PagesResponse = self
            .get(
                "me/accounts",
                &[
                    ("access_token", user_token),
                    ("fields", "id,name,access_token,instagram_business_account"),
                ],
            )
            .await?;
        Ok(pages.data)
    }

    pub async fn fetch_username(
        &self,
        instagram_business_id: &str,
        page_token: &str,
    ) -> Result<String, GraphError> {
        let details: UsernameResponse = self
            .get(
                instagram_business_id,
                &[("fields", "username"), ("access_token", page_token)],
            )
            .await?;
        details.username.ok_or(GraphError::MissingField("username"))
    }

    /// Exchanges a token for its long-lived counterpart.
    pub async fn exchange_long_lived(
        &self,
        token: &str,
    ) -> Result<AccessTokenResponse, GraphError> {
        self.get(
            "oauth/access_token",
            &[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.as_str()),
                ("fb_exchange_token", token),
            ],
        )
        .await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GraphError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!("Graph GET /{path} returned {status}");

        let value: Value =
            serde_json::from_str(&body).map_err(|source| GraphError::Parse { status, source })?;
        if let Err(e) = check_embedded_error(&value) {
            if let GraphError::Api { kind, code, .. } = &e {
                warn!("Graph GET /{path} reported error (type: {kind:?}, code: {code:?}): {e}");
            }
            return Err(e);
        }

        serde_json::from_value(value).map_err(|source| GraphError::Parse { status, source })
    }
}

/// Fails when the body carries the platform's `error` object.
fn check_embedded_error(value: &Value) -> Result<(), GraphError> {
    match value.get("error") {
        Some(error) if !error.is_null() => {
            let body: GraphErrorBody =
                serde_json::from_value(error.clone()).unwrap_or(GraphErrorBody {
                    message: error.to_string(),
                    kind: None,
                    code: None,
                });
            Err(GraphError::Api {
                message: body.message,
                kind: body.kind,
                code: body.code,
            })
        }
        _ => Ok(()),
    }
}
