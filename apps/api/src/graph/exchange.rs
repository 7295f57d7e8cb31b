//! The account-linking chain: authorization code → Instagram business account.
//!
//! Strictly sequential. Each step needs the previous step's output, and the
//! first failure ends the chain; nothing is retried or rolled back.

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use crate::graph::{GraphClient, GraphError, Page};

/// The steps whose failure aborts the chain. The long-lived exchange is not
/// one of them: it falls back to the page token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStep {
    CodeExchange,
    PageListing,
    UsernameLookup,
}

impl fmt::Display for ExchangeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExchangeStep::CodeExchange => "exchanging token",
            ExchangeStep::PageListing => "listing pages",
            ExchangeStep::UsernameLookup => "fetching Instagram details",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Error {step}: {source}")]
    Step {
        step: ExchangeStep,
        #[source]
        source: GraphError,
    },

    #[error("No pages found for this user.")]
    NoPages,

    #[error("No Instagram Business Account connected to your Facebook Pages.")]
    NoLinkedAccount,
}

impl ExchangeError {
    fn at(step: ExchangeStep) -> impl FnOnce(GraphError) -> ExchangeError {
        move |source| ExchangeError::Step { step, source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ExchangeError::NoPages | ExchangeError::NoLinkedAccount)
    }
}

/// Outcome of one successful chain run. Lives only for the callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenExchangeResult {
    pub page_id: String,
    pub instagram_business_id: String,
    pub username: String,
    /// Long-lived token when the final exchange worked, the page token otherwise.
    pub access_token: String,
    pub long_lived: bool,
}

/// A page that qualified for linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPage {
    pub page_id: String,
    pub page_name: String,
    pub page_token: String,
    pub instagram_business_id: String,
}

/// Picks the first page that has an Instagram business account attached.
pub fn select_linked_page(pages: Vec<Page>) -> Result<LinkedPage, ExchangeError> {
    if pages.is_empty() {
        return Err(ExchangeError::NoPages);
    }

    let page = pages
        .into_iter()
        .find(|p| p.instagram_business_account.is_some())
        .ok_or(ExchangeError::NoLinkedAccount)?;

    let instagram_business_id = page
        .instagram_business_account
        .map(|account| account.id)
        .ok_or(ExchangeError::NoLinkedAccount)?;
    let page_token = page.access_token.ok_or(ExchangeError::Step {
        step: ExchangeStep::PageListing,
        source: GraphError::MissingField("access_token"),
    })?;

    Ok(LinkedPage {
        page_id: page.id,
        page_name: page.name.unwrap_or_default(),
        page_token,
        instagram_business_id,
    })
}

/// Runs the full chain for one authorization code.
pub async fn link_account(
    graph: &GraphClient,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenExchangeResult, ExchangeError> {
    // 1. Code → short-lived user token
    let short_lived = graph
        .exchange_code(code, redirect_uri)
        .await
        .map_err(ExchangeError::at(ExchangeStep::CodeExchange))?
        .access_token
        .ok_or(ExchangeError::Step {
            step: ExchangeStep::CodeExchange,
            source: GraphError::MissingField("access_token"),
        })?;

    // 2–3. Pages → first page with a linked business account
    let pages = graph
        .list_pages(&short_lived)
        .await
        .map_err(ExchangeError::at(ExchangeStep::PageListing))?;
    let page_count = pages.len();
    let linked = select_linked_page(pages)?;
    info!(
        "Selected page {} '{}' out of {page_count} (Instagram business account {})",
        linked.page_id, linked.page_name, linked.instagram_business_id
    );

    // 4. Business account → username
    let username = graph
        .fetch_username(&linked.instagram_business_id, &linked.page_token)
        .await
        .map_err(ExchangeError::at(ExchangeStep::UsernameLookup))?;

    // 5. Long-lived token, best effort
    let (access_token, long_lived) = match graph.exchange_long_lived(&linked.page_token).await {
        Ok(response) => match response.access_token {
            Some(token) => {
                info!(
                    "Obtained long-lived token for @{username} (expires_in: {:?})",
                    response.expires_in
                );
                (token, true)
            }
            None => {
                warn!("Long-lived exchange returned no token for @{username}; keeping page token");
                (linked.page_token.clone(), false)
            }
        },
        Err(e) => {
            warn!("Long-lived exchange failed for @{username}: {e}; keeping page token");
            (linked.page_token.clone(), false)
        }
    };

    Ok(TokenExchangeResult {
        page_id: linked.page_id,
        instagram_business_id: linked.instagram_business_id,
        username,
        access_token,
        long_lived,
    })
}
