//! Related-person lookup.
//!
//! The beneficiary chooser needs the authenticated user's related
//! persons. The listing is scoped server-side by the bearer token, so
//! the request carries no person id of its own.

use async_trait::async_trait;

use turnero_core::model::RelatedPerson;
use turnero_core::ports::{FetchError, RelatedPersonProvider};

use crate::error::{parse_response, RestApiError};

/// HTTP client for the related-person endpoint.
pub struct RelatedPersonApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RelatedPersonApi {
    /// Create a new client.
    ///
    /// * `base_url` - API base, e.g. `https://host/api`.
    /// * `token`    - bearer credential, opaque to this subsystem.
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url,
            token,
        }
    }

    /// List the authenticated user's related persons.
    ///
    /// Sends `GET /RelatedPerson/list`. An empty list is a normal
    /// outcome -- the booking flow then books for the user themself.
    pub async fn list(&self) -> Result<Vec<RelatedPerson>, RestApiError> {
        let response = self
            .client
            .get(format!("{}/RelatedPerson/list", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let persons: Vec<RelatedPerson> = parse_response(response).await?;

        tracing::debug!(count = persons.len(), "Fetched related persons");

        Ok(persons)
    }
}

#[async_trait]
impl RelatedPersonProvider for RelatedPersonApi {
    async fn related_persons(&self) -> Result<Vec<RelatedPerson>, FetchError> {
        self.list().await.map_err(Into::into)
    }
}
