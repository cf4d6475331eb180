//! Availability fetcher.
//!
//! One-shot REST call that returns the slot list for an appointment
//! type on a calendar day. The backend answers with SlotRecord-shaped
//! objects, each carrying its own `resourceScheduleId` -- the resource
//! id for a day is discovered from the first returned record.

use async_trait::async_trait;
use chrono::NaiveDate;

use turnero_core::model::SlotRecord;
use turnero_core::ports::{AvailabilityProvider, FetchError};
use turnero_core::types::DbId;

use crate::error::{parse_response, RestApiError};

/// HTTP client for the availability endpoint.
pub struct AvailabilityApi {
    client: reqwest::Client,
    base_url: String,
}

impl AvailabilityApi {
    /// Create a new client.
    ///
    /// * `base_url` - API base, e.g. `https://host/api`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (connection pooling across the REST collaborators).
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Fetch the slot list for one day.
    ///
    /// Sends `GET /CitationCore/core` with `appointmentTypeId`, `date`
    /// (always formatted `YYYY-MM-DD`), and `includeOccupied`.
    pub async fn fetch_blocks(
        &self,
        appointment_type_id: DbId,
        date: NaiveDate,
        include_occupied: bool,
    ) -> Result<Vec<SlotRecord>, RestApiError> {
        let response = self
            .client
            .get(format!("{}/CitationCore/core", self.base_url))
            .query(&[
                ("appointmentTypeId", appointment_type_id.to_string()),
                ("date", date.format("%Y-%m-%d").to_string()),
                ("includeOccupied", include_occupied.to_string()),
            ])
            .send()
            .await?;

        let blocks: Vec<SlotRecord> = parse_response(response).await?;

        tracing::debug!(
            appointment_type_id,
            %date,
            include_occupied,
            count = blocks.len(),
            "Fetched availability",
        );

        Ok(blocks)
    }
}

#[async_trait]
impl AvailabilityProvider for AvailabilityApi {
    async fn available_blocks(
        &self,
        appointment_type_id: DbId,
        date: NaiveDate,
        include_occupied: bool,
    ) -> Result<Vec<SlotRecord>, FetchError> {
        self.fetch_blocks(appointment_type_id, date, include_occupied)
            .await
            .map_err(Into::into)
    }
}
