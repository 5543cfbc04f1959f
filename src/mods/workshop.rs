// Workshop API client - published item and collection lookups

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.steampowered.com";
const ITEM_TIMEOUT: Duration = Duration::from_secs(10);
const COLLECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Description text is capped at this many characters in lookups.
const DESCRIPTION_LIMIT: usize = 200;

#[derive(Error, Debug)]
pub enum WorkshopError {
    #[error("workshop API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("workshop API returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("mod {0} not found")]
    ItemNotFound(String),

    #[error("collection {0} not found or empty")]
    CollectionNotFound(String),
}

/// Metadata for a single published workshop item.
#[derive(Debug, Clone)]
pub struct ItemDetails {
    pub title: String,
    pub description: String,
    pub preview_url: String,
    pub is_collection: bool,
}

/// Seam over the workshop content API so registry logic can be exercised
/// without the network.
#[async_trait]
pub trait WorkshopProvider: Send + Sync {
    async fn fetch_item(&self, id: &str) -> Result<ItemDetails, WorkshopError>;

    /// Member IDs of a collection, in the provider's order.
    async fn fetch_collection(&self, id: &str) -> Result<Vec<String>, WorkshopError>;
}

/// Client for the Steam remote-storage endpoints.
pub struct SteamWorkshopClient {
    client: reqwest::Client,
    api_base: String,
}

impl SteamWorkshopClient {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for SteamWorkshopClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkshopProvider for SteamWorkshopClient {
    async fn fetch_item(&self, id: &str) -> Result<ItemDetails, WorkshopError> {
        let url = format!(
            "{}/ISteamRemoteStorage/GetPublishedFileDetails/v1/",
            self.api_base
        );
        let response = self
            .client
            .post(&url)
            .timeout(ITEM_TIMEOUT)
            .form(&[("itemcount", "1"), ("publishedfileids[0]", id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WorkshopError::Status(response.status()));
        }

        let envelope: FileDetailsEnvelope = response.json().await?;
        let details = envelope
            .response
            .publishedfiledetails
            .into_iter()
            .next()
            .filter(|d| d.result == Some(1))
            .ok_or_else(|| WorkshopError::ItemNotFound(id.to_string()))?;

        Ok(ItemDetails {
            title: details.title.unwrap_or_else(|| "Unknown".to_string()),
            description: truncate_chars(
                &details.description.unwrap_or_default(),
                DESCRIPTION_LIMIT,
            ),
            preview_url: details.preview_url.unwrap_or_default(),
            // Collections are published with a zero creator app id.
            is_collection: details.creator_appid == Some(0),
        })
    }

    async fn fetch_collection(&self, id: &str) -> Result<Vec<String>, WorkshopError> {
        let url = format!(
            "{}/ISteamRemoteStorage/GetCollectionDetails/v1/",
            self.api_base
        );
        let response = self
            .client
            .post(&url)
            .timeout(COLLECTION_TIMEOUT)
            .form(&[("collectioncount", "1"), ("publishedfileids[0]", id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WorkshopError::Status(response.status()));
        }

        let envelope: CollectionEnvelope = response.json().await?;
        let members: Vec<String> = envelope
            .response
            .collectiondetails
            .into_iter()
            .next()
            .filter(|c| c.result == Some(1))
            .map(|c| c.children.into_iter().map(|child| child.publishedfileid).collect())
            .unwrap_or_default();

        if members.is_empty() {
            return Err(WorkshopError::CollectionNotFound(id.to_string()));
        }

        Ok(members)
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

// Provider envelopes. Field names follow the wire format.

#[derive(Debug, Deserialize)]
struct FileDetailsEnvelope {
    response: FileDetailsResponse,
}

#[derive(Debug, Default, Deserialize)]
struct FileDetailsResponse {
    #[serde(default)]
    publishedfiledetails: Vec<PublishedFileDetails>,
}

#[derive(Debug, Deserialize)]
struct PublishedFileDetails {
    result: Option<i64>,
    title: Option<String>,
    description: Option<String>,
    preview_url: Option<String>,
    creator_appid: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CollectionEnvelope {
    response: CollectionResponse,
}

#[derive(Debug, Default, Deserialize)]
struct CollectionResponse {
    #[serde(default)]
    collectiondetails: Vec<CollectionDetails>,
}

#[derive(Debug, Deserialize)]
struct CollectionDetails {
    result: Option<i64>,
    #[serde(default)]
    children: Vec<CollectionChild>,
}

#[derive(Debug, Deserialize)]
struct CollectionChild {
    publishedfileid: String,
}
