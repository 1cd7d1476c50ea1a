//! Persistence Gateway
//!
//! The remote store for users, completed runs and history. The core only sees
//! this trait; `AppsScriptGateway` talks to the spreadsheet web app over HTTP
//! and `InMemoryGateway` reproduces its semantics locally.

use crate::error::GatewayError;
use crate::types::{GeneratedArtifact, ImagePayload, ListingMetadata, RecordHandle, UserRole};
use async_trait::async_trait;

pub mod http;
pub mod memory;
pub mod wire;

pub use http::AppsScriptGateway;
pub use memory::InMemoryGateway;

/// Placeholder stored for any absent field.
pub const PLACEHOLDER: &str = "N/A";

/// Number of result slots kept per stored run.
pub const RESULT_SLOTS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Success,
    Pending,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub status: LoginStatus,
    pub role: Option<UserRole>,
    /// Key for the generation capability, issued on success
    pub capability_key: Option<String>,
    pub message: Option<String>,
}

/// A run flattened for storage. Absent values already carry placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub username: String,
    /// Source image as a data URL
    pub original_image: String,
    pub description: String,
    /// Artifact images as data URLs, in result order
    pub results: Vec<String>,
    pub sku: String,
    pub title: String,
    pub listing_description: String,
    pub tags: String,
    pub materials: String,
}

impl RunRecord {
    pub fn new(
        username: &str,
        source: &ImagePayload,
        description: &str,
        artifacts: &[GeneratedArtifact],
        sku: Option<&str>,
        metadata: Option<&ListingMetadata>,
        fallback_title: &str,
    ) -> Self {
        let field = |value: Option<&str>| -> String {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(PLACEHOLDER)
                .to_string()
        };
        let title = metadata
            .map(|m| m.title.trim())
            .filter(|t| !t.is_empty())
            .unwrap_or(fallback_title)
            .to_string();

        Self {
            username: username.to_string(),
            original_image: source.to_data_url(),
            description: description.to_string(),
            results: artifacts.iter().map(|a| a.image.to_data_url()).collect(),
            sku: field(sku),
            title,
            listing_description: field(metadata.map(|m| m.description.as_str())),
            tags: field(metadata.map(|m| m.tags.as_str())),
            materials: field(metadata.map(|m| m.materials.as_str())),
        }
    }
}

/// Read-only projection of a stored run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub handle: RecordHandle,
    pub time: String,
    pub username: String,
    pub sku: String,
    pub title: String,
    pub listing_description: String,
    pub tags: String,
    pub materials: String,
    /// Link to the stored source image, empty when absent
    pub original_image: String,
    /// Links to stored results; placeholder slots are omitted
    pub results: Vec<String>,
}

impl HistoryItem {
    pub fn sku_matches(&self, query: &str) -> bool {
        self.sku
            .to_lowercase()
            .contains(&query.trim().to_lowercase())
    }
}

/// Remote persistence boundary. Every call may fail with a service error.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, GatewayError>;

    /// Create a pending account; returns the service's message.
    async fn register(&self, username: &str, password: &str) -> Result<String, GatewayError>;

    /// Store a completed run. `None` means the service accepted it without
    /// returning a handle.
    async fn save_run(&self, record: &RunRecord) -> Result<Option<RecordHandle>, GatewayError>;

    async fn update_sku(&self, handle: RecordHandle, sku: &str) -> Result<(), GatewayError>;

    /// History visible to `username`, newest first.
    async fn fetch_history(&self, username: &str) -> Result<Vec<HistoryItem>, GatewayError>;

    fn gateway_name(&self) -> &str;
}
