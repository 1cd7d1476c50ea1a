//! Core domain types shared by the generation client, pipeline and gateway.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::ApiError;

/// Binary image with its declared MIME type.
///
/// The bytes are shared, so cloning a payload (for run views or history
/// snapshots) never copies the image.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    mime_type: String,
    data: Arc<[u8]>,
}

impl ImagePayload {
    /// Build a payload, rejecting empty data and non-image MIME types.
    pub fn new(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Result<Self, ApiError> {
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        let data: Vec<u8> = data.into();
        if !mime_type.starts_with("image/") {
            return Err(ApiError::InvalidRequest(format!(
                "Unsupported MIME type for image payload: {}",
                mime_type
            )));
        }
        if data.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Image payload cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            mime_type,
            data: data.into(),
        })
    }

    /// Decode base64 data as delivered inline by a capability response.
    pub fn from_base64(mime_type: impl Into<String>, encoded: &str) -> Result<Self, ApiError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid base64 image data: {}", e)))?;
        Self::new(mime_type, bytes)
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, ApiError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ApiError::InvalidRequest("Image URL is not a data URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ApiError::InvalidRequest("Data URL has no payload".to_string()))?;
        let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
            ApiError::InvalidRequest("Only base64 data URLs are supported".to_string())
        })?;
        Self::from_base64(mime_type, payload)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Content fingerprint (blake3, hex encoded).
    pub fn digest(&self) -> String {
        hex::encode(blake3::hash(&self.data).as_bytes())
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Lighting environment the scenes are staged in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Indoor,
    #[default]
    Outdoor,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Indoor => "indoor",
            Environment::Outdoor => "outdoor",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indoor" => Ok(Environment::Indoor),
            "outdoor" => Ok(Environment::Outdoor),
            other => Err(ApiError::InvalidRequest(format!(
                "Unknown environment: {} (expected 'indoor' or 'outdoor')",
                other
            ))),
        }
    }
}

/// Staging role of a generated scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneKind {
    /// Overall view of the whole piece
    Wide,
    /// People using or interacting with the piece
    Lifestyle,
    /// Joinery, framing and on-site assembly
    Construction,
}

impl SceneKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SceneKind::Wide => "wide",
            SceneKind::Lifestyle => "lifestyle",
            SceneKind::Construction => "construction",
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an artifact within a run.
///
/// `Scene(n)` uses the 1-based catalog position, so identities stay aligned
/// with the catalog even when earlier scenes were skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactId {
    Master,
    Scene(usize),
}

impl ArtifactId {
    pub fn is_master(self) -> bool {
        matches!(self, ArtifactId::Master)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactId::Master => f.write_str("master"),
            ArtifactId::Scene(position) => write!(f, "scene-{}", position),
        }
    }
}

impl std::str::FromStr for ArtifactId {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "master" {
            return Ok(ArtifactId::Master);
        }
        s.strip_prefix("scene-")
            .and_then(|n| n.parse::<usize>().ok())
            .map(ArtifactId::Scene)
            .ok_or_else(|| ApiError::InvalidRequest(format!("Unknown artifact id: {}", s)))
    }
}

/// One generated image together with the context it was generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub id: ArtifactId,
    pub image: ImagePayload,
    pub kind: SceneKind,
    /// Human-facing label
    pub label: String,
    /// Context instruction used for generation; reused by refinement
    pub context: String,
    pub refinement_note: Option<String>,
}

/// E-commerce listing text generated from the product description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingMetadata {
    pub title: String,
    pub description: String,
    pub tags: String,
    pub materials: String,
}

/// Opaque identity of a persisted run (the gateway's row index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordHandle(pub u64);

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    User,
}

/// Authenticated studio user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub role: UserRole,
}
