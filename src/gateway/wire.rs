//! JSON wire format of the spreadsheet web app.
//!
//! Requests are a single object with an `action` discriminator. Responses are
//! loosely typed: any field may be missing or carry a number where a string is
//! expected, so decoding degrades to placeholders instead of failing.

use super::{HistoryItem, LoginOutcome, LoginStatus, RunRecord, PLACEHOLDER};
use crate::error::GatewayError;
use crate::types::{RecordHandle, UserRole};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum GatewayRequest<'a> {
    Login {
        username: &'a str,
        password: &'a str,
    },
    Register {
        username: &'a str,
        password: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    SaveResult {
        username: &'a str,
        original_image: &'a str,
        description: &'a str,
        results: Vec<ResultLink<'a>>,
        sku: &'a str,
        title: &'a str,
        etsy_description: &'a str,
        tags: &'a str,
        materials: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    UpdateSku { row_index: u64, sku: &'a str },
    GetHistory { username: &'a str },
}

#[derive(Debug, Serialize)]
pub struct ResultLink<'a> {
    pub url: &'a str,
}

impl<'a> GatewayRequest<'a> {
    pub fn save_result(record: &'a RunRecord) -> Self {
        GatewayRequest::SaveResult {
            username: &record.username,
            original_image: &record.original_image,
            description: &record.description,
            results: record
                .results
                .iter()
                .map(|url| ResultLink { url })
                .collect(),
            sku: &record.sku,
            title: &record.title,
            etsy_description: &record.listing_description,
            tags: &record.tags,
            materials: &record.materials,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub row_index: Option<Value>,
    #[serde(default, alias = "items")]
    pub history: Option<Vec<Value>>,
}

impl GatewayResponse {
    fn status(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }

    pub fn is_success(&self) -> bool {
        self.status().eq_ignore_ascii_case("success")
    }

    /// Fail with the service's message unless the status is success.
    pub fn require_success(self) -> Result<Self, GatewayError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.rejection())
        }
    }

    pub fn rejection(&self) -> GatewayError {
        GatewayError::Rejected {
            message: self
                .message
                .clone()
                .unwrap_or_else(|| format!("status '{}'", self.status())),
        }
    }

    pub fn into_login_outcome(self) -> LoginOutcome {
        let status = if self.is_success() {
            LoginStatus::Success
        } else if self.status().eq_ignore_ascii_case("pending") {
            LoginStatus::Pending
        } else {
            LoginStatus::Rejected
        };
        let role = self.role.as_deref().map(parse_role);
        LoginOutcome {
            status,
            role,
            capability_key: self
                .api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            message: self.message,
        }
    }

    pub fn record_handle(&self) -> Option<RecordHandle> {
        self.row_index.as_ref().and_then(as_row_index).map(RecordHandle)
    }

    pub fn into_history(self) -> Vec<HistoryItem> {
        self.history
            .unwrap_or_default()
            .iter()
            .filter_map(history_item)
            .collect()
    }
}

pub fn parse_role(role: &str) -> UserRole {
    if role.trim().eq_ignore_ascii_case("admin") {
        UserRole::Admin
    } else {
        UserRole::User
    }
}

fn as_row_index(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_or(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

/// Decode one history entry; entries without a usable row index are dropped.
pub fn history_item(value: &Value) -> Option<HistoryItem> {
    let handle = value.get("rowIndex").and_then(as_row_index)?;
    let results = value
        .get("results")
        .and_then(Value::as_array)
        .map(|links| {
            links
                .iter()
                .filter_map(Value::as_str)
                .filter(|link| !link.is_empty() && *link != PLACEHOLDER)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let original_image = text_or(value.get("originalImage"), "");
    Some(HistoryItem {
        handle: RecordHandle(handle),
        time: text_or(value.get("time"), PLACEHOLDER),
        username: text_or(value.get("username"), PLACEHOLDER),
        sku: text_or(value.get("sku"), PLACEHOLDER),
        title: text_or(value.get("etsyTitle"), PLACEHOLDER),
        listing_description: text_or(value.get("etsyDescription"), PLACEHOLDER),
        tags: text_or(value.get("tags"), PLACEHOLDER),
        materials: text_or(value.get("materials"), PLACEHOLDER),
        original_image: if original_image == PLACEHOLDER {
            String::new()
        } else {
            original_image
        },
        results,
    })
}
