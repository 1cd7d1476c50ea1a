//! HTTP client for the spreadsheet web app.

use super::wire::{GatewayRequest, GatewayResponse};
use super::{HistoryItem, LoginOutcome, PersistenceGateway, RunRecord};
use crate::config::GatewaySettings;
use crate::error::{ApiError, GatewayError};
use crate::types::RecordHandle;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub struct AppsScriptGateway {
    client: Client,
    endpoint: String,
}

impl AppsScriptGateway {
    pub fn new(settings: &GatewaySettings) -> Result<Self, ApiError> {
        let endpoint = settings
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ApiError::ConfigError("gateway.endpoint is not set".to_string()))?
            .to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, endpoint })
    }

    async fn call(&self, request: &GatewayRequest<'_>) -> Result<GatewayResponse, GatewayError> {
        debug!(endpoint = %self.endpoint, "Calling persistence gateway");
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::RequestFailed(format!(
                "Gateway answered with status {}",
                status
            )));
        }

        response
            .json::<GatewayResponse>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PersistenceGateway for AppsScriptGateway {
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, GatewayError> {
        let response = self
            .call(&GatewayRequest::Login { username, password })
            .await?;
        Ok(response.into_login_outcome())
    }

    async fn register(&self, username: &str, password: &str) -> Result<String, GatewayError> {
        let response = self
            .call(&GatewayRequest::Register { username, password })
            .await?
            .require_success()?;
        Ok(response.message.unwrap_or_default())
    }

    async fn save_run(&self, record: &RunRecord) -> Result<Option<RecordHandle>, GatewayError> {
        let response = self
            .call(&GatewayRequest::save_result(record))
            .await?
            .require_success()?;
        Ok(response.record_handle())
    }

    async fn update_sku(&self, handle: RecordHandle, sku: &str) -> Result<(), GatewayError> {
        self.call(&GatewayRequest::UpdateSku {
            row_index: handle.0,
            sku,
        })
        .await?
        .require_success()?;
        Ok(())
    }

    async fn fetch_history(&self, username: &str) -> Result<Vec<HistoryItem>, GatewayError> {
        let response = self
            .call(&GatewayRequest::GetHistory { username })
            .await?
            .require_success()?;
        Ok(response.into_history())
    }

    fn gateway_name(&self) -> &str {
        "apps-script"
    }
}
