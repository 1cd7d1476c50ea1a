//! Studio facade
//!
//! Entry point for an embedding application. `Studio::login` authenticates
//! against the persistence gateway and builds the generation capability from
//! the key it issues; the resulting `StudioSession` runs the pipeline, refines
//! artifacts, corrects SKUs and browses history for that user.

use crate::config::StudioConfig;
use crate::error::{ApiError, GenerationError};
use crate::gateway::{AppsScriptGateway, HistoryItem, LoginStatus, PersistenceGateway};
use crate::generation::GenerationClient;
use crate::pipeline::{PipelineOrchestrator, Run, RunRequest, RunView};
use crate::progress::ProgressRuntime;
use crate::provider::{GenerationCapability, ProviderFactory};
use crate::refinement::Refiner;
use crate::types::{
    ArtifactId, Environment, GeneratedArtifact, ImagePayload, RecordHandle, User, UserRole,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub struct Studio {
    config: StudioConfig,
    gateway: Arc<dyn PersistenceGateway>,
    progress: ProgressRuntime,
    capability: Option<Arc<dyn GenerationCapability>>,
}

impl Studio {
    pub fn new(config: StudioConfig, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            config,
            gateway,
            progress: ProgressRuntime::new(),
            capability: None,
        }
    }

    /// Validate the configuration and connect to the configured web app.
    pub fn from_config(config: StudioConfig) -> Result<Self, ApiError> {
        config.ensure_valid()?;
        let gateway = AppsScriptGateway::new(&config.gateway)?;
        Ok(Self::new(config, Arc::new(gateway)))
    }

    /// Use this capability for every session instead of building one from
    /// the issued key.
    pub fn with_capability(mut self, capability: Arc<dyn GenerationCapability>) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn with_progress(mut self, progress: ProgressRuntime) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> &ProgressRuntime {
        &self.progress
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Username and password are required".to_string(),
            ));
        }
        Ok(self.gateway.register(username, password).await?)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<StudioSession, ApiError> {
        let username = username.trim();
        let outcome = self.gateway.login(username, password).await?;
        match outcome.status {
            LoginStatus::Success => {}
            LoginStatus::Pending => {
                return Err(ApiError::PendingApproval(
                    outcome
                        .message
                        .unwrap_or_else(|| "Pending approval.".to_string()),
                ))
            }
            LoginStatus::Rejected => {
                return Err(ApiError::Unauthorized(
                    outcome
                        .message
                        .unwrap_or_else(|| "Wrong credentials".to_string()),
                ))
            }
        }

        let capability = match &self.capability {
            Some(capability) => capability.clone(),
            None => {
                let key = outcome
                    .capability_key
                    .or_else(|| self.config.generation.api_key.clone())
                    .ok_or_else(|| {
                        GenerationError::NotConfigured(
                            "No capability key issued at login or configured".to_string(),
                        )
                    })?;
                ProviderFactory::create_capability(&self.config.generation, &key)?
            }
        };

        let user = User {
            username: username.to_string(),
            role: outcome.role.unwrap_or(UserRole::User),
        };
        info!(username = %user.username, role = ?user.role, "User logged in");

        let client = GenerationClient::new(capability);
        let orchestrator = PipelineOrchestrator::new(client, self.gateway.clone())
            .with_settings(&self.config.pipeline)
            .with_progress(self.progress.clone());
        let refiner = Refiner::new(orchestrator.client().clone(), self.progress.clone());

        Ok(StudioSession {
            user,
            orchestrator,
            refiner,
            gateway: self.gateway.clone(),
            current: None,
            history: Vec::new(),
        })
    }
}

/// A logged-in user's workspace. Holds at most one current run.
pub struct StudioSession {
    user: User,
    orchestrator: PipelineOrchestrator,
    refiner: Refiner,
    gateway: Arc<dyn PersistenceGateway>,
    current: Option<Run>,
    history: Vec<HistoryItem>,
}

impl StudioSession {
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn current_run(&self) -> Option<&Run> {
        self.current.as_ref()
    }

    pub fn progress(&self) -> &ProgressRuntime {
        self.orchestrator.progress()
    }

    /// Run the pipeline on `image`. The previous current run is replaced.
    pub async fn start_run(
        &mut self,
        image: ImagePayload,
        environment: Environment,
        sku: Option<String>,
        updates: Option<&watch::Sender<RunView>>,
    ) -> Result<&Run, ApiError> {
        let request = RunRequest {
            username: self.user.username.clone(),
            source_image: image,
            environment,
            sku,
        };
        let run = self.orchestrator.execute(request, updates).await?;
        if run.record_handle().is_some() {
            self.refresh_history_best_effort().await;
        }
        Ok(&*self.current.insert(run))
    }

    pub async fn refine(&mut self, id: ArtifactId, note: &str) -> Result<GeneratedArtifact, ApiError> {
        let run = self
            .current
            .as_mut()
            .ok_or_else(|| ApiError::InvalidRequest("No active run".to_string()))?;
        self.refiner.refine(run, id, note).await
    }

    /// Correct the SKU of the current run's stored record.
    pub async fn update_sku(&mut self, sku: &str) -> Result<(), ApiError> {
        let run = self.current.as_mut().ok_or(ApiError::NotPersisted)?;
        let handle = run.record_handle().ok_or(ApiError::NotPersisted)?;
        let sku = sku.trim();
        self.gateway.update_sku(handle, sku).await?;
        run.set_sku(sku);
        info!(record = %handle, sku, "SKU updated");
        self.refresh_history_best_effort().await;
        Ok(())
    }

    /// Correct the SKU of any stored record visible to this user.
    pub async fn update_history_sku(&mut self, handle: RecordHandle, sku: &str) -> Result<(), ApiError> {
        if !self.history.iter().any(|item| item.handle == handle) {
            self.load_history().await?;
        }
        if !self.history.iter().any(|item| item.handle == handle) {
            return Err(ApiError::RecordNotFound(handle));
        }

        let sku = sku.trim();
        self.gateway.update_sku(handle, sku).await?;
        if let Some(item) = self.history.iter_mut().find(|item| item.handle == handle) {
            item.sku = sku.to_string();
        }
        if let Some(run) = self.current.as_mut() {
            if run.record_handle() == Some(handle) {
                run.set_sku(sku);
            }
        }
        Ok(())
    }

    pub async fn load_history(&mut self) -> Result<&[HistoryItem], ApiError> {
        self.history = self.gateway.fetch_history(&self.user.username).await?;
        Ok(&self.history)
    }

    pub fn history(&self) -> &[HistoryItem] {
        &self.history
    }

    /// Loaded history filtered by case-insensitive SKU substring.
    pub fn search_history(&self, query: &str) -> Vec<&HistoryItem> {
        self.history
            .iter()
            .filter(|item| item.sku_matches(query))
            .collect()
    }

    async fn refresh_history_best_effort(&mut self) {
        if let Err(err) = self.load_history().await {
            warn!(username = %self.user.username, error = %err, "History refresh failed");
        }
    }
}
