pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use config::PayGuideConfig;
use services::document_cache::DocumentCache;
use services::github::{GitHubClient, GitHubError};
use services::pay_guide::PayGuideStore;
use services::prompt::PromptBuilder;
use services::providers::TextProvider;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PayGuideConfig>,
    pub provider: Arc<dyn TextProvider>,
    pub store: PayGuideStore,
    pub cache: DocumentCache,
    pub prompt: PromptBuilder,
    /// The publish client, or the reason publishing is unavailable.
    github: Result<GitHubClient, String>,
}

impl AppState {
    pub fn new(config: PayGuideConfig, provider: Arc<dyn TextProvider>) -> Self {
        let github = GitHubClient::from_settings(&config.github).map_err(|e| e.to_string());
        if let Err(reason) = &github {
            tracing::warn!(reason = %reason, "GitHub publishing disabled");
        }

        Self {
            store: PayGuideStore::new(&config.document.path),
            cache: DocumentCache::new(),
            prompt: PromptBuilder::new(&config.assistant),
            config: Arc::new(config),
            provider,
            github,
        }
    }

    pub fn github(&self) -> Result<&GitHubClient, GitHubError> {
        self.github
            .as_ref()
            .map_err(|reason| GitHubError::Disabled(reason.clone()))
    }
}
