//! Lists the models the configured API key can use for generation.

use crate::services::providers::ModelInfo;
use crate::AppState;
use askama::Template;
use axum::extract::State;

pub const GENERATE_CONTENT: &str = "generateContent";
pub const NO_MODELS_MESSAGE: &str = "No compatible models found. Your API key might be restricted.";

#[derive(Template)]
#[template(path = "diagnostics.html")]
pub struct DiagnosticsTemplate {
    pub title: String,
    pub configured_model: String,
    pub models: Vec<ModelInfo>,
    pub error: Option<String>,
}

impl DiagnosticsTemplate {
    /// Whether the configured model shows up in the listing.
    pub fn configured_model_available(&self) -> bool {
        self.models
            .iter()
            .any(|m| m.name.trim_start_matches("models/") == self.configured_model)
    }
}

pub async fn diagnostics(State(state): State<AppState>) -> DiagnosticsTemplate {
    let (models, error) = match state.provider.list_models().await {
        Ok(models) => {
            let compatible: Vec<ModelInfo> = models
                .into_iter()
                .filter(|m| m.supports(GENERATE_CONTENT))
                .collect();
            tracing::info!(count = compatible.len(), "Listed generateContent models");
            (compatible, None)
        }
        Err(e) => {
            tracing::error!(error = %e, "Model listing failed");
            (Vec::new(), Some(e.to_string()))
        }
    };

    DiagnosticsTemplate {
        title: state.config.assistant.title.clone(),
        configured_model: state.config.gemini.model.clone(),
        models,
        error,
    }
}
