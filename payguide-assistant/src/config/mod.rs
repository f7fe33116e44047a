use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{self as core_config, get_env, optional_env};
use service_core::error::AppError;
use std::path::{Path, PathBuf};

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that answers questions \
about the attached Australian Pay Guide. Answer only from the Pay Guide. Quote the relevant \
award classification, rate and effective date when they apply. If the Pay Guide does not \
contain the answer, say so plainly instead of guessing.";

pub const DEFAULT_DISCLAIMER: &str = "This is general information only, based on the Pay Guide. \
Check the official Pay Guide or contact the Fair Work Ombudsman before relying on it.";

#[derive(Debug, Clone, Deserialize)]
pub struct PayGuideConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub gemini: GeminiSettings,
    #[serde(default)]
    pub assistant: AssistantSettings,
    #[serde(default)]
    pub document: DocumentSettings,
    #[serde(default)]
    pub admin: AdminSettings,
    #[serde(default)]
    pub github: GitHubSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(flatten)]
    pub listen: core_config::Config,
    /// Mark the session cookie `Secure` (requires HTTPS).
    #[serde(default)]
    pub session_secure: bool,
    #[serde(default = "default_session_inactivity_hours")]
    pub session_inactivity_hours: i64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    #[serde(skip, default = "empty_secret")]
    pub api_key: Secret<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How many times to poll a freshly uploaded file until it is ACTIVE.
    #[serde(default = "default_file_poll_attempts")]
    pub file_poll_attempts: u32,
    #[serde(default = "default_file_poll_interval_ms")]
    pub file_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantSettings {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
    #[serde(default = "default_disclaimer")]
    pub disclaimer: String,
    /// Number of prior question/answer exchanges sent along with each question.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    /// Append the disclaimer to answers that do not already end with it.
    #[serde(default = "default_true")]
    pub enforce_disclaimer: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSettings {
    #[serde(default = "default_document_path")]
    pub path: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminSettings {
    #[serde(skip, default = "empty_secret")]
    pub password: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSettings {
    #[serde(skip)]
    pub token: Option<Secret<String>>,
    #[serde(default = "default_github_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Path of the Pay Guide inside the repository.
    #[serde(default = "default_repo_path")]
    pub path: String,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn empty_secret() -> Secret<String> {
    Secret::new(String::new())
}

fn default_true() -> bool {
    true
}

fn default_session_inactivity_hours() -> i64 {
    24
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_file_poll_attempts() -> u32 {
    10
}

fn default_file_poll_interval_ms() -> u64 {
    1000
}

fn default_title() -> String {
    "Pay Guide Assistant".to_string()
}

fn default_system_instruction() -> String {
    DEFAULT_SYSTEM_INSTRUCTION.to_string()
}

fn default_disclaimer() -> String {
    DEFAULT_DISCLAIMER.to_string()
}

fn default_history_turns() -> usize {
    5
}

fn default_document_path() -> String {
    "data/pay_guide.pdf".to_string()
}

fn default_display_name() -> String {
    "Pay Guide".to_string()
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_repo_path() -> String {
    "pay_guide.pdf".to_string()
}

fn default_commit_message() -> String {
    "Update Pay Guide PDF".to_string()
}

fn default_user_agent() -> String {
    concat!("payguide-assistant/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: core_config::Config::default(),
            session_secure: false,
            session_inactivity_hours: default_session_inactivity_hours(),
            max_upload_bytes: default_max_upload_bytes(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: empty_secret(),
            model: default_model(),
            api_base_url: default_gemini_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            file_poll_attempts: default_file_poll_attempts(),
            file_poll_interval_ms: default_file_poll_interval_ms(),
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            title: default_title(),
            system_instruction: default_system_instruction(),
            disclaimer: default_disclaimer(),
            history_turns: default_history_turns(),
            enforce_disclaimer: true,
        }
    }
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            path: default_document_path(),
            display_name: default_display_name(),
        }
    }
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            password: empty_secret(),
        }
    }
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: default_github_base_url(),
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
            path: default_repo_path(),
            commit_message: default_commit_message(),
            user_agent: default_user_agent(),
        }
    }
}

impl GitHubSettings {
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl PayGuideConfig {
    /// Defaults plus the two mandatory secrets, without touching the environment.
    pub fn with_secrets(api_key: &str, admin_password: &str) -> Self {
        let mut config = Self {
            server: ServerSettings::default(),
            gemini: GeminiSettings::default(),
            assistant: AssistantSettings::default(),
            document: DocumentSettings::default(),
            admin: AdminSettings::default(),
            github: GitHubSettings::default(),
        };
        config.gemini.api_key = Secret::new(api_key.to_string());
        config.admin.password = Secret::new(admin_password.to_string());
        config
    }

    /// Load `config/base.yaml`, apply `APP__` overrides, then read the secrets.
    ///
    /// `GOOGLE_API_KEY` and `ADMIN_PASSWORD` are required; `GITHUB_TOKEN` only
    /// enables publishing.
    pub fn load() -> Result<Self, AppError> {
        let configuration_directory = configuration_directory()?;
        let layered = core_config::layered(&configuration_directory)?;
        let mut config: PayGuideConfig = layered.try_deserialize()?;

        if let Some(crate_dir) = configuration_directory.parent() {
            config.resolve_paths(crate_dir);
        }

        let is_prod = core_config::is_prod();
        config.gemini.api_key = Secret::new(get_env("GOOGLE_API_KEY", None, is_prod)?);
        config.admin.password = Secret::new(get_env("ADMIN_PASSWORD", None, is_prod)?);
        config.github.token = optional_env("GITHUB_TOKEN").map(Secret::new);

        if let Some(port) = optional_env("PORT") {
            config.server.listen.port = port.parse().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("PORT is not a valid port: {}", e))
            })?;
        }

        Ok(config)
    }

    /// Anchor relative file locations at the crate directory.
    pub fn resolve_paths(&mut self, crate_dir: &Path) {
        self.document.path = anchor(crate_dir, &self.document.path);
        self.server.static_dir = anchor(crate_dir, &self.server.static_dir);
    }
}

fn anchor(base: &Path, path: &str) -> String {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        path.to_string()
    } else {
        base.join(candidate).to_string_lossy().into_owned()
    }
}

fn configuration_directory() -> Result<PathBuf, AppError> {
    let base_path = std::env::current_dir()?;

    // Running from the crate directory or from the workspace root
    if base_path.ends_with("payguide-assistant") {
        Ok(base_path.join("config"))
    } else {
        Ok(base_path.join("payguide-assistant").join("config"))
    }
}
