#![allow(dead_code)]

use payguide_assistant::config::PayGuideConfig;
use payguide_assistant::startup::Application;
use payguide_assistant::AppState;
use secrecy::Secret;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ADMIN_PASSWORD: &str = "correct horse battery staple";
pub const API_KEY: &str = "test-api-key";
pub const MODEL: &str = "gemini-2.5-flash";
pub const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";
pub const UPLOAD_START_PATH: &str = "/upload/v1beta/files";
pub const UPLOAD_SESSION_PATH: &str = "/upload-session/pay-guide";
pub const GITHUB_CONTENTS_PATH: &str = "/repos/acme/pay-guides/contents/pay_guide.pdf";
pub const SAMPLE_PDF: &[u8] = b"%PDF-1.7\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    /// Keeps the session cookie and never follows redirects.
    pub client: reqwest::Client,
    pub gemini: MockServer,
    pub github: MockServer,
    pub storage_path: String,
    pub state: AppState,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(true, |_| {}).await
    }

    pub async fn spawn_without_pdf() -> Self {
        Self::spawn_with(false, |_| {}).await
    }

    pub async fn spawn_with(seed_pdf: bool, customize: impl FnOnce(&mut PayGuideConfig)) -> Self {
        let gemini = MockServer::start().await;
        let github = MockServer::start().await;
        let storage_path = format!("target/test-storage-{}", Uuid::new_v4());

        let mut config = PayGuideConfig::with_secrets(API_KEY, ADMIN_PASSWORD);
        config.server.listen.host = "127.0.0.1".to_string();
        config.server.listen.port = 0;
        config.gemini.api_base_url = gemini.uri();
        config.gemini.model = MODEL.to_string();
        config.gemini.file_poll_interval_ms = 10;
        config.document.path = format!("{}/pay_guide.pdf", storage_path);
        config.github.api_base_url = github.uri();
        config.github.owner = "acme".to_string();
        config.github.repo = "pay-guides".to_string();
        config.github.token = Some(Secret::new("ghp_test".to_string()));
        customize(&mut config);

        if seed_pdf {
            std::fs::create_dir_all(&storage_path).expect("Failed to create storage dir");
            std::fs::write(&config.document.path, SAMPLE_PDF).expect("Failed to seed PDF");
        }

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let state = app.state().clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build client");

        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
            gemini,
            github,
            storage_path,
            state,
        }
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.address, route)
    }

    /// Resumable upload that returns an ACTIVE file straight away.
    pub async fn mount_gemini_upload(&self) {
        Mock::given(method("POST"))
            .and(path(UPLOAD_START_PATH))
            .respond_with(ResponseTemplate::new(200).insert_header(
                "x-goog-upload-url",
                format!("{}{}", self.gemini.uri(), UPLOAD_SESSION_PATH).as_str(),
            ))
            .mount(&self.gemini)
            .await;

        Mock::given(method("POST"))
            .and(path(UPLOAD_SESSION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "file": {
                    "name": "files/pay-guide-1",
                    "displayName": "Pay Guide",
                    "mimeType": "application/pdf",
                    "sizeBytes": SAMPLE_PDF.len().to_string(),
                    "uri": format!("{}/v1beta/files/pay-guide-1", self.gemini.uri()),
                    "state": "ACTIVE"
                }
            })))
            .mount(&self.gemini)
            .await;
    }

    /// Answers `generateContent` only when the API key header is present.
    pub async fn mount_gemini_answer(&self, text: &str) {
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": text}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 24}
            })))
            .mount(&self.gemini)
            .await;
    }

    pub async fn ask(&self, question: &str) -> reqwest::Response {
        self.client
            .post(self.url("/chat"))
            .header("HX-Request", "true")
            .form(&[("question", question)])
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn transcript(&self) -> serde_json::Value {
        self.client
            .get(self.url("/chat/transcript"))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .expect("Transcript is not JSON")
    }

    pub async fn login(&self, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/admin/login"))
            .header("HX-Request", "true")
            .form(&[("password", password)])
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn upload_pdf(&self, bytes: &[u8], push: bool) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name("pay_guide.pdf")
            .mime_str("application/pdf")
            .expect("Invalid mime type");
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if push {
            form = form.text("push", "on");
        }

        self.client
            .post(self.url("/admin/upload"))
            .header("HX-Request", "true")
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_htmx(&self, route: &str) -> reqwest::Response {
        self.client
            .post(self.url(route))
            .header("HX-Request", "true")
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Requests the mock Gemini server received on `route`.
    pub async fn gemini_requests(&self, route: &str) -> Vec<wiremock::Request> {
        self.gemini
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == route)
            .collect()
    }

    pub fn pdf_on_disk(&self) -> Vec<u8> {
        std::fs::read(format!("{}/pay_guide.pdf", self.storage_path)).unwrap_or_default()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.storage_path);
    }
}
