use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ::common::storage::filesystem::FilesystemObjectStore;
use reqwest::Client;
use serde_json::{Value, json};
use tempfile::TempDir;

use server::config::AppConfig;
use server::notify::{EmailTemplate, MemoryNotifier};
use server::seed::seed_admin;
use server::services::MemoryJobQueue;
use server::state::AppState;
use server::store::MemoryStore;
use server::tasks::BackgroundTasks;

pub const PASSWORD: &str = "securepass";
pub const ADMIN: &str = "root";
pub const MAX_FILE_SIZE: u64 = 64 * 1024;
pub const MAX_AVATAR_SIZE: u64 = 1024;

/// Smallest valid PNG signature accepted as an avatar.
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

pub mod routes {
    pub const REGISTER: &str = "/api/v1/auth/register";
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const RESEND_CONFIRMATION: &str = "/api/v1/auth/resend-confirmation";
    pub const RESET_PASSWORD: &str = "/api/v1/auth/reset-password";
    pub const RESET_PASSWORD_CONFIRM: &str = "/api/v1/auth/reset-password/confirm";
    pub const FILES: &str = "/api/v1/files";

    pub fn confirm(token: &str) -> String {
        format!("/api/v1/auth/confirm?token={token}")
    }

    pub fn file(sha256: &str) -> String {
        format!("/api/v1/files/{sha256}")
    }

    pub fn file_actions(sha256: &str) -> String {
        format!("/api/v1/files/{sha256}/actions")
    }

    pub fn file_ingest(sha256: &str) -> String {
        format!("/api/v1/files/{sha256}/ingest")
    }

    pub fn file_download(sha256: &str) -> String {
        format!("/api/v1/files/{sha256}/download")
    }

    pub fn file_comments(sha256: &str) -> String {
        format!("/api/v1/files/{sha256}/comments")
    }

    pub fn file_comment(sha256: &str, id: &str) -> String {
        format!("/api/v1/files/{sha256}/comments/{id}")
    }

    pub fn user(username: &str) -> String {
        format!("/api/v1/users/{username}")
    }

    pub fn user_actions(username: &str) -> String {
        format!("/api/v1/users/{username}/actions")
    }

    /// `list` is one of `activities`, `likes`, `following`, `followers`,
    /// `comments`, `submissions`, `avatar`.
    pub fn user_list(username: &str, list: &str) -> String {
        format!("/api/v1/users/{username}/{list}")
    }
}

/// A running test server over in-memory documents, a temp-dir object
/// store, a recording job queue and a recording mailer.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub queue: Arc<MemoryJobQueue>,
    pub mail: Arc<MemoryNotifier>,
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// Raw response body.
    pub bytes: Vec<u8>,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config: AppConfig = serde_json::from_value(json!({
            "auth": {"jwt_secret": "test-secret-for-integration-tests"},
            "storage": {
                "path": dir.path().join("objects"),
                "max_file_size": MAX_FILE_SIZE,
                "max_avatar_size": MAX_AVATAR_SIZE,
                "timeout_secs": 5,
            },
            "mq": {"enabled": false, "publish_timeout_secs": 5},
            "admin": {
                "username": ADMIN,
                "password": PASSWORD,
                "email": "root@example.com",
            },
        }))
        .expect("Invalid test configuration");

        let blobs = FilesystemObjectStore::new(dir.path().join("objects"), u64::MAX)
            .await
            .expect("Failed to create object store");
        let queue = Arc::new(MemoryJobQueue::new());
        let mail = Arc::new(MemoryNotifier::new());
        let (tasks, _runner) = BackgroundTasks::start();

        let state = AppState::build(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(blobs),
            queue.clone(),
            mail.clone(),
            tasks,
        );
        seed_admin(&state.accounts, &state.config.admin)
            .await
            .expect("Failed to seed admin");

        let app = server::build_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            queue,
            mail,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let res = self
            .request(reqwest::Method::GET, path, token)
            .send()
            .await
            .expect("Failed to send GET request");
        TestResponse::from_response(res).await
    }

    pub async fn post(&self, path: &str, body: &Value, token: Option<&str>) -> TestResponse {
        let res = self
            .request(reqwest::Method::POST, path, token)
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");
        TestResponse::from_response(res).await
    }

    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> TestResponse {
        let res = self
            .request(reqwest::Method::POST, path, token)
            .send()
            .await
            .expect("Failed to send POST request");
        TestResponse::from_response(res).await
    }

    pub async fn put_bytes(&self, path: &str, data: Vec<u8>, token: &str) -> TestResponse {
        let res = self
            .request(reqwest::Method::PUT, path, Some(token))
            .header("Content-Type", "application/octet-stream")
            .body(data)
            .send()
            .await
            .expect("Failed to send PUT request");
        TestResponse::from_response(res).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        let res = self
            .request(reqwest::Method::DELETE, path, token)
            .send()
            .await
            .expect("Failed to send DELETE request");
        TestResponse::from_response(res).await
    }

    /// Submit `data` as the `file` multipart field.
    pub async fn upload(
        &self,
        file_name: &str,
        data: Vec<u8>,
        token: &str,
        country: Option<&str>,
    ) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(data).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut builder = self
            .request(reqwest::Method::POST, routes::FILES, Some(token))
            .multipart(form);
        if let Some(country) = country {
            builder = builder.header("X-Geoip-Country", country);
        }
        let res = builder
            .send()
            .await
            .expect("Failed to send multipart upload request");
        TestResponse::from_response(res).await
    }

    /// Wait for the background runner to send an email and return its token.
    pub async fn email_token(&self, recipient: &str, template: EmailTemplate) -> String {
        for _ in 0..200 {
            if let Some(link) = self.mail.last_link(recipient, template) {
                return link
                    .split_once("token=")
                    .map(|(_, token)| token.to_string())
                    .expect("Email link should carry a token");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("No {template:?} email sent to {recipient}");
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.post(
            routes::LOGIN,
            &json!({"username": username, "password": password}),
            None,
        )
        .await
    }

    /// Register, confirm and log in, returning the session token.
    pub async fn create_user(&self, username: &str) -> String {
        let email = format!("{username}@example.com");
        let reg = self
            .post(
                routes::REGISTER,
                &json!({"username": username, "password": PASSWORD, "email": email}),
                None,
            )
            .await;
        assert_eq!(reg.status, 201, "Registration failed: {}", reg.text());

        let token = self.email_token(&email, EmailTemplate::Confirm).await;
        let confirm = self.get(&routes::confirm(&token), None).await;
        assert_eq!(confirm.status, 200, "Confirmation failed: {}", confirm.text());

        self.token_for(username).await
    }

    pub async fn token_for(&self, username: &str) -> String {
        let res = self.login(username, PASSWORD).await;
        assert_eq!(res.status, 200, "Login failed: {}", res.text());
        res.body["token"]
            .as_str()
            .expect("Login response should contain a token")
            .to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.token_for(ADMIN).await
    }

    /// Upload `data` and return its hash.
    pub async fn submit(&self, data: &[u8], token: &str) -> String {
        let res = self.upload("sample.exe", data.to_vec(), token, None).await;
        assert!(
            res.status == 200 || res.status == 201,
            "Upload failed: {}",
            res.text()
        );
        res.body["sha256"]
            .as_str()
            .expect("File record should carry its hash")
            .to_string()
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = res.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Self {
            status,
            content_type,
            bytes,
            body,
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}
