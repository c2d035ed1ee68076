#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use secrecy::Secret;
use serde_json::{json, Value};
use std::{path::PathBuf, sync::Arc};
use storefront_accounts::{
    app::{router, AppState},
    config::{ApplicationConfig, Config, CookieConfig, DatabaseConfig, JwtConfig, StorageConfig},
    domain::fields::Role,
    repository::{MemoryUserStore, UserStore},
};
use tower::ServiceExt;
use uuid::Uuid;

pub const BOUNDARY: &str = "storefront-test-boundary";
pub const DEFAULT_AVATAR: &str = "default-avatar.png";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryUserStore>,
    pub upload_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookies: Vec<String>,
}

impl TestResponse {
    /// Value of the session cookie set by this response, if any.
    pub fn token_cookie(&self) -> Option<String> {
        self.set_cookies.iter().find_map(|c| {
            let pair = c.split(';').next()?;
            let value = pair.strip_prefix("token=")?;
            Some(value.to_string())
        })
    }
}

pub struct Registration<'a> {
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub password: &'a str,
    pub pan_card: &'a str,
    pub referral_code: Option<&'a str>,
    pub file: Option<(&'a str, &'a [u8])>,
}

impl<'a> Registration<'a> {
    pub fn new(name: &'a str, email: &'a str, pan_card: &'a str) -> Self {
        Self {
            name,
            email: Some(email),
            password: "secret-password",
            pan_card,
            referral_code: None,
            file: None,
        }
    }
}

pub fn test_config(upload_dir: PathBuf) -> Config {
    Config {
        application: ApplicationConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            debug_mode: "debug".to_string(),
        },
        database: DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: Secret::new("password".to_string()),
            database_name: "storefront_test".to_string(),
            require_ssl: false,
        },
        jwt: JwtConfig {
            secret: Secret::new("integration-test-secret".to_string()),
            iss: "storefront-accounts".to_string(),
            exp: 3600,
        },
        cookie: CookieConfig {
            name: "token".to_string(),
            max_age_days: 7,
            secure: false,
        },
        storage: StorageConfig {
            upload_dir,
            default_avatar: DEFAULT_AVATAR.to_string(),
        },
    }
}

pub fn spawn_app() -> TestApp {
    let upload_dir = std::env::temp_dir().join(format!("storefront-uploads-{}", Uuid::new_v4()));
    let store = Arc::new(MemoryUserStore::new());
    let shared: Arc<dyn UserStore> = store.clone();
    let state = Arc::new(AppState::new(test_config(upload_dir.clone()), shared));

    TestApp {
        router: router(state),
        store,
        upload_dir,
    }
}

pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn read(response: Response<axum::body::BoxBody>) -> TestResponse {
    let status = response.status();
    let set_cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(|s| s.to_string()))
        .collect();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        body,
        set_cookies,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        read(response).await
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("token={}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("token={}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("DELETE").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("token={}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn multipart(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("token={}", token));
        }
        let body = multipart_body(fields, file);
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    pub async fn register(&self, registration: Registration<'_>) -> TestResponse {
        let mut fields = vec![
            ("name", registration.name),
            ("password", registration.password),
            ("phoneNumber", "5550100"),
            ("panCard", registration.pan_card),
            ("gender", "female"),
        ];
        if let Some(email) = registration.email {
            fields.push(("email", email));
        }
        if let Some(code) = registration.referral_code {
            fields.push(("inputReferralCode", code));
        }
        self.multipart(
            "POST",
            "/api/v2/user/create-user",
            None,
            &fields,
            registration.file,
        )
        .await
    }

    /// Registers a user and returns (session token, user json).
    pub async fn register_ok(&self, registration: Registration<'_>) -> (String, Value) {
        let response = self.register(registration).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        let token = response.token_cookie().expect("session cookie");
        (token, response.body["user"].clone())
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.json(
            "POST",
            "/api/v2/user/login-user",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    pub async fn promote_to_admin(&self, user: &Value) {
        let id = Uuid::parse_str(user["id"].as_str().unwrap()).unwrap();
        assert!(self.store.set_role(&id, Role::Admin).await);
    }

    pub fn uploaded_files(&self) -> Vec<String> {
        match std::fs::read_dir(&self.upload_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
