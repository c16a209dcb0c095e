use std::env;

const DEFAULT_TABLE_NAME: &str = "lead-dispatch";
const DEFAULT_PHOTO_BUCKET: &str = "lead-dispatch-photos";
const DEFAULT_EMAIL_FROM: &str = "noreply@leaddispatch.app";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:8080";

/// Which store implementation backs the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Dynamo,
    /// In-process store for local runs (`cargo lambda watch`)
    Memory,
}

/// Settings read once at cold start
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub store: StoreKind,
    pub cognito_client_id: Option<String>,
    pub cognito_client_secret: Option<String>,
    pub cognito_user_pool_id: Option<String>,
    pub ws_api_endpoint: Option<String>,
    pub photo_bucket: String,
    pub email_from: String,
    pub frontend_url: String,
    /// Accept the `X-User-Id` header (and `?user_id=` on WebSocket connect)
    /// as the caller identity. Off unless `DISPATCH_DEV_IDENTITY` is set or
    /// the memory store is in use.
    pub dev_identity: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let store = match env::var("DISPATCH_STORE").as_deref() {
            Ok("memory") => StoreKind::Memory,
            Ok("dynamo") | Err(_) => StoreKind::Dynamo,
            Ok(other) => {
                tracing::warn!("Unknown DISPATCH_STORE '{}', using dynamo", other);
                StoreKind::Dynamo
            }
        };

        let dev_identity = match env::var("DISPATCH_DEV_IDENTITY").as_deref() {
            Ok("1") | Ok("true") => true,
            Ok(_) => false,
            Err(_) => store == StoreKind::Memory,
        };
        if dev_identity {
            tracing::warn!("Caller identity taken from X-User-Id; do not use outside local development");
        }

        Self {
            table_name: env::var("TABLE_NAME").unwrap_or_else(|_| DEFAULT_TABLE_NAME.to_string()),
            store,
            cognito_client_id: env::var("COGNITO_CLIENT_ID").ok(),
            cognito_client_secret: env::var("COGNITO_CLIENT_SECRET").ok(),
            cognito_user_pool_id: env::var("COGNITO_USER_POOL_ID").ok(),
            ws_api_endpoint: env::var("WS_API_ENDPOINT").ok(),
            photo_bucket: env::var("PHOTO_BUCKET")
                .unwrap_or_else(|_| DEFAULT_PHOTO_BUCKET.to_string()),
            email_from: env::var("EMAIL_FROM").unwrap_or_else(|_| DEFAULT_EMAIL_FROM.to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
            dev_identity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            store: StoreKind::Memory,
            cognito_client_id: None,
            cognito_client_secret: None,
            cognito_user_pool_id: None,
            ws_api_endpoint: None,
            photo_bucket: DEFAULT_PHOTO_BUCKET.to_string(),
            email_from: DEFAULT_EMAIL_FROM.to_string(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            dev_identity: true,
        }
    }
}
