use axum::http::header::InvalidHeaderValue;
use axum::http::{header, HeaderName, HeaderValue, Method};
use ragnest_core::config::RagConfig;
use ragnest_core::error::Result;
use ragnest_llm::OLLAMA_LOCALHOST;
use std::env;
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use crate::handlers::{REQUEST_ID_HEADER, USER_ID_HEADER};

const DEFAULT_LOG_FILTER: &str = "ragnest_api=info,tower_http=debug";

/// API server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub cors_origin: String,
    /// Optional TOML file layered under `RAGNEST_*` variables
    pub config_file: Option<PathBuf>,
    pub ollama_url: String,
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let port = env::var("RAGNEST_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3001);

        let cors_origin =
            env::var("RAGNEST_CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let config_file = env::var("RAGNEST_CONFIG").ok().map(PathBuf::from);

        let ollama_url =
            env::var("RAGNEST_OLLAMA_URL").unwrap_or_else(|_| OLLAMA_LOCALHOST.to_string());

        Self {
            port,
            cors_origin,
            config_file,
            ollama_url,
        }
    }

    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// CORS policy for the configured browser origin
    pub fn cors_layer(&self) -> std::result::Result<CorsLayer, InvalidHeaderValue> {
        Ok(CorsLayer::new()
            .allow_origin(self.cors_origin.parse::<HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static(USER_ID_HEADER),
                HeaderName::from_static(REQUEST_ID_HEADER),
            ]))
    }

    /// Core settings: defaults, then the config file, then the environment
    pub fn rag_config(&self) -> Result<RagConfig> {
        let mut config = RagConfig::with_defaults();
        if let Some(path) = &self.config_file {
            config = config.load_from_file(path)?;
        }
        let config = config.load_from_env();
        config.validate()?;
        Ok(config)
    }
}

/// Log filter from `RAGNEST_LOG`, then `RUST_LOG`, then the default
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_env("RAGNEST_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
