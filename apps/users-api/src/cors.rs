use axum::http::{header, HeaderValue, Method};
use core_config::{ConfigError, FromEnv};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Cross-origin policy for the HTTP API
///
/// Environment variables:
/// - `CORS_ALLOWED_ORIGIN` (optional, comma-separated). Unset or empty allows any origin.
#[derive(Clone, Debug, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<HeaderValue>,
}

impl CorsConfig {
    pub fn is_permissive(&self) -> bool {
        self.allowed_origins.is_empty()
    }

    pub fn layer(&self) -> CorsLayer {
        if self.is_permissive() {
            return CorsLayer::permissive();
        }

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(self.allowed_origins.clone()))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    }
}

impl FromEnv for CorsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("CORS_ALLOWED_ORIGIN").unwrap_or_default();

        let allowed_origins = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "CORS_ALLOWED_ORIGIN".to_string(),
                details: e.to_string(),
            })?;

        Ok(Self { allowed_origins })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_is_permissive() {
        temp_env::with_var_unset("CORS_ALLOWED_ORIGIN", || {
            assert!(CorsConfig::from_env().unwrap().is_permissive());
        });
    }

    #[test]
    fn test_parses_origin_list() {
        temp_env::with_var(
            "CORS_ALLOWED_ORIGIN",
            Some("http://localhost:3000, https://app.example.com,"),
            || {
                let config = CorsConfig::from_env().unwrap();
                assert_eq!(
                    config.allowed_origins,
                    vec![
                        HeaderValue::from_static("http://localhost:3000"),
                        HeaderValue::from_static("https://app.example.com"),
                    ]
                );
            },
        );
    }

    #[test]
    fn test_rejects_invalid_origin() {
        temp_env::with_var("CORS_ALLOWED_ORIGIN", Some("http://bad\norigin"), || {
            assert!(CorsConfig::from_env().is_err());
        });
    }
}
