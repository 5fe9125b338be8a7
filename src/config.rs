use std::collections::HashMap;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::domain::{qr::RenderOptions, scanner::CaptureConstraints};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub profile_api: ProfileApiConfig,
    #[serde(default)]
    pub qr: RenderOptions,
    #[serde(default)]
    pub scanner: CaptureConstraints,
    /// Enables developer-only routes. Set once at startup, never read from the ambient environment.
    #[serde(default)]
    pub dev_tools: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<SecretString>,
    pub timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("server.host", "localhost")?
            .set_default("server.port", 3000)?
            .set_default("profile_api.base_url", "http://localhost:8080/api")?
            .set_default("profile_api.timeout_secs", 10)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_SERVER__HOST or APP_QR__SIZE
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        qr::{Color, ErrorCorrection},
        scanner::FacingMode,
    };
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = Config::load_with_sources(Some(HashMap::new())).expect("Failed to load config");

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.profile_api.base_url, "http://localhost:8080/api");
        assert!(config.profile_api.token.is_none());
        assert_eq!(config.qr, RenderOptions::default());
        assert_eq!(config.scanner, CaptureConstraints::default());
        assert!(!config.dev_tools);
    }

    #[test]
    fn test_env_config() {
        let env_vars = HashMap::from([
            ("server.host".to_string(), "0.0.0.0".to_string()),
            ("server.port".to_string(), "443".to_string()),
            ("profile_api.token".to_string(), "s3cret".to_string()),
            ("qr.size".to_string(), "512".to_string()),
            ("qr.error_correction".to_string(), "M".to_string()),
            ("qr.foreground".to_string(), "#1a2b3c".to_string()),
            ("scanner.sample_rate".to_string(), "15".to_string()),
            ("scanner.facing".to_string(), "user".to_string()),
            ("dev_tools".to_string(), "true".to_string()),
        ]);

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 443);
        assert_eq!(
            config.profile_api.token.unwrap().expose_secret(),
            "s3cret"
        );
        assert_eq!(config.qr.size, 512);
        assert_eq!(config.qr.margin, 4);
        assert_eq!(config.qr.error_correction, ErrorCorrection::Medium);
        assert_eq!(config.qr.foreground, Color::rgb(0x1a, 0x2b, 0x3c));
        assert_eq!(config.scanner.sample_rate, 15);
        assert_eq!(config.scanner.facing, FacingMode::User);
        assert!(config.dev_tools);
    }

    #[test]
    fn test_partial_env_override() {
        let mut env_vars = HashMap::new();
        // We just override the host
        env_vars.insert("server.host".to_string(), "192.168.1.1".to_string());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.server.host, "192.168.1.1");
        // The other values should use default
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.profile_api.timeout_secs, 10);
    }

    #[test]
    fn test_invalid_color_is_rejected() {
        let env_vars = HashMap::from([("qr.background".to_string(), "white".to_string())]);
        assert!(Config::load_with_sources(Some(env_vars)).is_err());
    }
}
