use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub debug: bool,
    pub auth_token: String,
    pub enable_swagger: bool,
    pub port: u16,
    pub center_name: String,
    /// Storage-zone endpoint blobs are PUT to.
    pub storage_base_url: Url,
    /// Public hostname uploaded blobs are served from.
    pub cdn_base_url: Url,
    pub storage_access_key: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // Load from environment variables with APP_ prefix
            .add_source(Environment::with_prefix("APP").separator("_"))
            .set_default("debug", false)?
            .set_default("auth_token", "default-token-change-me")?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .set_default("center_name", "Trung tâm bồi dưỡng văn hóa")?
            .set_default("storage_base_url", "https://storage.bunnycdn.com/tuition-center/")?
            .set_default("cdn_base_url", "https://tuition-center.b-cdn.net/")?
            .set_default("storage_access_key", "")?
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.port, 8080);
        assert!(!settings.debug);
        assert!(settings.enable_swagger);
        assert_eq!(settings.cdn_base_url.host_str(), Some("tuition-center.b-cdn.net"));
    }
}
