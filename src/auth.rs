use crate::settings::Settings;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::error::ApiError;

pub fn verify_token(
    settings: &Settings,
    auth: Option<Authorization<Bearer>>,
    query_token: Option<&str>,
) -> Result<(), ApiError> {
    let provided_token = auth
        .map(|a| a.token().to_string())
        .or_else(|| query_token.map(|s| s.to_string()));
    match provided_token {
        Some(token) if token == settings.auth_token => Ok(()),
        _ => Err(ApiError::Unauthorized(
            "Invalid authentication token".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn settings() -> Settings {
        Settings {
            debug: false,
            auth_token: "secret".to_string(),
            enable_swagger: true,
            port: 8080,
            center_name: "Trung tâm bồi dưỡng văn hóa".to_string(),
            storage_base_url: Url::parse("https://storage.example.com/zone/").unwrap(),
            cdn_base_url: Url::parse("https://cdn.example.com/").unwrap(),
            storage_access_key: "key".to_string(),
        }
    }

    #[test]
    fn test_verify_token_header() {
        let auth = Authorization::bearer("secret").unwrap();
        assert!(verify_token(&settings(), Some(auth), None).is_ok());
    }

    #[test]
    fn test_verify_token_query() {
        assert!(verify_token(&settings(), None, Some("secret")).is_ok());
        assert!(verify_token(&settings(), None, Some("bad")).is_err());
    }

    #[test]
    fn test_verify_token_missing() {
        assert!(verify_token(&settings(), None, None).is_err());
    }
}
