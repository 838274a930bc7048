//! OAuth registration for Google Drive.

use core_auth::OAuthConfig;
use core_runtime::config::GoogleDriveSettings;

pub const PROVIDER_NAME: &str = "google";
pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/calendar",
];

pub fn google_oauth_config(settings: &GoogleDriveSettings) -> OAuthConfig {
    OAuthConfig {
        provider_name: PROVIDER_NAME.to_string(),
        client_id: settings.client_id.clone(),
        client_secret: settings.client_secret.clone(),
        redirect_uri: settings.redirect_uri.clone(),
        scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_config_defaults() {
        let config = google_oauth_config(&GoogleDriveSettings::new("id.apps.googleusercontent.com"));

        assert_eq!(config.redirect_uri, "http://localhost");
        assert_eq!(config.token_url, TOKEN_URL);
        assert_eq!(config.scopes.len(), 2);
        assert!(config.client_secret.is_none());
        config.validate().unwrap();
    }
}
