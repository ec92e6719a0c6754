//! Configuration for gander.
//!
//! Everything comes from environment variables (with a `.env` preload for
//! local runs). Credentials are held as [`SecretString`] so they never show
//! up in debug output or logs.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Main configuration for the assistant.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub line: LineConfig,
    pub llm: LlmConfig,
    pub portal: PortalConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            server: ServerConfig::from_env()?,
            line: LineConfig::from_env()?,
            llm: LlmConfig::from_env(),
            portal: PortalConfig::from_env()?,
        })
    }

    /// The fixed recipient list, built once at startup.
    pub fn recipients(&self) -> Vec<Recipient> {
        let mut recipients = vec![Recipient {
            id: self.line.primary_user_id.clone(),
            role: Role::Primary,
        }];
        if let Some(partner) = &self.line.partner_user_id {
            recipients.push(Recipient { id: partner.clone(), role: Role::Partner });
        }
        recipients
    }
}

/// Display role of a configured recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The account owner; receives reminders and attendance reports.
    Primary,
    /// The monitored recipient; gets the daily welcome and inactivity check-ins.
    Partner,
}

/// A chat recipient known at process start. Never mutated, never deleted.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: String,
    pub role: Role,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the webhook server on.
    pub port: u16,
    /// Public base URL of this deployment, if any. Enables the keep-alive
    /// self-ping that defeats free-tier host idling.
    pub public_url: Option<String>,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".into(),
                message: format!("not a valid port number: {v}"),
            })?,
            Err(_) => 5000,
        };
        Ok(Self { port, public_url: optional_env("PUBLIC_BASE_URL") })
    }
}

/// LINE Messaging API settings.
#[derive(Debug, Clone)]
pub struct LineConfig {
    pub channel_access_token: SecretString,
    /// Channel secret used for webhook signature verification.
    pub channel_secret: SecretString,
    /// User id of the account owner.
    pub primary_user_id: String,
    /// User id of the monitored partner, if configured.
    pub partner_user_id: Option<String>,
}

impl LineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            channel_access_token: required_secret("LINE_CHANNEL_ACCESS_TOKEN")?,
            channel_secret: required_secret("LINE_CHANNEL_SECRET")?,
            primary_user_id: required_env("LINE_PRIMARY_USER_ID")?,
            partner_user_id: optional_env("LINE_PARTNER_USER_ID"),
        })
    }
}

/// Text-generation provider settings.
///
/// The API key is optional: without it the router falls back to the canned
/// capabilities reply instead of calling out.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub model: String,
}

impl LlmConfig {
    fn from_env() -> Self {
        Self {
            api_key: optional_env("GEMINI_API_KEY").map(SecretString::from),
            model: optional_env("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".into()),
        }
    }
}

/// HR portal scrape settings.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// WebDriver endpoint (chromedriver) the scraper connects to.
    pub webdriver_url: String,
    pub login_url: String,
    /// Deep link to the attendance report screen, loaded after login.
    pub report_url: String,
    /// Portal account; doubles as the employee id looked up in the report.
    pub username: String,
    pub password: SecretString,
}

impl PortalConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            webdriver_url: optional_env("WEBDRIVER_URL")
                .unwrap_or_else(|| "http://localhost:9515".into()),
            login_url: optional_env("PORTAL_LOGIN_URL")
                .unwrap_or_else(|| "https://eportal.futai.com.tw/Home/Login?ReturnUrl=%2F".into()),
            report_url: optional_env("PORTAL_REPORT_URL")
                .unwrap_or_else(|| "https://eportal.futai.com.tw/Futai/Default/Index/70".into()),
            username: required_env("PORTAL_USERNAME")?,
            password: required_secret("PORTAL_PASSWORD")?,
        })
    }
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}

fn required_secret(key: &str) -> Result<SecretString, ConfigError> {
    required_env(key).map(SecretString::from)
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test so they
    // cannot race each other under the parallel test runner.
    #[test]
    fn config_from_env_round_trip() {
        // SAFETY: test-only env mutation, serialized within this test.
        unsafe {
            std::env::set_var("LINE_CHANNEL_ACCESS_TOKEN", "token");
            std::env::set_var("LINE_CHANNEL_SECRET", "secret");
            std::env::set_var("LINE_PRIMARY_USER_ID", "U-primary");
            std::env::set_var("LINE_PARTNER_USER_ID", "U-partner");
            std::env::set_var("PORTAL_USERNAME", "2993");
            std::env::set_var("PORTAL_PASSWORD", "hunter2");
            std::env::set_var("PORT", "8080");
        }

        let config = Config::from_env().expect("config loads");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.line.primary_user_id, "U-primary");
        assert_eq!(config.portal.username, "2993");
        assert_eq!(config.llm.model, "gemini-1.5-flash");

        let recipients = config.recipients();
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0].role, Role::Primary);
        assert_eq!(recipients[1].role, Role::Partner);
        assert_eq!(recipients[1].id, "U-partner");

        // Missing required key is an error, not a default.
        unsafe {
            std::env::remove_var("LINE_PRIMARY_USER_ID");
        }
        assert!(matches!(
            LineConfig::from_env(),
            Err(ConfigError::MissingEnvVar(key)) if key == "LINE_PRIMARY_USER_ID"
        ));
        unsafe {
            std::env::set_var("LINE_PRIMARY_USER_ID", "U-primary");
        }
    }
}
