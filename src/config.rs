//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables
//! into a type-safe struct.
//!
//! Transport provider settings are all optional: when a provider is not
//! configured, the corresponding driver runs in simulated mode and reports
//! success with `metadata.simulated = true`.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `REDIS_URL` (optional): delivery-result cache; absent disables the mirror
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `WORKER_COUNT` (optional): dispatch worker pool size, defaults to 5
/// - `QUEUE_CAPACITY` (optional): bounded job queue capacity, defaults to 100
/// - `POLL_INTERVAL_MS` (optional): dispatcher tick interval, defaults to 1000
/// - `CLAIM_BATCH_SIZE` (optional): notifications claimed per tick, defaults to 100
/// - `SMTP_HOST` / `SMTP_PORT` / `SMTP_USER` / `SMTP_PASSWORD` / `FROM_EMAIL`
///   (optional): real email delivery; absent means the email driver simulates
/// - `SMS_PROVIDER` (optional): `twilio` selects the Twilio driver, plus
///   `TWILIO_ACCOUNT_SID` / `TWILIO_AUTH_TOKEN` / `TWILIO_FROM_NUMBER`
/// - `PUSH_SERVICE` (optional): `fcm` selects the FCM driver, plus `FCM_SERVER_KEY`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    pub redis_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_claim_batch_size")]
    pub claim_batch_size: i64,

    // SMTP settings; all must be present for real email delivery
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from_email: Option<String>,

    // SMS provider selection
    pub sms_provider: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,

    // Push provider selection
    pub push_service: Option<String>,
    pub fcm_server_key: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// Default dispatch worker pool size.
fn default_worker_count() -> usize {
    5
}

/// Default bounded job queue capacity.
fn default_queue_capacity() -> usize {
    100
}

/// Default dispatcher tick interval in milliseconds.
fn default_poll_interval_ms() -> u64 {
    1000
}

/// Default number of pending notifications claimed per tick.
fn default_claim_batch_size() -> i64 {
    100
}

/// Default SMTP submission port.
fn default_smtp_port() -> u16 {
    587
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    /// SMTP `(host, from address)` when email is configured for real delivery.
    ///
    /// Requires at least a host and a from address; credentials are optional
    /// (open relays on private networks do exist). `None` means the email
    /// driver runs simulated.
    pub fn smtp_settings(&self) -> Option<(&str, &str)> {
        match (&self.smtp_host, &self.from_email) {
            (Some(host), Some(from)) => Some((host.as_str(), from.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            database_url: "postgres://localhost/notifications".to_string(),
            redis_url: None,
            server_port: default_port(),
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            claim_batch_size: default_claim_batch_size(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_user: None,
            smtp_password: None,
            from_email: None,
            sms_provider: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
            push_service: None,
            fcm_server_key: None,
        }
    }

    #[test]
    fn defaults_match_dispatch_contract() {
        let config = base_config();
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.claim_batch_size, 100);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn smtp_requires_host_and_from_address() {
        let mut config = base_config();
        assert!(config.smtp_settings().is_none());

        config.smtp_host = Some("smtp.example.com".to_string());
        assert!(config.smtp_settings().is_none());

        config.from_email = Some("noreply@example.com".to_string());
        assert_eq!(
            config.smtp_settings(),
            Some(("smtp.example.com", "noreply@example.com"))
        );
    }
}
