//! Transport drivers, one per channel kind.
//!
//! Every driver exposes the same shape: it takes a fan-out job plus the
//! already-rendered subject/content and resolves to a `DeliveryResult`. A
//! driver never returns an error; transport problems become failed results.
//! A driver also never blocks past its transport-level timeout (hard cap
//! 10 seconds); timeouts resolve as `success = false`.
//!
//! When a provider is not configured a driver runs in simulated mode: it
//! reports success and tags the result metadata with `simulated: true`.

pub mod email;
pub mod push;
pub mod sms;
pub mod webhook;

use std::time::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::models::delivery::{DeliveryResult, NotificationJob};
use crate::models::notification::{Channel, MessageContent};

/// Per-request timeout shared by the HTTP-based drivers (webhook, SMS, push).
pub const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// All configured transport drivers, selected by an exhaustive channel match.
///
/// Built once at startup from configuration and shared by every dispatch
/// worker. The HTTP client is reused across drivers; per-request timeouts
/// are applied at the call site.
pub struct Transports {
    pub http: reqwest::Client,
    pub email: email::EmailTransport,
    pub sms: sms::SmsTransport,
    pub push: push::PushTransport,
}

impl Transports {
    /// Build drivers from configuration.
    ///
    /// Each driver independently falls back to simulated mode when its
    /// provider settings are absent; an invalid SMTP host is the only
    /// configuration that fails startup.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            http: reqwest::Client::new(),
            email: email::EmailTransport::from_config(config)?,
            sms: sms::SmsTransport::from_config(config),
            push: push::PushTransport::from_config(config),
        })
    }

    /// Invoke the driver for the job's channel.
    ///
    /// `subject` and `content` are the rendered forms; the job still carries
    /// the raw content and variables for drivers that forward them (webhook).
    pub async fn deliver(
        &self,
        job: &NotificationJob,
        subject: &str,
        content: &MessageContent,
    ) -> DeliveryResult {
        match job.channel {
            Channel::Email => self.email.deliver(job, subject, content).await,
            Channel::Sms => self.sms.deliver(&self.http, job, content).await,
            Channel::Push => self.push.deliver(&self.http, job, subject, content).await,
            Channel::Webhook => webhook::deliver(&self.http, job, subject, content).await,
        }
    }
}
