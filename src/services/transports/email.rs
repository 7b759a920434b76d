//! Email transport driver.
//!
//! Sends multipart MIME messages (text/plain + text/html alternatives) over
//! SMTP via lettre. When SMTP is not configured the driver simulates
//! delivery: it reports success and tags the result with `simulated: true`.

use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;

use crate::config::Config;
use crate::error::AppError;
use crate::models::delivery::{DeliveryResult, NotificationJob};
use crate::models::notification::MessageContent;

/// Email driver: a real SMTP mailer or the simulated path.
pub enum EmailTransport {
    Smtp {
        mailer: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    },
    Simulated,
}

impl EmailTransport {
    /// Build the driver from configuration.
    ///
    /// Requires `SMTP_HOST` and `FROM_EMAIL` for real delivery; credentials
    /// are attached when both `SMTP_USER` and `SMTP_PASSWORD` are present.
    /// Anything less configures the simulated path.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let Some((host, from_email)) = config.smtp_settings() else {
            tracing::info!("SMTP not configured, email driver will simulate deliveries");
            return Ok(EmailTransport::Simulated);
        };

        let from: Mailbox = from_email.parse().map_err(|e| {
            AppError::InvalidRequest(format!("Invalid FROM_EMAIL address: {}", e))
        })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| AppError::InvalidRequest(format!("Invalid SMTP host: {}", e)))?
            .port(config.smtp_port);

        if let (Some(user), Some(password)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        tracing::info!(host = %host, "Email driver configured for SMTP delivery");
        Ok(EmailTransport::Smtp {
            mailer: builder.build(),
            from,
        })
    }

    /// Deliver one email job.
    ///
    /// `subject` and `content` are already rendered. The message is built as
    /// a multipart alternative when HTML is present, plain text otherwise.
    /// Transport errors resolve as failed results with the carrier message.
    pub async fn deliver(
        &self,
        job: &NotificationJob,
        subject: &str,
        content: &MessageContent,
    ) -> DeliveryResult {
        let EmailTransport::Smtp { mailer, from } = self else {
            return DeliveryResult::simulated(job);
        };

        let to: Mailbox = match job.contact.identifier.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                return DeliveryResult::failure(
                    job,
                    format!("Invalid email address '{}': {}", job.contact.identifier, e),
                );
            }
        };

        let builder = Message::builder()
            .from(from.clone())
            .to(to)
            .subject(subject);

        let message = match (&content.text, &content.html) {
            (text, Some(html)) => builder.multipart(MultiPart::alternative_plain_html(
                text.clone().unwrap_or_default(),
                html.clone(),
            )),
            (Some(text), None) => builder.singlepart(SinglePart::plain(text.clone())),
            (None, None) => {
                return DeliveryResult::failure(job, "No email content to send");
            }
        };

        let message = match message {
            Ok(m) => m,
            Err(e) => {
                return DeliveryResult::failure(job, format!("Failed to build message: {}", e));
            }
        };

        match mailer.send(message).await {
            Ok(_) => DeliveryResult::success(
                job,
                json!({
                    "simulated": false,
                    "to": job.contact.identifier,
                }),
            ),
            Err(e) => DeliveryResult::failure(job, format!("SMTP delivery failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contact::Contact;
    use crate::models::notification::Channel;
    use chrono::Utc;
    use uuid::Uuid;

    fn email_job() -> NotificationJob {
        NotificationJob {
            notification_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            contact: Contact {
                id: Uuid::new_v4(),
                profile_id: Uuid::new_v4(),
                external_id: "user-1".to_string(),
                identifier: "c@x.test".to_string(),
                first_name: None,
                last_name: None,
                timezone: None,
                locale: None,
                preferences: json!({}),
                status: "active".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            channel: Channel::Email,
            subject: "Hi {{n}}".to_string(),
            content: MessageContent {
                text: Some("Hello {{n}}".to_string()),
                html: None,
            },
            variables: json!({"n": "Ada"}),
            webhook_secret: None,
        }
    }

    #[tokio::test]
    async fn unconfigured_smtp_simulates_success() {
        let job = email_job();
        let result = EmailTransport::Simulated
            .deliver(&job, "Hi Ada", &job.content)
            .await;

        assert!(result.success);
        assert_eq!(result.metadata["simulated"], json!(true));
        assert_eq!(result.metadata["to"], json!("c@x.test"));
    }
}
