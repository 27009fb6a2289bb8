//! SMTP alert delivery.
//!
//! Configured under `[alerts.email]`:
//!
//! ```toml
//! [alerts.email]
//! smtp_host = "smtp.gmail.com"
//! smtp_port = 587
//! security = "starttls"
//! username = "alerts@example.org"
//! password_env = "LANDWATCH_SMTP_PASSWORD"
//! from = "alerts@example.org"
//! default_recipient = "ops@example.org"
//! ```
//!
//! Alerts go to the task's `email_recipient`, falling back to
//! `default_recipient`. Alerts with neither are skipped.

use crate::alert::{Alert, AlertSink};
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::{info, warn};

const SENDER_NAME: &str = "Change Detection Alert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS
    #[default]
    Starttls,
    /// TLS from the first byte (usually port 465)
    Tls,
    /// No encryption; local relays only
    Plain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub security: SmtpSecurity,
    #[serde(default)]
    pub username: Option<String>,
    /// Environment variable holding the SMTP password
    #[serde(default)]
    pub password_env: Option<String>,
    pub from: String,
    #[serde(default)]
    pub default_recipient: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox> {
    value
        .parse()
        .map_err(|e| MonitorError::Config(format!("alerts.email.{field} {value:?}: {e}")))
}

/// Subject and plain-text body for an alert.
pub fn render_email(alert: &Alert) -> (String, String) {
    let subject = format!("Significant Change Alert for AOI: {}", alert.aoi_id);

    let mut body = String::new();
    let _ = writeln!(body, "Significant change detected in area {}.", alert.aoi_id);
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Change in AOI: {:.2}%",
        alert.combined_change_percentage
    );
    let _ = writeln!(
        body,
        "Vegetation & Land Cover Change: {:.2}%",
        alert.ndvi_percentage
    );
    let _ = writeln!(
        body,
        "Structural & Ground-Level Change: {:.2}%",
        alert.inference_percentage
    );
    let _ = writeln!(body, "User Threshold: {:.2}%", alert.threshold * 100.0);
    let _ = writeln!(body);
    let _ = writeln!(body, "Date of detection: {}", alert.date);
    (subject, body)
}

/// Sends each alert as a plain-text email over SMTP.
pub struct EmailAlertSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    default_recipient: Option<Mailbox>,
}

impl EmailAlertSink {
    /// Build the transport. The password is read from `password_env` now,
    /// so a missing secret fails at startup rather than on the first alert.
    pub fn from_settings(settings: &EmailSettings) -> Result<Self> {
        let host = settings.smtp_host.as_str();
        let builder = match settings.security {
            SmtpSecurity::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| MonitorError::Config(format!("alerts.email.smtp_host: {e}")))?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| MonitorError::Config(format!("alerts.email.smtp_host: {e}")))?,
            SmtpSecurity::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        let mut builder = builder.port(settings.smtp_port);

        if let Some(user) = &settings.username {
            let var = settings.password_env.as_deref().ok_or_else(|| {
                MonitorError::Config("alerts.email.password_env is required with a username".into())
            })?;
            let password = std::env::var(var).map_err(|_| {
                MonitorError::Config(format!("environment variable {var} is not set"))
            })?;
            builder = builder.credentials(Credentials::new(user.clone(), password));
        }

        let from = parse_mailbox("from", &settings.from)?;
        let from = Mailbox::new(Some(SENDER_NAME.to_string()), from.email);
        let default_recipient = settings
            .default_recipient
            .as_deref()
            .map(|r| parse_mailbox("default_recipient", r))
            .transpose()?;

        Ok(Self {
            transport: builder.build(),
            from,
            default_recipient,
        })
    }

    /// The message for `alert`, or `None` when it has nowhere to go.
    pub fn message(&self, alert: &Alert) -> Result<Option<Message>> {
        let to = match alert.email_recipient.as_deref() {
            Some(r) => r
                .parse::<Mailbox>()
                .map_err(|e| MonitorError::Alert(format!("recipient {r:?}: {e}")))?,
            None => match &self.default_recipient {
                Some(r) => r.clone(),
                None => return Ok(None),
            },
        };
        let (subject, body) = render_email(alert);
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| MonitorError::Alert(e.to_string()))?;
        Ok(Some(message))
    }
}

#[async_trait]
impl AlertSink for EmailAlertSink {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        let Some(message) = self.message(alert)? else {
            warn!(aoi_id = %alert.aoi_id, "no recipient for alert, email skipped");
            return Ok(());
        };
        self.transport
            .send(message)
            .await
            .map_err(|e| MonitorError::Alert(e.to_string()))?;
        info!(aoi_id = %alert.aoi_id, "alert email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::Signal;
    use chrono::NaiveDate;

    fn alert(recipient: Option<&str>) -> Alert {
        Alert {
            aoi_id: "vineyard-north".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            email_recipient: recipient.map(str::to_string),
            combined_change_percentage: 30.0,
            threshold: 0.25,
            ndvi_percentage: 20.0,
            inference_percentage: 40.0,
            cva_percentage: 12.5,
            inputs: vec![Signal::Ndvi, Signal::Inference],
        }
    }

    fn settings(default_recipient: Option<&str>) -> EmailSettings {
        EmailSettings {
            smtp_host: "localhost".into(),
            smtp_port: 2525,
            security: SmtpSecurity::Plain,
            username: None,
            password_env: None,
            from: "alerts@example.org".into(),
            default_recipient: default_recipient.map(str::to_string),
        }
    }

    #[test]
    fn test_render_email() {
        let (subject, body) = render_email(&alert(None));
        assert_eq!(subject, "Significant Change Alert for AOI: vineyard-north");
        assert!(body.contains("Change in AOI: 30.00%"));
        assert!(body.contains("Vegetation & Land Cover Change: 20.00%"));
        assert!(body.contains("Structural & Ground-Level Change: 40.00%"));
        assert!(body.contains("User Threshold: 25.00%"));
        assert!(body.contains("2024-08-01"));
    }

    #[test]
    fn test_message_prefers_task_recipient() {
        let sink = EmailAlertSink::from_settings(&settings(Some("ops@example.org"))).unwrap();
        let message = sink.message(&alert(Some("owner@example.org"))).unwrap().unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: owner@example.org"));
        assert!(raw.contains("Subject: Significant Change Alert for AOI: vineyard-north"));
        assert!(raw.contains("Change Detection Alert"));
    }

    #[test]
    fn test_message_falls_back_or_skips() {
        let sink = EmailAlertSink::from_settings(&settings(Some("ops@example.org"))).unwrap();
        let message = sink.message(&alert(None)).unwrap().unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: ops@example.org"));

        let sink = EmailAlertSink::from_settings(&settings(None)).unwrap();
        assert!(sink.message(&alert(None)).unwrap().is_none());
    }

    #[test]
    fn test_settings_errors() {
        let mut bad_from = settings(None);
        bad_from.from = "not an address".into();
        assert!(matches!(
            EmailAlertSink::from_settings(&bad_from),
            Err(MonitorError::Config(_))
        ));

        let mut no_secret = settings(None);
        no_secret.username = Some("alerts@example.org".into());
        no_secret.password_env = Some("LANDWATCH_TEST_SMTP_PASSWORD_UNSET".into());
        assert!(matches!(
            EmailAlertSink::from_settings(&no_secret),
            Err(MonitorError::Config(_))
        ));
    }
}
