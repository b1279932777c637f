use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{config::MailConfig, error::Error};

#[cfg(feature = "mail_http")]
pub mod http;

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    /// Base64 encoded payload.
    pub content: String,
}

/// A single outgoing message, built per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub from_name: String,
    pub subject: String,
    pub attachments: Vec<Attachment>,
    pub html_body: String,
}

impl Email {
    pub fn new(to: &str, from_name: &str, subject: &str, html_body: String) -> Self {
        Email {
            to: to.to_string(),
            from_name: from_name.to_string(),
            subject: subject.to_string(),
            attachments: vec![],
            html_body,
        }
    }

    #[allow(dead_code)]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// `Name <address>` header value for the given sender address.
    pub fn sender(&self, from_address: &str) -> String {
        format!("{} <{}>", self.from_name, from_address)
    }
}

/// What the provider said about an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentInfo {
    pub response: String,
    pub message_id: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<SentInfo, Error>;
}

/// Local development transport: nothing leaves the process, the message is written to the log.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from_address: String,
}

impl LogMailer {
    pub fn new(from_address: &str) -> Self {
        LogMailer {
            from_address: from_address.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<SentInfo, Error> {
        info!(
            target: "mail",
            from = %email.sender(&self.from_address),
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "mail accepted by log transport"
        );
        debug!(target: "mail", body = %email.html_body, "mail body");
        Ok(SentInfo {
            response: "250 Message accepted".to_string(),
            message_id: None,
        })
    }
}

/// Picks the transport the configuration asks for.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, Error> {
    match &config.api_url {
        #[cfg(feature = "mail_http")]
        Some(_) => Ok(Arc::new(http::HttpMailer::from_config(config)?)),
        #[cfg(not(feature = "mail_http"))]
        Some(url) => {
            tracing::warn!(
                target: "mail",
                %url,
                "MAIL_API_URL set but built without `mail_http`; using log transport"
            );
            Ok(Arc::new(LogMailer::new(&config.from_address)))
        }
        None => Ok(Arc::new(LogMailer::new(&config.from_address))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_header_combines_name_and_address() {
        let email = Email::new("a@b.com", "Overnight Developers", "Hi", String::new());
        assert_eq!(
            email.sender("no-reply@localhost"),
            "Overnight Developers <no-reply@localhost>"
        );
    }

    #[tokio::test]
    async fn log_mailer_always_accepts() {
        let mailer = LogMailer::new("no-reply@localhost");
        let attachment = Attachment {
            filename: "a.txt".into(),
            content_type: "text/plain".into(),
            content: "aGk=".into(),
        };
        let email = Email::new("a@b.com", "Devs", "Hi", "<p>hi</p>".into())
            .with_attachments(vec![attachment]);
        let info = mailer.send(email).await.unwrap();
        assert!(info.response.starts_with("250"));
    }

    #[test]
    fn unset_api_url_selects_log_transport() {
        let config = crate::config::Config::from_lookup(|_| None).unwrap();
        assert!(from_config(&config.mail).is_ok());
    }
}
