// HTTP mail API transport, compiled with `--features mail_http`.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{config::MailConfig, error::Error};

use super::{Attachment, Email, Mailer, SentInfo};

pub const TOKEN_HEADER: &str = "X-Mail-Server-Token";

#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
    from_address: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendRequest<'a> {
    from: String,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    attachments: Vec<ApiAttachment<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ApiAttachment<'a> {
    name: &'a str,
    content: &'a str,
    content_type: &'a str,
}

impl<'a> From<&'a Attachment> for ApiAttachment<'a> {
    fn from(a: &'a Attachment) -> Self {
        ApiAttachment {
            name: &a.filename,
            content: &a.content,
            content_type: &a.content_type,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct SendResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "MessageID")]
    message_id: Option<String>,
}

impl HttpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self, Error> {
        let api_url = config
            .api_url
            .clone()
            .ok_or_else(|| Error::Config("MAIL_API_URL is required for the HTTP mailer".into()))?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(HttpMailer {
            client,
            api_url,
            api_token: config.api_token.clone(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<SentInfo, Error> {
        let body = SendRequest {
            from: email.sender(&self.from_address),
            to: &email.to,
            subject: &email.subject,
            html_body: &email.html_body,
            attachments: email.attachments.iter().map(ApiAttachment::from).collect(),
        };
        debug!(target: "mail", url = %self.api_url, to = %email.to, "posting mail to API");
        let res = self
            .client
            .post(&self.api_url)
            .header(TOKEN_HEADER, &self.api_token)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            warn!(target: "mail", %status, body = %text, "mail API rejected message");
            return Err(Error::Mail(format!("mail API returned {status}: {text}")));
        }

        let parsed: SendResponse = res.json().await.unwrap_or_default();
        Ok(SentInfo {
            response: parsed.message.unwrap_or_else(|| status.to_string()),
            message_id: parsed.message_id,
        })
    }
}
