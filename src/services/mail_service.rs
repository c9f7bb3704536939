// ==================== DIGEST MAIL ====================
// Renderiza o email do digest (askama) e envia via Gmail SMTP com XOAUTH2.
// O refresh token do MailConfig é trocado por um access token, guardado em
// cache até pouco antes de expirar. Cada envio cria e descarta seu próprio
// transporte SMTP.

use crate::{config::MailConfig, models::Paper};
use askama::Template;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DIGEST_SUBJECT: &str = "Your Weekly Research Paper is Here";

// Renova o token um pouco antes de expirar
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Template)]
#[template(path = "digest_email.html")]
struct DigestEmailHtml<'a> {
    title: &'a str,
    summary: &'a str,
    published: &'a str,
    authors: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "digest_email.txt")]
struct DigestEmailText<'a> {
    title: &'a str,
    summary: &'a str,
    published: &'a str,
    authors: &'a str,
    link: &'a str,
}

/// A fully rendered digest message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl DigestEmail {
    pub fn for_paper(to: &str, paper: &Paper) -> Result<Self, String> {
        let authors = paper.authors.join(", ");

        let html_body = DigestEmailHtml {
            title: &paper.title,
            summary: &paper.summary,
            published: &paper.published,
            authors: &authors,
            link: &paper.id,
        }
        .render()
        .map_err(|e| format!("Failed to render HTML email: {}", e))?;

        let text_body = DigestEmailText {
            title: &paper.title,
            summary: &paper.summary,
            published: &paper.published,
            authors: &authors,
            link: &paper.id,
        }
        .render()
        .map_err(|e| format!("Failed to render text email: {}", e))?;

        Ok(Self {
            to: to.to_string(),
            subject: DIGEST_SUBJECT.to_string(),
            text_body,
            html_body,
        })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &DigestEmail) -> Result<(), String>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct GmailMailer {
    config: MailConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl GmailMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let (client_id, client_secret, refresh_token) = match (
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
            self.config.refresh_token.as_deref(),
        ) {
            (Some(id), Some(secret), Some(refresh)) => (id, secret, refresh),
            _ => return Err("Mail OAuth2 credentials are not configured".to_string()),
        };

        log::debug!("🔑 Refreshing Gmail access token");

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| format!("Failed to refresh access token: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("OAuth2 token endpoint error: {}", response.status()));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse token response: {}", e))?;

        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(body.access_token)
    }

    fn build_message(&self, email: &DigestEmail) -> Result<Message, String> {
        let from = self.config.from_header();

        Message::builder()
            .from(from.parse().map_err(|_| format!("Invalid sender address: {}", from))?)
            .to(email
                .to
                .parse()
                .map_err(|_| format!("Invalid recipient address: {}", email.to))?)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| format!("Failed to build message: {}", e))
    }
}

#[async_trait]
impl Mailer for GmailMailer {
    async fn send(&self, email: &DigestEmail) -> Result<(), String> {
        let message = self.build_message(email)?;
        let access_token = self.access_token().await?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| format!("Failed to create SMTP transport: {}", e))?
            .credentials(Credentials::new(self.config.sender_address.clone(), access_token))
            .authentication(vec![Mechanism::Xoauth2])
            .build();

        let response = transport
            .send(message)
            .await
            .map_err(|e| format!("SMTP error: {}", e))?;

        log::info!("📧 Email sent to {} ({:?})", email.to, response.code());
        Ok(())
    }
}
