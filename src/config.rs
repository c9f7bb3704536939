// Configuração da aplicação carregada do ambiente (.env em desenvolvimento)

use chrono::Weekday;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: String,
    pub database_url: String,
    pub bcrypt_cost: u32,
    pub jwt: JwtConfig,
    pub digest: DigestConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expiration_hours: i64,
}

/// Settings for the weekly digest pipeline (feed, sampling, schedule).
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub enabled: bool,
    pub run_on_startup: bool,
    pub weekday: Weekday,
    pub hour: u32,
    pub feed_url: String,
    pub request_delay_ms: u64,
    pub max_results: u32,
    pub keywords_per_query: usize,
}

/// Gmail sender identity and the OAuth2 client used to mint SMTP access tokens.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender_address: String,
    pub sender_name: String,
    pub smtp_host: String,
    pub token_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_on_startup: false,
            weekday: Weekday::Mon,
            hour: 0,
            feed_url: "http://export.arxiv.org/api/query".to_string(),
            request_delay_ms: 3000,
            max_results: 10,
            keywords_per_query: 3,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender_address: String::new(),
            sender_name: "Scholar Weekly".to_string(),
            smtp_host: "smtp.gmail.com".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
        }
    }
}

impl MailConfig {
    /// True when every credential needed to obtain an access token is present.
    pub fn is_configured(&self) -> bool {
        !self.sender_address.is_empty()
            && self.client_id.is_some()
            && self.client_secret.is_some()
            && self.refresh_token.is_some()
    }

    /// `Scholar Weekly <sender@gmail.com>`
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.sender_name, self.sender_address)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set".to_string())?;

        let defaults = DigestConfig::default();

        let weekday = match env::var("DIGEST_WEEKDAY") {
            Ok(value) => parse_weekday(&value)?,
            Err(_) => defaults.weekday,
        };

        let hour = parse_var("DIGEST_HOUR", defaults.hour)?;
        if hour > 23 {
            return Err(format!("DIGEST_HOUR must be between 0 and 23, got {}", hour));
        }

        let digest = DigestConfig {
            enabled: flag_var("DIGEST_ENABLED", defaults.enabled),
            run_on_startup: flag_var("DIGEST_RUN_ON_STARTUP", defaults.run_on_startup),
            weekday,
            hour,
            feed_url: env::var("ARXIV_API_URL").unwrap_or(defaults.feed_url),
            request_delay_ms: parse_var("ARXIV_REQUEST_DELAY_MS", defaults.request_delay_ms)?,
            max_results: parse_var("DIGEST_MAX_RESULTS", defaults.max_results)?,
            keywords_per_query: parse_var("DIGEST_KEYWORDS_PER_QUERY", defaults.keywords_per_query)?
                .max(1),
        };

        let mail_defaults = MailConfig::default();
        let mail = MailConfig {
            sender_address: env::var("MAIL_SENDER").unwrap_or(mail_defaults.sender_address),
            sender_name: env::var("MAIL_SENDER_NAME").unwrap_or(mail_defaults.sender_name),
            smtp_host: env::var("SMTP_HOST").unwrap_or(mail_defaults.smtp_host),
            token_url: env::var("OAUTH_TOKEN_URL").unwrap_or(mail_defaults.token_url),
            client_id: env::var("GOOGLE_CLIENT_ID").ok(),
            client_secret: env::var("GOOGLE_CLIENT_SECRET").ok(),
            refresh_token: env::var("GOOGLE_REFRESH_TOKEN").ok(),
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT").unwrap_or_else(|_| "3002".to_string()),
            database_url,
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "default-secret-change-me".to_string()),
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "scholar-weekly".to_string()),
                audience: env::var("JWT_AUDIENCE")
                    .unwrap_or_else(|_| "scholar-weekly-api".to_string()),
                expiration_hours: parse_var("JWT_EXPIRATION_HOURS", 1)?,
            },
            digest,
            mail,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("Invalid value for {}: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

fn flag_var(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| {
            let v = v.to_lowercase();
            v == "true" || v == "1"
        })
        .unwrap_or(default)
}

/// Accepts `mon`, `Monday`, `1` (cron numbering, 0 = Sunday).
pub fn parse_weekday(value: &str) -> Result<Weekday, String> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u8>() {
        return match n {
            0 | 7 => Ok(Weekday::Sun),
            1 => Ok(Weekday::Mon),
            2 => Ok(Weekday::Tue),
            3 => Ok(Weekday::Wed),
            4 => Ok(Weekday::Thu),
            5 => Ok(Weekday::Fri),
            6 => Ok(Weekday::Sat),
            _ => Err(format!("Invalid weekday number: {}", n)),
        };
    }

    value
        .parse::<Weekday>()
        .map_err(|_| format!("Invalid weekday: '{}'", value))
}
