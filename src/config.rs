use std::{env, str::FromStr, time::Duration};

use crate::state::PushConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1/";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/barber2go-client.db";

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub database_url: String,
    pub http_timeout: Duration,
    pub reminder_lead: chrono::Duration,
    pub reminder_poll: Duration,
    pub push: PushConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            http_timeout: Duration::from_secs(15),
            reminder_lead: chrono::Duration::minutes(60),
            reminder_poll: Duration::from_secs(30),
            push: PushConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_url = env::var("BARBER_API_URL").unwrap_or(defaults.api_url);
        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);

        Self {
            api_url: with_trailing_slash(api_url),
            database_url,
            http_timeout: Duration::from_secs(positive_var("HTTP_TIMEOUT_SECS", 15)),
            reminder_lead: chrono::Duration::minutes(positive_var("REMINDER_LEAD_MINUTES", 60)),
            reminder_poll: Duration::from_secs(positive_var("REMINDER_POLL_SECS", 30)),
            push: PushConfig {
                public_key: env::var("VAPID_PUBLIC_KEY").unwrap_or_default(),
                private_key: env::var("VAPID_PRIVATE_KEY").unwrap_or_default(),
                subject: env::var("VAPID_SUBJECT")
                    .unwrap_or_else(|_| "mailto:reminders@barber2go.app".to_string()),
            },
        }
    }
}

fn positive_var<T>(name: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    parse_positive(name, env::var(name).ok().as_deref(), default)
}

/// Zero and negative values fall back to the default like unparseable ones.
fn parse_positive<T>(name: &str, raw: Option<&str>, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            log::warn!("{name}={raw} is not a valid value, using the default");
            default
        }
    }
}

pub(crate) fn with_trailing_slash(url: String) -> String {
    if url.ends_with('/') {
        url
    } else {
        format!("{url}/")
    }
}
