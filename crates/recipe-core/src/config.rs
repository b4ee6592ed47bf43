use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_REMINDER_TITLE: &str = "Simple Groceries Påminnelse";
pub const DEFAULT_REMINDER_BODY: &str = "Dags att kolla din inköpslista!";

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FETCH_MAX_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_PUSH_TTL_SECS: u32 = 86_400;

/// Reads a variable through `lookup`, treating empty values as unset.
fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match non_empty(lookup, key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparsable setting");
            default
        }),
        None => default,
    }
}

/// Settings for fetching recipe pages.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_bytes: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_bytes: DEFAULT_FETCH_MAX_BYTES,
        }
    }
}

impl FetchSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            timeout: Duration::from_secs(parsed_or(
                &lookup,
                "FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT_SECS,
            )),
            user_agent: non_empty(&lookup, "FETCH_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_bytes: parsed_or(&lookup, "FETCH_MAX_BYTES", DEFAULT_FETCH_MAX_BYTES),
        }
    }
}

/// VAPID credentials used to sign push messages.
#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub private_key: String,
    pub subject: String,
}

/// Settings for the reminder endpoints.
#[derive(Debug, Clone)]
pub struct PushSettings {
    pub kv_url: Option<String>,
    /// `None` unless both the private key and the subject are set.
    pub vapid: Option<VapidCredentials>,
    pub reminder_title: String,
    pub reminder_body: String,
    pub ttl_secs: u32,
}

impl PushSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let vapid = match (
            non_empty(&lookup, "VAPID_PRIVATE_KEY"),
            non_empty(&lookup, "VAPID_SUBJECT"),
        ) {
            (Some(private_key), Some(subject)) => Some(VapidCredentials {
                private_key,
                subject,
            }),
            _ => None,
        };

        Self {
            kv_url: non_empty(&lookup, "KV_URL"),
            vapid,
            reminder_title: non_empty(&lookup, "REMINDER_TITLE")
                .unwrap_or_else(|| DEFAULT_REMINDER_TITLE.to_string()),
            reminder_body: non_empty(&lookup, "REMINDER_BODY")
                .unwrap_or_else(|| DEFAULT_REMINDER_BODY.to_string()),
            ttl_secs: parsed_or(&lookup, "PUSH_TTL_SECS", DEFAULT_PUSH_TTL_SECS),
        }
    }

    /// JSON body delivered to the service worker.
    pub fn notification_payload(&self) -> Vec<u8> {
        serde_json::json!({
            "title": self.reminder_title,
            "body": self.reminder_body,
        })
        .to_string()
        .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn fetch_defaults() {
        let settings = FetchSettings::from_lookup(lookup_from(&[]));
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(settings.max_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn fetch_overrides_and_bad_values() {
        let settings = FetchSettings::from_lookup(lookup_from(&[
            ("FETCH_TIMEOUT_SECS", "3"),
            ("FETCH_MAX_BYTES", "lots"),
            ("FETCH_USER_AGENT", "  "),
        ]));
        assert_eq!(settings.timeout, Duration::from_secs(3));
        assert_eq!(settings.max_bytes, 5 * 1024 * 1024);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn vapid_requires_both_values() {
        let only_key = PushSettings::from_lookup(lookup_from(&[("VAPID_PRIVATE_KEY", "abc")]));
        assert!(only_key.vapid.is_none());

        let both = PushSettings::from_lookup(lookup_from(&[
            ("VAPID_PRIVATE_KEY", "abc"),
            ("VAPID_SUBJECT", "mailto:me@example.com"),
            ("KV_URL", "redis://localhost:6379"),
        ]));
        let vapid = both.vapid.unwrap();
        assert_eq!(vapid.private_key, "abc");
        assert_eq!(vapid.subject, "mailto:me@example.com");
        assert_eq!(both.kv_url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn empty_kv_url_is_unset() {
        let settings = PushSettings::from_lookup(lookup_from(&[("KV_URL", "")]));
        assert!(settings.kv_url.is_none());
        assert_eq!(settings.ttl_secs, 86_400);
    }

    #[test]
    fn payload_carries_title_and_body() {
        let settings = PushSettings::from_lookup(lookup_from(&[("REMINDER_TITLE", "Handla")]));
        let payload: serde_json::Value =
            serde_json::from_slice(&settings.notification_payload()).unwrap();
        assert_eq!(payload["title"], "Handla");
        assert_eq!(payload["body"], DEFAULT_REMINDER_BODY);
    }
}
