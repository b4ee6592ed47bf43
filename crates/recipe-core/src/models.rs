use serde::{Deserialize, Serialize};

/// Title, representative image and ingredient list extracted from a recipe page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeMeta {
    pub title: String,
    pub image_url: Option<String>,
    pub ingredients: Vec<String>,
}

impl RecipeMeta {
    /// Degraded result used whenever the page cannot be fetched or read:
    /// the URL doubles as the title and nothing else is known.
    pub fn fallback(url: &str) -> Self {
        Self {
            title: url.to_string(),
            image_url: None,
            ingredients: Vec::new(),
        }
    }
}

/// The single stored reminder: an opaque push subscription and the time it is due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub subscription: serde_json::Value,
    /// Epoch seconds.
    pub scheduled_at: f64,
}

impl Reminder {
    pub fn is_due(&self, now_secs: f64) -> bool {
        now_secs >= self.scheduled_at
    }
}

/// What a delivery check did with the stored reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    NoReminder,
    NotDue,
    Delivered,
    SubscriptionGone,
    DeliveryFailed,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoReminder => "no_reminder",
            Self::NotDue => "not_due",
            Self::Delivered => "delivered",
            Self::SubscriptionGone => "subscription_gone",
            Self::DeliveryFailed => "delivery_failed",
        }
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
