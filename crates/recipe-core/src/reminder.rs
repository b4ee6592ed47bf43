//! The single scheduled reminder: stored as two keys, replaced on every
//! subscribe, cleared after delivery or when the subscription is gone.

use crate::error::{AppError, Result};
use crate::kv::KeyValueStore;
use crate::models::{DeliveryOutcome, Reminder};
use crate::push::{PushError, PushSender};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

pub const SUBSCRIPTION_KEY: &str = "active_reminder_sub";
pub const TIMESTAMP_KEY: &str = "active_reminder_ts";

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid timestamp format")]
    InvalidTimestamp,
    #[error("Timestamp is in the past")]
    InPast,
    #[error(transparent)]
    Store(#[from] AppError),
}

fn epoch_secs(now: DateTime<Utc>) -> f64 {
    now.timestamp_millis() as f64 / 1000.0
}

/// Epoch milliseconds given as a JSON number or a numeric string.
pub fn parse_timestamp_ms(value: &Value) -> Option<f64> {
    let ms = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    ms.is_finite().then_some(ms)
}

#[derive(Clone)]
pub struct Reminders {
    store: Arc<dyn KeyValueStore>,
}

impl Reminders {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Validate and store a reminder, replacing whatever was there. Nothing
    /// is written when validation fails.
    pub async fn schedule(
        &self,
        subscription: Value,
        timestamp_ms: &Value,
        now: DateTime<Utc>,
    ) -> std::result::Result<Reminder, ScheduleError> {
        let ms = parse_timestamp_ms(timestamp_ms).ok_or(ScheduleError::InvalidTimestamp)?;
        let scheduled_at = ms / 1000.0;
        if scheduled_at <= epoch_secs(now) {
            return Err(ScheduleError::InPast);
        }

        let reminder = Reminder {
            subscription,
            scheduled_at,
        };
        let encoded = serde_json::to_string(&reminder.subscription).map_err(AppError::from)?;
        self.store.set(SUBSCRIPTION_KEY, &encoded).await?;
        self.store
            .set(TIMESTAMP_KEY, &reminder.scheduled_at.to_string())
            .await?;

        info!(scheduled_at = reminder.scheduled_at, "Reminder stored");
        Ok(reminder)
    }

    /// The stored reminder, if both keys are present.
    pub async fn current(&self) -> Result<Option<Reminder>> {
        let timestamp = self.store.get(TIMESTAMP_KEY).await?;
        let subscription = self.store.get(SUBSCRIPTION_KEY).await?;

        let (Some(timestamp), Some(subscription)) = (timestamp, subscription) else {
            return Ok(None);
        };

        let scheduled_at = timestamp
            .trim()
            .parse::<f64>()
            .map_err(|e| AppError::ParseError(format!("stored timestamp {timestamp:?}: {e}")))?;
        let subscription: Value = serde_json::from_str(&subscription)?;

        Ok(Some(Reminder {
            subscription,
            scheduled_at,
        }))
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.delete(&[TIMESTAMP_KEY, SUBSCRIPTION_KEY]).await
    }

    /// Deliver the stored reminder if it is due.
    ///
    /// Success and a gone subscription both clear the entry; any other push
    /// failure leaves it in place for the next trigger.
    pub async fn deliver_due(
        &self,
        sender: &dyn PushSender,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<DeliveryOutcome> {
        let Some(reminder) = self.current().await? else {
            info!("No active reminder");
            return Ok(DeliveryOutcome::NoReminder);
        };

        let now_secs = epoch_secs(now);
        if !reminder.is_due(now_secs) {
            info!(now = now_secs, scheduled_at = reminder.scheduled_at, "Reminder not yet due");
            return Ok(DeliveryOutcome::NotDue);
        }

        match sender.send(&reminder.subscription, payload).await {
            Ok(()) => {
                self.clear().await?;
                info!("Reminder delivered and cleared");
                Ok(DeliveryOutcome::Delivered)
            }
            Err(PushError::Gone) => {
                self.clear().await?;
                warn!("Subscription expired or invalid, reminder removed");
                Ok(DeliveryOutcome::SubscriptionGone)
            }
            Err(PushError::Failed(reason)) => {
                error!(reason = %reason, "Push delivery failed, reminder kept for retry");
                Ok(DeliveryOutcome::DeliveryFailed)
            }
        }
    }
}
