//! Push delivery. The reminder logic only sees [`PushSender`]; the Web Push
//! implementation sits behind the `push` feature.

use async_trait::async_trait;
use thiserror::Error;

/// Why a push delivery did not go through.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// The push service reported the subscription as expired or unsubscribed.
    #[error("subscription is gone")]
    Gone,
    /// Anything else; the reminder stays stored for the next trigger.
    #[error("delivery failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        subscription: &serde_json::Value,
        payload: &[u8],
    ) -> std::result::Result<(), PushError>;
}

#[cfg(feature = "push")]
pub use web::{PushMessages, WebPushSender};

#[cfg(feature = "push")]
mod web {
    use super::{PushError, PushSender};
    use crate::config::VapidCredentials;
    use crate::error::{AppError, Result};
    use async_trait::async_trait;
    use web_push::{
        ContentEncoding, IsahcWebPushClient, PartialVapidSignatureBuilder, SubscriptionInfo,
        VapidSignatureBuilder, WebPushClient, WebPushError, WebPushMessage,
        WebPushMessageBuilder, URL_SAFE_NO_PAD,
    };

    /// Builds encrypted (aes128gcm), VAPID-signed messages for a subscription.
    #[derive(Clone)]
    pub struct PushMessages {
        key: PartialVapidSignatureBuilder,
        subject: String,
        ttl_secs: u32,
    }

    impl PushMessages {
        /// Fails with a config error when the private key is not a base64url P-256 key.
        pub fn new(vapid: &VapidCredentials, ttl_secs: u32) -> Result<Self> {
            let key = VapidSignatureBuilder::from_base64_no_sub(&vapid.private_key, URL_SAFE_NO_PAD)
                .map_err(|e| AppError::ConfigError(format!("VAPID private key: {e}")))?;
            Ok(Self {
                key,
                subject: vapid.subject.clone(),
                ttl_secs,
            })
        }

        pub fn build(
            &self,
            subscription: &serde_json::Value,
            payload: &[u8],
        ) -> std::result::Result<WebPushMessage, PushError> {
            let info: SubscriptionInfo = serde_json::from_value(subscription.clone())
                .map_err(|e| PushError::Failed(format!("invalid subscription: {e}")))?;

            let mut signature = self.key.clone().add_sub_info(&info);
            signature.add_claim("sub", self.subject.as_str());
            let signature = signature.build().map_err(classify)?;

            let mut builder = WebPushMessageBuilder::new(&info);
            builder.set_payload(ContentEncoding::Aes128Gcm, payload);
            builder.set_vapid_signature(signature);
            builder.set_ttl(self.ttl_secs);
            builder.build().map_err(classify)
        }
    }

    /// Sends messages from [`PushMessages`] over HTTP.
    pub struct WebPushSender {
        client: IsahcWebPushClient,
        messages: PushMessages,
    }

    impl WebPushSender {
        pub fn new(vapid: VapidCredentials, ttl_secs: u32) -> Result<Self> {
            let messages = PushMessages::new(&vapid, ttl_secs)?;
            let client =
                IsahcWebPushClient::new().map_err(|e| AppError::PushError(e.to_string()))?;
            Ok(Self { client, messages })
        }
    }

    pub(super) fn classify(e: WebPushError) -> PushError {
        match e {
            // 410 Gone from the push service.
            WebPushError::EndpointNotValid => PushError::Gone,
            other => PushError::Failed(other.to_string()),
        }
    }

    #[async_trait]
    impl PushSender for WebPushSender {
        async fn send(
            &self,
            subscription: &serde_json::Value,
            payload: &[u8],
        ) -> std::result::Result<(), PushError> {
            let message = self.messages.build(subscription, payload)?;
            self.client.send(message).await.map_err(classify)
        }
    }
}
