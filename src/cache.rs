//! Delivery-result cache mirror.
//!
//! Every recorded delivery result is mirrored into Redis under
//! `delivery:<notification_id>:<channel>` with a 24-hour TTL so other
//! processes can observe recent outcomes without hitting the database.
//!
//! The mirror is strictly best-effort: the Store is authoritative, writes
//! that fail are logged at `warn` and never affect dispatch outcomes, and
//! the service runs fine with no Redis configured at all.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::models::delivery::DeliveryResult;

/// Seconds a mirrored delivery result stays readable (~24h).
const DELIVERY_RESULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Handle to the delivery-result mirror.
///
/// `Disabled` is the no-op variant used when `REDIS_URL` is absent or the
/// initial connection fails; every write silently becomes a no-op.
#[derive(Clone)]
pub enum Cache {
    Redis(ConnectionManager),
    Disabled,
}

impl Cache {
    /// Connect to Redis, or fall back to the disabled no-op mirror.
    ///
    /// A bad URL or unreachable server downgrades to `Disabled` with a
    /// warning instead of failing startup: losing the mirror must never
    /// affect behaviour.
    pub async fn connect(redis_url: Option<&str>) -> Cache {
        let Some(url) = redis_url else {
            tracing::info!("REDIS_URL not set, delivery-result mirror disabled");
            return Cache::Disabled;
        };

        match redis::Client::open(url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(manager) => {
                    tracing::info!("Connected to delivery-result cache");
                    Cache::Redis(manager)
                }
                Err(e) => {
                    tracing::warn!("Cache connection failed, mirror disabled: {}", e);
                    Cache::Disabled
                }
            },
            Err(e) => {
                tracing::warn!("Invalid REDIS_URL, mirror disabled: {}", e);
                Cache::Disabled
            }
        }
    }

    /// Mirror a delivery result, keyed by `(notification_id, channel)`.
    ///
    /// Best-effort: serialization or write failures are logged and dropped.
    pub async fn record_delivery(&self, result: &DeliveryResult) {
        let Cache::Redis(manager) = self else {
            return;
        };

        let key = delivery_key(result);
        let value = match serde_json::to_string(result) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Failed to serialize delivery result for cache: {}", e);
                return;
            }
        };

        let mut conn = manager.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(&key, value, DELIVERY_RESULT_TTL_SECS)
            .await
        {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }
}

/// Cache key for one channel attempt.
fn delivery_key(result: &DeliveryResult) -> String {
    format!(
        "delivery:{}:{}",
        result.notification_id,
        result.channel.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::Channel;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn delivery_key_includes_notification_and_channel() {
        let id = Uuid::new_v4();
        let result = DeliveryResult {
            notification_id: id,
            channel: Channel::Webhook,
            success: true,
            error: String::new(),
            delivered_at: Utc::now(),
            metadata: json!({}),
        };
        assert_eq!(delivery_key(&result), format!("delivery:{}:webhook", id));
    }

    #[tokio::test]
    async fn disabled_cache_ignores_writes() {
        let result = DeliveryResult {
            notification_id: Uuid::new_v4(),
            channel: Channel::Email,
            success: true,
            error: String::new(),
            delivered_at: Utc::now(),
            metadata: json!({}),
        };
        // Must not panic or block
        Cache::Disabled.record_delivery(&result).await;
    }
}
