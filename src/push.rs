use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder, URL_SAFE_NO_PAD,
};

use crate::state::PushConfig;

/// Fire-and-forget delivery of a user-visible notification.
///
/// Implementations swallow their own failures (missing permission, no
/// subscription, transport errors).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, booking_id: i64, title: &str, body: &str);
}

/// Route a tapped notification opens, carrying the booking id.
pub fn booking_url(booking_id: i64) -> String {
    format!("/bookings/{booking_id}")
}

#[derive(Debug, Deserialize)]
pub struct PushSubscriptionInput {
    pub endpoint: String,
    pub keys: PushKeys,
}

#[derive(Debug, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, sqlx::FromRow)]
struct PushSubscriptionRow {
    endpoint: String,
    p256dh: String,
    auth: String,
}

/// Registers this device's push subscription. Malformed payloads are logged
/// and ignored.
pub async fn store_subscription(pool: &SqlitePool, raw_subscription: &str) -> Result<(), sqlx::Error> {
    let subscription: PushSubscriptionInput = match serde_json::from_str(raw_subscription) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("Invalid push subscription payload: {err}");
            return Ok(());
        }
    };

    sqlx::query(
        r#"INSERT INTO push_subscriptions (endpoint, p256dh, auth, created_at)
           VALUES (?, ?, ?, ?)
           ON CONFLICT(endpoint) DO UPDATE SET
             p256dh = excluded.p256dh,
             auth = excluded.auth"#,
    )
    .bind(subscription.endpoint)
    .bind(subscription.keys.p256dh)
    .bind(subscription.keys.auth)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub struct WebPushNotifier {
    db: SqlitePool,
    config: PushConfig,
}

impl WebPushNotifier {
    pub fn new(db: SqlitePool, config: PushConfig) -> Self {
        Self { db, config }
    }
}

#[async_trait]
impl Notifier for WebPushNotifier {
    async fn notify(&self, booking_id: i64, title: &str, body: &str) {
        if !self.config.enabled() {
            return;
        }

        let rows = match subscriptions(&self.db).await {
            Ok(rows) if rows.is_empty() => {
                log::warn!("No push subscription registered, reminder for booking {booking_id} dropped");
                return;
            }
            Ok(rows) => rows,
            Err(err) => {
                log::warn!("Could not read push subscriptions, reminder for booking {booking_id} dropped: {err}");
                return;
            }
        };

        let payload = serde_json::json!({
            "title": title,
            "body": body,
            "url": booking_url(booking_id),
            "booking_id": booking_id,
        })
        .to_string();

        for row in rows {
            if let Err(err) = send_push(&self.config, row, &payload).await {
                log::warn!("Push send failed: {err}");
            }
        }
    }
}

async fn subscriptions(pool: &SqlitePool) -> Result<Vec<PushSubscriptionRow>, sqlx::Error> {
    sqlx::query_as::<_, PushSubscriptionRow>("SELECT endpoint, p256dh, auth FROM push_subscriptions")
        .fetch_all(pool)
        .await
}

async fn send_push(
    config: &PushConfig,
    row: PushSubscriptionRow,
    payload: &str,
) -> Result<(), WebPushError> {
    let subscription = SubscriptionInfo::new(row.endpoint, row.p256dh, row.auth);
    let mut builder = WebPushMessageBuilder::new(&subscription);
    builder.set_payload(ContentEncoding::Aes128Gcm, payload.as_bytes());

    let mut vapid_builder =
        VapidSignatureBuilder::from_base64(&config.private_key, URL_SAFE_NO_PAD, &subscription)?;
    vapid_builder.add_claim("sub", config.subject.clone());

    builder.set_vapid_signature(vapid_builder.build()?);

    let client = IsahcWebPushClient::new()?;
    client.send(builder.build()?).await?;
    Ok(())
}

/// Stand-in used when no push credentials are configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, booking_id: i64, title: &str, body: &str) {
        log::info!("{title}: {body} ({})", booking_url(booking_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn invalid_subscription_is_ignored() {
        let pool = db::open("sqlite::memory:").await.unwrap();
        store_subscription(&pool, "{not json").await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM push_subscriptions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn resubscribing_updates_the_keys() {
        let pool = db::open("sqlite::memory:").await.unwrap();
        let first = r#"{"endpoint":"https://push.example/abc","keys":{"p256dh":"k1","auth":"a1"}}"#;
        let second = r#"{"endpoint":"https://push.example/abc","keys":{"p256dh":"k2","auth":"a2"}}"#;
        store_subscription(&pool, first).await.unwrap();
        store_subscription(&pool, second).await.unwrap();

        let rows: Vec<(String, String)> = sqlx::query_as("SELECT p256dh, auth FROM push_subscriptions")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows, vec![("k2".to_string(), "a2".to_string())]);
    }

    #[tokio::test]
    async fn subscription_read_failure_is_an_error_not_an_empty_list() {
        let pool = db::open("sqlite::memory:").await.unwrap();
        assert!(subscriptions(&pool).await.unwrap().is_empty());

        sqlx::query("DROP TABLE push_subscriptions")
            .execute(&pool)
            .await
            .unwrap();
        assert!(subscriptions(&pool).await.is_err());
    }

    #[test]
    fn tap_routes_to_the_booking() {
        assert_eq!(booking_url(41), "/bookings/41");
    }
}
