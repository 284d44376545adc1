use crate::usage;

use super::{map_result, ApiError, AppContext};

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{error, info};
use uuid::Uuid;
use warp::hyper::body::Bytes;
use warp::{Filter, Reply};

type HmacSha256 = Hmac<Sha256>;

/// Checks the provider's signature header: base64 HMAC-SHA256 of the raw
/// body under the shared secret. Runs before any parsing.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let signature = match signature {
        Some(s) => s,
        None => return false,
    };
    let decoded = match base64::decode(signature.trim()) {
        Ok(d) => d,
        Err(_) => return false,
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&decoded).is_ok()
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Deserialize, Default)]
pub struct WebhookData {
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
    #[serde(rename = "customerId", alias = "customer_id", default)]
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanUpgrade {
    pub user_id: String,
    pub customer_id: Option<String>,
}

/// Decides what a webhook event means for the account, if anything. The
/// resulting update is absolute, so replayed events plan the same write.
pub fn planned_upgrade(event: &WebhookEvent) -> Option<PlanUpgrade> {
    match event.event_type.as_str() {
        "order.created" | "subscription.created" => {
            let user_id = event.data.metadata.as_ref()?.user_id.clone()?;
            Some(PlanUpgrade {
                user_id,
                customer_id: event.data.customer_id.clone(),
            })
        }
        _ => None,
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Webhook endpoint. A bad signature is the only hard failure; everything
/// past that point is logged and acknowledged so the provider does not
/// retry forever.
#[tracing::instrument(
    name = "Processing a payment webhook.",
    err,
    level = "info",
    skip(ctx, body, signature),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn handle_polar_webhook(
    signature: Option<String>,
    ctx: AppContext,
    body: Bytes,
) -> Result<WebhookAck, ApiError> {
    if !verify_signature(&ctx.polar_webhook_secret, &body, signature.as_deref()) {
        return Err(ApiError::InvalidSignature);
    }

    match serde_json::from_slice::<WebhookEvent>(&body) {
        Ok(event) => {
            info!(event_type = %event.event_type, "Received payment webhook.");
            match planned_upgrade(&event) {
                Some(upgrade) => {
                    match usage::upgrade_user_to_pro(
                        ctx.db_pool.clone(),
                        &upgrade.user_id,
                        upgrade.customer_id.as_deref(),
                    )
                    .await
                    {
                        Ok(()) => info!(user_id = %upgrade.user_id, "Upgraded user to pro."),
                        Err(err) => {
                            error!(error = ?err, user_id = %upgrade.user_id, "Failed to apply plan upgrade.")
                        }
                    }
                }
                None => info!(event_type = %event.event_type, "Ignoring webhook event."),
            }
        }
        Err(err) => error!(error = ?err, "Failed to parse webhook payload."),
    }

    Ok(WebhookAck { received: true })
}

pub fn get_filters(
    ctx: AppContext,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    warp::post()
        .and(warp::path("webhooks"))
        .and(warp::path("polar"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(1024 * 64))
        .and(warp::header::optional::<String>("webhook-signature"))
        .and(warp::any().map(move || ctx.clone()))
        .and(warp::body::bytes())
        .then(handle_polar_webhook)
        .map(map_result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        base64::encode(mac.finalize().into_bytes())
    }

    const ORDER_CREATED: &str = r#"{
        "type": "order.created",
        "data": {
            "id": "ord_123",
            "customerId": "cus_456",
            "customer_email": "reader@example.com",
            "metadata": {
                "user_id": "user-1",
                "user_email": "reader@example.com",
                "user_name": "A Reader"
            }
        }
    }"#;

    #[test]
    fn a_correct_signature_verifies() {
        let body = ORDER_CREATED.as_bytes();
        let signature = sign("hook-secret", body);
        assert!(verify_signature("hook-secret", body, Some(&signature)));
    }

    #[test]
    fn tampered_bodies_and_wrong_secrets_fail() {
        let body = ORDER_CREATED.as_bytes();
        let signature = sign("hook-secret", body);
        assert!(!verify_signature("hook-secret", b"{}", Some(&signature)));
        assert!(!verify_signature("other-secret", body, Some(&signature)));
        assert!(!verify_signature("hook-secret", body, None));
        assert!(!verify_signature("hook-secret", body, Some("not base64!!")));
    }

    #[test]
    fn order_and_subscription_events_plan_an_upgrade() {
        let order: WebhookEvent = serde_json::from_str(ORDER_CREATED).unwrap();
        assert_eq!(
            planned_upgrade(&order),
            Some(PlanUpgrade {
                user_id: "user-1".into(),
                customer_id: Some("cus_456".into()),
            })
        );
        let subscription: WebhookEvent = serde_json::from_str(
            r#"{"type": "subscription.created", "data": {"metadata": {"user_id": "user-2"}}}"#,
        )
        .unwrap();
        assert_eq!(
            planned_upgrade(&subscription).unwrap().user_id,
            "user-2".to_string()
        );
    }

    #[test]
    fn other_events_and_missing_user_ids_are_ignored() {
        let refund: WebhookEvent =
            serde_json::from_str(r#"{"type": "order.refunded", "data": {}}"#).unwrap();
        assert!(planned_upgrade(&refund).is_none());
        let anonymous: WebhookEvent =
            serde_json::from_str(r#"{"type": "order.created", "data": {"metadata": {}}}"#).unwrap();
        assert!(planned_upgrade(&anonymous).is_none());
    }

    #[test]
    fn replayed_events_plan_the_identical_update() {
        let first: WebhookEvent = serde_json::from_str(ORDER_CREATED).unwrap();
        let second: WebhookEvent = serde_json::from_str(ORDER_CREATED).unwrap();
        // The update is absolute, so applying the same plan twice leaves the
        // row exactly as one application would.
        assert_eq!(planned_upgrade(&first), planned_upgrade(&second));
    }
}
