use crate::clients::polar::CheckoutMetadata;
use crate::models::User;
use crate::schema::users;
use crate::usage::{usage_status, Remaining};

use super::{map_result, ApiError, AppContext};

use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, QueryDsl, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::{span, Instrument, Level};
use url::Url;
use uuid::Uuid;
use warp::{Filter, Reply};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutRequest {
    #[serde(rename = "productId")]
    product_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    #[serde(rename = "checkoutUrl")]
    pub checkout_url: String,
    #[serde(rename = "checkoutId")]
    pub checkout_id: String,
}

/// Builds the hosted-checkout session; the user's identity rides along as
/// opaque metadata so the webhook can find the account afterwards.
#[tracing::instrument(
    name = "Creating a checkout.",
    err,
    level = "info",
    skip(ctx, body, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn create_checkout(
    authorization: Option<String>,
    ctx: AppContext,
    body: CheckoutRequest,
) -> Result<CheckoutResponse, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    let product_id = body
        .product_id
        .unwrap_or_else(|| ctx.polar_product_id.clone());
    if product_id.trim().is_empty() {
        return Err(ApiError::MissingFields("productId"));
    }
    let success_url = Url::parse(&ctx.base_url)?.join("/success")?;
    let checkout = ctx
        .polar
        .create_checkout(
            &product_id,
            success_url.as_str(),
            CheckoutMetadata {
                user_id: session.user_id,
                user_email: session.email.unwrap_or_default(),
                user_name: session.name.unwrap_or_default(),
            },
        )
        .await?;
    Ok(CheckoutResponse {
        checkout_url: checkout.url,
        checkout_id: checkout.id,
    })
}

#[derive(Debug, Serialize)]
pub struct PlanDetails {
    pub plan: crate::models::Plan,
    pub story_count: i32,
    pub upgraded_at: Option<DateTime<Utc>>,
    #[serde(rename = "canCreateStory")]
    pub can_create_story: bool,
    #[serde(rename = "storiesRemaining")]
    pub stories_remaining: Remaining,
    #[serde(rename = "isProPlan")]
    pub is_pro_plan: bool,
}

#[tracing::instrument(
    name = "Fetching plan details.",
    err,
    level = "info",
    skip(ctx, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn get_plan(
    authorization: Option<String>,
    ctx: AppContext,
) -> Result<PlanDetails, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    let conn = ctx
        .db_pool
        .get()
        .instrument(tracing::info_span!("Acquiring a DB Connection."))
        .await?
        .into_inner();
    let db_span = span!(Level::INFO, "Fetching the user row.");
    let user: Option<User> = {
        let _a = db_span.enter();
        users::table.find(&session.user_id).first(&conn).optional()?
    };
    let user = user.ok_or(ApiError::NotFound("user"))?;
    let status = usage_status(user.plan, user.story_count);
    Ok(PlanDetails {
        plan: user.plan,
        story_count: user.story_count,
        upgraded_at: user.upgraded_at,
        can_create_story: status.can_generate,
        stories_remaining: status.remaining,
        is_pro_plan: user.plan == crate::models::Plan::Pro,
    })
}

pub fn get_filters(
    ctx: AppContext,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    let checkout_ctx = ctx.clone();
    let checkout_filter = warp::post()
        .and(warp::path("checkout"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(1024))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || checkout_ctx.clone()))
        .and(warp::body::json())
        .then(create_checkout)
        .map(map_result);
    let plan_filter = warp::get()
        .and(warp::path("plan"))
        .and(warp::path::end())
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || ctx.clone()))
        .then(get_plan)
        .map(map_result);
    checkout_filter.or(plan_filter)
}
