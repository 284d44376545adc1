use std::sync::Arc;

use futures::Future;
use governor::{Quota, RateLimiter};
use mobc::Pool;
use nonzero_ext::nonzero;
use serde::Serialize;
use tracing::error;
use warp::http::StatusCode;
use warp::{reply, Filter, Reply};

use crate::auth::{self, SessionVerifier};
use crate::clients::openai::{self, OpenAiClient};
use crate::clients::polar::{self, PolarClient};
use crate::configuration::Configuration;
use crate::connection_pool::PgConnectionManager;
use crate::models::Plan;
use crate::rate_limit::{
    generation_rate_limit_filter, ip_rate_limit_filter, path_method_limit_filter,
};
use crate::storage::CoverStore;
use crate::usage::{Remaining, UsageStatus};
use crate::util::ErrorMessage;
use crate::{binder, outline, storage, usage};

pub mod billing;
pub mod chapters;
pub mod covers;
pub mod exports;
pub mod outlines;
pub mod stories;
pub mod webhooks;

/// Everything a request handler needs, constructed once in `main` and
/// cloned into the filters.
#[derive(Clone)]
pub struct AppContext {
    pub db_pool: Pool<PgConnectionManager>,
    pub sessions: SessionVerifier,
    pub llm: OpenAiClient,
    pub polar: PolarClient,
    pub covers: CoverStore,
    pub base_url: String,
    pub polar_product_id: String,
    pub polar_webhook_secret: String,
}

impl AppContext {
    pub fn new(config: &Configuration, db_pool: Pool<PgConnectionManager>) -> AppContext {
        AppContext {
            db_pool,
            sessions: SessionVerifier::new(&config.session_secret),
            llm: OpenAiClient::new(&config.openai_api_key),
            polar: PolarClient::new(&config.polar_api_url, &config.polar_access_token),
            covers: CoverStore::new(config),
            base_url: config.base_url.clone(),
            polar_product_id: config.polar_product_id.clone(),
            polar_webhook_secret: config.polar_webhook_secret.clone(),
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::From, derive_more::Error)]
pub enum ApiError {
    Unauthorized(auth::Error),
    #[display(fmt = "Invalid webhook signature.")]
    InvalidSignature,
    #[from(ignore)]
    #[display(fmt = "Missing required fields: {}", "_0")]
    MissingFields(#[error(not(source))] &'static str),
    #[from(ignore)]
    #[display(fmt = "Story generation limit reached.")]
    LimitExceeded(#[error(not(source))] UsageStatus),
    #[from(ignore)]
    #[display(fmt = "Not found: {}", "_0")]
    NotFound(#[error(not(source))] &'static str),
    EstablishConnection(mobc::Error<diesel::ConnectionError>),
    QueryResult(diesel::result::Error),
    Usage(usage::Error),
    Llm(openai::Error),
    Outline(outline::Error),
    Checkout(polar::Error),
    Storage(storage::Error),
    Binder(binder::Error),
    Url(url::ParseError),
}

#[derive(Serialize)]
struct LimitExceededBody {
    error: String,
    plan: Plan,
    remaining: Remaining,
    #[serde(rename = "needsUpgrade")]
    needs_upgrade: bool,
}

pub fn map_result(result: Result<impl Serialize, ApiError>) -> impl Reply {
    match result {
        Ok(x) => reply::with_status(reply::json(&x), StatusCode::OK),
        Err(err) => error_reply(err),
    }
}

pub fn error_reply(err: ApiError) -> reply::WithStatus<reply::Json> {
    let internal_server_error: (StatusCode, ErrorMessage) = (
        StatusCode::INTERNAL_SERVER_ERROR,
        "An internal exception occurred.".into(),
    );
    let (status, body) = match &err {
        ApiError::Unauthorized(_) => (
            StatusCode::UNAUTHORIZED,
            "Unauthorized - Please sign in.".into(),
        ),
        ApiError::InvalidSignature => (
            StatusCode::UNAUTHORIZED,
            "Invalid webhook signature.".into(),
        ),
        ApiError::MissingFields(fields) => (
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {}", fields).into(),
        ),
        ApiError::LimitExceeded(status_body) => {
            let reply = reply::with_status(
                reply::json(&LimitExceededBody {
                    error: "Story generation limit reached".into(),
                    plan: status_body.plan,
                    remaining: status_body.remaining,
                    needs_upgrade: true,
                }),
                StatusCode::FORBIDDEN,
            );
            error!("Returning limit-exceeded body for plan {}", status_body.plan);
            return reply;
        }
        ApiError::NotFound(what) => (
            StatusCode::NOT_FOUND,
            format!("Not found: {}", what).into(),
        ),
        ApiError::QueryResult(diesel::result::Error::NotFound) => {
            (StatusCode::NOT_FOUND, "Not found.".into())
        }
        ApiError::Usage(usage::Error::QueryResult(diesel::result::Error::NotFound)) => {
            (StatusCode::NOT_FOUND, "User not found.".into())
        }
        ApiError::Outline(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid outline structure.".into(),
        ),
        ApiError::EstablishConnection(_)
        | ApiError::QueryResult(_)
        | ApiError::Usage(_)
        | ApiError::Llm(_)
        | ApiError::Checkout(_)
        | ApiError::Storage(_)
        | ApiError::Binder(_)
        | ApiError::Url(_) => internal_server_error,
    };
    error!(
        "Returning error body: {}, StatusCode: {}, Source: {}",
        serde_json::to_string(&body).expect("Failed to serialize outgoing message body."),
        status,
        err
    );
    reply::with_status(reply::json(&body), status)
}

pub fn get_server_future(ctx: &AppContext) -> impl Future<Output = ()> {
    let ip_limiter = Arc::new(RateLimiter::keyed(Quota::per_second(nonzero!(5u32))));
    let ip_rate_limiter = ip_rate_limit_filter(ip_limiter);
    let generation_limiter = Arc::new(RateLimiter::keyed(Quota::per_minute(nonzero!(30u32))));
    let generation_rate_limiter = generation_rate_limit_filter(generation_limiter);
    let api_limiter = Arc::new(RateLimiter::keyed(Quota::per_second(nonzero!(5u32))));
    let api_rate_limiter = path_method_limit_filter(api_limiter);

    let outline_routes = outlines::get_filters(ctx.clone());
    let story_routes = stories::get_filters(ctx.clone());
    let chapter_routes = chapters::get_filters(ctx.clone());
    let cover_routes = covers::get_filters(ctx.clone());
    let billing_routes = billing::get_filters(ctx.clone());
    let webhook_routes = webhooks::get_filters(ctx.clone());
    let export_routes = exports::get_filters(ctx.clone());

    warp::serve(
        ip_rate_limiter
            .or(generation_rate_limiter)
            .or(api_rate_limiter)
            .or(outline_routes)
            .or(story_routes)
            .or(chapter_routes)
            .or(cover_routes)
            .or(billing_routes)
            .or(webhook_routes)
            .or(export_routes)
            .with(warp::trace::request()),
    )
    .run(([0, 0, 0, 0], 3000))
}
