use std::{net::SocketAddr, sync::Arc};

use governor::{clock, state::keyed::DefaultKeyedStateStore, RateLimiter};
use reqwest::{Method, StatusCode};
use warp::{
    filters::BoxedFilter,
    path::Peek,
    reply::{Json, WithStatus},
    Filter, Rejection, Reply,
};

use crate::util::ErrorMessage;

/// Route prefixes that fan out to the LLM or image model; these get a much
/// tighter quota than plain CRUD traffic.
const GENERATION_PREFIXES: [&str; 3] = ["outlines", "chapters", "covers"];

pub type IpLimiter = Arc<
    RateLimiter<
        Option<SocketAddr>,
        DefaultKeyedStateStore<Option<SocketAddr>>,
        clock::DefaultClock,
    >,
>;

pub type PathLimiter = Arc<
    RateLimiter<(String, Method), DefaultKeyedStateStore<(String, Method)>, clock::DefaultClock>,
>;

pub fn ip_rate_limit_filter(limiter: IpLimiter) -> BoxedFilter<(impl Reply,)> {
    warp::addr::remote()
        .and(warp::any().map(move || limiter.clone()))
        .and_then(check_ip_limiter)
        .boxed()
}

async fn check_ip_limiter(
    ip: Option<SocketAddr>,
    limiter: IpLimiter,
) -> Result<WithStatus<Json>, Rejection> {
    let rate_limit_reply = warp::reply::with_status(
        warp::reply::json(&ErrorMessage {
            message: "IP Rate Limit".into(),
        }),
        StatusCode::TOO_MANY_REQUESTS,
    );
    match limiter.check_key(&ip) {
        Ok(_) => Err(warp::reject()),
        Err(_) => Ok(rate_limit_reply),
    }
}

/// Per-route limiter for the generation endpoints only; other paths fall
/// through untouched.
pub fn generation_rate_limit_filter(limiter: PathLimiter) -> BoxedFilter<(impl Reply,)> {
    warp::path::peek()
        .and(warp::method())
        .and(warp::any().map(move || limiter.clone()))
        .and_then(check_generation_limiter)
        .boxed()
}

async fn check_generation_limiter(
    path: Peek,
    method: Method,
    limiter: PathLimiter,
) -> Result<WithStatus<Json>, Rejection> {
    let first_segment = path.segments().next().unwrap_or_default().to_string();
    if !GENERATION_PREFIXES.contains(&first_segment.as_str()) {
        return Err(warp::reject());
    }
    let rate_limit_reply = warp::reply::with_status(
        warp::reply::json(&ErrorMessage {
            message: "Generation Rate Limit".into(),
        }),
        StatusCode::TOO_MANY_REQUESTS,
    );
    match limiter.check_key(&(first_segment, method)) {
        Ok(_) => Err(warp::reject()),
        Err(_) => Ok(rate_limit_reply),
    }
}

pub fn path_method_limit_filter(limiter: PathLimiter) -> BoxedFilter<(impl Reply,)> {
    warp::path::peek()
        .and(warp::method())
        .and(warp::any().map(move || limiter.clone()))
        .and_then(check_path_limiter)
        .boxed()
}

async fn check_path_limiter(
    path: Peek,
    method: Method,
    limiter: PathLimiter,
) -> Result<WithStatus<Json>, Rejection> {
    let rate_limit_reply = warp::reply::with_status(
        warp::reply::json(&ErrorMessage {
            message: "API Rate Limit".into(),
        }),
        StatusCode::TOO_MANY_REQUESTS,
    );
    match limiter.check_key(&(path.as_str().into(), method)) {
        Ok(_) => Err(warp::reject()),
        Err(_) => Ok(rate_limit_reply),
    }
}
