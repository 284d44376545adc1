#[macro_use]
extern crate diesel;

pub mod auth;
pub mod binder;
pub mod clients;
pub mod configuration;
pub mod connection_pool;
pub mod controllers;
pub mod flow;
pub mod generation;
pub mod honeycomb;
pub mod models;
pub mod outline;
pub mod rate_limit;
pub mod schema;
pub mod storage;
pub mod typeset;
pub mod usage;
pub mod util;
pub mod viewer;
