use std::env;

/// Everything the service reads from the environment, gathered once at
/// startup. The clients built from these values are passed into the route
/// filters; nothing reads the environment after boot.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub database_url: String,
    pub session_secret: String,
    pub openai_api_key: String,
    pub spaces_key: String,
    pub spaces_secret: String,
    pub spaces_endpoint: String,
    pub spaces_public_url: String,
    pub covers_bucket: String,
    pub polar_api_url: String,
    pub polar_access_token: String,
    pub polar_webhook_secret: String,
    pub polar_product_id: String,
    pub base_url: String,
    pub honeycomb_api_key: Option<String>,
    pub honeycomb_dataset: Option<String>,
}

impl Configuration {
    pub fn from_env() -> Configuration {
        Configuration {
            database_url: require("DATABASE_URL"),
            session_secret: require("STORYHATCH_SESSION_SECRET"),
            openai_api_key: require("STORYHATCH_OPENAI_API_KEY"),
            spaces_key: require("STORYHATCH_SPACES_KEY"),
            spaces_secret: require("STORYHATCH_SPACES_SECRET"),
            spaces_endpoint: require("STORYHATCH_SPACES_ENDPOINT"),
            spaces_public_url: require("STORYHATCH_SPACES_PUBLIC_URL"),
            covers_bucket: require("STORYHATCH_COVERS_BUCKET"),
            polar_api_url: env::var("STORYHATCH_POLAR_API_URL")
                .unwrap_or_else(|_| "https://api.polar.sh/v1/checkouts/".into()),
            polar_access_token: require("STORYHATCH_POLAR_ACCESS_TOKEN"),
            polar_webhook_secret: require("STORYHATCH_POLAR_WEBHOOK_SECRET"),
            polar_product_id: require("STORYHATCH_POLAR_PRODUCT_ID"),
            base_url: env::var("STORYHATCH_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            honeycomb_api_key: env::var("HONEYCOMB_API_KEY").ok(),
            honeycomb_dataset: env::var("HONEYCOMB_DATASET").ok(),
        }
    }
}

fn require(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("{} must be set", name))
}
