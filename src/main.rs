use storyhatch::configuration::Configuration;
use storyhatch::connection_pool::establish_connection_pool;
use storyhatch::controllers::{self, AppContext};
use storyhatch::honeycomb::get_honeycomb_tracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = Configuration::from_env();
    init_tracing(&config);
    let pool = establish_connection_pool(&config.database_url);
    let ctx = AppContext::new(&config, pool);
    controllers::get_server_future(&ctx).await;
}

fn init_tracing(config: &Configuration) {
    match (&config.honeycomb_api_key, &config.honeycomb_dataset) {
        (Some(api_key), Some(dataset)) => {
            let telemetry =
                tracing_opentelemetry::layer().with_tracer(get_honeycomb_tracer(api_key, dataset));
            let subscriber = Registry::default()
                .with(telemetry)
                .with(tracing_subscriber::fmt::Layer::default());
            tracing::subscriber::set_global_default(subscriber)
                .expect("Failed to install tracing subscriber.");
        }
        _ => tracing_subscriber::fmt::init(),
    }
}
