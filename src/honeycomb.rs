use opentelemetry::sdk::trace::Tracer;
use opentelemetry_otlp::WithExportConfig;

pub fn get_honeycomb_tracer(api_key: &str, dataset: &str) -> Tracer {
    let mut map = tonic::metadata::MetadataMap::with_capacity(2);

    map.insert("x-honeycomb-team", api_key.parse().unwrap());
    map.insert("x-honeycomb-dataset", dataset.parse().unwrap());
    let otlp_exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint("https://api.honeycomb.io")
        .with_metadata(map);
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(otlp_exporter)
        .install_simple()
        .unwrap()
}
