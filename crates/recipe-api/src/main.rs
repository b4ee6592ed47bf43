use recipe_api::AppState;
use recipe_core::config::FetchSettings;
use recipe_core::fetch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = FetchSettings::from_env();
    let http_client = fetch::build_client(&settings)
        .map_err(|e| lambda_http::Error::from(format!("Failed to build HTTP client: {e}")))?;

    info!(timeout_secs = settings.timeout.as_secs(), "Recipe metadata endpoint starting");

    let state = AppState::new(http_client, settings.max_bytes);

    lambda_http::run(recipe_api::app(state)).await
}
