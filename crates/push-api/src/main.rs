use push_api::PushState;
use recipe_core::config::PushSettings;

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = PushSettings::from_env();
    let state = PushState::from_settings(&settings).await;

    lambda_http::run(push_api::app(state)).await
}
