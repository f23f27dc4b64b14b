mod configuration;
mod error;
mod routes;
mod state;

use axum::http::HeaderValue;
use scixplain::datasources::wiki::WikiPageStore;
use scixplain::providers::openai::OpenAiProvider;
use scixplain::token_counter::TokenCounter;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = configuration::Settings::new()?;
    let addr = settings.server.socket_addr()?;

    let model = settings.provider.model.clone();
    let provider = OpenAiProvider::new(settings.provider.into_config())?;
    let wiki = WikiPageStore::new(settings.wiki.into_config())?;

    let mut token_counter = TokenCounter::new()?;
    if let Err(err) = token_counter.add_model(&model) {
        warn!(%model, "no tokenizer for model, counting with o200k_base: {}", err);
    }

    let state = state::AppState {
        provider: Arc::new(provider),
        wiki: Arc::new(wiki),
        token_counter: Arc::new(token_counter),
        communicator: settings.communicator.into_config(model)?,
        request_timeout: settings.server.request_timeout(),
    };

    let cors = if settings.server.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = settings
            .server
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new().allow_origin(origins)
    }
    .allow_methods(Any)
    .allow_headers(Any);

    let app = routes::configure(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
