use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use branch_llm::{LLMProvider, OpenAICompatProvider};

use crate::config::ServerConfig;
use crate::error::{AppError, Result};
use crate::handlers;

/// Shared handler state. Without an API key there is no provider and every
/// request answers 500.
pub struct AppState {
    provider: Option<Arc<dyn LLMProvider>>,
}

impl AppState {
    pub fn new(provider: Option<Arc<dyn LLMProvider>>) -> Self {
        Self { provider }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let provider = config.api_key.as_ref().map(|key| {
            Arc::new(
                OpenAICompatProvider::new(key.clone())
                    .with_base_url(config.base_url.clone())
                    .with_model(config.model.clone()),
            ) as Arc<dyn LLMProvider>
        });
        Self::new(provider)
    }

    pub fn provider(&self) -> Result<&dyn LLMProvider> {
        self.provider.as_deref().ok_or(AppError::MissingApiKey)
    }
}

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").configure(handlers::config));
}

pub async fn run(config: ServerConfig) -> io::Result<()> {
    let state = web::Data::new(AppState::from_config(&config));
    if config.api_key.is_none() {
        log::warn!("GROQ_API_KEY is not set; completion requests will fail");
    }

    let (host, port) = config.bind_address();
    log::info!(
        "Starting branch proxy on {}:{} (model: {}, upstream: {})",
        host,
        port,
        config.model,
        config.base_url
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .bind((host, port))?
    .run()
    .await
}
