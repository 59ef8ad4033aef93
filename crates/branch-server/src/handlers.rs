use actix_web::{web, HttpResponse};
use branch_core::WireMessage;
use branch_llm::LLMProvider;
use bytes::Bytes;
use futures::StreamExt;

use crate::error::{AppError, Result};
use crate::prompt::{
    branch_messages, chat_messages, parse_body, summary_messages, BranchBody, ChatBody,
    SummaryBody,
};
use crate::server::AppState;

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/chat", web::post().to(chat))
        .route("/branch", web::post().to(branch))
        .route("/branch/summary", web::post().to(branch_summary));
}

pub async fn chat(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let provider = state.provider()?;
    let body: ChatBody = parse_body(&body);
    stream_completion(provider, chat_messages(&body)).await
}

pub async fn branch(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let provider = state.provider()?;
    let body: BranchBody = parse_body(&body);
    stream_completion(provider, branch_messages(&body)?).await
}

pub async fn branch_summary(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let provider = state.provider()?;
    let body: SummaryBody = parse_body(&body);
    stream_completion(provider, summary_messages(&body)?).await
}

/// Start the upstream completion and re-stream its text deltas.
///
/// Upstream failures are reported before the response starts; once
/// streaming, an error aborts the body.
async fn stream_completion(
    provider: &dyn LLMProvider,
    messages: Vec<WireMessage>,
) -> Result<HttpResponse> {
    log::info!(
        "Streaming completion: model={}, messages={}",
        provider.model(),
        messages.len()
    );

    let tokens = provider.chat_stream(&messages).await.map_err(|err| {
        log::warn!("Upstream request failed: {}", err);
        AppError::from(err)
    })?;

    let body = tokens.map(|token| {
        token.map(Bytes::from).map_err(|err| {
            log::error!("Upstream stream error: {}", err);
            AppError::from(err)
        })
    });

    Ok(HttpResponse::Ok()
        .content_type(TEXT_CONTENT_TYPE)
        .streaming(body))
}
