use std::sync::{Arc, Mutex};

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use branch_core::{Role, WireMessage};
use branch_llm::{LLMError, LLMProvider, OpenAICompatProvider, TokenStream};
use branch_server::prompt::{SUMMARY_INSTRUCTION, TRANSCRIPT_HEADER};
use branch_server::{app_config, AppState};
use futures::stream;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Provider that records prompts and replies with fixed tokens.
struct FakeProvider {
    tokens: Vec<&'static str>,
    prompts: Mutex<Vec<Vec<WireMessage>>>,
}

impl FakeProvider {
    fn new(tokens: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            tokens,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn last_prompt(&self) -> Vec<WireMessage> {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for FakeProvider {
    async fn chat_stream(&self, messages: &[WireMessage]) -> branch_llm::Result<TokenStream> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        let tokens: Vec<branch_llm::Result<String>> =
            self.tokens.iter().map(|token| Ok(token.to_string())).collect();
        Ok(Box::pin(stream::iter(tokens)))
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

fn state_with(provider: Option<Arc<dyn LLMProvider>>) -> web::Data<AppState> {
    web::Data::new(AppState::new(provider))
}

#[actix_web::test]
async fn chat_streams_plain_text_deltas() {
    let provider = FakeProvider::new(vec!["Hel", "lo ", "☃"]);
    let app = test::init_service(
        App::new()
            .app_data(state_with(Some(provider.clone())))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({"messages": [{"role": "user", "content": "hi"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/plain; charset=utf-8"
    );
    let body = test::read_body(resp).await;
    assert_eq!(std::str::from_utf8(&body).unwrap(), "Hello ☃");
    assert_eq!(
        provider.last_prompt(),
        vec![WireMessage::new(Role::User, "hi")]
    );
}

#[actix_web::test]
async fn branch_prompt_places_selection_after_history() {
    let provider = FakeProvider::new(vec!["ok"]);
    let app = test::init_service(
        App::new()
            .app_data(state_with(Some(provider.clone())))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/branch")
        .set_json(json!({
            "selection": "the citric acid cycle",
            "history": [{"role": "assistant", "content": "main answer"}],
            "popup_turns": [{"role": "user", "content": "explain simply"}]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let prompt = provider.last_prompt();
    let contents: Vec<&str> = prompt.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "main answer",
            "Selected Context:\nthe citric acid cycle",
            "explain simply"
        ]
    );
}

#[actix_web::test]
async fn summary_prompt_ends_with_instruction() {
    let provider = FakeProvider::new(vec!["- point"]);
    let app = test::init_service(
        App::new()
            .app_data(state_with(Some(provider.clone())))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/branch/summary")
        .set_json(json!({
            "selection": "anchor",
            "history": [],
            "popup_turns": [
                {"role": "user", "content": "q"},
                {"role": "assistant", "content": "a"}
            ]
        }))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(&body[..], b"- point");

    let prompt = provider.last_prompt();
    assert_eq!(prompt[1].content, TRANSCRIPT_HEADER);
    assert_eq!(prompt[2].content, "User: q");
    assert_eq!(prompt[3].content, "Assistant: a");
    assert_eq!(prompt.last().unwrap().content, SUMMARY_INSTRUCTION);
}

#[actix_web::test]
async fn missing_selection_is_a_bad_request() {
    let provider = FakeProvider::new(vec![]);
    let app = test::init_service(
        App::new()
            .app_data(state_with(Some(provider.clone())))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/branch")
        .set_json(json!({"selection": "", "question": "why?"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "selection required"}));
    assert!(provider.prompts.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn missing_api_key_fails_every_endpoint() {
    let app = test::init_service(App::new().app_data(state_with(None)).configure(app_config)).await;

    for uri in ["/api/chat", "/api/branch", "/api/branch/summary"] {
        let req = test::TestRequest::post()
            .uri(uri)
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "GROQ_API_KEY missing"}));
    }
}

#[actix_web::test]
async fn upstream_error_status_and_message_are_relayed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_raw(
            r#"{"error":{"message":"Rate limit reached","type":"tokens"}}"#,
            "application/json",
        ))
        .mount(&mock_server)
        .await;

    let provider: Arc<dyn LLMProvider> =
        Arc::new(OpenAICompatProvider::new("gsk_test").with_base_url(mock_server.uri()));
    let app = test::init_service(
        App::new()
            .app_data(state_with(Some(provider)))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({"messages": [{"role": "user", "content": "hi"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Rate limit reached"}));
}

#[actix_web::test]
async fn upstream_json_error_without_message_is_relayed_as_is() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_raw(
            r#"{"detail":"model overloaded","retry_after":3}"#,
            "application/json",
        ))
        .mount(&mock_server)
        .await;

    let provider: Arc<dyn LLMProvider> =
        Arc::new(OpenAICompatProvider::new("gsk_test").with_base_url(mock_server.uri()));
    let app = test::init_service(
        App::new()
            .app_data(state_with(Some(provider)))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/branch/summary")
        .set_json(json!({"selection": "anchor", "popup_turns": []}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"detail": "model overloaded", "retry_after": 3}));
}

#[actix_web::test]
async fn unreachable_upstream_is_a_bad_gateway() {
    // Nothing listens on the discard port.
    let provider: Arc<dyn LLMProvider> =
        Arc::new(OpenAICompatProvider::new("gsk_test").with_base_url("http://127.0.0.1:9"));
    let app = test::init_service(
        App::new()
            .app_data(state_with(Some(provider)))
            .configure(app_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({"messages": []}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let body: Value = test::read_body_json(resp).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Network error contacting upstream"));
}

#[::core::prelude::v1::test]
fn llm_errors_map_to_app_errors() {
    use actix_web::ResponseError;
    use branch_server::AppError;

    let err = AppError::from(LLMError::Stream("reset".to_string()));
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
}
