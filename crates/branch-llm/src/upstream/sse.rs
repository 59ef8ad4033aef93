//! SSE response -> [`TokenStream`] adapter.

use eventsource_stream::Eventsource;
use futures::{future, StreamExt};
use reqwest::Response;

use super::openai_compat::{parse_frame, Frame};
use super::TokenStream;
use crate::error::LLMError;

/// Convert a streaming completions response into text deltas.
///
/// Stops at the `[DONE]` frame; skips frames without content.
pub fn token_stream_from_sse(response: Response) -> TokenStream {
    let stream = response
        .bytes_stream()
        .eventsource()
        .map(|event| match event {
            Ok(event) => Ok(parse_frame(&event.data)),
            Err(err) => Err(LLMError::Stream(err.to_string())),
        })
        .take_while(|frame| future::ready(!matches!(frame, Ok(Frame::Done))))
        .filter_map(|frame| async move {
            match frame {
                Ok(Frame::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            }
        });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn sse_response(body: &'static str) -> Response {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        reqwest::Client::new()
            .get(format!("{}/sse", mock_server.uri()))
            .send()
            .await
            .expect("response")
    }

    #[tokio::test]
    async fn yields_content_deltas_until_done() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );

        let mut stream = token_stream_from_sse(sse_response(body).await);
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.expect("token"));
        }

        assert_eq!(out, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let body = concat!(
            "data: {oops\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
        );

        let mut stream = token_stream_from_sse(sse_response(body).await);
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.expect("token"));
        }

        assert_eq!(out, vec!["ok"]);
    }
}
