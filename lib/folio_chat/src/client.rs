use std::time::Duration;

use futures::future::{AbortRegistration, Abortable, FutureExt, LocalBoxFuture};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;

use crate::decoder::{read_event_stream, ChunkCallback};
use crate::error::Error;
use crate::message::ChatMessage;
use crate::payload::extract_fragment;

/// Environment variable holding the chat endpoint URL.
pub const ENDPOINT_ENV: &str = "FOLIO_CHAT_ENDPOINT";

const EVENT_STREAM: &str = "text/event-stream";

/// Per-request knobs of [`ChatService::send_chat_request`].
#[derive(Default)]
pub struct RequestOptions<'a> {
    /// Aborting the paired handle cancels the request and drops the stream.
    pub signal: Option<AbortRegistration>,
    /// Receives each streamed fragment in wire order.
    pub on_chunk: Option<ChunkCallback<'a>>,
}

/// One request/reply cycle against a chat backend.
pub trait ChatService {
    fn send_chat_request<'a>(
        &'a self,
        history: &'a [ChatMessage],
        options: RequestOptions<'a>,
    ) -> LocalBoxFuture<'a, Result<String, Error>>;
}

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    messages: &'a [ChatMessage],
}

/// HTTP chat client posting the full history to a single endpoint.
#[derive(Debug, Clone, Default)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl ChatClient {
    #[must_use]
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.filter(|url| !url.trim().is_empty()),
        }
    }

    /// Reads the endpoint from `FOLIO_CHAT_ENDPOINT`. A missing variable is
    /// not an error here; requests fail with [`Error::Configuration`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::var(ENDPOINT_ENV).ok())
    }

    /// Applies a timeout to the whole request, streamed body included.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, Error> {
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    async fn exchange(
        &self,
        history: &[ChatMessage],
        on_chunk: Option<ChunkCallback<'_>>,
    ) -> Result<String, Error> {
        let endpoint = self.endpoint.as_deref().ok_or(Error::Configuration)?;
        log::debug!("POST {endpoint} with {} messages", history.len());

        let response = self
            .http
            .post(endpoint)
            .header(ACCEPT, "text/event-stream, application/json")
            .json(&ChatRequestBody { messages: history })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .ok()
                .map(|body| body.trim().to_string())
                .filter(|body| !body.is_empty());
            log::debug!("chat endpoint answered {status}: {detail:?}");

            return Err(Error::Service {
                status: Some(status.as_u16()),
                detail,
            });
        }

        let streamed = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.to_ascii_lowercase().contains(EVENT_STREAM));

        let text = if streamed {
            read_event_stream(response.bytes_stream(), on_chunk).await?
        } else {
            let body = response.text().await?;
            log::trace!("response body: {body}");
            extract_fragment(&body).unwrap_or(body).trim().to_string()
        };

        if text.is_empty() {
            return Err(Error::empty_response(status.as_u16()));
        }

        Ok(text)
    }
}

impl ChatService for ChatClient {
    fn send_chat_request<'a>(
        &'a self,
        history: &'a [ChatMessage],
        options: RequestOptions<'a>,
    ) -> LocalBoxFuture<'a, Result<String, Error>> {
        let RequestOptions { signal, on_chunk } = options;
        let exchange = self.exchange(history, on_chunk);

        match signal {
            Some(signal) => Abortable::new(exchange, signal)
                .map(|result| result.unwrap_or(Err(Error::Cancelled)))
                .boxed_local(),
            None => exchange.boxed_local(),
        }
    }
}
