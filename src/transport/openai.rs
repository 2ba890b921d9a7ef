//! HTTP client for the OpenAI / Azure OpenAI Assistants API (v2).
//!
//! Contains [`AssistantsClient`], which implements [`SessionTransport`]
//! with `reqwest`. Run streams are read as server-sent events and decoded
//! through [`super::sse`].

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::sse::{map_frame, SseDecoder};
use super::{
    AssistantHandle, AssistantSpec, AssistantSummary, EventStream, SessionTransport,
    TransportError,
};
use crate::config::{Config, ServiceKind};
use crate::message::{Role, ToolOutput};

/// How requests authenticate.
#[derive(Debug, Clone)]
enum Auth {
    /// `Authorization: Bearer <key>` (api.openai.com).
    Bearer(String),
    /// `api-key: <key>` (Azure OpenAI).
    AzureKey(String),
}

/// A configured Assistants API client.
///
/// Cheap to clone; the inner `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct AssistantsClient {
    http: reqwest::Client,
    base_url: String,
    auth: Auth,
    /// Sent as the `api-version` query parameter (Azure only).
    api_version: Option<String>,
}

#[derive(Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Deserialize)]
struct AssistantObject {
    id: String,
    name: Option<String>,
    model: String,
}

#[derive(Deserialize)]
struct AssistantPage {
    data: Vec<AssistantObject>,
    #[serde(default)]
    has_more: bool,
    last_id: Option<String>,
}

#[derive(Serialize)]
struct SubmitToolOutputsBody<'a> {
    tool_outputs: &'a [ToolOutput],
    stream: bool,
}

impl AssistantsClient {
    /// Creates a client from the loaded application config.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key (or, for Azure, no endpoint) is
    /// configured, or if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let service = &config.service;
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        match service.kind() {
            ServiceKind::Azure => {
                let endpoint = service.endpoint.as_deref().filter(|e| !e.is_empty()).context(
                    "No Azure OpenAI endpoint found. Set AZURE_OPENAI_ENDPOINT or configure service.endpoint",
                )?;
                let api_key = service.api_key.clone().filter(|k| !k.is_empty()).context(
                    "No authentication method found. Set AZURE_OPENAI_API_KEY or configure service.api_key",
                )?;
                Ok(Self {
                    http,
                    base_url: format!("{}/openai", endpoint.trim_end_matches('/')),
                    auth: Auth::AzureKey(api_key),
                    api_version: Some(service.api_version().to_string()),
                })
            }
            ServiceKind::OpenAI => {
                let api_key = service.api_key.clone().filter(|k| !k.is_empty()).context(
                    "No API key found for OpenAI. Set OPENAI_API_KEY or configure service.api_key",
                )?;
                let base_url = service
                    .endpoint
                    .as_deref()
                    .filter(|e| !e.is_empty())
                    .unwrap_or(crate::constants::OPENAI_BASE_URL)
                    .trim_end_matches('/')
                    .to_string();
                Ok(Self {
                    http,
                    base_url,
                    auth: Auth::Bearer(api_key),
                    api_version: None,
                })
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let mut builder = self
            .http
            .request(method, url)
            .header("OpenAI-Beta", crate::constants::ASSISTANTS_BETA_HEADER);
        builder = match &self.auth {
            Auth::Bearer(key) => builder.bearer_auth(key),
            Auth::AzureKey(key) => builder.header("api-key", key),
        };
        if let Some(version) = &self.api_version {
            builder = builder.query(&[("api-version", version.as_str())]);
        }
        builder
    }

    async fn send(builder: RequestBuilder) -> Result<Response, TransportError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "assistants request failed");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, TransportError> {
        let resp = Self::send(builder).await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode {
            what: what.to_string(),
            reason: e.to_string(),
        })
    }

    async fn stream(&self, builder: RequestBuilder) -> Result<EventStream, TransportError> {
        let resp = Self::send(builder.header("Accept", "text/event-stream")).await?;
        Ok(event_stream(resp))
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<AssistantObject, TransportError> {
        Self::send_json(
            self.request(Method::GET, &format!("assistants/{assistant_id}")),
            "assistant",
        )
        .await
    }
}

/// Adapts an SSE response body into decoded run events.
///
/// The stream ends at the service's `done` frame; a body that ends without
/// one simply ends the stream, leaving the run loop to judge completeness.
fn event_stream(resp: Response) -> EventStream {
    let mut bytes = resp.bytes_stream();
    let stream = async_stream::stream! {
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(err = %e, "error reading run stream");
                    yield Err(TransportError::Http(e));
                    return;
                }
            };
            for frame in decoder.push(&chunk) {
                if frame.is_done() {
                    return;
                }
                match map_frame(&frame) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }
        if let Some(frame) = decoder.finish() {
            if !frame.is_done() {
                match map_frame(&frame) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(e) => yield Err(e),
                }
            }
        }
    };
    Box::pin(stream)
}

#[async_trait::async_trait]
impl SessionTransport for AssistantsClient {
    async fn create_thread(&self) -> Result<String, TransportError> {
        let thread: IdObject =
            Self::send_json(self.request(Method::POST, "threads").json(&json!({})), "thread")
                .await?;
        info!(thread_id = %thread.id, "thread created");
        Ok(thread.id)
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), TransportError> {
        let body = json!({ "role": role, "content": content });
        let message: IdObject = Self::send_json(
            self.request(Method::POST, &format!("threads/{thread_id}/messages"))
                .json(&body),
            "message",
        )
        .await?;
        debug!(thread_id, message_id = %message.id, "message created");
        Ok(())
    }

    async fn create_or_retrieve_assistant(
        &self,
        spec: &AssistantSpec,
    ) -> Result<AssistantHandle, TransportError> {
        if let Some(id) = &spec.existing_id {
            let assistant = self.retrieve_assistant(id).await?;
            info!(assistant_id = %assistant.id, model = %assistant.model, "assistant retrieved");
            return Ok(AssistantHandle {
                id: assistant.id,
                created: false,
            });
        }

        let tools: Vec<_> = spec
            .tools
            .iter()
            .map(|t| json!({ "type": "function", "function": t }))
            .collect();
        let body = json!({
            "name": spec.name,
            "description": spec.description,
            "instructions": spec.instructions,
            "model": spec.model,
            "tools": tools,
        });
        let assistant: AssistantObject = Self::send_json(
            self.request(Method::POST, "assistants").json(&body),
            "assistant",
        )
        .await?;
        info!(assistant_id = %assistant.id, model = %assistant.model, "assistant created");
        Ok(AssistantHandle {
            id: assistant.id,
            created: true,
        })
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), TransportError> {
        Self::send(self.request(Method::DELETE, &format!("assistants/{assistant_id}"))).await?;
        info!(assistant_id, "assistant deleted");
        Ok(())
    }

    async fn list_assistants(&self) -> Result<Vec<AssistantSummary>, TransportError> {
        let mut all = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut builder = self
                .request(Method::GET, "assistants")
                .query(&[("limit", "100")]);
            if let Some(cursor) = &after {
                builder = builder.query(&[("after", cursor.as_str())]);
            }
            let page: AssistantPage = Self::send_json(builder, "assistant list").await?;
            all.extend(page.data.into_iter().map(|a| AssistantSummary {
                id: a.id,
                name: a.name,
                model: a.model,
            }));
            match (page.has_more, page.last_id) {
                (true, Some(last)) => after = Some(last),
                _ => break,
            }
        }
        Ok(all)
    }

    async fn open_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<EventStream, TransportError> {
        debug!(thread_id, assistant_id, "opening run stream");
        let body = json!({ "assistant_id": assistant_id, "stream": true });
        self.stream(
            self.request(Method::POST, &format!("threads/{thread_id}/runs"))
                .json(&body),
        )
        .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<EventStream, TransportError> {
        debug!(thread_id, run_id, count = outputs.len(), "submitting tool outputs");
        let body = SubmitToolOutputsBody {
            tool_outputs: outputs,
            stream: true,
        };
        self.stream(
            self.request(
                Method::POST,
                &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            )
            .json(&body),
        )
        .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), TransportError> {
        Self::send(self.request(
            Method::POST,
            &format!("threads/{thread_id}/runs/{run_id}/cancel"),
        ))
        .await?;
        info!(thread_id, run_id, "run cancelled");
        Ok(())
    }
}
