//! Shared fixtures for unit tests: small tools, a recording sink, and a
//! transport that replays scripted event streams.

use anyhow::Result;
use futures::stream;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::message::{Role, StreamEvent, ToolInvocationRequest, ToolOutput};
use crate::run::TurnSink;
use crate::tools::{Tool, ToolRegistry};
use crate::transport::{
    AssistantHandle, AssistantSpec, AssistantSummary, EventStream, SessionTransport,
    TransportError,
};

/// Dataset behind `lookup_by_kind`: exactly one API entity.
pub const LOOKUP_DATASET: &str = r#"[
    {"kind": "API", "metadata": {"provider": "github", "name": "billing-api"}},
    {"kind": "Repository", "metadata": {"provider": "github", "name": "billing"}}
]"#;

struct LookupByKindTool;

#[async_trait::async_trait]
impl Tool for LookupByKindTool {
    fn name(&self) -> &str {
        "lookup_by_kind"
    }
    fn description(&self) -> &str {
        "Find entities of one kind."
    }
    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "kind": { "type": "string" } },
            "required": ["kind"]
        })
    }
    async fn execute(&self, input: Value) -> Result<Value> {
        let kind = input["kind"].as_str().unwrap_or_default().to_lowercase();
        let data: Vec<Value> = serde_json::from_str(LOOKUP_DATASET)?;
        Ok(Value::Array(
            data.into_iter()
                .filter(|e| e["kind"].as_str().map(str::to_lowercase) == Some(kind.clone()))
                .collect(),
        ))
    }
}

struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Returns its input."
    }
    fn schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn execute(&self, input: Value) -> Result<Value> {
        Ok(input)
    }
}

struct FailingTool;

#[async_trait::async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "always_fails"
    }
    fn description(&self) -> &str {
        "Fails every time."
    }
    fn schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn execute(&self, _input: Value) -> Result<Value> {
        anyhow::bail!("data source missing")
    }
}

struct NothingTool;

#[async_trait::async_trait]
impl Tool for NothingTool {
    fn name(&self) -> &str {
        "nothing"
    }
    fn description(&self) -> &str {
        "Reports nothing."
    }
    fn schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }
    async fn execute(&self, _input: Value) -> Result<Value> {
        Ok(Value::Null)
    }
}

/// Counts how many times it ran.
pub struct CountingTool {
    hits: Arc<AtomicUsize>,
}

impl CountingTool {
    pub fn new(hits: Arc<AtomicUsize>) -> Self {
        Self { hits }
    }
}

#[async_trait::async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        "counting"
    }
    fn description(&self) -> &str {
        "Counts invocations."
    }
    fn schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn execute(&self, _input: Value) -> Result<Value> {
        let n = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!(n))
    }
}

pub fn test_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(LookupByKindTool)).unwrap();
    registry.register(Box::new(EchoTool)).unwrap();
    registry.register(Box::new(FailingTool)).unwrap();
    registry.register(Box::new(NothingTool)).unwrap();
    registry
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub segments: usize,
    pub text: String,
    pub fragments: Vec<String>,
    pub tool_calls: Vec<String>,
    pub submissions: Vec<usize>,
}

impl TurnSink for RecordingSink {
    fn segment_started(&mut self) {
        self.segments += 1;
    }
    fn text_delta(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.fragments.push(fragment.to_string());
    }
    fn tool_called(&mut self, request: &ToolInvocationRequest) {
        self.tool_calls.push(request.tool_name.clone());
    }
    fn submitting_outputs(&mut self, count: usize) {
        self.submissions.push(count);
    }
}

/// One scripted stream.
pub struct Script {
    events: Vec<Result<StreamEvent, TransportError>>,
    /// Never end after the events, as a slow service would.
    hang: bool,
}

impl Script {
    pub fn events(events: Vec<StreamEvent>) -> Self {
        Self {
            events: events.into_iter().map(Ok).collect(),
            hang: false,
        }
    }

    /// Events followed by a transport failure.
    pub fn broken(events: Vec<StreamEvent>, error: TransportError) -> Self {
        let mut script = Self::events(events);
        script.events.push(Err(error));
        script
    }

    /// Events followed by silence.
    pub fn hanging(events: Vec<StreamEvent>) -> Self {
        let mut script = Self::events(events);
        script.hang = true;
        script
    }

    fn into_stream(self) -> EventStream {
        let head = stream::iter(self.events);
        if self.hang {
            Box::pin(head.chain(stream::pending()))
        } else {
            Box::pin(head)
        }
    }
}

/// What the scripted transport was asked to do.
#[derive(Debug, Default)]
pub struct TransportLog {
    pub opened: usize,
    pub submitted: Vec<(String, Vec<ToolOutput>)>,
    pub cancelled: Vec<String>,
    pub messages: Vec<(String, Role, String)>,
    pub deleted: Vec<String>,
    pub threads: usize,
    pub specs: Vec<AssistantSpec>,
}

/// A [`SessionTransport`] that replays one [`Script`] per opened stream.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    refuse_threads: bool,
    stall_submit: bool,
    pub log: Mutex<TransportLog>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            refuse_threads: false,
            stall_submit: false,
            log: Mutex::new(TransportLog::default()),
        }
    }

    /// A transport that records submissions but never answers them.
    pub fn stalling_submit(scripts: Vec<Script>) -> Self {
        Self {
            stall_submit: true,
            ..Self::new(scripts)
        }
    }

    /// A transport whose thread creation always fails.
    pub fn refusing_threads() -> Self {
        Self {
            refuse_threads: true,
            ..Self::default()
        }
    }

    fn next_stream(&self) -> Result<EventStream, TransportError> {
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .map(Script::into_stream)
            .ok_or_else(|| TransportError::Protocol("no scripted stream left".into()))
    }
}

#[async_trait::async_trait]
impl SessionTransport for ScriptedTransport {
    async fn create_thread(&self) -> Result<String, TransportError> {
        if self.refuse_threads {
            return Err(TransportError::Status {
                status: 500,
                body: "thread store unavailable".into(),
            });
        }
        let mut log = self.log.lock().unwrap();
        log.threads += 1;
        Ok(format!("thread_{}", log.threads))
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .messages
            .push((thread_id.to_string(), role, content.to_string()));
        Ok(())
    }

    async fn create_or_retrieve_assistant(
        &self,
        spec: &AssistantSpec,
    ) -> Result<AssistantHandle, TransportError> {
        self.log.lock().unwrap().specs.push(spec.clone());
        Ok(match &spec.existing_id {
            Some(id) => AssistantHandle {
                id: id.clone(),
                created: false,
            },
            None => AssistantHandle {
                id: "asst_new".into(),
                created: true,
            },
        })
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .deleted
            .push(assistant_id.to_string());
        Ok(())
    }

    async fn list_assistants(&self) -> Result<Vec<AssistantSummary>, TransportError> {
        Ok(vec![AssistantSummary {
            id: "asst_1".into(),
            name: Some("Helpful Assistant".into()),
            model: "gpt-4o".into(),
        }])
    }

    async fn open_stream(
        &self,
        _thread_id: &str,
        _assistant_id: &str,
    ) -> Result<EventStream, TransportError> {
        self.log.lock().unwrap().opened += 1;
        self.next_stream()
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<EventStream, TransportError> {
        self.log
            .lock()
            .unwrap()
            .submitted
            .push((run_id.to_string(), outputs.to_vec()));
        if self.stall_submit {
            futures::future::pending::<()>().await;
        }
        self.next_stream()
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<(), TransportError> {
        self.log.lock().unwrap().cancelled.push(run_id.to_string());
        Ok(())
    }
}

pub fn text(fragment: &str) -> StreamEvent {
    StreamEvent::TextDelta(fragment.to_string())
}

pub fn action(run_id: &str, calls: &[(&str, &str, &str)]) -> StreamEvent {
    StreamEvent::ActionRequired {
        run_id: run_id.to_string(),
        calls: calls
            .iter()
            .map(|(id, tool, args)| ToolInvocationRequest::new(*id, *tool, *args))
            .collect(),
    }
}
