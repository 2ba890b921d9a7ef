//! Server-sent event decoding for Assistants run streams.
//!
//! [`SseDecoder`] turns arbitrary byte chunks into complete frames; it keeps
//! partial lines across chunk boundaries. [`map_frame`] turns one frame into
//! the [`StreamEvent`]s the run loop consumes.

use serde::Deserialize;

use super::TransportError;
use crate::message::{StreamEvent, ToolInvocationRequest};

/// One dispatched SSE frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// The service ends every stream with `event: done` / `data: [DONE]`.
    pub fn is_done(&self) -> bool {
        self.event.as_deref() == Some("done") || self.data.trim() == "[DONE]"
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0usize;
        while let Some(offset) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.buf[start..end])
                .trim_end_matches('\r')
                .to_string();
            start = end + 1;
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        self.buf.drain(..start);
        frames
    }

    /// Flushes a trailing frame when the body ends without a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.take_frame()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.take_frame();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: DeltaBody,
}

#[derive(Deserialize)]
struct DeltaBody {
    #[serde(default)]
    content: Vec<DeltaContent>,
}

#[derive(Deserialize)]
struct DeltaContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<DeltaText>,
}

#[derive(Deserialize)]
struct DeltaText {
    value: Option<String>,
}

#[derive(Deserialize)]
struct RunObject {
    id: String,
    status: Option<String>,
    required_action: Option<RequiredAction>,
    last_error: Option<LastError>,
}

#[derive(Deserialize)]
struct RequiredAction {
    #[serde(rename = "type")]
    kind: String,
    submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Deserialize)]
struct SubmitToolOutputs {
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct LastError {
    code: Option<String>,
    message: Option<String>,
}

fn parse<T: for<'de> Deserialize<'de>>(event: &str, data: &str) -> Result<T, TransportError> {
    serde_json::from_str(data).map_err(|e| TransportError::Decode {
        what: format!("'{event}' event"),
        reason: e.to_string(),
    })
}

/// Maps one frame to run events. A done frame maps to nothing; callers
/// check [`SseFrame::is_done`] first to end the stream.
pub fn map_frame(frame: &SseFrame) -> Result<Vec<StreamEvent>, TransportError> {
    let Some(event) = frame.event.as_deref() else {
        return Ok(Vec::new());
    };
    let events = match event {
        "thread.run.created" => {
            let run: RunObject = parse(event, &frame.data)?;
            vec![StreamEvent::RunCreated { run_id: run.id }]
        }
        "thread.message.created" => vec![StreamEvent::TextCreated],
        "thread.message.delta" => {
            let delta: MessageDelta = parse(event, &frame.data)?;
            delta
                .delta
                .content
                .into_iter()
                .filter(|c| c.kind == "text")
                .filter_map(|c| c.text.and_then(|t| t.value))
                .map(StreamEvent::TextDelta)
                .collect()
        }
        "thread.run.requires_action" => {
            let run: RunObject = parse(event, &frame.data)?;
            let calls = match run.required_action {
                Some(RequiredAction {
                    kind,
                    submit_tool_outputs: Some(submit),
                }) if kind == "submit_tool_outputs" => submit
                    .tool_calls
                    .into_iter()
                    .map(|c| ToolInvocationRequest::new(c.id, c.function.name, c.function.arguments))
                    .collect(),
                _ => {
                    return Err(TransportError::Protocol(format!(
                        "run {} requires an unsupported action",
                        run.id
                    )))
                }
            };
            vec![StreamEvent::ActionRequired {
                run_id: run.id,
                calls,
            }]
        }
        "thread.run.completed" => vec![StreamEvent::RunCompleted],
        "thread.run.failed" => {
            let run: RunObject = parse(event, &frame.data)?;
            let reason = match run.last_error {
                Some(LastError { code, message }) => match (code, message) {
                    (Some(code), Some(message)) => format!("{code}: {message}"),
                    (None, Some(message)) => message,
                    (Some(code), None) => code,
                    (None, None) => "run failed".to_string(),
                },
                None => "run failed".to_string(),
            };
            vec![StreamEvent::RunFailed(reason)]
        }
        "thread.run.cancelled" | "thread.run.expired" | "thread.run.incomplete" => {
            let run: RunObject = parse(event, &frame.data)?;
            let status = run
                .status
                .unwrap_or_else(|| event.trim_start_matches("thread.run.").to_string());
            vec![StreamEvent::RunFailed(format!("run {status}"))]
        }
        "error" => return Err(TransportError::Protocol(frame.data.clone())),
        other => vec![StreamEvent::Other(other.to_string())],
    };
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: thread.me").is_empty());
        assert!(decoder.push(b"ssage.created\ndata: {\"id\"").is_empty());
        let frames = decoder.push(b":\"m1\"}\n\nevent: done\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("thread.message.created"));
        assert_eq!(frames[0].data, r#"{"id":"m1"}"#);

        let frames = decoder.push(b"data: [DONE]\n\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_done());
    }

    #[test]
    fn test_decoder_crlf_comments_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\r\nevent: x\r\ndata: a\r\ndata: b\r\n\r\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("x".into()),
                data: "a\nb".into()
            }]
        );
    }

    #[test]
    fn test_decoder_finish_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: thread.run.completed\ndata: {}").is_empty());
        let last = decoder.finish().unwrap();
        assert_eq!(last.event.as_deref(), Some("thread.run.completed"));
        assert_eq!(last.data, "{}");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_decoder_keeps_split_utf8() {
        let mut decoder = SseDecoder::new();
        let bytes = "event: e\ndata: héllo\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(decoder.push(&bytes[..split]).is_empty());
        let frames = decoder.push(&bytes[split..]);
        assert_eq!(frames[0].data, "héllo");
    }

    #[test]
    fn test_map_text_delta() {
        let data = r#"{"id":"m1","object":"thread.message.delta","delta":{"content":[
            {"index":0,"type":"text","text":{"value":"Hel","annotations":[]}}]}}"#;
        let events = map_frame(&frame("thread.message.delta", data)).unwrap();
        assert_eq!(events, vec![StreamEvent::TextDelta("Hel".into())]);
    }

    #[test]
    fn test_map_requires_action() {
        let data = r#"{"id":"run_1","status":"requires_action","required_action":{
            "type":"submit_tool_outputs","submit_tool_outputs":{"tool_calls":[
              {"id":"call_a","type":"function","function":{"name":"find_entities_by_kind","arguments":"{\"kind\":\"API\"}"}},
              {"id":"call_b","type":"function","function":{"name":"get_all_entities_of_kind","arguments":"{}"}}
            ]}}}"#;
        let events = map_frame(&frame("thread.run.requires_action", data)).unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::ActionRequired {
                run_id: "run_1".into(),
                calls: vec![
                    ToolInvocationRequest::new("call_a", "find_entities_by_kind", r#"{"kind":"API"}"#),
                    ToolInvocationRequest::new("call_b", "get_all_entities_of_kind", "{}"),
                ],
            }]
        );
    }

    #[test]
    fn test_map_run_failed_reason() {
        let data = r#"{"id":"run_1","status":"failed","last_error":{"code":"rate_limit_exceeded","message":"slow down"}}"#;
        let events = map_frame(&frame("thread.run.failed", data)).unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::RunFailed("rate_limit_exceeded: slow down".into())]
        );

        let expired = map_frame(&frame("thread.run.expired", r#"{"id":"r","status":"expired"}"#)).unwrap();
        assert_eq!(expired, vec![StreamEvent::RunFailed("run expired".into())]);
    }

    #[test]
    fn test_map_lifecycle_and_unknown_events() {
        let created = map_frame(&frame("thread.run.created", r#"{"id":"run_9"}"#)).unwrap();
        assert_eq!(created, vec![StreamEvent::RunCreated { run_id: "run_9".into() }]);

        let step = map_frame(&frame("thread.run.step.created", "{}")).unwrap();
        assert_eq!(step, vec![StreamEvent::Other("thread.run.step.created".into())]);

        assert!(map_frame(&frame("error", r#"{"message":"boom"}"#)).is_err());
        assert!(map_frame(&frame("thread.message.delta", "not json")).is_err());
    }
}
