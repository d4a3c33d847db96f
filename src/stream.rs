use serde_json::Value;

use crate::models::Fragment;

/// What a chat surface sees while one turn streams.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Fragments(Vec<Fragment>),
    Completed,
    Failed(String),
}

/// Reassembles event-stream lines across arbitrary network chunk boundaries.
#[derive(Debug, Default)]
pub struct FragmentDecoder {
    pending: Vec<u8>,
}

impl FragmentDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Fragment> {
        self.pending.extend_from_slice(bytes);

        let mut fragments = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            fragments.extend(parse_line(&line));
        }
        fragments
    }

    /// Flushes a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Vec<Fragment> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.pending);
        parse_line(&line)
    }
}

fn parse_line(raw: &[u8]) -> Vec<Fragment> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();

    if line.is_empty() || line.starts_with(':') {
        return Vec::new();
    }
    if line.starts_with("event:") || line.starts_with("id:") || line.starts_with("retry:") {
        return Vec::new();
    }

    let payload = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    if payload.is_empty() || payload == "[DONE]" {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Fragment>(item).ok())
            .collect(),
        Ok(value @ Value::Object(_)) => match serde_json::from_value::<Fragment>(value) {
            Ok(fragment) => vec![fragment],
            Err(e) => {
                tracing::debug!("Skipping stream payload with unexpected shape: {}", e);
                Vec::new()
            }
        },
        Ok(other) => {
            tracing::debug!("Skipping non-object stream payload: {}", other);
            Vec::new()
        }
        Err(e) => {
            tracing::debug!("Skipping undecodable stream line {:?}: {}", payload, e);
            Vec::new()
        }
    }
}
