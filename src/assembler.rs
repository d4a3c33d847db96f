use crate::models::Fragment;
use crate::stream::TurnEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub role: Role,
    pub content: String,
}

/// How a streamed turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    Succeeded,
    Failed(String),
}

/// Chat entries of one session, growing as fragments arrive.
///
/// Fragments are applied in arrival order with no reordering or
/// deduplication. At most one assistant entry is open for appending, and
/// only while a turn is streaming.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<Entry>,
    streaming: bool,
    open: Option<usize>,
}

impl Transcript {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// The assistant entry currently receiving fragments.
    pub fn open_entry(&self) -> Option<&Entry> {
        self.open.and_then(|i| self.entries.get(i))
    }

    pub fn begin_turn(&mut self, question: impl Into<String>) {
        self.entries.push(Entry {
            role: Role::User,
            content: question.into(),
        });
        self.streaming = true;
        self.open = None;
    }

    pub fn apply(&mut self, fragment: &Fragment) {
        if !self.streaming {
            tracing::warn!("Dropping fragment received outside of a turn");
            return;
        }

        match self.open.and_then(|i| self.entries.get_mut(i)) {
            Some(entry) => entry.content.push_str(fragment.text()),
            None => {
                self.entries.push(Entry {
                    role: Role::Assistant,
                    content: fragment.text().to_string(),
                });
                self.open = Some(self.entries.len() - 1);
            }
        }
    }

    /// Closes the turn. Accumulated text is kept either way.
    pub fn finish(&mut self, end: &TurnEnd) {
        if let TurnEnd::Failed(reason) = end {
            tracing::warn!("Chat turn failed: {}", reason);
        }
        self.streaming = false;
        self.open = None;
    }

    pub fn handle(&mut self, event: TurnEvent) -> Option<TurnEnd> {
        let end = match event {
            TurnEvent::Fragments(fragments) => {
                for fragment in &fragments {
                    self.apply(fragment);
                }
                return None;
            }
            TurnEvent::Completed => TurnEnd::Succeeded,
            TurnEvent::Failed(reason) => TurnEnd::Failed(reason),
        };
        if !self.streaming {
            return None;
        }
        self.finish(&end);
        Some(end)
    }

    pub fn clear(&mut self) {
        *self = Transcript::default();
    }
}
