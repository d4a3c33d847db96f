//! Client-side caches filled from API responses. Views read them; only the
//! owning message handlers write them. Every `set` replaces the previous
//! contents outright.

use crate::models::{Conversation, DataSource, SourceOption, Task};

#[derive(Debug, Default)]
pub struct SourceStore {
    sources: Option<Vec<DataSource>>,
    /// Table names of one database, keyed by its connection URL.
    tables: Option<(String, Vec<String>)>,
}

impl SourceStore {
    /// False until the first successful fetch.
    pub fn is_loaded(&self) -> bool {
        self.sources.is_some()
    }

    pub fn all(&self) -> &[DataSource] {
        self.sources.as_deref().unwrap_or_default()
    }

    pub fn get(&self, id: i64) -> Option<&DataSource> {
        self.all().iter().find(|s| s.id == id)
    }

    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.get(id).map(|s| s.name.as_str())
    }

    pub fn options(&self) -> Vec<SourceOption> {
        self.all().iter().map(SourceOption::from).collect()
    }

    pub fn set(&mut self, sources: Vec<DataSource>) {
        self.sources = Some(sources);
    }

    /// Empty unless the last table fetch was for `url`.
    pub fn tables_for(&self, url: &str) -> &[String] {
        match &self.tables {
            Some((owner, tables)) if owner == url => tables,
            _ => &[],
        }
    }

    pub fn set_tables(&mut self, url: String, tables: Vec<String>) {
        self.tables = Some((url, tables));
    }

    pub fn clear_tables(&mut self) {
        self.tables = None;
    }
}

#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    loaded: bool,
}

impl TaskStore {
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn set(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.loaded = true;
    }
}

#[derive(Debug, Default)]
pub struct ChatStore {
    conversations: Vec<Conversation>,
}

impl ChatStore {
    pub fn all(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn set(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }
}

/// Everything cached for the signed-in session. Created at startup and
/// cleared on logout.
#[derive(Debug, Default)]
pub struct AppState {
    pub sources: SourceStore,
    pub tasks: TaskStore,
    pub chats: ChatStore,
}

impl AppState {
    pub fn clear(&mut self) {
        *self = AppState::default();
    }
}
