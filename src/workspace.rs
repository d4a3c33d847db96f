use std::fmt;

use thiserror::Error;

use crate::assembler::{Transcript, TurnEnd};
use crate::models::{AskRequest, NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
use crate::stream::TurnEvent;

/// Conversation id reserved for the source-less task assistant.
pub const TASK_CONVERSATION_SOURCE: i64 = 0;
pub const TASK_CONVERSATION_TITLE: &str = "Task Assistant Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    pub const ALL: [StatusFilter; 3] = [StatusFilter::All, StatusFilter::Pending, StatusFilter::Completed];

    fn matches(&self, status: TaskStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == TaskStatus::Pending,
            StatusFilter::Completed => status == TaskStatus::Completed,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatusFilter::All => "All",
            StatusFilter::Pending => "Pending",
            StatusFilter::Completed => "Completed",
        };
        write!(f, "{}", label)
    }
}

pub fn filter_tasks(tasks: &[Task], filter: StatusFilter) -> Vec<&Task> {
    tasks.iter().filter(|t| filter.matches(t.status)).collect()
}

/// Only ever flips between completed and pending.
pub fn toggle_patch(task: &Task) -> TaskPatch {
    TaskPatch {
        status: Some(task.status.toggled()),
        ..Default::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task title is required")]
    EmptyTitle,
}

/// The direct-create compose form.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub data_source_id: Option<i64>,
}

impl TaskDraft {
    pub fn to_request(&self) -> Result<NewTask, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let description = self.description.trim();
        Ok(NewTask {
            title: title.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            status: Some(TaskStatus::Pending),
            priority: Some(self.priority),
            data_source_id: self.data_source_id,
        })
    }

    pub fn clear(&mut self) {
        *self = TaskDraft::default();
    }
}

/// Why a chat message was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendBlocked {
    #[error("Type a message first")]
    Empty,
    #[error("Chat is still initializing, please wait")]
    Initializing,
    #[error("Wait for the current answer to finish")]
    Busy,
}

/// What the workspace must do after a turn ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    RefreshTasks,
    NotifyFailure(String),
}

/// Natural-language task control over the task-global conversation.
#[derive(Debug, Default)]
pub struct TaskAssistant {
    conversation: Option<i64>,
    unavailable: bool,
    pub transcript: Transcript,
    pub input: String,
}

impl TaskAssistant {
    pub fn conversation(&self) -> Option<i64> {
        self.conversation
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    pub fn on_initiated(&mut self, result: Result<i64, String>) {
        match result {
            Ok(id) => {
                tracing::debug!("Task assistant conversation {}", id);
                self.conversation = Some(id);
                self.unavailable = false;
            }
            Err(e) => {
                tracing::error!("Failed to initiate task conversation: {}", e);
                self.conversation = None;
                self.unavailable = true;
            }
        }
    }

    pub fn can_send(&self) -> bool {
        self.conversation.is_some() && !self.transcript.is_streaming() && !self.input.trim().is_empty()
    }

    /// Opens a turn for the current input and returns the request to stream.
    pub fn prepare_send(&mut self, model: &str) -> Result<AskRequest, SendBlocked> {
        let question = self.input.trim().to_string();
        if question.is_empty() {
            return Err(SendBlocked::Empty);
        }
        let conversation_id = self.conversation.ok_or(SendBlocked::Initializing)?;
        if self.transcript.is_streaming() {
            return Err(SendBlocked::Busy);
        }

        self.input.clear();
        self.transcript.begin_turn(question.clone());
        Ok(AskRequest {
            question,
            conversation_id,
            dataset_id: TASK_CONVERSATION_SOURCE,
            dataset_ids: None,
            selected_tables: Vec::new(),
            kind: "task".to_string(),
            llm_model: model.to_string(),
        })
    }

    pub fn handle(&mut self, event: TurnEvent) -> Option<FollowUp> {
        match self.transcript.handle(event)? {
            TurnEnd::Succeeded => Some(FollowUp::RefreshTasks),
            TurnEnd::Failed(reason) => Some(FollowUp::NotifyFailure(reason)),
        }
    }
}
