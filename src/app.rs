use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use iced::task::Handle;
use iced::widget::{column, container};
use iced::{time, Element, Length, Subscription, Task, Theme};

use crate::answer::{HistoryMessage, SqlToggles};
use crate::api::chat::turn_events;
use crate::api::sources::UploadKind;
use crate::api::{ApiClient, ApiError};
use crate::assembler::{Transcript, TurnEnd};
use crate::config::Config;
use crate::models::{
    self, format_health_report, AskRequest, Conversation, DataSource, HealthSuggestion, SourceOption, TaskPriority,
};
use crate::selection::{Fetch, SourceSelection};
use crate::session::{Session, User};
use crate::storage::LocalStorage;
use crate::store::AppState;
use crate::stream::TurnEvent;
use crate::toast::Toasts;
use crate::ui;
use crate::workspace::{
    toggle_patch, FollowUp, SendBlocked, StatusFilter, TaskAssistant, TaskDraft, TASK_CONVERSATION_SOURCE,
    TASK_CONVERSATION_TITLE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Sources,
    Chat,
    History,
    Tasks,
    Account,
}

impl Screen {
    pub const ALL: [Screen; 5] = [Screen::Sources, Screen::Chat, Screen::History, Screen::Tasks, Screen::Account];

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Sources => "Data Sources",
            Screen::Chat => "Chat",
            Screen::History => "History",
            Screen::Tasks => "Tasks",
            Screen::Account => "Account",
        }
    }
}

/// Lifecycle of one fetch as the views see it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestStatus {
    #[default]
    Idle,
    Pending,
    Failed(String),
}

impl RequestStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }

    fn settle<T>(&mut self, result: &Result<T, String>) {
        *self = match result {
            Ok(_) => RequestStatus::Idle,
            Err(e) => RequestStatus::Failed(e.clone()),
        };
    }
}

/// Which structured answer list an SQL toggle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Chat,
    History,
}

#[derive(Debug, Clone)]
pub enum Message {
    Navigate(Screen),
    Tick,
    DismissToast(usize),
    ModelSelected(String),

    LoadSources,
    SourcesLoaded(Result<Vec<DataSource>, String>),
    RequestDelete(i64),
    CancelDelete,
    ConfirmDelete,
    SourceDeleted(Result<(), String>),
    AnalyzeHealth(i64),
    HealthAnalyzed(i64, Result<Vec<HealthSuggestion>, String>),
    DismissHealth,
    ConnectNameChanged(String),
    ConnectUrlChanged(String),
    ConnectSubmit,
    UploadPathChanged(String),
    UploadSubmit,
    SourceAdded(Result<i64, String>),

    OpenSource(i64),
    PrimarySelected(SourceOption),
    SecondarySelected(SourceOption),
    RemoveSecondary(i64),
    TableSelected(String),
    TablesLoaded(String, Result<Vec<String>, String>),
    SuggestionsLoaded(i64, Result<Vec<String>, String>),
    SuggestionPicked(usize),
    SourceConversationReady(i64, Result<i64, String>),
    ChatInputChanged(String),
    ChatSubmit,
    AskSource(String),
    SourceTurn(TurnEvent),
    SourceHistoryLoaded(i64, Result<Vec<HistoryMessage>, String>),
    ToggleSql(Surface, usize, usize),

    ConversationsLoaded(Result<Vec<Conversation>, String>),
    OpenConversation(i64),
    HistoryLoaded(i64, Result<Vec<HistoryMessage>, String>),

    TasksLoaded(Result<Vec<models::Task>, String>),
    TaskTitleChanged(String),
    TaskDescriptionChanged(String),
    TaskPrioritySelected(TaskPriority),
    TaskSourceSelected(SourceOption),
    CreateTask,
    TaskCreated(Result<i64, String>),
    ToggleTask(i64),
    TaskUpdated(Result<(), String>),
    DeleteTask(i64),
    TaskDeleted(Result<(), String>),
    FilterSelected(StatusFilter),
    AssistantReady(u64, Result<i64, String>),
    AssistantInputChanged(String),
    AssistantSubmit,
    AssistantTurn(TurnEvent),

    TokenChanged(String),
    NameChanged(String),
    SignIn,
    SignOut,
}

#[derive(Default)]
pub struct SourcesPanel {
    pub status: RequestStatus,
    pub pending_delete: Option<i64>,
    pub health: Option<(i64, String)>,
    pub connect_name: String,
    pub connect_url: String,
    pub upload_path: String,
    pub submitting: bool,
}

/// Chat about one primary source, plus any attached secondaries.
#[derive(Default)]
pub struct SourceChat {
    pub selection: SourceSelection,
    pub conversation: Option<i64>,
    pub transcript: Transcript,
    pub history: Vec<HistoryMessage>,
    pub sql: SqlToggles,
    pub input: String,
    stream: Option<Handle>,
}

#[derive(Default)]
pub struct HistoryPanel {
    pub status: RequestStatus,
    pub selected: Option<i64>,
    pub loading: RequestStatus,
    pub messages: Vec<HistoryMessage>,
    pub sql: SqlToggles,
}

#[derive(Default)]
pub struct TaskWorkspace {
    pub status: RequestStatus,
    pub draft: TaskDraft,
    pub filter: StatusFilter,
    pub assistant: TaskAssistant,
    /// Bumped each time the task screen is entered.
    mount: u64,
    stream: Option<Handle>,
}

#[derive(Default)]
pub struct AccountForm {
    pub token: String,
    pub name: String,
}

pub struct App {
    pub config: Config,
    session: Arc<Session>,
    client: ApiClient,
    pub state: AppState,
    pub screen: Screen,
    pub toasts: Toasts,
    pub model: String,
    pub sources: SourcesPanel,
    pub chat: SourceChat,
    pub history: HistoryPanel,
    pub workspace: TaskWorkspace,
    pub account: AccountForm,
}

impl App {
    pub fn new(config: Config) -> (Self, Task<Message>) {
        let storage = match LocalStorage::open_default() {
            Ok(storage) => Some(storage),
            Err(e) => {
                tracing::warn!("Local storage unavailable, session will not persist: {}", e);
                None
            }
        };
        App::with_session(config, Arc::new(Session::load(storage)))
    }

    fn with_session(config: Config, session: Arc<Session>) -> (Self, Task<Message>) {
        if !session.is_signed_in() {
            if let Some(token) = config.api.token.clone() {
                let user = User {
                    access_token: token,
                    name: None,
                };
                if let Err(e) = session.sign_in(user) {
                    tracing::warn!("Could not store configured token: {}", e);
                }
            }
        }

        let client = ApiClient::new(config.api.base_url.clone(), session.clone());
        tracing::info!("Using API at {}", client.base_url());

        let signed_in = session.is_signed_in();
        let mut app = App {
            model: config.api.default_model.clone(),
            config,
            session,
            client,
            state: AppState::default(),
            screen: if signed_in { Screen::Sources } else { Screen::Account },
            toasts: Toasts::default(),
            sources: SourcesPanel::default(),
            chat: SourceChat::default(),
            history: HistoryPanel::default(),
            workspace: TaskWorkspace::default(),
            account: AccountForm::default(),
        };

        let startup = if signed_in { app.load_sources() } else { Task::none() };
        (app, startup)
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_signed_in()
    }

    pub fn user_name(&self) -> Option<String> {
        self.session.user().and_then(|u| u.name)
    }

    /// Runs one API call and maps its outcome into a message.
    fn request<T, F, Fut>(&self, call: F, on_done: impl Fn(Result<T, String>) -> Message + Send + 'static) -> Task<Message>
    where
        F: FnOnce(ApiClient) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
    {
        let pending = call(self.client.clone());
        Task::perform(
            async move {
                pending.await.map_err(|e| {
                    tracing::warn!("Request failed: {}", e);
                    e.to_string()
                })
            },
            on_done,
        )
    }

    fn stream_turn(&self, request: AskRequest, on_event: fn(TurnEvent) -> Message) -> (Task<Message>, Handle) {
        Task::run(turn_events(self.client.clone(), request), on_event).abortable()
    }

    fn load_sources(&mut self) -> Task<Message> {
        self.sources.status = RequestStatus::Pending;
        self.request(|c| async move { c.list_sources().await }, Message::SourcesLoaded)
    }

    fn load_tasks(&mut self) -> Task<Message> {
        self.workspace.status = RequestStatus::Pending;
        self.request(|c| async move { c.list_tasks().await }, Message::TasksLoaded)
    }

    fn load_conversations(&mut self) -> Task<Message> {
        self.history.status = RequestStatus::Pending;
        self.request(|c| async move { c.list_conversations().await }, Message::ConversationsLoaded)
    }

    /// Tables of the current primary database, if it has any loaded.
    pub fn primary_tables(&self) -> &[String] {
        match self.chat.selection.primary().and_then(|s| s.connection_string()) {
            Some(url) => self.state.sources.tables_for(url),
            None => &[],
        }
    }

    fn fetch(&mut self, fetches: Vec<Fetch>) -> Task<Message> {
        let mut tasks = Vec::new();
        for fetch in fetches {
            tasks.push(match fetch {
                Fetch::Sources => self.load_sources(),
                Fetch::Tables(url) => {
                    let tag = url.clone();
                    self.request(
                        move |c| async move { c.source_tables(&url).await },
                        move |r| Message::TablesLoaded(tag.clone(), r),
                    )
                }
                Fetch::Suggestions(id) => self.request(
                    move |c| async move { c.suggest_questions(id).await },
                    move |r| Message::SuggestionsLoaded(id, r),
                ),
            });
        }
        Task::batch(tasks)
    }

    /// Stops listening to the source chat stream. The server is not told.
    fn abandon_chat_stream(&mut self) {
        if let Some(handle) = self.chat.stream.take() {
            handle.abort();
        }
        if self.chat.transcript.is_streaming() {
            self.chat.transcript.finish(&TurnEnd::Failed("abandoned".to_string()));
        }
    }

    fn abandon_assistant_stream(&mut self) {
        if let Some(handle) = self.workspace.stream.take() {
            handle.abort();
        }
        if self.workspace.assistant.transcript.is_streaming() {
            self.workspace
                .assistant
                .transcript
                .finish(&TurnEnd::Failed("abandoned".to_string()));
        }
    }

    fn select_source(&mut self, id: i64) -> Task<Message> {
        self.abandon_chat_stream();
        self.chat = SourceChat::default();
        self.state.sources.clear_tables();
        self.screen = Screen::Chat;

        let fetches = self.chat.selection.select_primary(id, &self.state.sources);
        let title = self
            .state
            .sources
            .name_of(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Source {}", id));
        let initiate = self.request(
            move |c| async move { c.initiate_conversation(id, &title).await },
            move |r| Message::SourceConversationReady(id, r),
        );
        Task::batch([self.fetch(fetches), initiate])
    }

    fn ask_source(&mut self, question: String) -> Task<Message> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Task::none();
        }
        if self.chat.transcript.is_streaming() {
            self.toasts.warn(SendBlocked::Busy.to_string());
            return Task::none();
        }
        let Some(conversation) = self.chat.conversation else {
            self.toasts.warn(SendBlocked::Initializing.to_string());
            return Task::none();
        };
        let Some(request) = self.chat.selection.ask_request(conversation, question.clone(), &self.model) else {
            self.toasts.warn("Pick a data source first");
            return Task::none();
        };

        self.chat.input.clear();
        self.chat.transcript.begin_turn(question);
        let (task, handle) = self.stream_turn(request, Message::SourceTurn);
        self.chat.stream = Some(handle);
        task
    }

    fn navigate(&mut self, screen: Screen) -> Task<Message> {
        if screen == self.screen {
            return Task::none();
        }
        match self.screen {
            Screen::Tasks => self.abandon_assistant_stream(),
            Screen::Chat => self.abandon_chat_stream(),
            _ => {}
        }
        self.screen = screen;

        match screen {
            Screen::Sources => self.load_sources(),
            Screen::Chat if !self.state.sources.is_loaded() => self.load_sources(),
            Screen::History => self.load_conversations(),
            Screen::Tasks => {
                self.workspace.assistant = TaskAssistant::default();
                self.workspace.mount += 1;
                let mount = self.workspace.mount;
                let initiate = self.request(
                    |c| async move {
                        c.initiate_conversation(TASK_CONVERSATION_SOURCE, TASK_CONVERSATION_TITLE)
                            .await
                    },
                    move |r| Message::AssistantReady(mount, r),
                );
                let sources = if self.state.sources.is_loaded() {
                    Task::none()
                } else {
                    self.load_sources()
                };
                Task::batch([self.load_tasks(), initiate, sources])
            }
            _ => Task::none(),
        }
    }

    fn sign_out(&mut self) {
        self.abandon_chat_stream();
        self.abandon_assistant_stream();
        if let Err(e) = self.session.sign_out() {
            tracing::warn!("Could not clear stored session: {}", e);
        }
        self.state.clear();
        self.sources = SourcesPanel::default();
        self.chat = SourceChat::default();
        self.history = HistoryPanel::default();
        self.workspace = TaskWorkspace::default();
        self.screen = Screen::Account;
        self.toasts.info("Signed out");
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Navigate(screen) => self.navigate(screen),
            Message::Tick => {
                self.toasts.expire(Instant::now());
                Task::none()
            }
            Message::DismissToast(index) => {
                self.toasts.dismiss(index);
                Task::none()
            }
            Message::ModelSelected(model) => {
                self.model = model;
                Task::none()
            }

            Message::LoadSources => self.load_sources(),
            Message::SourcesLoaded(result) => {
                self.sources.status.settle(&result);
                match result {
                    Ok(sources) => {
                        self.state.sources.set(sources);
                        if self.chat.selection.primary_id().is_some() {
                            let fetches = self.chat.selection.on_sources_loaded(&self.state.sources);
                            return self.fetch(fetches);
                        }
                    }
                    Err(e) => self.toasts.error(format!("Failed to load data sources: {}", e)),
                }
                Task::none()
            }
            Message::RequestDelete(id) => {
                self.sources.pending_delete = Some(id);
                Task::none()
            }
            Message::CancelDelete => {
                self.sources.pending_delete = None;
                Task::none()
            }
            Message::ConfirmDelete => {
                let Some(id) = self.sources.pending_delete.take() else {
                    return Task::none();
                };
                self.request(move |c| async move { c.delete_source(id).await }, Message::SourceDeleted)
            }
            Message::SourceDeleted(result) => match result {
                Ok(()) => {
                    self.toasts.success("Data source deleted");
                    self.load_sources()
                }
                Err(e) => {
                    self.toasts.error(format!("Failed to delete data source: {}", e));
                    Task::none()
                }
            },
            Message::AnalyzeHealth(id) => {
                self.sources.health = None;
                self.toasts.info("Analyzing data health...");
                self.request(
                    move |c| async move { c.analyze_health(id).await },
                    move |r| Message::HealthAnalyzed(id, r),
                )
            }
            Message::HealthAnalyzed(id, result) => {
                match result {
                    Ok(suggestions) => match format_health_report(&suggestions) {
                        Some(report) => self.sources.health = Some((id, report)),
                        None => self.toasts.success("Data looks healthy!"),
                    },
                    Err(e) => self.toasts.error(format!("Health analysis failed: {}", e)),
                }
                Task::none()
            }
            Message::DismissHealth => {
                self.sources.health = None;
                Task::none()
            }
            Message::ConnectNameChanged(value) => {
                self.sources.connect_name = value;
                Task::none()
            }
            Message::ConnectUrlChanged(value) => {
                self.sources.connect_url = value;
                Task::none()
            }
            Message::ConnectSubmit => {
                let name = self.sources.connect_name.trim().to_string();
                let url = self.sources.connect_url.trim().to_string();
                if name.is_empty() || url.is_empty() {
                    self.toasts.warn("Both a name and a connection URL are required");
                    return Task::none();
                }
                self.sources.submitting = true;
                self.request(
                    move |c| async move { c.connect_source(&name, &url).await },
                    Message::SourceAdded,
                )
            }
            Message::UploadPathChanged(value) => {
                self.sources.upload_path = value;
                Task::none()
            }
            Message::UploadSubmit => {
                let path = PathBuf::from(self.sources.upload_path.trim());
                let Some(kind) = UploadKind::detect(&path) else {
                    self.toasts
                        .warn("Unsupported file type. Use .csv, .xlsx, .xls, .pdf, .doc or .txt");
                    return Task::none();
                };
                self.sources.submitting = true;
                self.request(
                    move |c| async move { c.upload_source(&path, kind).await },
                    Message::SourceAdded,
                )
            }
            Message::SourceAdded(result) => {
                self.sources.submitting = false;
                match result {
                    Ok(id) => {
                        tracing::info!("Registered data source {}", id);
                        self.sources.connect_name.clear();
                        self.sources.connect_url.clear();
                        self.sources.upload_path.clear();
                        self.toasts.success("Data source added");
                        self.load_sources()
                    }
                    Err(e) => {
                        self.toasts.error(format!("Failed to add data source: {}", e));
                        Task::none()
                    }
                }
            }

            Message::OpenSource(id) => self.select_source(id),
            Message::PrimarySelected(option) => self.select_source(option.id),
            Message::SecondarySelected(option) => {
                self.chat.selection.add_secondary(option.id);
                Task::none()
            }
            Message::RemoveSecondary(id) => {
                self.chat.selection.remove_secondary(id);
                Task::none()
            }
            Message::TableSelected(table) => {
                if self.primary_tables().contains(&table) {
                    self.chat.selection.select_table(table);
                }
                Task::none()
            }
            Message::TablesLoaded(url, result) => {
                let current = self
                    .chat
                    .selection
                    .primary()
                    .and_then(|s| s.connection_string());
                if current != Some(url.as_str()) {
                    return Task::none();
                }
                match result {
                    Ok(tables) => self.state.sources.set_tables(url, tables),
                    Err(e) => {
                        self.state.sources.clear_tables();
                        self.toasts.error(format!("Failed to load tables: {}", e));
                    }
                }
                Task::none()
            }
            Message::SuggestionsLoaded(id, result) => {
                if self.chat.selection.primary_id() != Some(id) {
                    return Task::none();
                }
                match result {
                    Ok(questions) => self.chat.selection.set_suggestions(questions),
                    Err(e) => tracing::warn!("No suggested questions for source {}: {}", id, e),
                }
                Task::none()
            }
            Message::SuggestionPicked(index) => match self.chat.selection.pick_suggestion(index, Message::AskSource) {
                Some(message) => self.update(message),
                None => Task::none(),
            },
            Message::SourceConversationReady(id, result) => {
                if self.chat.selection.primary_id() != Some(id) {
                    return Task::none();
                }
                match result {
                    Ok(conversation) => self.chat.conversation = Some(conversation),
                    Err(e) => self
                        .toasts
                        .error(format!("Could not start a conversation: {}", e)),
                }
                Task::none()
            }
            Message::ChatInputChanged(value) => {
                self.chat.input = value;
                Task::none()
            }
            Message::ChatSubmit => {
                let question = self.chat.input.clone();
                self.ask_source(question)
            }
            Message::AskSource(question) => self.ask_source(question),
            Message::SourceTurn(event) => {
                match self.chat.transcript.handle(event) {
                    Some(TurnEnd::Succeeded) => {
                        self.chat.stream = None;
                        if let Some(id) = self.chat.conversation {
                            return self.request(
                                move |c| async move { c.conversation_history(id).await },
                                move |r| Message::SourceHistoryLoaded(id, r),
                            );
                        }
                    }
                    Some(TurnEnd::Failed(reason)) => {
                        self.chat.stream = None;
                        self.toasts.error(format!("Answer failed: {}", reason));
                    }
                    None => {}
                }
                Task::none()
            }
            Message::SourceHistoryLoaded(id, result) => {
                if self.chat.conversation != Some(id) {
                    return Task::none();
                }
                match result {
                    Ok(messages) => {
                        self.chat.history = messages;
                        if !self.chat.transcript.is_streaming() {
                            self.chat.transcript.clear();
                        }
                    }
                    Err(e) => self.toasts.error(format!("Failed to reload the conversation: {}", e)),
                }
                Task::none()
            }
            Message::ToggleSql(surface, message, part) => {
                match surface {
                    Surface::Chat => self.chat.sql.toggle(message, part),
                    Surface::History => self.history.sql.toggle(message, part),
                }
                Task::none()
            }

            Message::ConversationsLoaded(result) => {
                self.history.status.settle(&result);
                match result {
                    Ok(conversations) => self.state.chats.set(conversations),
                    Err(e) => self.toasts.error(format!("Failed to load conversations: {}", e)),
                }
                Task::none()
            }
            Message::OpenConversation(id) => {
                self.history.selected = Some(id);
                self.history.messages.clear();
                self.history.sql.clear();
                self.history.loading = RequestStatus::Pending;
                self.request(
                    move |c| async move { c.conversation_history(id).await },
                    move |r| Message::HistoryLoaded(id, r),
                )
            }
            Message::HistoryLoaded(id, result) => {
                if self.history.selected != Some(id) {
                    return Task::none();
                }
                self.history.loading.settle(&result);
                match result {
                    Ok(messages) => self.history.messages = messages,
                    Err(e) => self.toasts.error(format!("Failed to load conversation: {}", e)),
                }
                Task::none()
            }

            Message::TasksLoaded(result) => {
                self.workspace.status.settle(&result);
                match result {
                    Ok(tasks) => self.state.tasks.set(tasks),
                    Err(e) => self.toasts.error(format!("Failed to load tasks: {}", e)),
                }
                Task::none()
            }
            Message::TaskTitleChanged(value) => {
                self.workspace.draft.title = value;
                Task::none()
            }
            Message::TaskDescriptionChanged(value) => {
                self.workspace.draft.description = value;
                Task::none()
            }
            Message::TaskPrioritySelected(priority) => {
                self.workspace.draft.priority = priority;
                Task::none()
            }
            Message::TaskSourceSelected(option) => {
                self.workspace.draft.data_source_id = Some(option.id);
                Task::none()
            }
            Message::CreateTask => match self.workspace.draft.to_request() {
                Ok(task) => self.request(move |c| async move { c.create_task(&task).await }, Message::TaskCreated),
                Err(e) => {
                    self.toasts.warn(e.to_string());
                    Task::none()
                }
            },
            Message::TaskCreated(result) => match result {
                Ok(id) => {
                    tracing::debug!("Created task {}", id);
                    self.workspace.draft.clear();
                    self.toasts.success("Task created");
                    self.load_tasks()
                }
                Err(e) => {
                    self.toasts.error(format!("Failed to create task: {}", e));
                    Task::none()
                }
            },
            Message::ToggleTask(id) => {
                let Some(task) = self.state.tasks.all().iter().find(|t| t.id == id) else {
                    return Task::none();
                };
                let patch = toggle_patch(task);
                self.request(move |c| async move { c.update_task(id, &patch).await }, Message::TaskUpdated)
            }
            Message::TaskUpdated(result) => match result {
                Ok(()) => {
                    self.toasts.success("Task updated");
                    self.load_tasks()
                }
                Err(e) => {
                    self.toasts.error(format!("Failed to update task: {}", e));
                    Task::none()
                }
            },
            Message::DeleteTask(id) => self.request(move |c| async move { c.delete_task(id).await }, Message::TaskDeleted),
            Message::TaskDeleted(result) => match result {
                Ok(()) => {
                    self.toasts.success("Task deleted");
                    self.load_tasks()
                }
                Err(e) => {
                    self.toasts.error(format!("Failed to delete task: {}", e));
                    Task::none()
                }
            },
            Message::FilterSelected(filter) => {
                self.workspace.filter = filter;
                Task::none()
            }
            Message::AssistantReady(mount, result) => {
                if mount != self.workspace.mount {
                    tracing::debug!("Ignoring assistant conversation from an earlier visit");
                    return Task::none();
                }
                if let Err(e) = &result {
                    self.toasts
                        .error(format!("Task assistant unavailable: {}", e));
                }
                self.workspace.assistant.on_initiated(result);
                Task::none()
            }
            Message::AssistantInputChanged(value) => {
                self.workspace.assistant.input = value;
                Task::none()
            }
            Message::AssistantSubmit => match self.workspace.assistant.prepare_send(&self.model) {
                Ok(request) => {
                    let (task, handle) = self.stream_turn(request, Message::AssistantTurn);
                    self.workspace.stream = Some(handle);
                    task
                }
                Err(SendBlocked::Empty) => Task::none(),
                Err(blocked) => {
                    self.toasts.warn(blocked.to_string());
                    Task::none()
                }
            },
            Message::AssistantTurn(event) => match self.workspace.assistant.handle(event) {
                Some(FollowUp::RefreshTasks) => {
                    self.workspace.stream = None;
                    self.load_tasks()
                }
                Some(FollowUp::NotifyFailure(reason)) => {
                    self.workspace.stream = None;
                    self.toasts.error(format!("Task assistant failed: {}", reason));
                    Task::none()
                }
                None => Task::none(),
            },

            Message::TokenChanged(value) => {
                self.account.token = value;
                Task::none()
            }
            Message::NameChanged(value) => {
                self.account.name = value;
                Task::none()
            }
            Message::SignIn => {
                let token = self.account.token.trim().to_string();
                if token.is_empty() {
                    self.toasts.warn("An access token is required");
                    return Task::none();
                }
                let name = self.account.name.trim();
                let user = User {
                    access_token: token,
                    name: (!name.is_empty()).then(|| name.to_string()),
                };
                if let Err(e) = self.session.sign_in(user) {
                    tracing::error!("Failed to persist session: {}", e);
                    self.toasts.error("Could not save the session");
                    return Task::none();
                }
                self.account = AccountForm::default();
                self.toasts.success("Signed in");
                self.screen = Screen::Sources;
                self.load_sources()
            }
            Message::SignOut => {
                self.sign_out();
                Task::none()
            }
        }
    }

    pub fn subscription(&self) -> Subscription<Message> {
        if self.toasts.is_empty() {
            Subscription::none()
        } else {
            time::every(Duration::from_millis(500)).map(|_| Message::Tick)
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let body = match self.screen {
            Screen::Sources => ui::sources::view(self),
            Screen::Chat => ui::chat::view(self),
            Screen::History => ui::history::view(self),
            Screen::Tasks => ui::tasks::view(self),
            Screen::Account => ui::account(self),
        };

        let content = column![
            ui::nav(self.screen, self.is_signed_in()),
            container(body).width(Length::Fill).height(Length::Fill),
            ui::toasts(&self.toasts),
        ]
        .spacing(10)
        .padding(10);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    pub fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::AnswerPart;
    use crate::assembler::Role;
    use crate::models::{Fragment, SourceKind, TaskStatus};

    const DB_ONE: &str = "postgresql://db/one";
    const DB_TWO: &str = "postgresql://db/two";

    fn signed_in_app() -> App {
        let mut config = Config::default();
        config.api.token = Some("tok".to_string());
        let (app, _) = App::with_session(config, Arc::new(Session::load(None)));
        app
    }

    fn database(id: i64, url: &str) -> DataSource {
        DataSource {
            id,
            name: format!("db{}", id),
            kind: SourceKind::Url,
            connection_url: Some(url.to_string()),
            table_name: None,
            created_at: None,
        }
    }

    fn task(id: i64) -> models::Task {
        models::Task {
            id,
            title: format!("task {}", id),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            data_source_id: None,
            created_at: None,
        }
    }

    fn answer(text: &str) -> TurnEvent {
        TurnEvent::Fragments(vec![Fragment::answer(text)])
    }

    fn toast_texts(app: &App) -> Vec<String> {
        app.toasts.iter().map(|t| t.text.clone()).collect()
    }

    fn with_databases() -> App {
        let mut app = signed_in_app();
        let _ = app.update(Message::SourcesLoaded(Ok(vec![database(1, DB_ONE), database(2, DB_TWO)])));
        app
    }

    #[test]
    fn test_request_status_settles() {
        let mut status = RequestStatus::Pending;
        assert!(status.is_pending());
        status.settle::<()>(&Err("boom".to_string()));
        assert_eq!(status, RequestStatus::Failed("boom".to_string()));
        status.settle(&Ok(1));
        assert_eq!(status, RequestStatus::Idle);
    }

    #[test]
    fn test_every_screen_has_a_title() {
        let titles: Vec<&str> = Screen::ALL.iter().map(Screen::title).collect();
        assert_eq!(titles.len(), 5);
        assert!(titles.iter().all(|t| !t.is_empty()));
    }

    #[test]
    fn test_starts_on_sources_when_a_token_is_configured() {
        let app = signed_in_app();
        assert!(app.is_signed_in());
        assert_eq!(app.screen, Screen::Sources);
        assert!(app.sources.status.is_pending());

        let (anonymous, _) = App::with_session(Config::default(), Arc::new(Session::load(None)));
        assert_eq!(anonymous.screen, Screen::Account);
    }

    #[test]
    fn test_switching_source_drops_previous_tables() {
        let mut app = with_databases();

        let _ = app.update(Message::OpenSource(1));
        let _ = app.update(Message::TablesLoaded(DB_ONE.to_string(), Ok(vec!["orders_of_db1".to_string()])));
        assert_eq!(app.primary_tables(), ["orders_of_db1".to_string()]);

        let _ = app.update(Message::OpenSource(2));
        assert_eq!(app.chat.selection.primary_id(), Some(2));
        assert!(app.primary_tables().is_empty());

        // a late answer for the first database is not applied
        let _ = app.update(Message::TablesLoaded(DB_ONE.to_string(), Ok(vec!["orders_of_db1".to_string()])));
        let _ = app.update(Message::TablesLoaded(DB_TWO.to_string(), Err("timeout".to_string())));
        assert!(app.primary_tables().is_empty());
        assert!(toast_texts(&app).iter().any(|t| t.contains("Failed to load tables")));

        let _ = app.update(Message::TableSelected("orders_of_db1".to_string()));
        assert_eq!(app.chat.selection.table(), None);

        let request = app
            .chat
            .selection
            .ask_request(7, "How many orders?".to_string(), "m")
            .unwrap();
        assert_eq!(request.dataset_id, 2);
        assert!(request.selected_tables.is_empty());
    }

    #[test]
    fn test_failed_table_fetch_clears_tables() {
        let mut app = with_databases();
        let _ = app.update(Message::OpenSource(1));
        let _ = app.update(Message::TablesLoaded(DB_ONE.to_string(), Ok(vec!["orders".to_string()])));
        let _ = app.update(Message::TableSelected("orders".to_string()));
        assert_eq!(app.chat.selection.table(), Some("orders"));

        let _ = app.update(Message::TablesLoaded(DB_ONE.to_string(), Err("gone".to_string())));
        assert!(app.primary_tables().is_empty());
    }

    #[test]
    fn test_successful_source_turn_reloads_history() {
        let mut app = with_databases();
        let _ = app.update(Message::OpenSource(1));
        let _ = app.update(Message::SourceConversationReady(1, Ok(5)));
        assert_eq!(app.chat.conversation, Some(5));

        let _ = app.update(Message::ChatInputChanged("How many orders?".to_string()));
        let _ = app.update(Message::ChatSubmit);
        assert!(app.chat.transcript.is_streaming());
        assert!(app.chat.input.is_empty());

        let _ = app.update(Message::SourceTurn(answer("There are ")));
        let _ = app.update(Message::SourceTurn(answer("42 orders.")));
        assert_eq!(
            app.chat.transcript.open_entry().map(|e| e.content.as_str()),
            Some("There are 42 orders.")
        );
        let _ = app.update(Message::SourceTurn(TurnEvent::Completed));
        assert!(!app.chat.transcript.is_streaming());

        // history for another conversation is ignored
        let _ = app.update(Message::SourceHistoryLoaded(99, Ok(Vec::new())));
        assert!(!app.chat.transcript.is_empty());

        let history = vec![
            HistoryMessage::Question("How many orders?".to_string()),
            HistoryMessage::Answer(vec![AnswerPart::Unknown]),
        ];
        let _ = app.update(Message::SourceHistoryLoaded(5, Ok(history)));
        assert_eq!(app.chat.history.len(), 2);
        assert!(app.chat.transcript.is_empty());
    }

    #[test]
    fn test_switching_primary_abandons_the_stream() {
        let mut app = with_databases();
        let _ = app.update(Message::OpenSource(1));
        let _ = app.update(Message::SourceConversationReady(1, Ok(5)));
        let _ = app.update(Message::AskSource("Top customers?".to_string()));
        let _ = app.update(Message::SourceTurn(answer("Acme")));
        assert!(app.chat.transcript.is_streaming());

        let _ = app.update(Message::OpenSource(2));
        assert!(!app.chat.transcript.is_streaming());
        assert!(app.chat.transcript.is_empty());
        assert_eq!(app.chat.conversation, None);

        // leftovers from the abandoned turn land nowhere
        let _ = app.update(Message::SourceTurn(answer(" Corp")));
        let _ = app.update(Message::SourceConversationReady(1, Ok(5)));
        assert!(app.chat.transcript.is_empty());
        assert_eq!(app.chat.conversation, None);
    }

    #[test]
    fn test_task_mutations_refetch_instead_of_patching() {
        let mut app = signed_in_app();
        let _ = app.update(Message::TasksLoaded(Ok(vec![task(1), task(2)])));
        assert_eq!(app.workspace.status, RequestStatus::Idle);

        let _ = app.update(Message::ToggleTask(1));
        let _ = app.update(Message::TaskUpdated(Ok(())));
        assert!(app.workspace.status.is_pending());
        assert_eq!(app.state.tasks.all()[0].status, TaskStatus::Pending);
        assert!(toast_texts(&app).contains(&"Task updated".to_string()));

        let mut toggled = task(1);
        toggled.status = TaskStatus::Completed;
        let _ = app.update(Message::TasksLoaded(Ok(vec![toggled, task(2)])));
        assert_eq!(app.state.tasks.all()[0].status, TaskStatus::Completed);

        let _ = app.update(Message::TaskDeleted(Ok(())));
        assert!(app.workspace.status.is_pending());
        assert_eq!(app.state.tasks.all().len(), 2);
        let _ = app.update(Message::TasksLoaded(Ok(vec![task(2)])));

        let _ = app.update(Message::TaskTitleChanged("Review Q3".to_string()));
        let _ = app.update(Message::TaskCreated(Ok(3)));
        assert!(app.workspace.status.is_pending());
        assert!(app.workspace.draft.title.is_empty());
        let _ = app.update(Message::TasksLoaded(Ok(vec![task(2), task(3)])));

        let _ = app.update(Message::TaskUpdated(Err("boom".to_string())));
        assert_eq!(app.workspace.status, RequestStatus::Idle);
        assert!(toast_texts(&app).iter().any(|t| t.contains("Failed to update task")));
    }

    #[test]
    fn test_assistant_turn_refreshes_tasks_once() {
        let mut app = signed_in_app();
        let _ = app.update(Message::Navigate(Screen::Tasks));
        let _ = app.update(Message::TasksLoaded(Ok(Vec::new())));
        let _ = app.update(Message::AssistantReady(1, Ok(42)));
        assert_eq!(app.workspace.assistant.conversation(), Some(42));

        let _ = app.update(Message::AssistantInputChanged("Create a task to review Q3 numbers".to_string()));
        let _ = app.update(Message::AssistantSubmit);
        assert!(app.workspace.assistant.transcript.is_streaming());

        let _ = app.update(Message::AssistantTurn(answer("I've created")));
        let _ = app.update(Message::AssistantTurn(answer(" the task.")));
        assert_eq!(app.workspace.status, RequestStatus::Idle);

        let _ = app.update(Message::AssistantTurn(TurnEvent::Completed));
        assert!(app.workspace.status.is_pending());
        let _ = app.update(Message::TasksLoaded(Ok(vec![task(7)])));

        // a second end for the same turn does not refetch again
        let _ = app.update(Message::AssistantTurn(TurnEvent::Completed));
        assert_eq!(app.workspace.status, RequestStatus::Idle);

        let entries = app.workspace.assistant.transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].content, "I've created the task.");
        assert_eq!(app.state.tasks.all().len(), 1);
    }

    #[test]
    fn test_late_assistant_conversation_is_ignored() {
        let mut app = signed_in_app();
        let _ = app.update(Message::Navigate(Screen::Tasks));
        let _ = app.update(Message::Navigate(Screen::Sources));
        let _ = app.update(Message::Navigate(Screen::Tasks));

        let _ = app.update(Message::AssistantReady(1, Ok(10)));
        assert_eq!(app.workspace.assistant.conversation(), None);

        let _ = app.update(Message::AssistantReady(2, Ok(11)));
        assert_eq!(app.workspace.assistant.conversation(), Some(11));
    }
}
