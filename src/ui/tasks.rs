use iced::widget::{button, checkbox, column, container, pick_list, row, scrollable, text, text_input, vertical_rule, Column};
use iced::{Element, Length};

use crate::app::{App, Message};
use crate::models::{display_date, Task, TaskPriority, TaskStatus};
use crate::workspace::{filter_tasks, StatusFilter};

const PRIORITIES: [TaskPriority; 3] = [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High];

fn compose(app: &App) -> Element<'_, Message> {
    let draft = &app.workspace.draft;
    let sources = app.state.sources.options();
    let linked = draft
        .data_source_id
        .and_then(|id| sources.iter().find(|o| o.id == id).cloned());

    column![
        text("New task").size(16),
        text_input("Title", &draft.title)
            .on_input(Message::TaskTitleChanged)
            .on_submit(Message::CreateTask)
            .padding(8),
        text_input("Description (optional)", &draft.description)
            .on_input(Message::TaskDescriptionChanged)
            .padding(8),
        row![
            pick_list(PRIORITIES, Some(draft.priority), Message::TaskPrioritySelected),
            pick_list(sources, linked, Message::TaskSourceSelected).placeholder("Link a data source"),
            button(text("Add task")).style(button::primary).on_press(Message::CreateTask),
        ]
        .spacing(8),
    ]
    .spacing(6)
    .into()
}

fn task_row<'a>(app: &'a App, task: &'a Task) -> Element<'a, Message> {
    let id = task.id;
    let mut details = vec![task.priority.as_str().to_string()];
    if task.status == TaskStatus::InProgress {
        details.push(task.status.as_str().to_string());
    }
    if let Some(name) = task.data_source_id.and_then(|s| app.state.sources.name_of(s)) {
        details.push(name.to_string());
    }
    if let Some(created) = task.created_at.as_deref() {
        details.push(display_date(created));
    }

    let mut body = Column::new()
        .spacing(2)
        .push(checkbox(task.title.as_str(), task.status == TaskStatus::Completed).on_toggle(move |_| Message::ToggleTask(id)));
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        body = body.push(text(description).size(13));
    }
    body = body.push(text(details.join(" · ")).size(12));

    container(
        row![
            body.width(Length::Fill),
            button(text("Delete").size(13))
                .style(button::danger)
                .on_press(Message::DeleteTask(id)),
        ]
        .spacing(8),
    )
    .padding(8)
    .width(Length::Fill)
    .style(container::rounded_box)
    .into()
}

fn task_list(app: &App) -> Element<'_, Message> {
    let workspace = &app.workspace;
    let tasks = filter_tasks(app.state.tasks.all(), workspace.filter);

    let mut list = Column::new()
        .spacing(6)
        .push(
            row![
                text("Tasks").size(18).width(Length::Fill),
                pick_list(StatusFilter::ALL, Some(workspace.filter), Message::FilterSelected),
            ]
            .spacing(8),
        )
        .push_maybe(crate::ui::status(&workspace.status, "tasks"));

    if tasks.is_empty() && app.state.tasks.is_loaded() {
        list = list.push(text("Nothing here.").size(14));
    }
    for task in tasks {
        list = list.push(task_row(app, task));
    }
    scrollable(list).height(Length::Fill).into()
}

fn assistant(app: &App) -> Element<'_, Message> {
    let assistant = &app.workspace.assistant;
    let mut panel = Column::new().spacing(8).push(text("Task assistant").size(18));

    if assistant.is_unavailable() {
        panel = panel.push(text("Natural-language commands are unavailable. You can still manage tasks directly.").size(14));
    } else if assistant.conversation().is_none() {
        panel = panel.push(text("Starting the assistant...").size(14));
    } else if assistant.transcript.is_empty() {
        panel = panel.push(text("Try \"Create a task to review Q3 numbers\".").size(14));
    }

    panel = panel.push(scrollable(crate::ui::transcript(&assistant.transcript)).height(Length::Fill));

    let input = if assistant.transcript.is_streaming() {
        text_input("Working on it...", &assistant.input).padding(10)
    } else {
        text_input("Tell the assistant what to do...", &assistant.input)
            .on_input(Message::AssistantInputChanged)
            .on_submit(Message::AssistantSubmit)
            .padding(10)
    };
    let send = button(text("Send"))
        .padding(10)
        .on_press_maybe(assistant.can_send().then_some(Message::AssistantSubmit));

    panel.push(row![input, send].spacing(8)).into()
}

pub fn view(app: &App) -> Element<'_, Message> {
    row![
        column![compose(app), task_list(app)]
            .spacing(12)
            .width(Length::FillPortion(3)),
        vertical_rule(1),
        container(assistant(app)).width(Length::FillPortion(2)),
    ]
    .spacing(12)
    .into()
}
