use iced::widget::{button, column, container, pick_list, row, scrollable, text, text_input, Column, Row};
use iced::{Element, Length};

use crate::app::{App, Message, Surface};
use crate::models::SourceOption;

fn source_picker(app: &App) -> Element<'_, Message> {
    let options = app.state.sources.options();
    let selected = app
        .chat
        .selection
        .primary_id()
        .and_then(|id| options.iter().find(|o| o.id == id).cloned());

    row![
        pick_list(options, selected, Message::PrimarySelected)
            .placeholder("Choose a data source")
            .width(Length::FillPortion(2)),
        pick_list(
            app.config.api.models.as_slice(),
            Some(app.model.clone()),
            Message::ModelSelected
        )
        .width(Length::FillPortion(1)),
    ]
    .spacing(8)
    .into()
}

fn secondary_sources(app: &App) -> Element<'_, Message> {
    let selection = &app.chat.selection;
    let mut chips = Row::new().spacing(6);
    for id in selection.secondary() {
        let name = app
            .state
            .sources
            .name_of(*id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Source {}", id));
        chips = chips.push(
            container(
                row![
                    text(name).size(13),
                    button(text("x").size(12))
                        .style(button::text)
                        .on_press(Message::RemoveSecondary(*id)),
                ]
                .spacing(4),
            )
            .padding(4)
            .style(container::rounded_box),
        );
    }

    let options = selection.secondary_options(app.state.sources.all());
    column![
        pick_list(options, None::<SourceOption>, Message::SecondarySelected).placeholder("Add another source"),
        chips,
    ]
    .spacing(6)
    .into()
}

fn context_controls(app: &App) -> Element<'_, Message> {
    let selection = &app.chat.selection;
    let mut controls = Column::new().spacing(8).push(secondary_sources(app));

    let tables = app.primary_tables();
    if !tables.is_empty() {
        controls = controls.push(
            pick_list(tables, selection.table().map(str::to_string), Message::TableSelected)
                .placeholder("Select a table"),
        );
    }

    if !selection.suggestions().is_empty() {
        let suggestions = selection.suggestions().iter().enumerate().map(|(i, q)| {
            button(text(q.as_str()).size(13))
                .style(button::secondary)
                .on_press(Message::SuggestionPicked(i))
                .into()
        });
        controls = controls.push(column![
            text("Suggested questions").size(14),
            Column::with_children(suggestions).spacing(4),
        ]
        .spacing(4));
    }
    controls.into()
}

pub fn view(app: &App) -> Element<'_, Message> {
    let chat = &app.chat;
    let mut page = Column::new().spacing(10).push(source_picker(app));

    let Some(primary) = chat.selection.primary() else {
        let hint = if chat.selection.primary_id().is_some() {
            "Loading data source..."
        } else {
            "Pick a data source to start chatting."
        };
        return page.push(text(hint).size(15)).into();
    };

    page = page
        .push(text(format!("{} ({})", primary.name, primary.kind.as_str())).size(18))
        .push(context_controls(app));

    let messages = column![
        crate::ui::conversation(&chat.history, &chat.sql, Surface::Chat),
        crate::ui::transcript(&chat.transcript),
    ]
    .spacing(12);
    page = page.push(scrollable(messages).height(Length::Fill));

    let streaming = chat.transcript.is_streaming();
    let input = if streaming {
        text_input("Waiting for the answer...", &chat.input).padding(10)
    } else {
        text_input("Ask a question about your data...", &chat.input)
            .on_input(Message::ChatInputChanged)
            .on_submit(Message::ChatSubmit)
            .padding(10)
    };
    let ready = !streaming && chat.conversation.is_some() && !chat.input.trim().is_empty();
    let send = button(text("Send")).padding(10).on_press_maybe(ready.then_some(Message::ChatSubmit));

    page.push(row![input, send].spacing(8)).into()
}
