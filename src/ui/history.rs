use iced::widget::{button, column, row, scrollable, text, vertical_rule, Column};
use iced::{Element, Length};

use crate::app::{App, Message, Surface};

pub fn view(app: &App) -> Element<'_, Message> {
    let history = &app.history;

    let mut list = Column::new()
        .spacing(4)
        .push(text("Conversations").size(18))
        .push_maybe(crate::ui::status(&history.status, "conversations"));
    for conversation in app.state.chats.all() {
        let style: crate::ui::ButtonStyle = if history.selected == Some(conversation.id) {
            button::primary
        } else {
            button::text
        };
        list = list.push(
            button(text(conversation.label()).size(14))
                .width(Length::Fill)
                .style(style)
                .on_press(Message::OpenConversation(conversation.id)),
        );
    }
    if app.state.chats.all().is_empty() && !history.status.is_pending() {
        list = list.push(text("No conversations yet.").size(14));
    }

    let detail: Element<'_, Message> = match history.selected {
        None => text("Select a conversation to replay it.").size(15).into(),
        Some(_) => column![]
            .push_maybe(crate::ui::status(&history.loading, "conversation"))
            .push(scrollable(crate::ui::conversation(&history.messages, &history.sql, Surface::History)).height(Length::Fill))
            .spacing(8)
            .into(),
    };

    row![
        scrollable(list).width(Length::FillPortion(1)),
        vertical_rule(1),
        column![detail].width(Length::FillPortion(3)),
    ]
    .spacing(12)
    .into()
}
