//! Views. Everything here reads application state and emits messages; nothing mutates.

pub mod chart;
pub mod chat;
pub mod history;
pub mod sources;
pub mod tasks;

use iced::font::Weight;
use iced::widget::text::Span;
use iced::widget::{button, column, container, rich_text, row, span, text, text_input, Column, Row, Space};
use iced::{Element, Font, Length};

use crate::answer::{self, Block, HistoryMessage, SqlToggles};
use crate::app::{App, Message, RequestStatus, Screen, Surface};
use crate::assembler::{Role, Transcript};
use crate::markdown::{self, Inline, Line};
use crate::toast::{Level, Toasts};

const BOLD: Font = Font {
    weight: Weight::Bold,
    ..Font::MONOSPACE
};

type ButtonStyle = fn(&iced::Theme, button::Status) -> button::Style;

pub fn nav<'a>(current: Screen, signed_in: bool) -> Element<'a, Message> {
    let mut bar = Row::new().spacing(8);
    for screen in Screen::ALL {
        if !signed_in && screen != Screen::Account {
            continue;
        }
        let style: ButtonStyle = if screen == current {
            button::primary
        } else {
            button::secondary
        };
        bar = bar.push(
            button(text(screen.title()).size(15))
                .padding(8)
                .style(style)
                .on_press(Message::Navigate(screen)),
        );
    }
    bar.into()
}

pub fn toasts(toasts: &Toasts) -> Element<'_, Message> {
    let mut list = Column::new().spacing(6);
    for (index, toast) in toasts.iter().enumerate() {
        let tag = match toast.level {
            Level::Info => "info",
            Level::Success => "ok",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        list = list.push(
            container(
                row![
                    text(format!("[{}] {}", tag, toast.text)).size(14).width(Length::Fill),
                    button(text("x").size(12))
                        .style(button::text)
                        .on_press(Message::DismissToast(index)),
                ]
                .spacing(8),
            )
            .padding(8)
            .width(Length::Fill)
            .style(container::rounded_box),
        );
    }
    list.into()
}

/// Shown above a list while it loads or after it failed to load.
pub fn status<'a>(status: &RequestStatus, what: &str) -> Option<Element<'a, Message>> {
    match status {
        RequestStatus::Idle => None,
        RequestStatus::Pending => Some(text(format!("Loading {}...", what)).size(14).into()),
        RequestStatus::Failed(e) => Some(text(format!("Could not load {}: {}", what, e)).size(14).into()),
    }
}

fn spans<'a>(inline: &[Inline]) -> Vec<Span<'a, Message, Font>> {
    inline
        .iter()
        .map(|piece| match piece {
            Inline::Text(t) => span(t.clone()),
            Inline::Bold(t) => span(t.clone()).font(BOLD),
        })
        .collect()
}

pub fn markdown<'a>(lines: &[Line]) -> Element<'a, Message> {
    let mut body = Column::new().spacing(4);
    for line in lines {
        let item: Element<'a, Message> = match line {
            Line::Heading(inline) => rich_text(spans(inline)).size(19).into(),
            Line::Bullet(inline) => row![text("•"), rich_text(spans(inline))].spacing(8).into(),
            Line::Spacer => Space::with_height(Length::Fixed(8.0)).into(),
            Line::Paragraph(inline) => rich_text(spans(inline)).into(),
        };
        body = body.push(item);
    }
    body.into()
}

fn bubble<'a>(label: &'a str, body: Element<'a, Message>) -> Element<'a, Message> {
    container(column![text(label).size(12), body].spacing(4))
        .padding(10)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
}

/// Entries of a live chat, assistant text rendered as it accumulates.
pub fn transcript(transcript: &Transcript) -> Element<'_, Message> {
    let mut list = Column::new().spacing(12);
    for entry in transcript.entries() {
        list = list.push(match entry.role {
            Role::User => bubble("You", text(entry.content.as_str()).into()),
            Role::Assistant => bubble("LUMIN", markdown(&markdown::render(&entry.content))),
        });
    }
    if transcript.is_streaming() && transcript.open_entry().is_none() {
        list = list.push(text("Thinking...").size(14));
    }
    list.into()
}

fn block<'a>(block: Block<'a>, message: usize, sql: &SqlToggles, surface: Surface) -> Element<'a, Message> {
    match block {
        Block::Narrative {
            part,
            lines,
            citations,
            sql: query,
        } => {
            let mut body = Column::new().spacing(6).push(markdown(&lines));
            if !citations.is_empty() {
                let chips = citations.into_iter().map(|label| {
                    container(text(label).size(12))
                        .padding(4)
                        .style(container::rounded_box)
                        .into()
                });
                body = body.push(Row::with_children(chips).spacing(6));
            }
            if let Some(query) = query {
                let open = sql.is_open(message, part);
                body = body.push(
                    button(text(if open { "Hide SQL" } else { "Show SQL" }).size(13))
                        .style(button::text)
                        .on_press(Message::ToggleSql(surface, message, part)),
                );
                if open {
                    body = body.push(
                        container(text(query).size(13))
                            .padding(8)
                            .width(Length::Fill)
                            .style(container::rounded_box),
                    );
                }
            }
            body.into()
        }
        Block::Chart { kind, data, .. } => chart::view(kind, data),
    }
}

/// A completed conversation rendered part by part.
pub fn conversation<'a>(messages: &'a [HistoryMessage], sql: &SqlToggles, surface: Surface) -> Element<'a, Message> {
    let mut list = Column::new().spacing(12);
    for (index, message) in messages.iter().enumerate() {
        match message {
            HistoryMessage::Question(question) => {
                list = list.push(bubble("You", text(question.as_str()).into()));
            }
            HistoryMessage::Answer(parts) => {
                let blocks = answer::render(parts);
                if blocks.is_empty() {
                    continue;
                }
                let body = Column::with_children(blocks.into_iter().map(|b| block(b, index, sql, surface))).spacing(10);
                list = list.push(bubble("LUMIN", body.into()));
            }
        }
    }
    list.into()
}

pub fn account(app: &App) -> Element<'_, Message> {
    if app.is_signed_in() {
        let who = match app.user_name() {
            Some(name) => format!("Signed in as {}", name),
            None => "Signed in".to_string(),
        };
        return column![
            text(who).size(18),
            text(format!("API: {}", app.config.api.base_url)).size(14),
            button(text("Log out")).style(button::danger).on_press(Message::SignOut),
        ]
        .spacing(12)
        .into();
    }

    column![
        text("Sign in").size(20),
        text_input("Access token", &app.account.token)
            .secure(true)
            .on_input(Message::TokenChanged)
            .on_submit(Message::SignIn)
            .padding(10),
        text_input("Display name (optional)", &app.account.name)
            .on_input(Message::NameChanged)
            .on_submit(Message::SignIn)
            .padding(10),
        button(text("Sign in")).style(button::primary).on_press(Message::SignIn),
    ]
    .spacing(12)
    .max_width(480)
    .into()
}
