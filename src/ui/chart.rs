//! Stand-in chart renderer. The backend picks the chart kind and shapes the
//! data; this view lays the payload out as a table under the kind's name.

use iced::widget::{column, container, scrollable, text, Column, Row};
use iced::{Element, Length};
use serde_json::Value;

use crate::app::Message;

const MAX_ROWS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lays out a list of records, or an object of equal-role columns, as rows.
pub fn tabulate(data: &Value) -> Option<Table> {
    match data {
        Value::Array(records) if !records.is_empty() && records.iter().all(Value::is_object) => {
            let mut headers: Vec<String> = Vec::new();
            for record in records.iter().filter_map(Value::as_object) {
                for key in record.keys() {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
            }
            let rows = records
                .iter()
                .filter_map(Value::as_object)
                .map(|record| {
                    headers
                        .iter()
                        .map(|h| record.get(h).map(cell).unwrap_or_default())
                        .collect()
                })
                .collect();
            Some(Table { headers, rows })
        }
        Value::Object(columns) if !columns.is_empty() && columns.values().all(Value::is_array) => {
            let headers: Vec<String> = columns.keys().cloned().collect();
            let height = columns
                .values()
                .filter_map(Value::as_array)
                .map(Vec::len)
                .max()
                .unwrap_or(0);
            let rows = (0..height)
                .map(|i| {
                    columns
                        .values()
                        .map(|col| col.get(i).map(cell).unwrap_or_default())
                        .collect()
                })
                .collect();
            Some(Table { headers, rows })
        }
        _ => None,
    }
}

fn table_row<'a>(cells: &[String], size: u16) -> Element<'a, Message> {
    Row::with_children(
        cells
            .iter()
            .map(|c| text(c.clone()).size(size).width(Length::Fill).into()),
    )
    .spacing(12)
    .into()
}

pub fn view<'a>(kind: &'a str, data: &'a Value) -> Element<'a, Message> {
    let title = text(format!("Chart: {}", kind)).size(15);

    let body: Element<'a, Message> = match tabulate(data) {
        Some(table) => {
            let mut rows = Column::new().spacing(4).push(table_row(&table.headers, 14));
            for row in table.rows.iter().take(MAX_ROWS) {
                rows = rows.push(table_row(row, 13));
            }
            if table.rows.len() > MAX_ROWS {
                rows = rows.push(text(format!("... {} more rows", table.rows.len() - MAX_ROWS)).size(12));
            }
            rows.into()
        }
        None => {
            let raw = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            scrollable(text(raw).size(13)).height(Length::Shrink).into()
        }
    };

    container(column![title, body].spacing(8))
        .padding(10)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
}
