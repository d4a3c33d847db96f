//! Completed answers as returned by the history endpoint, and the blocks they render into.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::markdown::{self, Line};

#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerPart {
    Narrative {
        answer: String,
        source_documents: Vec<SourceDocument>,
        sql_query: Option<String>,
    },
    Visualization {
        recommended_visualization: String,
        formatted_data_for_visualization: Value,
    },
    /// Matches neither shape. Renders as nothing.
    Unknown,
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl AnswerPart {
    pub fn from_value(value: &Value) -> Self {
        if let Some(answer) = non_empty_str(value, "answer") {
            let source_documents = value
                .get("source_documents")
                .and_then(Value::as_array)
                .map(|docs| {
                    docs.iter()
                        .map(|doc| SourceDocument {
                            source: doc
                                .pointer("/metadata/source")
                                .and_then(Value::as_str)
                                .filter(|s| !s.is_empty())
                                .map(str::to_string),
                        })
                        .collect()
                })
                .unwrap_or_default();

            return AnswerPart::Narrative {
                answer,
                source_documents,
                sql_query: non_empty_str(value, "sql_query"),
            };
        }

        let kind = non_empty_str(value, "recommended_visualization");
        let data = value
            .get("formatted_data_for_visualization")
            .filter(|d| is_truthy(d));
        match (kind, data) {
            (Some(kind), Some(data)) => AnswerPart::Visualization {
                recommended_visualization: kind,
                formatted_data_for_visualization: data.clone(),
            },
            _ => AnswerPart::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for AnswerPart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(AnswerPart::from_value(&value))
    }
}

/// One turn of a stored conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryMessage {
    Question(String),
    Answer(Vec<AnswerPart>),
}

impl<'de> Deserialize<'de> for HistoryMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if let Some(question) = non_empty_str(&value, "question") {
            return Ok(HistoryMessage::Question(question));
        }
        let parts = value
            .get("answer")
            .and_then(Value::as_array)
            .map(|parts| parts.iter().map(AnswerPart::from_value).collect())
            .unwrap_or_default();
        Ok(HistoryMessage::Answer(parts))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block<'a> {
    Narrative {
        /// Position of the originating part, used to key the SQL toggle.
        part: usize,
        lines: Vec<Line>,
        citations: Vec<String>,
        sql: Option<&'a str>,
    },
    Chart {
        part: usize,
        kind: &'a str,
        data: &'a Value,
    },
}

/// One block per recognised part, in order.
pub fn render(parts: &[AnswerPart]) -> Vec<Block<'_>> {
    parts
        .iter()
        .enumerate()
        .filter_map(|(part, p)| match p {
            AnswerPart::Narrative {
                answer,
                source_documents,
                sql_query,
            } => Some(Block::Narrative {
                part,
                lines: markdown::render(answer),
                citations: source_documents
                    .iter()
                    .enumerate()
                    .map(|(i, doc)| {
                        doc.source
                            .clone()
                            .unwrap_or_else(|| format!("Doc {}", i + 1))
                    })
                    .collect(),
                sql: sql_query.as_deref(),
            }),
            AnswerPart::Visualization {
                recommended_visualization,
                formatted_data_for_visualization,
            } => Some(Block::Chart {
                part,
                kind: recommended_visualization,
                data: formatted_data_for_visualization,
            }),
            AnswerPart::Unknown => None,
        })
        .collect()
}

/// Which SQL blocks are expanded, keyed by (message index, part index). Collapsed by default.
#[derive(Debug, Default, Clone)]
pub struct SqlToggles {
    open: HashSet<(usize, usize)>,
}

impl SqlToggles {
    pub fn toggle(&mut self, message: usize, part: usize) {
        if !self.open.remove(&(message, part)) {
            self.open.insert((message, part));
        }
    }

    pub fn is_open(&self, message: usize, part: usize) -> bool {
        self.open.contains(&(message, part))
    }

    pub fn clear(&mut self) {
        self.open.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parts(raw: Value) -> Vec<AnswerPart> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_part_classification() {
        let parsed = parts(json!([
            {"answer": "Revenue grew", "sql_query": "SELECT 1", "source_documents": [{"metadata": {"source": "q3.pdf"}}, {}]},
            {"recommended_visualization": "bar", "formatted_data_for_visualization": [{"x": 1}]},
            {"answer": "", "recommended_visualization": "line", "formatted_data_for_visualization": {"labels": []}},
            {"recommended_visualization": "pie"},
            {"recommended_visualization": "", "formatted_data_for_visualization": [1]},
            {"something": "else"}
        ]));

        assert_eq!(
            parsed[0],
            AnswerPart::Narrative {
                answer: "Revenue grew".to_string(),
                source_documents: vec![
                    SourceDocument { source: Some("q3.pdf".to_string()) },
                    SourceDocument { source: None },
                ],
                sql_query: Some("SELECT 1".to_string()),
            }
        );
        assert!(matches!(parsed[1], AnswerPart::Visualization { .. }));
        assert!(matches!(parsed[2], AnswerPart::Visualization { ref recommended_visualization, .. } if recommended_visualization == "line"));
        assert_eq!(parsed[3], AnswerPart::Unknown);
        assert_eq!(parsed[4], AnswerPart::Unknown);
        assert_eq!(parsed[5], AnswerPart::Unknown);
    }

    #[test]
    fn test_falsy_payload_is_unknown() {
        for data in [json!(null), json!(""), json!(0), json!(false)] {
            let part = AnswerPart::from_value(&json!({
                "recommended_visualization": "bar",
                "formatted_data_for_visualization": data
            }));
            assert_eq!(part, AnswerPart::Unknown);
        }
    }

    #[test]
    fn test_one_block_per_recognised_part_in_order() {
        let parsed = parts(json!([
            {"answer": "first"},
            {"unrelated": true},
            {"recommended_visualization": "bar", "formatted_data_for_visualization": {"rows": []}},
            {"answer": "### last"}
        ]));
        let blocks = render(&parsed);
        assert_eq!(blocks.len(), 3);

        match &blocks[0] {
            Block::Narrative { part, lines, citations, sql } => {
                assert_eq!(*part, 0);
                assert_eq!(lines.len(), 1);
                assert!(citations.is_empty());
                assert!(sql.is_none());
            }
            other => panic!("unexpected block {:?}", other),
        }
        match &blocks[1] {
            Block::Chart { part, kind, data } => {
                assert_eq!(*part, 2);
                assert_eq!(*kind, "bar");
                assert_eq!(**data, json!({"rows": []}));
            }
            other => panic!("unexpected block {:?}", other),
        }
        assert!(matches!(&blocks[2], Block::Narrative { part: 3, .. }));
    }

    #[test]
    fn test_only_unknown_parts_render_nothing() {
        let parsed = parts(json!([{}, {"foo": 1}]));
        assert_eq!(parsed.len(), 2);
        assert!(render(&parsed).is_empty());
    }

    #[test]
    fn test_citation_labels_fall_back_to_position() {
        let parsed = parts(json!([
            {"answer": "a", "source_documents": [{"metadata": {}}, {"metadata": {"source": "b.txt"}}]}
        ]));
        match &render(&parsed)[0] {
            Block::Narrative { citations, .. } => {
                assert_eq!(citations, &vec!["Doc 1".to_string(), "b.txt".to_string()]);
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_history_messages() {
        let messages: Vec<HistoryMessage> = serde_json::from_value(json!([
            {"question": "Top customers?"},
            {"answer": [{"answer": "Acme"}, {"recommended_visualization": "table", "formatted_data_for_visualization": [["Acme", 10]]}]},
            {"answer": "not a list"},
            {"question": "", "answer": []}
        ]))
        .unwrap();

        assert_eq!(messages[0], HistoryMessage::Question("Top customers?".to_string()));
        assert!(matches!(&messages[1], HistoryMessage::Answer(p) if p.len() == 2));
        assert_eq!(messages[2], HistoryMessage::Answer(vec![]));
        assert_eq!(messages[3], HistoryMessage::Answer(vec![]));
    }

    #[test]
    fn test_sql_toggles_start_hidden() {
        let mut toggles = SqlToggles::default();
        assert!(!toggles.is_open(1, 0));

        toggles.toggle(1, 0);
        assert!(toggles.is_open(1, 0));
        assert!(!toggles.is_open(1, 1));

        toggles.toggle(1, 0);
        assert!(!toggles.is_open(1, 0));

        toggles.toggle(2, 2);
        toggles.clear();
        assert!(!toggles.is_open(2, 2));
    }
}
