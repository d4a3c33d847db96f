use crate::models::{AskRequest, DataSource, SourceKind, SourceOption};
use crate::store::SourceStore;

/// Requests a selection change needs issued. They have no ordering between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    Sources,
    Tables(String),
    Suggestions(i64),
}

/// Primary source, attached secondary sources, and the per-view choices feeding a question.
#[derive(Debug, Default, Clone)]
pub struct SourceSelection {
    primary_id: Option<i64>,
    primary: Option<DataSource>,
    secondary: Vec<i64>,
    table: Option<String>,
    suggestions: Vec<String>,
}

impl SourceSelection {
    pub fn primary_id(&self) -> Option<i64> {
        self.primary_id
    }

    pub fn primary(&self) -> Option<&DataSource> {
        self.primary.as_ref()
    }

    pub fn secondary(&self) -> &[i64] {
        &self.secondary
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// Starts a fresh selection for `id`. Secondary sources do not carry over.
    pub fn select_primary(&mut self, id: i64, store: &SourceStore) -> Vec<Fetch> {
        *self = SourceSelection {
            primary_id: Some(id),
            ..Default::default()
        };

        let mut fetches = Vec::new();
        if store.is_loaded() {
            fetches.extend(self.resolve(store));
        } else {
            fetches.push(Fetch::Sources);
        }
        fetches.push(Fetch::Suggestions(id));
        fetches
    }

    /// Resolves a pending primary id once sources arrive.
    pub fn on_sources_loaded(&mut self, store: &SourceStore) -> Vec<Fetch> {
        if self.primary.is_some() {
            return Vec::new();
        }
        self.resolve(store).into_iter().collect()
    }

    fn resolve(&mut self, store: &SourceStore) -> Option<Fetch> {
        let id = self.primary_id?;
        let Some(source) = store.get(id).cloned() else {
            tracing::warn!("Data source {} is not in the cached source list", id);
            return None;
        };
        let fetch = source
            .connection_string()
            .map(|url| Fetch::Tables(url.to_string()));
        self.primary = Some(source);
        fetch
    }

    /// Sources that may still be attached: never the primary, never one already added.
    pub fn secondary_options(&self, sources: &[DataSource]) -> Vec<SourceOption> {
        sources
            .iter()
            .filter(|s| Some(s.id) != self.primary_id && !self.secondary.contains(&s.id))
            .map(SourceOption::from)
            .collect()
    }

    pub fn add_secondary(&mut self, id: i64) {
        if Some(id) == self.primary_id || self.secondary.contains(&id) {
            return;
        }
        self.secondary.push(id);
    }

    pub fn remove_secondary(&mut self, id: i64) {
        self.secondary.retain(|s| *s != id);
    }

    pub fn select_table(&mut self, table: String) {
        self.table = Some(table);
    }

    pub fn set_suggestions(&mut self, questions: Vec<String>) {
        self.suggestions = questions;
    }

    /// Hands a suggested question to whoever decides what sending means.
    pub fn pick_suggestion<T, F>(&self, index: usize, on_pick: F) -> Option<T>
    where
        F: FnOnce(String) -> T,
    {
        self.suggestions.get(index).cloned().map(on_pick)
    }

    /// Value for the `type` field of a question about this selection.
    pub fn question_kind(&self) -> &'static str {
        self.primary
            .as_ref()
            .map(|s| s.kind)
            .unwrap_or(SourceKind::File)
            .as_str()
    }

    pub fn selected_tables(&self) -> Vec<String> {
        self.table.iter().cloned().collect()
    }

    pub fn dataset_ids(&self) -> Option<Vec<i64>> {
        if self.secondary.is_empty() {
            None
        } else {
            Some(self.secondary.clone())
        }
    }

    /// `None` until a primary source is chosen.
    pub fn ask_request(&self, conversation_id: i64, question: String, model: &str) -> Option<AskRequest> {
        Some(AskRequest {
            question,
            conversation_id,
            dataset_id: self.primary_id?,
            dataset_ids: self.dataset_ids(),
            selected_tables: self.selected_tables(),
            kind: self.question_kind().to_string(),
            llm_model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: i64, kind: SourceKind) -> DataSource {
        DataSource {
            id,
            name: format!("source-{}", id),
            kind,
            connection_url: match kind {
                SourceKind::Url => Some(format!("postgresql://db/{}", id)),
                _ => None,
            },
            table_name: None,
            created_at: None,
        }
    }

    fn loaded(sources: Vec<DataSource>) -> SourceStore {
        let mut store = SourceStore::default();
        store.set(sources);
        store
    }

    #[test]
    fn test_url_source_fetches_tables_and_suggestions() {
        let store = loaded(vec![source(1, SourceKind::Url), source(2, SourceKind::Spreadsheet)]);
        let mut selection = SourceSelection::default();

        let fetches = selection.select_primary(1, &store);
        assert_eq!(
            fetches,
            vec![
                Fetch::Tables("postgresql://db/1".to_string()),
                Fetch::Suggestions(1)
            ]
        );
        assert_eq!(selection.question_kind(), "url");

        let fetches = selection.select_primary(2, &store);
        assert_eq!(fetches, vec![Fetch::Suggestions(2)]);
        assert_eq!(selection.question_kind(), "spreadsheet");
    }

    #[test]
    fn test_url_without_connection_string_skips_tables() {
        let mut bare = source(1, SourceKind::Url);
        bare.connection_url = None;
        let store = loaded(vec![bare]);

        let mut selection = SourceSelection::default();
        assert_eq!(selection.select_primary(1, &store), vec![Fetch::Suggestions(1)]);
    }

    #[test]
    fn test_empty_cache_fetches_sources_first() {
        let mut selection = SourceSelection::default();
        let fetches = selection.select_primary(1, &SourceStore::default());
        assert_eq!(fetches, vec![Fetch::Sources, Fetch::Suggestions(1)]);
        assert!(selection.primary().is_none());

        let store = loaded(vec![source(1, SourceKind::Url)]);
        assert_eq!(
            selection.on_sources_loaded(&store),
            vec![Fetch::Tables("postgresql://db/1".to_string())]
        );
        assert!(selection.primary().is_some());
        assert!(selection.on_sources_loaded(&store).is_empty());
    }

    #[test]
    fn test_unknown_primary_resolves_to_nothing() {
        let store = loaded(vec![source(1, SourceKind::File)]);
        let mut selection = SourceSelection::default();
        assert_eq!(selection.select_primary(42, &store), vec![Fetch::Suggestions(42)]);
        assert!(selection.primary().is_none());
    }

    #[test]
    fn test_secondary_options_exclude_primary_and_added() {
        let all: Vec<DataSource> = (1..=5).map(|id| source(id, SourceKind::Spreadsheet)).collect();
        let store = loaded(all.clone());

        for primary in 1..=5 {
            // every subset of the other sources as the current selection
            for mask in 0u8..32 {
                let mut selection = SourceSelection::default();
                selection.select_primary(primary, &store);
                for id in 1..=5i64 {
                    if mask & (1 << (id - 1)) != 0 {
                        selection.add_secondary(id);
                    }
                }

                let offered: Vec<i64> = selection.secondary_options(&all).iter().map(|o| o.id).collect();
                assert!(!offered.contains(&primary));
                for added in selection.secondary() {
                    assert!(!offered.contains(added));
                }
                assert!(!selection.secondary().contains(&primary));
                assert_eq!(offered.len() + selection.secondary().len() + 1, all.len());
            }
        }
    }

    #[test]
    fn test_secondary_add_remove() {
        let store = loaded(vec![source(1, SourceKind::Url), source(2, SourceKind::Url)]);
        let mut selection = SourceSelection::default();
        selection.select_primary(1, &store);

        selection.add_secondary(2);
        selection.add_secondary(2);
        selection.add_secondary(1);
        assert_eq!(selection.secondary(), &[2]);
        assert_eq!(selection.dataset_ids(), Some(vec![2]));

        selection.remove_secondary(2);
        assert!(selection.secondary().is_empty());
        assert_eq!(selection.dataset_ids(), None);
    }

    #[test]
    fn test_switching_primary_drops_secondary_and_table() {
        let store = loaded(vec![source(1, SourceKind::Url), source(2, SourceKind::Url), source(3, SourceKind::Url)]);
        let mut selection = SourceSelection::default();
        selection.select_primary(1, &store);
        selection.add_secondary(3);
        selection.select_table("orders".to_string());
        assert_eq!(selection.selected_tables(), vec!["orders".to_string()]);

        selection.select_primary(2, &store);
        assert!(selection.secondary().is_empty());
        assert!(selection.table().is_none());
    }

    #[test]
    fn test_ask_request_carries_selection() {
        let store = loaded(vec![source(1, SourceKind::Url), source(2, SourceKind::Spreadsheet)]);
        let mut selection = SourceSelection::default();
        assert!(selection.ask_request(3, "q".to_string(), "m").is_none());

        selection.select_primary(1, &store);
        selection.add_secondary(2);
        selection.select_table("orders".to_string());

        let request = selection.ask_request(3, "Busiest month?".to_string(), "m").unwrap();
        assert_eq!(request.dataset_id, 1);
        assert_eq!(request.dataset_ids, Some(vec![2]));
        assert_eq!(request.selected_tables, vec!["orders".to_string()]);
        assert_eq!(request.kind, "url");
        assert_eq!(request.conversation_id, 3);
    }

    #[test]
    fn test_pick_suggestion_goes_through_callback() {
        let mut selection = SourceSelection::default();
        selection.set_suggestions(vec!["Top customers?".to_string(), "Churn trend?".to_string()]);

        let mut sent = Vec::new();
        selection.pick_suggestion(1, |q| sent.push(q));
        assert_eq!(sent, vec!["Churn trend?".to_string()]);
        assert_eq!(selection.pick_suggestion(5, |q| q), None);
    }
}
