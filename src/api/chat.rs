use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError, FragmentStream};
use crate::answer::HistoryMessage;
use crate::models::{AskRequest, Conversation};
use crate::stream::TurnEvent;

const CHAT_BASE: &str = "/chat/v1";

#[derive(Debug, Serialize)]
struct InitiateRequest<'a> {
    data_source_id: i64,
    title: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConversationId {
    Bare(i64),
    Wrapped {
        #[serde(alias = "conversation_id", alias = "conversaction_id")]
        id: i64,
    },
}

impl ConversationId {
    fn into_id(self) -> i64 {
        match self {
            ConversationId::Bare(id) | ConversationId::Wrapped { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListPayload<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "conversations", alias = "conversactions", alias = "messages", alias = "history")]
        items: Vec<T>,
    },
}

impl<T> ListPayload<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListPayload::Bare(items) | ListPayload::Wrapped { items } => items,
        }
    }
}

impl ApiClient {
    pub async fn initiate_conversation(&self, data_source_id: i64, title: &str) -> Result<i64, ApiError> {
        let id: ConversationId = self
            .post(
                &format!("{}/initiate-conversaction", CHAT_BASE),
                &InitiateRequest {
                    data_source_id,
                    title,
                },
            )
            .await?;
        Ok(id.into_id())
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let list: ListPayload<Conversation> = self
            .get(&format!("{}/get-conversactions", CHAT_BASE))
            .await?;
        Ok(list.into_vec())
    }

    pub async fn conversation_history(&self, conversation_id: i64) -> Result<Vec<HistoryMessage>, ApiError> {
        let list: ListPayload<HistoryMessage> = self
            .get(&format!("{}/get-conversaction-history/{}", CHAT_BASE, conversation_id))
            .await?;
        Ok(list.into_vec())
    }

    pub async fn ask(&self, request: &AskRequest) -> Result<FragmentStream, ApiError> {
        self.post_stream(&format!("{}/ask-question", CHAT_BASE), request)
            .await
    }
}

enum TurnState {
    Connecting(ApiClient, AskRequest),
    Streaming(FragmentStream),
    Done,
}

/// Sends one question and yields the turn as events, ending with `Completed` or `Failed`.
pub fn turn_events(client: ApiClient, request: AskRequest) -> impl Stream<Item = TurnEvent> + Send + 'static {
    futures_util::stream::unfold(TurnState::Connecting(client, request), |mut state| async move {
        loop {
            match state {
                TurnState::Connecting(client, request) => match client.ask(&request).await {
                    Ok(body) => state = TurnState::Streaming(body),
                    Err(e) => return Some((TurnEvent::Failed(e.to_string()), TurnState::Done)),
                },
                TurnState::Streaming(mut body) => match body.next().await {
                    Some(Ok(fragments)) if fragments.is_empty() => state = TurnState::Streaming(body),
                    Some(Ok(fragments)) => {
                        return Some((TurnEvent::Fragments(fragments), TurnState::Streaming(body)))
                    }
                    Some(Err(e)) => return Some((TurnEvent::Failed(e.to_string()), TurnState::Done)),
                    None => return Some((TurnEvent::Completed, TurnState::Done)),
                },
                TurnState::Done => return None,
            }
        }
    })
}
