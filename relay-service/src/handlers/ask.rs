//! `GET /ask?q=<query>&id=<user_id>`

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::services::Speaker;
use crate::startup::AppState;

pub const MISSING_PARAMS_MESSAGE: &str = "Please provide both the q and id query parameters.";
pub const GENERATION_FAILED_MESSAGE: &str =
    "Failed to process the question. Please try again later.";

/// Query parameters. Both are optional here so missing values produce our own 400.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AskQuery {
    pub q: Option<String>,
    pub id: Option<String>,
}

impl AskQuery {
    /// The first occurrence of a repeated parameter wins; later ones are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "q" => &mut query.q,
                "id" => &mut query.id,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Relay a question to the model within the caller's session.
///
/// The user turn is recorded before the model is called, so a failed call
/// leaves a `User:` entry with no matching `Bot:` entry.
pub async fn ask(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<AskResponse>, AppError> {
    let params = AskQuery::from_pairs(pairs);
    let (query, user_id) = match (non_empty(params.q), non_empty(params.id)) {
        (Some(q), Some(id)) => (q, id),
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                MISSING_PARAMS_MESSAGE
            )))
        }
    };

    let session = state
        .sessions
        .get_or_create(&user_id, state.provider.as_ref());
    let mut session = session.lock().await;

    session.record(Speaker::User, &query);

    match state.provider.send(session.conversation_mut(), &query).await {
        Ok(reply) => {
            session.record(Speaker::Bot, &reply);
            Ok(Json(AskResponse { response: reply }))
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Error processing question");
            Err(AppError::ProcessingFailed(
                GENERATION_FAILED_MESSAGE.to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn first_repeated_value_wins() {
        let query = AskQuery::from_pairs(pairs(&[("q", "a"), ("id", "u1"), ("q", "b")]));
        assert_eq!(query.q.as_deref(), Some("a"));
        assert_eq!(query.id.as_deref(), Some("u1"));
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        let query = AskQuery::from_pairs(pairs(&[("lang", "en"), ("q", "hi")]));
        assert_eq!(
            query,
            AskQuery {
                q: Some("hi".to_string()),
                id: None,
            }
        );
    }

    #[test]
    fn empty_first_value_is_kept() {
        let query = AskQuery::from_pairs(pairs(&[("id", ""), ("id", "u1")]));
        assert_eq!(non_empty(query.id), None);
    }
}
