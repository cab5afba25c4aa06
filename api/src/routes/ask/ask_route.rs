//! POST /finders/{finder_id}/ask: extractive QA through a registered finder.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::PathRejection},
};
use finder::FinderResponse;
use tracing::{debug, warn};

use crate::{
    core::app_state::AppState,
    error_handler::{AppError, AppResult},
    routes::ask::ask_request::AskRequest,
};

/// Handler: POST /finders/{finder_id}/ask
///
/// # Example
/// The body is parsed as JSON whatever the `Content-Type`, so plain
/// `curl --data` works.
///
/// ```bash
/// curl -X POST http://127.0.0.1:8000/finders/1/ask \
///   -d '{"question":"Who is the father of Arya Stark?","top_k_reader":3}'
/// ```
pub async fn ask(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> AppResult<Json<FinderResponse>> {
    let Path(raw_id) = path?;
    let finder_id = parse_finder_id(&raw_id)?;
    let request: AskRequest =
        serde_json::from_slice(&body).map_err(|e| AppError::Validation(e.to_string()))?;
    request.validate()?;

    let Some((finder_id, finder)) =
        finder_id.and_then(|id| state.registry.get(id).map(|f| (id, f)))
    else {
        return Err(AppError::FinderNotFound {
            id: display_id(&raw_id),
            available: state.registry.ids(),
        });
    };

    debug!(
        finder_id,
        question = %request.question,
        top_k_retriever = request.top_k_retriever,
        top_k_reader = request.top_k_reader,
        "ask: start"
    );

    let AskRequest {
        question,
        filters,
        top_k_reader,
        top_k_retriever,
    } = request;

    // Retrieval and inference are CPU bound.
    let response = tokio::task::spawn_blocking(move || {
        finder.get_answers(&question, filters.as_ref(), top_k_retriever, top_k_reader)
    })
    .await??;

    for a in response.answers.iter().filter(|a| !a.offsets_in_context()) {
        warn!(
            finder_id,
            answer = %a.answer,
            offset_start = a.offset_start,
            offset_end = a.offset_end,
            "ask: answer offsets fall outside its context"
        );
    }

    debug!(finder_id, answers = response.answers.len(), "ask: success");
    Ok(Json(response))
}

/// Parses a path id made of ASCII digits.
///
/// Ids too large for `u32` cannot be registered and yield `Ok(None)`;
/// anything non-numeric is a validation error.
fn parse_finder_id(raw: &str) -> AppResult<Option<u32>> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::Validation(format!(
            "finder_id must be a non-negative integer, got {raw:?}"
        )));
    }
    Ok(raw.parse().ok())
}

/// Canonical decimal form of a digit string (`"007"` → `"7"`).
fn display_id(raw: &str) -> String {
    match raw.trim_start_matches('0') {
        "" => "0".to_string(),
        digits => digits.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_digit_ids() {
        assert_eq!(parse_finder_id("1").unwrap(), Some(1));
        assert_eq!(parse_finder_id("007").unwrap(), Some(7));
        assert_eq!(parse_finder_id("4294967295").unwrap(), Some(u32::MAX));
    }

    #[test]
    fn overflowing_ids_are_unresolvable_not_invalid() {
        assert_eq!(parse_finder_id("4294967296").unwrap(), None);
        assert_eq!(parse_finder_id("99999999999999999999999").unwrap(), None);
    }

    #[test]
    fn non_numeric_ids_are_invalid() {
        for raw in ["", "abc", "-1", "+1", "1.5", " 1"] {
            assert!(matches!(parse_finder_id(raw), Err(AppError::Validation(_))), "{raw}");
        }
    }

    #[test]
    fn display_strips_leading_zeros() {
        assert_eq!(display_id("007"), "7");
        assert_eq!(display_id("000"), "0");
        assert_eq!(display_id("4294967296"), "4294967296");
    }
}
