pub mod filter;
pub mod handlers;
pub mod index;
pub mod query;
pub mod snippet;

use sqlx::types::Json;

use index::SearchIndex;

/// Index to persist alongside a content write.
///
/// `None` means indexing failed; writers bind it through
/// `COALESCE($n, search_index)` so the previous index is kept and the
/// content write still goes through.
pub fn index_for_write(title: &str, body_text: &str, tags: &str) -> Option<Json<SearchIndex>> {
    match SearchIndex::try_build(title, body_text, tags) {
        Ok(index) => Some(Json(index)),
        Err(e) => {
            tracing::warn!(error = %e, "Search indexing failed, keeping previous index");
            None
        }
    }
}
