//! Mail source abstraction. Pure I/O, no filtering logic.

use async_trait::async_trait;
use tracing::debug;

use crate::boundary::{Boundary, format_query_date};
use crate::error::MailError;
use crate::mail::types::{MessageStub, RawMessage, StubPage};

/// A searchable mailbox.
///
/// The search is a loose pre-filter; callers must not trust it for
/// correctness.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Source name for logging (e.g. "gmail").
    fn name(&self) -> &str;

    /// Fetch one page of stubs matching `query`.
    async fn list_page(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<StubPage, MailError>;

    /// Fetch a full message by id.
    async fn fetch(&self, id: &str) -> Result<RawMessage, MailError>;
}

/// Build the server-side query: the predicate plus an `after:` date hint.
pub fn search_query(predicate: &str, boundary: &Boundary) -> String {
    format!("({predicate}) after:{}", format_query_date(boundary.date))
}

/// Page through every result for `query` before returning.
///
/// Fails if the source hands back the same cursor twice in a row, which
/// would otherwise loop forever.
pub async fn drain_candidates(
    source: &dyn MailSource,
    query: &str,
) -> Result<Vec<MessageStub>, MailError> {
    let mut stubs = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source.list_page(query, page_token.as_deref()).await?;
        pages += 1;
        stubs.extend(page.stubs);

        match page.next_page_token {
            Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                return Err(MailError::InvalidResponse {
                    source_name: source.name().to_string(),
                    reason: format!("page token '{next}' repeated"),
                });
            }
            Some(next) => page_token = Some(next),
            None => break,
        }
    }

    debug!(
        source = source.name(),
        pages,
        candidates = stubs.len(),
        "Drained candidate listing"
    );
    Ok(stubs)
}
