//! Offline mail source over a directory of `.eml` files.
//!
//! Each file is one RFC 822 message; its `Date:` header stands in for the
//! authoritative receipt time. The search query is ignored: every file is
//! a candidate, and the pipeline filters as usual.

use std::path::PathBuf;

use async_trait::async_trait;
use mail_parser::{Message, MessageParser, MimeHeaders, PartType};
use tracing::debug;

use crate::error::MailError;
use crate::mail::source::MailSource;
use crate::mail::types::{BodyEncoding, Header, MessageStub, MimeNode, RawMessage, StubPage};
use crate::pipeline::body::MAX_MIME_DEPTH;

const SOURCE_NAME: &str = "eml";

/// Reads `*.eml` files from one directory, ordered by file name.
pub struct EmlDirSource {
    dir: PathBuf,
}

impl EmlDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl MailSource for EmlDirSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn list_page(
        &self,
        _query: &str,
        _page_token: Option<&str>,
    ) -> Result<StubPage, MailError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_eml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("eml"));
            if is_eml
                && entry.file_type().await?.is_file()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                names.push(name.to_string());
            }
        }
        names.sort();

        debug!(dir = %self.dir.display(), count = names.len(), "Listed .eml files");
        Ok(StubPage {
            stubs: names.into_iter().map(|id| MessageStub { id }).collect(),
            next_page_token: None,
        })
    }

    async fn fetch(&self, id: &str) -> Result<RawMessage, MailError> {
        if id.contains(['/', '\\']) || id == ".." {
            return Err(MailError::NotFound { id: id.to_string() });
        }
        let path = self.dir.join(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MailError::NotFound { id: id.to_string() });
            }
            Err(e) => return Err(e.into()),
        };
        parse_eml(id, &bytes)
    }
}

/// Parse one RFC 822 message into a [`RawMessage`].
pub fn parse_eml(id: &str, raw: &[u8]) -> Result<RawMessage, MailError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MailError::Malformed {
            id: id.to_string(),
            reason: "not a parseable message".into(),
        })?;

    let mut headers = Vec::new();
    if let Some(subject) = parsed.subject() {
        headers.push(Header::new("Subject", subject));
    }
    if let Some(from) = format_from(&parsed) {
        headers.push(Header::new("From", from));
    }
    if let Some(message_id) = parsed.message_id() {
        headers.push(Header::new("Message-ID", message_id));
    }

    let timestamp_ms = parsed
        .date()
        .and_then(|d| d.to_timestamp().checked_mul(1000));

    let body = (!parsed.parts.is_empty()).then(|| convert_part(&parsed, 0, 0));

    Ok(RawMessage {
        id: id.to_string(),
        timestamp_ms,
        headers,
        body,
    })
}

/// `Name <address>` when both are present, otherwise whichever is.
fn format_from(message: &Message<'_>) -> Option<String> {
    let addr = message.from()?.first()?;
    match (addr.name(), addr.address()) {
        (Some(name), Some(address)) => Some(format!("{name} <{address}>")),
        (None, Some(address)) => Some(address.to_string()),
        (Some(name), None) => Some(name.to_string()),
        (None, None) => None,
    }
}

fn convert_part(message: &Message<'_>, part_id: usize, depth: usize) -> MimeNode {
    let Some(part) = message.parts.get(part_id) else {
        return MimeNode::multipart("multipart/mixed", Vec::new());
    };

    let declared = part.content_type().map(|ct| match ct.subtype() {
        Some(sub) => format!("{}/{}", ct.ctype(), sub),
        None => ct.ctype().to_string(),
    });
    let media_type = |fallback: &str| declared.clone().unwrap_or_else(|| fallback.to_string());

    match &part.body {
        PartType::Text(text) => leaf(media_type("text/plain"), text.as_bytes()),
        PartType::Html(html) => leaf(media_type("text/html"), html.as_bytes()),
        PartType::Binary(data) | PartType::InlineBinary(data) => {
            leaf(media_type("application/octet-stream"), data)
        }
        PartType::Message(nested) => {
            let children = if depth < MAX_MIME_DEPTH && !nested.parts.is_empty() {
                vec![convert_part(nested, 0, depth + 1)]
            } else {
                Vec::new()
            };
            MimeNode::multipart(media_type("message/rfc822"), children)
        }
        PartType::Multipart(ids) => {
            let children = if depth < MAX_MIME_DEPTH {
                ids.iter()
                    .filter_map(|id| usize::try_from(*id).ok())
                    .filter(|&id| id != part_id)
                    .map(|id| convert_part(message, id, depth + 1))
                    .collect()
            } else {
                Vec::new()
            };
            MimeNode::multipart(media_type("multipart/mixed"), children)
        }
    }
}

fn leaf(media_type: String, data: &[u8]) -> MimeNode {
    MimeNode::Leaf {
        media_type,
        encoding: BodyEncoding::Identity,
        data: data.to_vec(),
    }
}
