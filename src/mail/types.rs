//! Mail-source data model: stubs, full messages and the MIME body tree.

// ── Listing ─────────────────────────────────────────────────────────

/// A candidate message returned by a search, before the full fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStub {
    pub id: String,
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct StubPage {
    pub stubs: Vec<MessageStub>,
    /// Cursor for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}

// ── Full message ────────────────────────────────────────────────────

/// A single header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// How a leaf's payload bytes are encoded for transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// Bytes are the content itself.
    #[default]
    Identity,
    /// Bytes are base64url text (padding optional), as Gmail delivers them.
    Base64Url,
}

/// A node of a MIME body tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeNode {
    Leaf {
        media_type: String,
        encoding: BodyEncoding,
        data: Vec<u8>,
    },
    Multipart {
        media_type: String,
        children: Vec<MimeNode>,
    },
}

impl MimeNode {
    /// Leaf with an unencoded text payload.
    pub fn text(media_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Leaf {
            media_type: media_type.into(),
            encoding: BodyEncoding::Identity,
            data: text.into().into_bytes(),
        }
    }

    pub fn multipart(media_type: impl Into<String>, children: Vec<MimeNode>) -> Self {
        Self::Multipart {
            media_type: media_type.into(),
            children,
        }
    }

    pub fn media_type(&self) -> &str {
        match self {
            Self::Leaf { media_type, .. } | Self::Multipart { media_type, .. } => media_type,
        }
    }

    /// True if this is a leaf whose media type equals `wanted`, ignoring case
    /// and any parameters (`text/plain; charset=utf-8`).
    pub fn is_leaf_of(&self, wanted: &str) -> bool {
        match self {
            Self::Leaf { media_type, .. } => media_type
                .split(';')
                .next()
                .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(wanted)),
            Self::Multipart { .. } => false,
        }
    }
}

/// A fully fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    /// The source's own receipt time in epoch milliseconds, if it reported one.
    pub timestamp_ms: Option<i64>,
    /// Headers in source order.
    pub headers: Vec<Header>,
    /// Root of the body tree. `None` when the source returned no payload.
    pub body: Option<MimeNode>,
}

impl RawMessage {
    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Subject header, or empty string.
    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or("")
    }

    /// From header, or empty string.
    pub fn sender(&self) -> &str {
        self.header("From").unwrap_or("")
    }
}
