//! Gmail REST API mail source.
//!
//! Uses an already-authorized bearer token; the OAuth handshake happens
//! elsewhere. Leaf bodies are kept in their base64url transport form so
//! decoding failures surface in body normalization, not here.

use std::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use tracing::debug;

use crate::error::MailError;
use crate::mail::source::MailSource;
use crate::mail::types::{BodyEncoding, Header, MessageStub, MimeNode, RawMessage, StubPage};

const SOURCE_NAME: &str = "gmail";

/// Gmail API client scoped to one user.
pub struct GmailSource {
    client: reqwest::Client,
    access_token: SecretString,
    user_id: String,
    base_url: String,
}

impl GmailSource {
    pub fn new(access_token: SecretString, user_id: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
            user_id,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.base_url, self.user_id)
    }

    /// GET a URL and return the response body, mapping non-2xx to errors.
    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, MailError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| MailError::Http {
                source_name: SOURCE_NAME.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| MailError::Http {
            source_name: SOURCE_NAME.into(),
            reason: format!("reading body: {e}"),
        })?;

        if !status.is_success() {
            return Err(MailError::Status {
                source_name: SOURCE_NAME.into(),
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl MailSource for GmailSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn list_page(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<StubPage, MailError> {
        let mut params = vec![("q", query)];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let body = self.get_text(&self.messages_url(), &params).await?;
        parse_list_page(&body)
    }

    async fn fetch(&self, id: &str) -> Result<RawMessage, MailError> {
        let url = format!("{}/{}", self.messages_url(), id);
        let body = match self.get_text(&url, &[("format", "full")]).await {
            Err(MailError::Status { status: 404, .. }) => {
                return Err(MailError::NotFound { id: id.to_string() });
            }
            other => other?,
        };
        parse_message(&body).map_err(|e| MailError::Malformed {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}

// ── Wire format ─────────────────────────────────────────────────────

/// Payload parts nested deeper than this are skipped unread.
///
/// Each part level costs two JSON levels, and skipped values do not count
/// toward serde_json's recursion limit of 128, so any nesting parses.
pub const MAX_PART_DEPTH: usize = 60;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<StubJson>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StubJson {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageJson {
    id: String,
    internal_date: Option<String>,
    payload: Option<PartJson>,
}

#[derive(Debug, Default)]
struct PartJson {
    mime_type: String,
    headers: Vec<HeaderJson>,
    body: Option<BodyJson>,
    parts: Vec<PartJson>,
    /// Children were present but below `MAX_PART_DEPTH`.
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct HeaderJson {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct BodyJson {
    data: Option<String>,
}

impl<'de> Deserialize<'de> for PartJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PartSeed { depth: 0 }.deserialize(deserializer)
    }
}

/// One payload part at a known depth.
#[derive(Clone, Copy)]
struct PartSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for PartSeed {
    type Value = PartJson;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<PartJson, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for PartSeed {
    type Value = PartJson;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a Gmail message part")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<PartJson, A::Error> {
        let mut part = PartJson::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "mimeType" => {
                    part.mime_type = map.next_value::<Option<String>>()?.unwrap_or_default();
                }
                "headers" => {
                    part.headers = map.next_value::<Option<Vec<HeaderJson>>>()?.unwrap_or_default();
                }
                "body" => part.body = map.next_value()?,
                "parts" if self.depth < MAX_PART_DEPTH => {
                    part.parts = map.next_value_seed(PartsSeed {
                        depth: self.depth + 1,
                    })?;
                }
                "parts" => {
                    map.next_value::<IgnoredAny>()?;
                    part.truncated = true;
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(part)
    }
}

/// The `parts` array of a part, whose children sit at `depth`.
#[derive(Clone, Copy)]
struct PartsSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for PartsSeed {
    type Value = Vec<PartJson>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<PartJson>, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for PartsSeed {
    type Value = Vec<PartJson>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of Gmail message parts")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Vec<PartJson>, E> {
        Ok(Vec::new())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<PartJson>, A::Error> {
        let mut parts = Vec::new();
        while let Some(part) = seq.next_element_seed(PartSeed { depth: self.depth })? {
            parts.push(part);
        }
        Ok(parts)
    }
}

/// Parse a `users.messages.list` response.
pub fn parse_list_page(json: &str) -> Result<StubPage, MailError> {
    let resp: ListResponse = serde_json::from_str(json).map_err(invalid)?;
    Ok(StubPage {
        stubs: resp
            .messages
            .into_iter()
            .map(|m| MessageStub { id: m.id })
            .collect(),
        next_page_token: resp.next_page_token.filter(|t| !t.is_empty()),
    })
}

/// Parse a `users.messages.get?format=full` response.
pub fn parse_message(json: &str) -> Result<RawMessage, serde_json::Error> {
    let msg: MessageJson = serde_json::from_str(json)?;

    let timestamp_ms = msg
        .internal_date
        .as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok());

    let (headers, body) = match msg.payload {
        Some(mut payload) => {
            let headers = std::mem::take(&mut payload.headers)
                .into_iter()
                .map(|h| Header::new(h.name, h.value))
                .collect();
            (headers, Some(part_to_node(payload)))
        }
        None => (Vec::new(), None),
    };

    Ok(RawMessage {
        id: msg.id,
        timestamp_ms,
        headers,
        body,
    })
}

/// Recursion is bounded by `MAX_PART_DEPTH`.
fn part_to_node(part: PartJson) -> MimeNode {
    if part.truncated {
        debug!(media_type = %part.mime_type, "Payload nested too deep, dropping children");
        return MimeNode::multipart(part.mime_type, Vec::new());
    }
    if part.parts.is_empty() {
        MimeNode::Leaf {
            media_type: part.mime_type,
            encoding: BodyEncoding::Base64Url,
            data: part
                .body
                .and_then(|b| b.data)
                .map(String::into_bytes)
                .unwrap_or_default(),
        }
    } else {
        MimeNode::Multipart {
            media_type: part.mime_type,
            children: part.parts.into_iter().map(part_to_node).collect(),
        }
    }
}

fn invalid(e: serde_json::Error) -> MailError {
    MailError::InvalidResponse {
        source_name: SOURCE_NAME.into(),
        reason: e.to_string(),
    }
}
