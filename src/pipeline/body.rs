//! Body normalization: reduce a MIME tree to one plain-text string.
//!
//! Precedence: first `text/plain` leaf (preorder, root first), else first
//! `text/html` leaf with markup stripped, else empty. A leaf that fails to
//! decode yields nothing and the search moves on.

use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use tracing::debug;

use crate::mail::types::{BodyEncoding, MimeNode};

/// Multipart nesting deeper than this is not searched.
pub const MAX_MIME_DEPTH: usize = 64;

/// Base64url with optional padding, as Gmail emits it.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static NBSP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)&(nbsp|#160|#x0*a0);").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Which part of the tree the text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOrigin {
    Plain,
    Html,
    Empty,
}

/// Normalized body text plus what happened while finding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyText {
    pub text: String,
    pub origin: BodyOrigin,
    /// Leaves of a wanted type that could not be decoded.
    pub decode_failures: usize,
}

/// A leaf payload that could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum BodyDecodeError {
    #[error("invalid base64url payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Reduce a message body tree to plain text. Never fails.
pub fn normalize_body(root: Option<&MimeNode>) -> BodyText {
    let mut decode_failures = 0;

    let Some(root) = root else {
        return BodyText {
            text: String::new(),
            origin: BodyOrigin::Empty,
            decode_failures,
        };
    };

    if let Some(text) = find_leaf_text(root, "text/plain", &mut decode_failures) {
        return BodyText {
            text,
            origin: BodyOrigin::Plain,
            decode_failures,
        };
    }

    if let Some(html) = find_leaf_text(root, "text/html", &mut decode_failures) {
        return BodyText {
            text: html_to_text(&html),
            origin: BodyOrigin::Html,
            decode_failures,
        };
    }

    BodyText {
        text: String::new(),
        origin: BodyOrigin::Empty,
        decode_failures,
    }
}

/// Strip tags, collapse non-breaking-space entities and whitespace runs.
pub fn html_to_text(html: &str) -> String {
    let without_tags = TAG.replace_all(html, " ");
    let without_nbsp = NBSP.replace_all(&without_tags, " ");
    WHITESPACE
        .replace_all(&without_nbsp, " ")
        .trim()
        .to_string()
}

/// Decode a leaf payload to text. Invalid UTF-8 is replaced, not rejected.
pub fn decode_leaf(encoding: BodyEncoding, data: &[u8]) -> Result<String, BodyDecodeError> {
    let bytes = match encoding {
        BodyEncoding::Identity => return Ok(String::from_utf8_lossy(data).into_owned()),
        BodyEncoding::Base64Url => BASE64_URL.decode(data)?,
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Preorder search for the first leaf of `media_type` with non-empty text.
fn find_leaf_text(root: &MimeNode, media_type: &str, failures: &mut usize) -> Option<String> {
    let mut stack: Vec<(&MimeNode, usize)> = vec![(root, 0)];

    while let Some((node, depth)) = stack.pop() {
        match node {
            MimeNode::Leaf { encoding, data, .. } => {
                if !node.is_leaf_of(media_type) {
                    continue;
                }
                match decode_leaf(*encoding, data) {
                    Ok(text) if !text.is_empty() => return Some(text),
                    Ok(_) => {}
                    Err(e) => {
                        *failures += 1;
                        debug!(media_type, error = %e, "Skipping undecodable body part");
                    }
                }
            }
            MimeNode::Multipart { children, .. } => {
                if depth >= MAX_MIME_DEPTH {
                    debug!(depth, "MIME tree too deep, not descending further");
                    continue;
                }
                stack.extend(children.iter().rev().map(|child| (child, depth + 1)));
            }
        }
    }
    None
}
