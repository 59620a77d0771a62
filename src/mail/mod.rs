//! Mail sources: where candidate messages come from.
//!
//! - `gmail`: Gmail REST API with a pre-authorized bearer token
//! - `eml_dir`: a local directory of `.eml` files
//!
//! Both produce the same `RawMessage` / `MimeNode` model.

pub mod eml_dir;
pub mod gmail;
pub mod source;
pub mod types;

pub use eml_dir::EmlDirSource;
pub use gmail::GmailSource;
pub use source::{MailSource, drain_candidates, search_query};
pub use types::{BodyEncoding, Header, MessageStub, MimeNode, RawMessage, StubPage};
