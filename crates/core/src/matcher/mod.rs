//! Confidence matching between search candidates and book requests.
//!
//! Everything in this module is pure and synchronous: the orchestrator feeds
//! it candidates and request metadata, the server reuses it for candidate
//! previews. No I/O happens here.

mod confidence;
mod release_name;
mod types;

pub use confidence::{calculate_confidence, text_similarity};
pub use release_name::{parse_release_name, ParsedRelease};
pub use types::{ConfidenceTier, MatchResult};
