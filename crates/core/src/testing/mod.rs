//! Test doubles shared by unit and integration tests.

mod mock_source;

pub use mock_source::{MockSourceAdapter, RecordedSearch, RecordedSubmit};
