//! Integration tests: full refresh pipeline against an in-memory price source.

mod mock_source;
mod pipeline;
