//! End-to-end tests: snapshot on disk → pipeline → results on disk,
//! with the reasoning service and the event source replaced by
//! in-memory mocks.

mod mocks;
mod pipeline;
