// Testing Tools Library
//
// Utilities for exercising a running live_visitors server from the outside.
// Currently includes:
// - sse-test-client: count stream integration testing tool

pub mod identity;
pub mod output;
pub mod scenarios;
pub mod sse_client;
