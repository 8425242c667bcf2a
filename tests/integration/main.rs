//! Integration tests
//!
//! These tests use wiremock to serve scripted responses to a real reqwest
//! client driven through the throttler, the retry loop, the circuit
//! breaker and the extractor.

mod pipeline_tests;
