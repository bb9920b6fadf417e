//! Integration tests for Site-Scribe
//!
//! Most tests drive the job manager against a scripted extractor and an
//! in-memory writer; `http_tests` runs the real HTTP extractor against a
//! wiremock server.

mod common;
mod lifecycle_tests;
mod resume_tests;
mod scenario_tests;
