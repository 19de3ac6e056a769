//! Unit tests for the reference-data client
//!
//! This module contains tests for various components of the crate.

pub mod config_tests;
pub mod resilience_tests;
pub mod session_mock_tests;
