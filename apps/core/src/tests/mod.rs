//! Test Module
//!
//! Cross-module test suite for the companion engine.
//!
//! ## Test Categories
//! - `engine_tests`: Multi-turn scenarios, resilience and turn properties
//! - `session_tests`: Choice splitting, apologies, reset and tone toggle

pub mod engine_tests;
