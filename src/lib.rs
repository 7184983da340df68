//! EduNexus Auth Backend Library
//!
//! Exposes the auth, API, and config modules for use by the binary and
//! integration tests.

pub mod api;
pub mod auth;
pub mod config;
