//! Mailbeacon - email campaign engagement tracking service
//!
//! This library provides the core functionality for the Mailbeacon service:
//! rewriting outbound email HTML for tracking, ingesting engagement events,
//! maintaining aggregate rollups, and serving analytics.
//!
//! # Architecture
//! - `rewriter`: Outbound HTML rewriting (tracking pixel, link redirection)
//! - `tracking`: Event model and buffered event manager
//! - `storage`: SeaORM storage backend (event log, rollups, references)
//! - `services`: Application-level engagement service
//! - `api`: HTTP services and middleware
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and server mode
//! - `system`: Logging and process-level utilities

pub mod api;
pub mod config;
pub mod errors;
pub mod rewriter;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod tracking;
pub mod utils;
