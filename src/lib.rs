//! burrow: a sandboxed, line-oriented file transfer server
//!
//! One control connection per client carries both command lines and
//! length-prefixed file frames. Every user is confined to their own
//! directory under the server root.

pub mod auth;
pub mod cli;
pub mod client;
pub mod command;
pub mod config;
pub mod conn;
pub mod engine;
pub mod error;
pub mod listing;
pub mod logger;
pub mod net;
pub mod protocol;
pub mod protocol_core;
pub mod sandbox;
pub mod session;
