//! # Tronity Agent
//!
//! Host runtime that registers one vehicle from the environment, keeps it
//! polled, and logs every observed field after each refresh.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod runtime;

pub use config::AgentConfig;
pub use runtime::Agent;
