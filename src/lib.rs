//! Clawe - notification watcher, heartbeat bootstrapper, and chat client
//! for an OpenClaw agent squad

pub mod chat;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod store;
pub mod telemetry;
pub mod template;
pub mod watcher;
