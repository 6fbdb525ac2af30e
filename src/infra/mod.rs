//! Infrastructure layer: config, logging, secrets and OS notifications.

pub mod config;
pub mod contracts;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod secrets;
