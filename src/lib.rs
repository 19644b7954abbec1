//! Client for the poll/vote service: the vote eligibility and selection
//! engine, the voting session built on it, result views, and an async
//! client for the service's REST API.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
