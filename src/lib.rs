// Core modules
pub mod api;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod journal;
pub mod models;
pub mod notify;
pub mod settings;
pub mod strategy;

// Re-export commonly used types
pub use api::ExchangeGateway;
pub use engine::TradingEngine;
pub use error::BotError;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
