pub mod core;
pub mod maintenance;
pub mod telegram;
pub mod tickets;

pub use crate::core::bot::{EventKind, InboundEvent, SupportBot};
pub use crate::core::config::AppConfig;
