pub mod bot;
pub mod config;
pub mod session;
pub mod shared;
