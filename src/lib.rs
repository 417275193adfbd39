pub mod clipboard;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod focus;
pub mod gesture;
pub mod hotkey;
pub mod platform;
pub mod resolver;
pub mod transaction;
