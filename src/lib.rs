//! gander — a personal LINE assistant daemon.
//!
//! One long-running process that relays chat through a goose persona,
//! pushes holiday countdown reminders, checks in on a quiet partner, and
//! scrapes an HR portal for the day's punch-clock record.

pub mod attendance;
pub mod care;
pub mod channels;
pub mod clock;
pub mod config;
pub mod error;
pub mod holidays;
pub mod llm;
pub mod persona;
pub mod reminders;
pub mod router;
pub mod scheduler;
pub mod server;
pub mod state;
