//! SmartMarks: a personal bookmark manager whose list stays in sync with a
//! remote store.
//!
//! The library holds the view state machines, the service contracts they are
//! driven through, two backends implementing those contracts and a pure
//! renderer. The `smartmarks` binary is a thin CLI host over it.

pub mod app;
pub mod backends;
pub mod database;
pub mod managers;
pub mod platform;
pub mod services;
pub mod types;
pub mod ui;
