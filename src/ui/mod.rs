//! SmartMarks presentation layer.
//!
//! Rendering is a pure function of the view state so any host (the terminal
//! CLI, a test, a future GUI) can display it.

pub mod render;
