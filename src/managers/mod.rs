// SmartMarks view state managers
// Managers own the state of a mounted view and drive it from the injected services.

pub mod bookmark_sync;
pub mod entry_guard;
