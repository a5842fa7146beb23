// SmartMarks backends
// Each backend implements the auth, store and change-stream contracts for one kind of service.

pub mod local;
#[cfg(feature = "hosted")]
pub mod rest;
