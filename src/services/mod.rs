// SmartMarks services
// Contracts of the external collaborators plus input validation, settings and session storage.

pub mod auth;
pub mod change_stream;
pub mod navigation;
pub mod settings_engine;
pub mod store;
pub mod token_vault;
pub mod url_validator;
