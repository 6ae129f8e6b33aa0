/// Web API Handlers
///
/// This module contains the handlers for the RESTful API endpoints.
/// Each handler locks the shared study session, calls into the collection
/// and turns the result (or the error) into a JSON response.

mod deck_handlers;
mod filtered_handlers;
mod note_handlers;
mod card_handlers;
mod study_handlers;

// Re-export all handlers
pub use deck_handlers::*;
pub use filtered_handlers::*;
pub use note_handlers::*;
pub use card_handlers::*;
pub use study_handlers::*;
