pub mod connection;
pub mod inspect;
pub mod sanitizer;
pub mod schema;

pub use connection::{open_database, ConnectionStrategy};
pub use inspect::{inspect_database, DatabaseInspection};
pub use sanitizer::{sanitize_database, SanitizeOutcome};
pub use schema::{is_safe_identifier, TableDescriptor};
