//! Configuration: the YAML file schema and the staged loader.

pub mod loader;
pub mod schema;

pub use loader::{Loaded, ServerSettings, load};
pub use schema::QuizConfig;
