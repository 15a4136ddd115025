// Core domain layer
pub mod emitter;
pub mod graph_builder;
pub mod interfaces;
pub mod models;
pub mod services;

pub use emitter::*;
pub use graph_builder::*;
pub use interfaces::*;
pub use models::*;
pub use services::*;
