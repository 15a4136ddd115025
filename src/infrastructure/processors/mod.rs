// Processors module
pub mod bundle_renderer;
pub mod minifier;
pub mod module_scanner;

pub use bundle_renderer::*;
pub use minifier::*;
pub use module_scanner::*;
