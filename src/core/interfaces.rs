use crate::core::models::*;
use crate::utils::{ParseError, ResolutionError};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_file(&self, path: &Path) -> io::Result<String>;
    async fn write_file(&self, path: &Path, content: &[u8]) -> io::Result<()>;
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    async fn remove_file(&self, path: &Path) -> io::Result<()>;
    async fn create_directory(&self, path: &Path) -> io::Result<()>;
    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
    async fn is_file(&self, path: &Path) -> bool;
    async fn is_dir(&self, path: &Path) -> bool;
}

/// Maps a specifier plus base directory to a canonical module identity
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    async fn resolve(
        &self,
        specifier: &ModuleSpecifier,
        from_directory: &Path,
    ) -> std::result::Result<ModuleIdentity, ResolutionError>;
}

/// Extracts static references and the rendering plan of one module
pub trait ModuleScanner: Send + Sync {
    fn scan(&self, path: &Path, source: &str) -> std::result::Result<ModuleAnalysis, ParseError>;
}

/// Size-reduction step applied to the whole bundle in production mode
#[async_trait]
pub trait CodeMinifier: Send + Sync {
    async fn minify(&self, code: String) -> std::result::Result<String, ParseError>;
}

/// The black-box bundling contract: configuration in, result out
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn run(&self, config: &Configuration) -> BuildResult;
}
