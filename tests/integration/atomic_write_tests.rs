use crate::support::Project;
use async_trait::async_trait;
use packrat::core::interfaces::{Bundler, FileSystemService};
use packrat::infrastructure::{MinificationService, OxcModuleScanner, TokioFileSystemService};
use packrat::{BuildError, Mode, PackratBuildService};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Real file system whose writes stop halfway and report a full disk
struct DiskFullFileSystem {
    inner: TokioFileSystemService,
}

#[async_trait]
impl FileSystemService for DiskFullFileSystem {
    async fn read_file(&self, path: &Path) -> io::Result<String> {
        self.inner.read_file(path).await
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        self.inner.write_file(path, &content[..content.len() / 2]).await?;
        Err(io::Error::new(io::ErrorKind::Other, "No space left on device"))
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path).await
    }

    async fn create_directory(&self, path: &Path) -> io::Result<()> {
        self.inner.create_directory(path).await
    }

    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        self.inner.canonicalize(path).await
    }

    async fn is_file(&self, path: &Path) -> bool {
        self.inner.is_file(path).await
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path).await
    }
}

fn disk_full_service() -> PackratBuildService {
    PackratBuildService::new(
        Arc::new(DiskFullFileSystem {
            inner: TokioFileSystemService,
        }),
        Arc::new(OxcModuleScanner::new()),
        Arc::new(MinificationService::new()),
    )
}

fn entries(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(read_dir) => read_dir
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_disk_full_leaves_no_partial_output() {
    let project = Project::new();
    project.file("index.js", "module.exports = 'x'.repeat(10);\n");

    let config = project.config("./index", "dist", Mode::Production);
    let result = disk_full_service().run(&config).await;

    match result.error() {
        Some(BuildError::Write(error)) => {
            assert_eq!(error.path, project.root().join("dist/main.js"));
            assert!(error.to_string().contains("No space left on device"));
        }
        other => panic!("expected write error, got {:?}", other),
    }

    assert!(!project.root().join("dist/main.js").exists());
    assert!(entries(&project.root().join("dist")).is_empty());
}

#[tokio::test]
async fn test_disk_full_keeps_previous_artifact() {
    let project = Project::new();
    project
        .file("index.js", "module.exports = 'new';\n")
        .file("dist/main.js", "previous build\n");

    let config = project.config("./index", "dist", Mode::Development);
    let result = disk_full_service().run(&config).await;
    assert!(!result.is_success());

    let content = std::fs::read_to_string(project.root().join("dist/main.js")).unwrap();
    assert_eq!(content, "previous build\n");
    assert_eq!(entries(&project.root().join("dist")), vec!["main.js"]);
}

#[tokio::test]
async fn test_output_path_occupied_by_directory() {
    let project = Project::new();
    project
        .file("index.js", "module.exports = 1;\n")
        .file("dist/main.js/keep", "");

    let config = project.config("./index", "dist", Mode::Development);
    let result = PackratBuildService::with_defaults().run(&config).await;

    assert!(matches!(result.error(), Some(BuildError::Write(_))));
    assert!(project.root().join("dist/main.js").is_dir());
    assert_eq!(entries(&project.root().join("dist")), vec!["main.js"]);
}

#[tokio::test]
async fn test_successful_build_replaces_previous_artifact() {
    let project = Project::new();
    project
        .file("index.js", "module.exports = 'fresh';\n")
        .file("dist/main.js", "stale\n");

    let config = project.config("./index", "dist", Mode::Development);
    let result = PackratBuildService::with_defaults().run(&config).await;
    assert!(result.is_success(), "build failed: {:?}", result.error());

    let content = std::fs::read_to_string(project.root().join("dist/main.js")).unwrap();
    assert!(content.contains("'fresh'"));
    assert_eq!(entries(&project.root().join("dist")), vec!["main.js"]);
}
