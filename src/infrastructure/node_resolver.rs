use crate::core::interfaces::{FileSystemService, ModuleResolver};
use crate::core::models::{ModuleIdentity, ModuleSpecifier, ResolveOptions, SpecifierKind};
use crate::utils::{Logger, ResolutionError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// The package.json fields resolution looks at
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageJson {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub browser: Option<BrowserField>,
    /// Everything else, for custom `main_fields`
    #[serde(flatten)]
    pub other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BrowserField {
    String(String),
    Disabled(bool),
    Object(HashMap<String, serde_json::Value>),
}

impl PackageJson {
    /// String value of an entry field; object-valued fields are ignored
    pub fn entry_field(&self, field: &str) -> Option<&str> {
        match field {
            "main" => self.main.as_deref(),
            "module" => self.module.as_deref(),
            "browser" => match &self.browser {
                Some(BrowserField::String(entry)) => Some(entry.as_str()),
                _ => None,
            },
            other => self.other.get(other)?.as_str(),
        }
    }
}

/// Node.js-style module resolution over a pluggable file system
pub struct NodeModuleResolver {
    fs: Arc<dyn FileSystemService>,
    options: ResolveOptions,
    /// Parsed package.json files, `None` when missing or malformed
    package_cache: DashMap<PathBuf, Option<Arc<PackageJson>>>,
}

impl NodeModuleResolver {
    pub fn new(fs: Arc<dyn FileSystemService>, options: ResolveOptions) -> Self {
        Self {
            fs,
            options,
            package_cache: DashMap::new(),
        }
    }

    /// Path named by the first matching alias, longest key first.
    ///
    /// An alias hit is a location on disk, never a new specifier.
    fn apply_alias(&self, specifier: &str) -> Option<PathBuf> {
        let mut keys: Vec<&String> = self.options.alias.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        for key in keys {
            let rest = if specifier == key.as_str() {
                ""
            } else if let Some(rest) = specifier
                .strip_prefix(key.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
            {
                rest
            } else {
                continue;
            };
            let target = &self.options.alias[key];
            return Some(normalize_path(&target.join(rest)));
        }

        None
    }

    async fn locate(&self, request: &str, from_directory: &Path) -> Option<PathBuf> {
        match ModuleSpecifier::new(request).kind() {
            SpecifierKind::Relative => {
                let candidate = normalize_path(&from_directory.join(request));
                self.resolve_file_or_directory(&candidate).await
            }
            SpecifierKind::Absolute => {
                let candidate = normalize_path(Path::new(request));
                self.resolve_file_or_directory(&candidate).await
            }
            SpecifierKind::Bare => self.resolve_node_module(request, from_directory).await,
        }
    }

    /// Try to resolve as file, then as directory
    async fn resolve_file_or_directory(&self, path: &Path) -> Option<PathBuf> {
        if let Some(file) = self.resolve_as_file(path).await {
            return Some(file);
        }
        self.resolve_as_directory(path).await
    }

    /// Exact path first, then each extension in priority order
    async fn resolve_as_file(&self, path: &Path) -> Option<PathBuf> {
        if self.fs.is_file(path).await {
            return Some(path.to_path_buf());
        }

        for ext in &self.options.extensions {
            let mut with_ext = OsString::from(path.as_os_str());
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if self.fs.is_file(&with_ext).await {
                return Some(with_ext);
            }
        }

        None
    }

    async fn resolve_as_directory(&self, path: &Path) -> Option<PathBuf> {
        if !self.fs.is_dir(path).await {
            return None;
        }

        // A package.json `main` inside a plain directory is honoured too
        let main = self
            .read_package_json(&path.join("package.json"))
            .await
            .and_then(|package| package.main.clone());
        if let Some(main) = main {
            let entry = normalize_path(&path.join(main));
            if let Some(resolved) = self.resolve_as_file(&entry).await {
                return Some(resolved);
            }
            if let Some(resolved) = self.resolve_index(&entry).await {
                return Some(resolved);
            }
        }

        self.resolve_index(path).await
    }

    async fn resolve_index(&self, dir: &Path) -> Option<PathBuf> {
        for main_file in &self.options.main_files {
            if let Some(resolved) = self.resolve_as_file(&dir.join(main_file)).await {
                return Some(resolved);
            }
        }
        None
    }

    /// Walk up from `from_directory` looking for `node_modules/<package>`
    async fn resolve_node_module(&self, specifier: &str, from_directory: &Path) -> Option<PathBuf> {
        let (package_name, subpath) = parse_package_specifier(specifier);

        for dir in from_directory.ancestors() {
            if dir.file_name().is_some_and(|name| name == "node_modules") {
                continue;
            }

            let package_dir = dir.join("node_modules").join(&package_name);
            if !self.fs.is_dir(&package_dir).await {
                continue;
            }

            let found = match &subpath {
                Some(subpath) => {
                    self.resolve_file_or_directory(&normalize_path(&package_dir.join(subpath)))
                        .await
                }
                None => self.resolve_package_entry(&package_dir).await,
            };
            if found.is_some() {
                return found;
            }
        }

        None
    }

    /// Entry point of a package: configured main fields in order, then index
    async fn resolve_package_entry(&self, package_dir: &Path) -> Option<PathBuf> {
        let package = self.read_package_json(&package_dir.join("package.json")).await;

        for field in &self.options.main_fields {
            let value = package.as_ref().and_then(|package| package.entry_field(field));
            if let Some(value) = value {
                let entry = normalize_path(&package_dir.join(value));
                if let Some(resolved) = self.resolve_as_file(&entry).await {
                    return Some(resolved);
                }
                if let Some(resolved) = self.resolve_index(&entry).await {
                    return Some(resolved);
                }
            }
        }

        self.resolve_index(package_dir).await
    }

    /// Read and cache package.json
    async fn read_package_json(&self, path: &Path) -> Option<Arc<PackageJson>> {
        if let Some(cached) = self.package_cache.get(path) {
            return cached.value().clone();
        }

        let parsed = if self.fs.is_file(path).await {
            match self.fs.read_file(path).await {
                Ok(content) => match serde_json::from_str::<PackageJson>(&content) {
                    Ok(package) => Some(Arc::new(package)),
                    Err(e) => {
                        Logger::debug(&format!("Ignoring {}: {}", path.display(), e));
                        None
                    }
                },
                Err(_) => None,
            }
        } else {
            None
        };

        self.package_cache.insert(path.to_path_buf(), parsed.clone());
        parsed
    }
}

#[async_trait]
impl ModuleResolver for NodeModuleResolver {
    async fn resolve(
        &self,
        specifier: &ModuleSpecifier,
        from_directory: &Path,
    ) -> Result<ModuleIdentity, ResolutionError> {
        let not_found = || ResolutionError {
            specifier: specifier.clone(),
            from_directory: from_directory.to_path_buf(),
        };

        let located = match self.apply_alias(specifier.as_str()) {
            Some(target) => self.resolve_file_or_directory(&target).await,
            None => self.locate(specifier.as_str(), from_directory).await,
        }
        .ok_or_else(not_found)?;
        let canonical = self.fs.canonicalize(&located).await.map_err(|_| not_found())?;

        Logger::resolved(specifier.as_str(), from_directory, &canonical);
        Ok(ModuleIdentity::from_canonical(canonical))
    }
}

/// Split a bare specifier into package name and optional subpath
fn parse_package_specifier(specifier: &str) -> (String, Option<String>) {
    let mut parts = specifier.splitn(if specifier.starts_with('@') { 3 } else { 2 }, '/');
    let name = if specifier.starts_with('@') {
        match (parts.next(), parts.next()) {
            (Some(scope), Some(name)) => format!("{}/{}", scope, name),
            (Some(scope), None) => scope.to_string(),
            _ => specifier.to_string(),
        }
    } else {
        parts.next().unwrap_or(specifier).to_string()
    };
    let subpath = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    (name, subpath)
}

/// Lexically collapse `.` and `..` segments
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
