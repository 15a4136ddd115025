use crate::utils::BuildError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Build mode, mirrors the `mode` field of the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn is_production(self) -> bool {
        self == Mode::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Production
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(Mode::Development),
            "production" => Ok(Mode::Production),
            other => Err(format!("unknown mode '{}', expected 'development' or 'production'", other)),
        }
    }
}

/// The string used at a reference site to name another module
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleSpecifier(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    Relative,
    Absolute,
    Bare,
}

impl ModuleSpecifier {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self(specifier.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> SpecifierKind {
        let s = self.0.as_str();
        if s == "." || s == ".." || s.starts_with("./") || s.starts_with("../") {
            SpecifierKind::Relative
        } else if s.starts_with('/') || Path::new(s).is_absolute() {
            SpecifierKind::Absolute
        } else {
            SpecifierKind::Bare
        }
    }
}

impl fmt::Display for ModuleSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleSpecifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ModuleSpecifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Canonical, deduplicated key of a resolved module: its real absolute path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleIdentity(PathBuf);

impl ModuleIdentity {
    /// Callers must pass an already canonicalized path.
    pub fn from_canonical(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Directory that relative references inside this module resolve against
    pub fn directory(&self) -> &Path {
        self.0.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Path relative to `context`, rendered webpack-style (`./src/a.js`)
    pub fn readable_name(&self, context: &Path) -> String {
        match self.0.strip_prefix(context) {
            Ok(relative) => {
                let joined = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                format!("./{}", joined)
            }
            Err(_) => self.0.to_string_lossy().replace('\\', "/"),
        }
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Resolution settings, the `resolve` section of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolveOptions {
    /// Tried in order after the exact path; first existing file wins
    pub extensions: Vec<String>,
    pub main_files: Vec<String>,
    pub main_fields: Vec<String>,
    pub alias: HashMap<String, PathBuf>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            extensions: vec![".js".to_string(), ".json".to_string()],
            main_files: vec!["index".to_string()],
            main_fields: vec!["browser".to_string(), "module".to_string(), "main".to_string()],
            alias: HashMap::new(),
        }
    }
}

/// Immutable build configuration, supplied once per build
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub entry: ModuleSpecifier,
    pub output_directory: PathBuf,
    pub output_filename: String,
    pub mode: Mode,
    /// Base directory the entry is resolved against
    pub context: PathBuf,
    pub resolve: ResolveOptions,
}

impl Configuration {
    pub fn new(
        entry: impl Into<ModuleSpecifier>,
        output_directory: impl Into<PathBuf>,
        output_filename: impl Into<String>,
        mode: Mode,
    ) -> Self {
        Self {
            entry: entry.into(),
            output_directory: output_directory.into(),
            output_filename: output_filename.into(),
            mode,
            context: PathBuf::from("."),
            resolve: ResolveOptions::default(),
        }
    }

    pub fn with_context(mut self, context: impl Into<PathBuf>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_resolve(mut self, resolve: ResolveOptions) -> Self {
        self.resolve = resolve;
        self
    }
}

/// How a module's body is interpreted when wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleFormat {
    EsModule,
    CommonJs,
    Json,
}

/// What an imported binding refers to in the target module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportedName {
    Default,
    Named(String),
    Namespace,
}

/// Replacement for a byte range of the module source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    Remove,
    Text(String),
    /// `require("<specifier>")` becomes a runtime require of the resolved id
    Require(ModuleSpecifier),
    /// A reference to an imported binding becomes a namespace member access
    Binding {
        specifier: ModuleSpecifier,
        imported: ImportedName,
        /// Callee position: rendered as `(0, ns.name)` so `this` is not the namespace
        call: bool,
    },
    /// Shorthand property `{ name }` over an imported binding
    ShorthandBinding {
        key: String,
        specifier: ModuleSpecifier,
        imported: ImportedName,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEdit {
    pub start: u32,
    pub end: u32,
    pub replacement: Replacement,
}

/// Getter expression published for one ESM export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    Local(String),
    Imported {
        specifier: ModuleSpecifier,
        imported: ImportedName,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub exported: String,
    pub target: ExportTarget,
}

/// Hoisted statements an ES module runs before its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrologueItem {
    Import(ModuleSpecifier),
    ExportStar(ModuleSpecifier),
}

/// Everything the scanner learns about one module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleAnalysis {
    pub format: Option<ModuleFormat>,
    /// Distinct static references in first-appearance order
    pub references: Vec<ModuleSpecifier>,
    pub edits: Vec<SourceEdit>,
    pub exports: Vec<ExportEntry>,
    pub prologue: Vec<PrologueItem>,
    /// `import(...)` and non-literal `require(...)` sites, never followed
    pub dynamic_references: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub identity: ModuleIdentity,
    pub source_text: String,
    pub format: ModuleFormat,
    pub references: Vec<ModuleSpecifier>,
    pub resolved: HashMap<ModuleSpecifier, ModuleIdentity>,
    pub edits: Vec<SourceEdit>,
    pub exports: Vec<ExportEntry>,
    pub prologue: Vec<PrologueItem>,
}

impl ModuleRecord {
    pub fn new(identity: ModuleIdentity, source_text: String, analysis: ModuleAnalysis) -> Self {
        Self {
            identity,
            source_text,
            format: analysis.format.unwrap_or(ModuleFormat::CommonJs),
            references: analysis.references,
            resolved: HashMap::new(),
            edits: analysis.edits,
            exports: analysis.exports,
            prologue: analysis.prologue,
        }
    }

    /// Resolved targets in reference order
    pub fn dependencies(&self) -> impl Iterator<Item = &ModuleIdentity> + '_ {
        self.references.iter().filter_map(|spec| self.resolved.get(spec))
    }
}

/// Modules reachable from the entry, keyed by identity in discovery order
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    pub modules: IndexMap<ModuleIdentity, ModuleRecord>,
    pub entry: ModuleIdentity,
    pub context: PathBuf,
}

impl ModuleGraph {
    pub fn get(&self, identity: &ModuleIdentity) -> Option<&ModuleRecord> {
        self.modules.get(identity)
    }

    pub fn entry_module(&self) -> Option<&ModuleRecord> {
        self.modules.get(&self.entry)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub modules: usize,
    pub bytes: usize,
    pub build_time: Duration,
}

/// Terminal outcome of one build invocation
#[derive(Debug)]
pub enum BuildResult {
    Success {
        output_path: PathBuf,
        stats: BuildStats,
    },
    Failure {
        error: BuildError,
    },
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildResult::Success { .. })
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            BuildResult::Success { output_path, .. } => Some(output_path),
            BuildResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&BuildError> {
        match self {
            BuildResult::Success { .. } => None,
            BuildResult::Failure { error } => Some(error),
        }
    }
}
