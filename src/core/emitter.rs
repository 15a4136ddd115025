use crate::core::interfaces::{CodeMinifier, FileSystemService};
use crate::core::models::*;
use crate::infrastructure::BundleRenderer;
use crate::utils::{BuildError, Logger, Result, Timer, WriteError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::iter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Length of `[contenthash]` when no explicit length is given
pub const DEFAULT_HASH_LENGTH: usize = 20;

/// Chunk name of the single output
pub const CHUNK_NAME: &str = "main";

static FILENAME_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(name|contenthash)(?::(\d+))?\]").unwrap());

#[derive(Debug, PartialEq, Eq, Hash)]
enum Status {
    ToBeExecuted(usize),
    WaitForExit(usize),
}

/// Post-order of the graph from the entry: dependencies before dependents
#[derive(Debug, Clone, Default)]
pub struct ExecutionOrder {
    pub modules: Vec<ModuleIdentity>,
    /// Each cycle is listed from the first module entered back to itself
    pub cycles: Vec<Vec<ModuleIdentity>>,
}

/// Sort modules in the order their bodies finish executing at runtime.
///
/// Cycles are broken at the back edge: a module already on the execution
/// chain is not entered again.
pub fn execution_order(graph: &ModuleGraph) -> ExecutionOrder {
    let Some(entry) = graph.modules.get_index_of(&graph.entry) else {
        return ExecutionOrder::default();
    };

    let mut execution_stack = vec![Status::ToBeExecuted(entry)];
    let mut executed = HashSet::with_capacity(graph.len());
    let mut stack_indexes_of_executing: HashMap<usize, usize> = HashMap::new();
    let mut sorted = Vec::with_capacity(graph.len());
    let mut cycles: Vec<Vec<usize>> = Vec::new();

    while let Some(status) = execution_stack.pop() {
        match status {
            Status::ToBeExecuted(index) => {
                if executed.contains(&index) {
                    if let Some(position) = stack_indexes_of_executing.get(&index).copied() {
                        // Only `WaitForExit` entries are on the current chain
                        let cycle = execution_stack[position..]
                            .iter()
                            .filter_map(|status| match status {
                                Status::ToBeExecuted(_) => None,
                                Status::WaitForExit(index) => Some(*index),
                            })
                            .chain(iter::once(index))
                            .collect::<Vec<_>>();
                        if !cycles.contains(&cycle) {
                            cycles.push(cycle);
                        }
                    }
                    continue;
                }

                executed.insert(index);
                execution_stack.push(Status::WaitForExit(index));
                stack_indexes_of_executing.insert(index, execution_stack.len() - 1);

                let Some((_, record)) = graph.modules.get_index(index) else {
                    continue;
                };
                let dependencies: Vec<usize> = record
                    .dependencies()
                    .filter_map(|identity| graph.modules.get_index_of(identity))
                    .collect();
                execution_stack.extend(dependencies.into_iter().rev().map(Status::ToBeExecuted));
            }
            Status::WaitForExit(index) => {
                sorted.push(index);
                stack_indexes_of_executing.remove(&index);
            }
        }
    }

    let identity_at = |index: usize| graph.modules.get_index(index).map(|(id, _)| id.clone());
    ExecutionOrder {
        modules: sorted.into_iter().filter_map(identity_at).collect(),
        cycles: cycles
            .into_iter()
            .map(|cycle| cycle.into_iter().filter_map(identity_at).collect())
            .collect(),
    }
}

/// Expand `[name]` and `[contenthash]` / `[contenthash:N]` in an output filename
pub fn render_filename(template: &str, content: &str) -> Result<String> {
    if template.trim().is_empty() {
        return Err(BuildError::config("output filename must not be empty"));
    }

    let hash = blake3::hash(content.as_bytes()).to_hex();
    let mut failure = None;

    let rendered = FILENAME_PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
        match &caps[1] {
            "name" => CHUNK_NAME.to_string(),
            _ => {
                let length = match caps.get(2) {
                    Some(digits) => digits.as_str().parse::<usize>().unwrap_or(0),
                    None => DEFAULT_HASH_LENGTH,
                };
                if length == 0 || length > hash.len() {
                    failure = Some(format!(
                        "invalid [contenthash] length {} in '{}' (expected 1..={})",
                        length,
                        template,
                        hash.len()
                    ));
                }
                hash.as_str()[..length.min(hash.len())].to_string()
            }
        }
    });

    match failure {
        Some(message) => Err(BuildError::config(message)),
        None => Ok(rendered.into_owned()),
    }
}

/// Temporary sibling of `path` used while writing
fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| CHUNK_NAME.to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
}

/// Where and how large the written artifact is
#[derive(Debug, Clone)]
pub struct EmittedBundle {
    pub output_path: PathBuf,
    pub bytes: usize,
    pub modules: usize,
}

/// Turns a module graph into the single output artifact
pub struct Emitter {
    fs: Arc<dyn FileSystemService>,
    minifier: Arc<dyn CodeMinifier>,
}

impl Emitter {
    pub fn new(fs: Arc<dyn FileSystemService>, minifier: Arc<dyn CodeMinifier>) -> Self {
        Self { fs, minifier }
    }

    /// Render the bundle source without writing it
    pub async fn render(&self, graph: &ModuleGraph, mode: Mode) -> Result<String> {
        let order = execution_order(graph);
        for cycle in &order.cycles {
            let chain = cycle
                .iter()
                .map(|identity| identity.readable_name(&graph.context))
                .collect::<Vec<_>>()
                .join(" -> ");
            Logger::circular_dependency(&chain);
        }

        let code = BundleRenderer::new(graph, &order.modules, mode).render();

        match mode {
            Mode::Production => self.minifier.minify(code).await.map_err(BuildError::Minify),
            Mode::Development => Ok(code),
        }
    }

    pub async fn emit(
        &self,
        graph: &ModuleGraph,
        output_directory: &Path,
        output_filename: &str,
        mode: Mode,
    ) -> Result<EmittedBundle> {
        let _timer = Timer::start("Emitting bundle");

        let code = self.render(graph, mode).await?;
        let filename = render_filename(output_filename, &code)?;
        let output_path = output_directory.join(filename);

        self.write_atomically(&output_path, code.as_bytes()).await?;

        Ok(EmittedBundle {
            output_path,
            bytes: code.len(),
            modules: graph.len(),
        })
    }

    /// Readers of `path` see either the previous artifact or the complete new one
    async fn write_atomically(&self, path: &Path, content: &[u8]) -> std::result::Result<(), WriteError> {
        let write_error = |source| WriteError {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            self.fs.create_directory(parent).await.map_err(write_error)?;
        }

        let temp_path = temp_path_for(path);
        let written = match self.fs.write_file(&temp_path, content).await {
            Ok(()) => self.fs.rename(&temp_path, path).await,
            Err(e) => Err(e),
        };

        if let Err(source) = written {
            if let Err(cleanup) = self.fs.remove_file(&temp_path).await {
                Logger::debug(&format!(
                    "Could not remove {}: {}",
                    temp_path.display(),
                    cleanup
                ));
            }
            return Err(write_error(source));
        }

        Ok(())
    }
}
