use crate::core::interfaces::{FileSystemService, ModuleResolver, ModuleScanner};
use crate::core::models::*;
use crate::utils::{GraphError, GraphErrorKind, Logger, ParseError, Timer};
use futures::stream::{self, StreamExt, TryStreamExt};
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

/// Discovers every module reachable from an entry.
///
/// Modules are processed in FIFO discovery order. Each wave of pending
/// modules is read, scanned and resolved concurrently, but results are
/// integrated strictly in queue order, so the resulting graph (and the first
/// error reported) does not depend on scheduling.
pub struct GraphBuilder {
    fs: Arc<dyn FileSystemService>,
    resolver: Arc<dyn ModuleResolver>,
    scanner: Arc<dyn ModuleScanner>,
    concurrency: usize,
}

struct PendingModule {
    /// First module that referenced this one; `None` for the entry
    importer: Option<ModuleIdentity>,
    identity: ModuleIdentity,
}

impl GraphBuilder {
    pub fn new(
        fs: Arc<dyn FileSystemService>,
        resolver: Arc<dyn ModuleResolver>,
        scanner: Arc<dyn ModuleScanner>,
    ) -> Self {
        Self {
            fs,
            resolver,
            scanner,
            concurrency: (num_cpus::get() * 2).max(1),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Build the graph rooted at `entry`, resolved against `context`
    pub async fn build(
        &self,
        entry: &ModuleSpecifier,
        context: &Path,
    ) -> Result<ModuleGraph, GraphError> {
        let _timer = Timer::start("Building module graph");

        let entry_identity = self
            .resolver
            .resolve(entry, context)
            .await
            .map_err(GraphError::entry)?;

        let mut modules: IndexMap<ModuleIdentity, ModuleRecord> = IndexMap::new();
        let mut enqueued: HashSet<ModuleIdentity> = HashSet::new();
        let mut pending: VecDeque<PendingModule> = VecDeque::new();

        enqueued.insert(entry_identity.clone());
        Logger::module_discovered(&entry_identity.readable_name(context));
        pending.push_back(PendingModule {
            importer: None,
            identity: entry_identity.clone(),
        });

        while !pending.is_empty() {
            let wave: Vec<PendingModule> = pending.drain(..).collect();

            let loaded: Vec<ModuleRecord> = stream::iter(wave.into_iter().map(|module| self.load_module(module)))
                .buffered(self.concurrency)
                .try_collect()
                .await?;

            for record in loaded {
                for dependency in record.dependencies() {
                    if enqueued.insert(dependency.clone()) {
                        Logger::module_discovered(&dependency.readable_name(context));
                        pending.push_back(PendingModule {
                            importer: Some(record.identity.clone()),
                            identity: dependency.clone(),
                        });
                    }
                }
                modules.insert(record.identity.clone(), record);
            }
        }

        Ok(ModuleGraph {
            modules,
            entry: entry_identity,
            context: context.to_path_buf(),
        })
    }

    /// Read, scan and resolve one module
    async fn load_module(&self, pending: PendingModule) -> Result<ModuleRecord, GraphError> {
        let PendingModule { importer, identity } = pending;
        let fail = |kind: GraphErrorKind| GraphError {
            importer: importer.clone(),
            kind,
        };

        let source = self
            .fs
            .read_file(identity.path())
            .await
            .map_err(|source| {
                fail(GraphErrorKind::Read {
                    path: identity.path().to_path_buf(),
                    source,
                })
            })?;

        let scanner = self.scanner.clone();
        let path = identity.path().to_path_buf();
        let text = source.clone();
        let analysis = tokio::task::spawn_blocking(move || scanner.scan(&path, &text))
            .await
            .map_err(|e| {
                fail(GraphErrorKind::Parse(ParseError::new(
                    identity.path().to_path_buf(),
                    format!("Scanner task failed: {}", e),
                )))
            })?
            .map_err(|e| fail(GraphErrorKind::Parse(e)))?;

        for site in &analysis.dynamic_references {
            Logger::dynamic_reference(identity.path(), site);
        }

        let mut record = ModuleRecord::new(identity, source, analysis);
        let directory = record.identity.directory();

        let resolutions: Vec<_> = record.references.iter().map(|specifier| async move {
            self.resolver
                .resolve(specifier, directory)
                .await
                .map(|target| (specifier.clone(), target))
        }).collect();
        let resolved: Vec<(ModuleSpecifier, ModuleIdentity)> = stream::iter(resolutions)
        .buffered(self.concurrency)
        .try_collect()
        .await
        .map_err(|e| GraphError::in_module(&record.identity, e))?;

        record.resolved = resolved.into_iter().collect();
        Ok(record)
    }
}
