use crate::core::emitter::{EmittedBundle, Emitter};
use crate::core::graph_builder::GraphBuilder;
use crate::core::{interfaces::*, models::*};
use crate::infrastructure::{MinificationService, NodeModuleResolver, OxcModuleScanner, TokioFileSystemService};
use crate::utils::{BuildError, Logger, Result, Timer};
use std::sync::Arc;

/// Main build service: resolve the entry, build the graph, emit the bundle
pub struct PackratBuildService {
    fs_service: Arc<dyn FileSystemService>,
    scanner: Arc<dyn ModuleScanner>,
    minifier: Arc<dyn CodeMinifier>,
}

impl PackratBuildService {
    pub fn new(
        fs_service: Arc<dyn FileSystemService>,
        scanner: Arc<dyn ModuleScanner>,
        minifier: Arc<dyn CodeMinifier>,
    ) -> Self {
        Self {
            fs_service,
            scanner,
            minifier,
        }
    }

    /// Real file system, oxc scanner and oxc minifier
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(TokioFileSystemService),
            Arc::new(OxcModuleScanner::new()),
            Arc::new(MinificationService::new()),
        )
    }

    async fn build(&self, config: &Configuration) -> Result<EmittedBundle> {
        if config.output_filename.trim().is_empty() {
            return Err(BuildError::config("output filename must not be empty"));
        }

        // Identities are canonical, so the context must be too for readable names
        let context = self.fs_service.canonicalize(&config.context).await.map_err(|e| {
            BuildError::config(format!(
                "context directory {} is not accessible: {}",
                config.context.display(),
                e
            ))
        })?;

        // Relative alias targets point into the context, not the importer's directory
        let mut resolve = config.resolve.clone();
        for target in resolve.alias.values_mut() {
            if target.is_relative() {
                *target = context.join(&*target);
            }
        }

        let resolver = Arc::new(NodeModuleResolver::new(self.fs_service.clone(), resolve));
        let graph_builder =
            GraphBuilder::new(self.fs_service.clone(), resolver, self.scanner.clone());

        let graph = graph_builder.build(&config.entry, &context).await?;
        Logger::graph_built(graph.len());

        Emitter::new(self.fs_service.clone(), self.minifier.clone())
            .emit(
                &graph,
                &config.output_directory,
                &config.output_filename,
                config.mode,
            )
            .await
    }
}

#[async_trait::async_trait]
impl Bundler for PackratBuildService {
    async fn run(&self, config: &Configuration) -> BuildResult {
        let timer = Timer::start("Build");
        Logger::build_start(config.entry.as_str(), &config.output_directory, config.mode);

        match self.build(config).await {
            Ok(bundle) => {
                let stats = BuildStats {
                    modules: bundle.modules,
                    bytes: bundle.bytes,
                    build_time: timer.elapsed(),
                };
                Logger::build_complete(&bundle.output_path, &stats);
                BuildResult::Success {
                    output_path: bundle.output_path,
                    stats,
                }
            }
            Err(error) => {
                Logger::error(&error.to_string());
                BuildResult::Failure { error }
            }
        }
    }
}
