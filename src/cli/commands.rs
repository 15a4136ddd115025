use crate::core::{interfaces::Bundler, models::*, services::PackratBuildService};
use crate::utils::{CliOverrides, ConfigLoader, Logger, CONFIG_FILE_NAME};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "packrat")]
#[command(about = "packrat - a minimal single-entry JavaScript bundler")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bundle the entry module and everything it references into one file
    Build {
        /// Config file (default: ./packrat.config.json when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Entry module specifier, resolved against the context directory
        #[arg(short, long)]
        entry: Option<String>,
        /// Directory the entry is resolved against
        #[arg(long)]
        context: Option<PathBuf>,
        /// Output directory
        #[arg(short, long)]
        output_path: Option<PathBuf>,
        /// Output filename; supports [name] and [contenthash]
        #[arg(short, long)]
        filename: Option<String>,
        /// Build mode
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,
    },
    /// Write an example packrat.config.json to the current directory
    Init,
    /// Show bundler information
    Info,
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let cli = Cli::parse();

        Logger::init(cli.verbose);

        match cli.command {
            Commands::Build {
                config,
                entry,
                context,
                output_path,
                filename,
                mode,
            } => {
                let overrides = CliOverrides {
                    entry,
                    context,
                    output_path,
                    filename,
                    mode,
                };
                self.handle_build_command(config.as_deref(), overrides).await
            }
            Commands::Init => self.handle_init_command(),
            Commands::Info => self.handle_info_command(),
        }
    }

    async fn handle_build_command(
        &self,
        config_path: Option<&Path>,
        overrides: CliOverrides,
    ) -> anyhow::Result<()> {
        let (file_config, base_dir) = match config_path {
            Some(path) => {
                let base_dir = path
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (Some(ConfigLoader::load_from_path(path)?), base_dir)
            }
            None => {
                let base_dir = PathBuf::from(".");
                (ConfigLoader::load_from_file(&base_dir)?, base_dir)
            }
        };

        let configuration = ConfigLoader::merge_with_cli(file_config, &base_dir, overrides)?;

        let build_service = PackratBuildService::with_defaults();
        match build_service.run(&configuration).await {
            BuildResult::Success { .. } => Ok(()),
            BuildResult::Failure { error } => {
                eprintln!("{}", error.format_detailed());
                bail!("Build failed")
            }
        }
    }

    fn handle_init_command(&self) -> anyhow::Result<()> {
        let path = Path::new(CONFIG_FILE_NAME);
        if path.exists() {
            bail!("{} already exists", CONFIG_FILE_NAME);
        }

        std::fs::write(path, ConfigLoader::generate_example() + "\n")
            .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;
        tracing::info!("✅ Created {}", CONFIG_FILE_NAME);
        Ok(())
    }

    fn handle_info_command(&self) -> anyhow::Result<()> {
        tracing::info!("📦 packrat v{}", env!("CARGO_PKG_VERSION"));
        tracing::info!("══════════════════════════════════════");
        tracing::info!("🏗️  Pipeline:");
        tracing::info!("  • Node-style module resolution (extensions, index files, package.json, node_modules)");
        tracing::info!("  • oxc parser for static import/export/require discovery");
        tracing::info!("  • CommonJS, ES module and JSON interop in one runtime");
        tracing::info!("  • oxc minifier in production mode");
        tracing::info!("  • Atomic single-file output");
        tracing::info!("");
        tracing::info!("⚙️  Config file: {}", CONFIG_FILE_NAME);
        Ok(())
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}
