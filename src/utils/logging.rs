use crate::core::models::{BuildStats, Mode};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

pub struct Logger;

impl Logger {
    /// Install the global subscriber. `RUST_LOG` wins over `verbose`.
    pub fn init(verbose: bool) {
        let default_directive = if verbose { "packrat=debug" } else { "packrat=info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        // A second init (tests, embedding) keeps the first subscriber
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }

    pub fn build_start(entry: &str, output: &Path, mode: Mode) {
        info!("📦 packrat - {} build", mode);
        info!("═══════════════════════════════════════");
        info!("🎯 Entry: {}", entry);
        info!("📁 Output: {}", output.display());
    }

    pub fn module_discovered(name: &str) {
        debug!("🔍 Discovered module: {}", name);
    }

    pub fn resolved(specifier: &str, from: &Path, to: &Path) {
        debug!("🔗 Resolved '{}' from {} to {}", specifier, from.display(), to.display());
    }

    pub fn graph_built(modules: usize) {
        info!("🧭 Module graph: {} modules", modules);
    }

    pub fn circular_dependency(cycle: &str) {
        warn!("⚠️  Circular dependency: {}", cycle);
    }

    pub fn dynamic_reference(module: &Path, site: &str) {
        warn!(
            "⚠️  Dynamic reference {} in {} is not bundled",
            site,
            module.display()
        );
    }

    pub fn minified(original: usize, minified: usize) {
        debug!("🗜️  Minified bundle: {} → {} bytes", original, minified);
    }

    pub fn build_complete(output_path: &Path, stats: &BuildStats) {
        info!("");
        info!("📊 Build Statistics:");
        info!("  • Modules bundled: {}", stats.modules);
        info!("  • Bundle size: {} bytes", stats.bytes);
        info!("  • Build time: {:.2?}", stats.build_time);
        info!("  • Output: {}", output_path.display());
        info!("");
        info!("✅ Build completed successfully!");
    }

    pub fn error(msg: &str) {
        error!("❌ {}", msg);
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("⏱️  Completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
