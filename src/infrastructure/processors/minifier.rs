use crate::core::interfaces::CodeMinifier;
use crate::utils::{Logger, ParseError};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::path::PathBuf;
use std::sync::Arc;

/// Pseudo path reported when the bundle itself fails to parse
const BUNDLE_PATH: &str = "<bundle>";

/// JavaScript minification using oxc (mangling and compression)
#[derive(Debug, Clone, Copy)]
pub struct OxcMinifier;

impl OxcMinifier {
    pub fn new() -> Self {
        Self
    }

    /// Minify a script. The bundle is a classic script, not a module.
    pub fn minify(&self, source_code: &str) -> Result<String, ParseError> {
        let allocator = Allocator::default();
        let parse_result = Parser::new(&allocator, source_code, SourceType::cjs()).parse();

        if parse_result.panicked || !parse_result.errors.is_empty() {
            let errors: Vec<String> = parse_result
                .errors
                .iter()
                .map(|e| format!("Parse error: {}", e))
                .collect();
            return Err(ParseError::new(PathBuf::from(BUNDLE_PATH), errors.join("\n")));
        }

        let options = MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: Some(CompressOptions::default()),
        };

        let mut program = parse_result.program;
        let minified = Minifier::new(options).minify(&allocator, &mut program);

        let code = Codegen::new()
            .with_options(CodegenOptions::minify())
            .with_scoping(minified.scoping)
            .build(&program)
            .code;

        Ok(code)
    }

    /// Estimate size reduction percentage
    pub fn calculate_reduction(&self, original: &str, minified: &str) -> f64 {
        let original_size = original.len() as f64;
        let minified_size = minified.len() as f64;

        if original_size == 0.0 {
            return 0.0;
        }

        ((original_size - minified_size) / original_size) * 100.0
    }
}

impl Default for OxcMinifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Async wrapper for minification in the build pipeline
pub struct MinificationService {
    minifier: Arc<OxcMinifier>,
}

impl MinificationService {
    pub fn new() -> Self {
        Self::with_minifier(OxcMinifier::new())
    }

    pub fn with_minifier(minifier: OxcMinifier) -> Self {
        Self {
            minifier: Arc::new(minifier),
        }
    }

    pub fn get_stats(&self, original: &str, minified: &str) -> MinificationStats {
        MinificationStats {
            original_size: original.len(),
            minified_size: minified.len(),
            reduction_percentage: self.minifier.calculate_reduction(original, minified),
            saved_bytes: original.len().saturating_sub(minified.len()),
        }
    }
}

impl Default for MinificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CodeMinifier for MinificationService {
    async fn minify(&self, code: String) -> Result<String, ParseError> {
        let minifier = self.minifier.clone();

        // oxc is CPU-bound
        let (original, minified) = tokio::task::spawn_blocking(move || {
            let minified = minifier.minify(&code);
            (code, minified)
        })
        .await
        .map_err(|e| {
            ParseError::new(
                PathBuf::from(BUNDLE_PATH),
                format!("Minification task failed: {}", e),
            )
        })?;

        let minified = minified?;
        Logger::minified(original.len(), minified.len());
        Logger::debug(&self.get_stats(&original, &minified).to_string());
        Ok(minified)
    }
}

#[derive(Debug, Clone)]
pub struct MinificationStats {
    pub original_size: usize,
    pub minified_size: usize,
    pub reduction_percentage: f64,
    pub saved_bytes: usize,
}

impl std::fmt::Display for MinificationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Minification: {:.1}% reduction ({} → {} bytes, saved {})",
            self.reduction_percentage,
            self.original_size,
            self.minified_size,
            self.saved_bytes
        )
    }
}
