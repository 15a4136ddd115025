use crate::support::{read_bundle, run_with_node, Project};
use packrat::core::interfaces::Bundler;
use packrat::utils::{CliOverrides, ConfigLoader, CONFIG_FILE_NAME};
use packrat::{BuildError, Configuration, Mode, PackratBuildService};
use std::path::{Path, PathBuf};

fn bootstrap_project() -> Project {
    let project = Project::new();
    project
        .file(
            "bootstrap.js",
            r#"
const greet = require('./lib/greet');
globalThis.__bootstrapRuns = (globalThis.__bootstrapRuns || 0) + 1;
console.log(greet('packrat') + ' ' + globalThis.__bootstrapRuns);
"#,
        )
        .file(
            "lib/greet.js",
            "module.exports = function greet(name) { return 'hello ' + name; };\n",
        );
    project
}

#[tokio::test]
async fn test_end_to_end_production_build() {
    let project = bootstrap_project();

    let config = Configuration::new(
        "./bootstrap",
        project.root().join("dist"),
        "main.js",
        Mode::Production,
    )
    .with_context(project.root());
    let result = PackratBuildService::with_defaults().run(&config).await;

    assert!(result.is_success(), "build failed: {:?}", result.error());
    let output_path = result.output_path().unwrap().to_path_buf();
    assert_eq!(output_path, project.root().join("dist/main.js"));
    assert!(output_path.is_file());

    if let Some(stdout) = run_with_node(&output_path) {
        assert_eq!(stdout, "hello packrat 1");
    }
}

#[tokio::test]
async fn test_stats_reported() {
    let project = bootstrap_project();
    let result = project.build("./bootstrap", Mode::Development).await;

    match result {
        packrat::BuildResult::Success { output_path, stats } => {
            assert_eq!(stats.modules, 2);
            assert_eq!(stats.bytes as u64, std::fs::metadata(output_path).unwrap().len());
        }
        packrat::BuildResult::Failure { error } => panic!("build failed: {}", error),
    }
}

#[tokio::test]
async fn test_builds_are_deterministic() {
    let project = bootstrap_project();
    project.file("lib/extra.js", "exports.extra = true;\n").file(
        "lib/greet.js",
        "require('./extra');\nmodule.exports = function greet(name) { return 'hello ' + name; };\n",
    );

    for mode in [Mode::Development, Mode::Production] {
        let first = read_bundle(&project.build("./bootstrap", mode).await);
        let second = read_bundle(&project.build("./bootstrap", mode).await);
        assert_eq!(first, second, "{} builds differ", mode);
    }
}

#[tokio::test]
async fn test_contenthash_filename() {
    let project = bootstrap_project();
    let config = Configuration::new(
        "./bootstrap",
        project.root().join("dist"),
        "[name].[contenthash:8].js",
        Mode::Production,
    )
    .with_context(project.root());

    let first = PackratBuildService::with_defaults().run(&config).await;
    let second = PackratBuildService::with_defaults().run(&config).await;

    let name = first.output_path().unwrap().file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("main."));
    assert_eq!(name.len(), "main..js".len() + 8);
    assert_eq!(first.output_path(), second.output_path());
}

#[tokio::test]
async fn test_cycle_terminates_and_bodies_appear_once() {
    let project = Project::new();
    project
        .file(
            "a.js",
            r#"
exports.fromA = 'a';
const b = require('./b');
console.log(JSON.stringify({ seen: b.seenA, runs: globalThis.__bRuns }));
"#,
        )
        .file(
            "b.js",
            r#"
const a = require('./a');
exports.seenA = a.fromA;
globalThis.__bRuns = (globalThis.__bRuns || 0) + 1;
"#,
        );

    let result = project.build("./a", Mode::Development).await;
    let bundle = read_bundle(&result);
    assert_eq!(bundle.matches("exports.seenA = a.fromA").count(), 1);
    assert_eq!(bundle.matches("exports.fromA = 'a'").count(), 1);

    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, r#"{"seen":"a","runs":1}"#);
    }
}

#[tokio::test]
async fn test_modes_differ_but_behave_the_same() {
    let project = Project::new();
    project
        .file(
            "index.js",
            r#"
import { total } from './math';
const format = require('./format');
console.log(format(total([1, 2, 3, 4])));
"#,
        )
        .file(
            "math.js",
            "export function total(values) {\n  let sum = 0;\n  for (const value of values) {\n    sum += value;\n  }\n  return sum;\n}\n",
        )
        .file("format.js", "module.exports = (n) => `total=${n}`;\n");

    let development = project.build("./index", Mode::Development).await;
    let production = project.build("./index", Mode::Production).await;

    let dev_bundle = read_bundle(&development);
    let prod_bundle = read_bundle(&production);
    assert_ne!(dev_bundle, prod_bundle);
    assert!(prod_bundle.len() < dev_bundle.len());
    assert!(dev_bundle.contains("// ./math.js"));

    let dev_out = run_with_node(development.output_path().unwrap());
    let prod_out = run_with_node(production.output_path().unwrap());
    if let (Some(dev_out), Some(prod_out)) = (dev_out, prod_out) {
        assert_eq!(dev_out, "total=10");
        assert_eq!(dev_out, prod_out);
    }
}

#[tokio::test]
async fn test_dynamic_import_is_not_followed() {
    let project = Project::new();
    project.file(
        "index.js",
        "const later = () => import('./lazy-and-missing');\nmodule.exports = later;\n",
    );

    let result = project.build("./index", Mode::Development).await;
    assert!(result.is_success(), "build failed: {:?}", result.error());
    assert!(read_bundle(&result).contains("import('./lazy-and-missing')"));
}

#[tokio::test]
async fn test_parse_error_reported_with_context() {
    let project = Project::new();
    project
        .file("index.js", "require('./data.json');\n")
        .file("data.json", "{\n  \"a\": 1,\n  oops\n}\n");

    let result = project.build("./index", Mode::Development).await;
    let error = result.error().expect("build should fail");

    let parse = error.parse_error().expect("parse error expected");
    assert_eq!(parse.path, project.root().join("data.json"));
    assert_eq!(parse.context.line, Some(3));

    let detailed = error.format_detailed();
    assert!(detailed.contains("Parse Error"));
    assert!(detailed.contains("oops"));
    assert!(!project.root().join("dist-dev").exists());
}

#[tokio::test]
async fn test_config_file_drives_build() {
    let project = bootstrap_project();
    project.file(
        CONFIG_FILE_NAME,
        r#"{
  "mode": "development",
  "entry": "./bootstrap",
  "output": { "path": "build", "filename": "[name].bundle.js" }
}"#,
    );

    let file_config = ConfigLoader::load_from_file(project.root()).unwrap();
    let config = ConfigLoader::merge_with_cli(file_config, project.root(), CliOverrides::default()).unwrap();
    assert_eq!(config.mode, Mode::Development);

    let result = PackratBuildService::with_defaults().run(&config).await;
    assert_eq!(
        result.output_path(),
        Some(project.root().join("build/main.bundle.js").as_path())
    );
}

/// `path` spelled relative to the working directory, the way a CLI user passes it
fn relative_to_cwd(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap();
    let mut relative = PathBuf::new();
    for _ in cwd.components().skip(1) {
        relative.push("..");
    }
    relative.join(path.strip_prefix("/").unwrap())
}

#[tokio::test]
async fn test_config_alias_is_relative_to_config_directory() {
    let project = Project::new();
    project
        .file("src/app/index.js", "console.log(require('@lib/util'));\n")
        .file("shared/lib/util.js", "module.exports = 'shared';\n")
        .file(
            CONFIG_FILE_NAME,
            r#"{
  "mode": "development",
  "entry": "./src/app/index",
  "resolve": { "alias": { "@lib": "shared/lib" } }
}"#,
        );

    let base_dir = relative_to_cwd(project.root());
    assert!(base_dir.is_relative());
    let file_config = ConfigLoader::load_from_file(&base_dir).unwrap();
    let config = ConfigLoader::merge_with_cli(file_config, &base_dir, CliOverrides::default()).unwrap();
    assert!(config.resolve.alias["@lib"].is_absolute());

    let result = PackratBuildService::with_defaults().run(&config).await;
    assert!(result.is_success(), "build failed: {:?}", result.error());
    assert!(read_bundle(&result).contains("// ./shared/lib/util.js"));

    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, "shared");
    }
}

#[tokio::test]
async fn test_invalid_filename_template_fails_before_write() {
    let project = bootstrap_project();
    let config = Configuration::new(
        "./bootstrap",
        project.root().join("dist"),
        "[contenthash:0].js",
        Mode::Development,
    )
    .with_context(project.root());

    let result = PackratBuildService::with_defaults().run(&config).await;
    assert!(matches!(result.error(), Some(BuildError::Config(_))));
    assert!(!project.root().join("dist").exists());
}
