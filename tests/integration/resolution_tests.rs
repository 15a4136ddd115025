use crate::support::{read_bundle, run_with_node, Project};
use packrat::core::interfaces::Bundler;
use packrat::utils::GraphErrorKind;
use packrat::{BuildError, Mode, PackratBuildService, ResolveOptions};
use std::path::PathBuf;

#[tokio::test]
async fn test_js_preferred_over_json_by_default() {
    let project = Project::new();
    project
        .file("index.js", "console.log(require('./x'));\n")
        .file("x.js", "module.exports = 'from js';\n")
        .file("x.json", "\"from json\"\n");

    let result = project.build("./index", Mode::Development).await;
    let bundle = read_bundle(&result);
    assert!(bundle.contains("// ./x.js"));
    assert!(!bundle.contains("./x.json"));

    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, "from js");
    }
}

#[tokio::test]
async fn test_custom_extension_order_is_honoured() {
    let project = Project::new();
    project
        .file("index.js", "console.log(require('./x'));\n")
        .file("x.js", "module.exports = 'from js';\n")
        .file("x.json", "\"from json\"\n");

    let resolve = ResolveOptions {
        extensions: vec![".json".to_string(), ".js".to_string()],
        ..ResolveOptions::default()
    };
    let config = project
        .config("./index", "dist-dev", Mode::Development)
        .with_resolve(resolve);
    let result = PackratBuildService::with_defaults().run(&config).await;

    let bundle = read_bundle(&result);
    assert!(bundle.contains("// ./x.json"));
    assert!(!bundle.contains("// ./x.js\n"));
}

#[tokio::test]
async fn test_directory_index_and_package_main() {
    let project = Project::new();
    project
        .file(
            "index.js",
            "console.log([require('./widgets'), require('./pkg'), require('lib')].join(','));\n",
        )
        .file("widgets/index.js", "module.exports = 'index';\n")
        .file("pkg/package.json", r#"{ "main": "dist/entry.js" }"#)
        .file("pkg/dist/entry.js", "module.exports = 'main';\n")
        .file("node_modules/lib/package.json", r#"{ "name": "lib", "main": "./lib" }"#)
        .file("node_modules/lib/lib.js", "module.exports = 'node_modules';\n");

    let result = project.build("./index", Mode::Development).await;
    assert!(result.is_success(), "build failed: {:?}", result.error());

    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, "index,main,node_modules");
    }
}

#[tokio::test]
async fn test_alias() {
    let project = Project::new();
    project
        .file("src/index.js", "console.log(require('@utils/answer'));\n")
        .file("src/shared/utils/answer.js", "module.exports = 42;\n");

    let mut resolve = ResolveOptions::default();
    resolve
        .alias
        .insert("@utils".to_string(), project.root().join("src/shared/utils"));
    let config = project
        .config("./src/index", "dist-dev", Mode::Development)
        .with_resolve(resolve);

    let result = PackratBuildService::with_defaults().run(&config).await;
    assert!(result.is_success(), "build failed: {:?}", result.error());

    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, "42");
    }
}

#[tokio::test]
async fn test_same_file_via_different_specifiers_is_one_module() {
    let project = Project::new();
    project
        .file(
            "index.js",
            "require('./lib/a');\nrequire('./lib/../lib/a.js');\nrequire('./lib/b');\n",
        )
        .file("lib/a.js", "globalThis.__aRuns = (globalThis.__aRuns || 0) + 1;\n")
        .file("lib/b.js", "require('./a');\nconsole.log(globalThis.__aRuns);\n");

    let result = project.build("./index", Mode::Development).await;
    match &result {
        packrat::BuildResult::Success { stats, .. } => assert_eq!(stats.modules, 3),
        packrat::BuildResult::Failure { error } => panic!("build failed: {}", error),
    }
    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, "1");
    }
}

#[tokio::test]
async fn test_missing_module_fails_naming_specifier_and_importer() {
    let project = Project::new();
    project
        .file("index.js", "require('./present');\n")
        .file("present.js", "require('./absent');\n");

    let result = project.build("./index", Mode::Production).await;
    let Some(BuildError::Graph(error)) = result.error() else {
        panic!("expected graph error, got {:?}", result.error());
    };

    match &error.kind {
        GraphErrorKind::Resolution(resolution) => {
            assert_eq!(resolution.specifier.as_str(), "./absent");
            assert_eq!(resolution.from_directory, project.root().to_path_buf());
        }
        other => panic!("unexpected error kind: {}", other),
    }
    assert_eq!(
        error.importer.as_ref().map(|m| m.path().to_path_buf()),
        Some(project.root().join("present.js"))
    );
    assert!(error.to_string().contains("Cannot resolve './absent'"));
    assert!(!project.root().join("dist").exists());
}

#[tokio::test]
async fn test_missing_entry_fails() {
    let project = Project::new();
    let result = project.build("./bootstrap", Mode::Production).await;

    let Some(BuildError::Graph(error)) = result.error() else {
        panic!("expected graph error, got {:?}", result.error());
    };
    assert!(error.importer.is_none());
    assert!(matches!(error.kind, GraphErrorKind::Resolution(_)));
}

#[tokio::test]
async fn test_entry_resolved_against_context() {
    let project = Project::new();
    project.file("app/main.js", "console.log('context');\n");

    let config = packrat::Configuration::new(
        "./main",
        project.root().join("out"),
        "main.js",
        Mode::Development,
    )
    .with_context(PathBuf::from(project.root()).join("app"));

    let result = PackratBuildService::with_defaults().run(&config).await;
    assert!(result.is_success(), "build failed: {:?}", result.error());
    assert!(read_bundle(&result).contains("// ./main.js"));
}
