use crate::support::{read_bundle, run_with_node, Project};
use packrat::Mode;

const EXPECTED: &str = r#"{"def":"default","named":"named","counter":1,"nsNamed":"named","esModule":true,"cjs":"cjs","cjsDefault":"cjs","cjsValue":"cjs","data":2,"star":"star","renamed":"named","anon":42}"#;

fn interop_project() -> Project {
    let project = Project::new();
    project
        .file(
            "bootstrap.js",
            r#"
import def, { named, counter, increment } from './esm';
import * as ns from './esm';
import cjsDefault, { value as cjsValue } from './cjs';
import data from './data.json';
import { star, renamed } from './reexport';
import anon from './anon';
const cjs = require('./cjs');

increment();
console.log(JSON.stringify({
  def: def(),
  named,
  counter,
  nsNamed: ns.named,
  esModule: require('./esm').__esModule,
  cjs: cjs.value,
  cjsDefault: cjsDefault.value,
  cjsValue,
  data: data.items.length,
  star,
  renamed,
  anon,
}));
"#,
        )
        .file(
            "esm.js",
            r#"
export let counter = 0;
export function increment() {
  counter += 1;
}
export const named = 'named';
export default function () {
  return 'default';
}
"#,
        )
        .file("cjs.js", "exports.value = 'cjs';\n")
        .file("data.json", "{ \"items\": [1, 2] }\n")
        .file(
            "reexport.js",
            "export * from './star';\nexport { named as renamed } from './esm';\n",
        )
        .file("star.js", "export const star = 'star';\nexport default 'hidden';\n")
        .file("anon.js", "export default 6 * 7\n");
    project
}

#[tokio::test]
async fn test_esm_cjs_json_interop_development() {
    let project = interop_project();
    let result = project.build("./bootstrap", Mode::Development).await;
    let bundle = read_bundle(&result);

    assert!(bundle.contains("__packrat_require__.r(__packrat_exports__);"));
    assert!(bundle.contains(r#"module.exports = JSON.parse("{ \"items\": [1, 2] }");"#));
    assert!(!bundle.contains("import def"));

    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, EXPECTED);
    }
}

#[tokio::test]
async fn test_esm_cjs_json_interop_production() {
    let project = interop_project();
    let result = project.build("./bootstrap", Mode::Production).await;
    assert!(result.is_success(), "build failed: {:?}", result.error());

    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, EXPECTED);
    }
}

#[tokio::test]
async fn test_shared_module_initialised_once() {
    let project = Project::new();
    project
        .file(
            "index.js",
            r#"
import { count as viaImport } from './state';
const viaRequire = require('./state').count;
require('./other');
console.log(viaImport, viaRequire, globalThis.__stateRuns);
"#,
        )
        .file("other.js", "require('./state');\n")
        .file(
            "state.js",
            "globalThis.__stateRuns = (globalThis.__stateRuns || 0) + 1;\nexports.count = globalThis.__stateRuns;\n",
        );

    let result = project.build("./index", Mode::Development).await;
    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, "1 1 1");
    }
}

const MODULE_SEMANTICS: &str = r#"[1,"m","e","undefined","default","default","default","named","called"]"#;

fn module_semantics_project() -> Project {
    let project = Project::new();
    project
        .file(
            "index.js",
            r#"
import { v } from './dep';
import fn from './fn';
import Klass from './klass';
import arrow from './arrow';
import named from './named';
const module = { name: 'm' };
let exports = 'e';
console.log(JSON.stringify([
  v,
  module.name,
  exports,
  typeof this,
  fn.name,
  Klass.name,
  arrow.name,
  named.name,
  fn(),
]));
"#,
        )
        .file("dep.js", "export const v = 1;\n")
        .file("fn.js", "export default function () {\n  return 'called';\n}\n")
        .file("klass.js", "export default class {}\n")
        .file("arrow.js", "export default () => 0;\n")
        .file("named.js", "export default function named() {}\n");
    project
}

#[tokio::test]
async fn test_esm_bodies_keep_module_semantics_development() {
    let project = module_semantics_project();
    let result = project.build("./index", Mode::Development).await;
    let bundle = read_bundle(&result);
    assert!(bundle.contains("const module = { name: 'm' };"));
    assert!(bundle.contains("typeof undefined"));

    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, MODULE_SEMANTICS);
    }
}

#[tokio::test]
async fn test_esm_bodies_keep_module_semantics_production() {
    let project = module_semantics_project();
    let result = project.build("./index", Mode::Production).await;
    assert!(result.is_success(), "build failed: {:?}", result.error());

    if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
        assert_eq!(stdout, MODULE_SEMANTICS);
    }
}

#[tokio::test]
async fn test_commonjs_top_level_return() {
    let project = Project::new();
    project
        .file("index.js", "require('./early');\nconsole.log('after');\n")
        .file(
            "early.js",
            "if (require('./flags').skip) return;\nconsole.log('not skipped');\n",
        )
        .file("flags.js", "exports.skip = true;\n");

    for mode in [Mode::Development, Mode::Production] {
        let result = project.build("./index", mode).await;
        assert!(result.is_success(), "build failed: {:?}", result.error());
        if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
            assert_eq!(stdout, "after");
        }
    }
}

#[tokio::test]
async fn test_json_proto_key_stays_data() {
    let project = Project::new();
    project
        .file(
            "index.js",
            "const data = require('./data.json');\nconsole.log(Object.keys(data).join(','), JSON.stringify(data));\n",
        )
        .file("data.json", "{ \"__proto__\": { \"polluted\": 1 }, \"a\": 1 }\n");

    for mode in [Mode::Development, Mode::Production] {
        let result = project.build("./index", mode).await;
        if let Some(stdout) = run_with_node(result.output_path().unwrap()) {
            assert_eq!(stdout, r#"__proto__,a {"__proto__":{"polluted":1},"a":1}"#);
        }
    }
}
