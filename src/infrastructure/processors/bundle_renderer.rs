use crate::core::models::*;
use std::collections::HashMap;

/// Name of the runtime require function inside the bundle
pub const RUNTIME_REQUIRE: &str = "__packrat_require__";

/// Wrapper parameters of ES modules, which may declare `module` or `exports` themselves
const ESM_MODULE: &str = "__unused_packrat_module__";
const ESM_EXPORTS: &str = "__packrat_exports__";

const RUNTIME: &str = r#"var __packrat_module_cache__ = {};
function __packrat_require__(moduleId) {
  var cachedModule = __packrat_module_cache__[moduleId];
  if (cachedModule !== undefined) {
    return cachedModule.exports;
  }
  var module = (__packrat_module_cache__[moduleId] = { exports: {} });
  __packrat_modules__[moduleId].call(module.exports, module, module.exports, __packrat_require__);
  return module.exports;
}
__packrat_require__.r = (exports) => {
  if (typeof Symbol !== "undefined" && Symbol.toStringTag) {
    Object.defineProperty(exports, Symbol.toStringTag, { value: "Module" });
  }
  Object.defineProperty(exports, "__esModule", { value: true });
};
__packrat_require__.d = (exports, getters) => {
  for (var key in getters) {
    if (Object.prototype.hasOwnProperty.call(getters, key) && !Object.prototype.hasOwnProperty.call(exports, key)) {
      Object.defineProperty(exports, key, { enumerable: true, get: getters[key] });
    }
  }
};
__packrat_require__.n = (module) => (module && module.__esModule ? module["default"] : module);
__packrat_require__.s = (exports, source) => {
  var getters = {};
  Object.keys(source).forEach((key) => {
    if (key !== "default" && !Object.prototype.hasOwnProperty.call(exports, key)) {
      getters[key] = () => source[key];
    }
  });
  __packrat_require__.d(exports, getters);
};
"#;

/// Renders a module graph into one self-executing script.
///
/// Every module body becomes a function in a module table keyed by its id.
/// The runtime caches each module's `exports` on first require, so a module
/// body runs at most once and cyclic requires observe partial exports.
pub struct BundleRenderer<'g> {
    graph: &'g ModuleGraph,
    order: &'g [ModuleIdentity],
    mode: Mode,
    ids: HashMap<&'g ModuleIdentity, String>,
}

impl<'g> BundleRenderer<'g> {
    /// `order` is the execution order; it also decides the numeric ids of
    /// production builds.
    pub fn new(graph: &'g ModuleGraph, order: &'g [ModuleIdentity], mode: Mode) -> Self {
        let ids = order
            .iter()
            .enumerate()
            .map(|(index, identity)| {
                let id = match mode {
                    Mode::Production => index.to_string(),
                    Mode::Development => string_literal(&identity.readable_name(&graph.context)),
                };
                (identity, id)
            })
            .collect();

        Self {
            graph,
            order,
            mode,
            ids,
        }
    }

    /// JavaScript literal naming `identity` in the module table
    pub fn module_id(&self, identity: &ModuleIdentity) -> Option<&str> {
        self.ids.get(identity).map(String::as_str)
    }

    pub fn render(&self) -> String {
        let mut bundle = String::new();

        if self.mode == Mode::Development {
            bundle.push_str("// packrat development bundle\n");
        }
        bundle.push_str("(() => {\nvar __packrat_modules__ = {\n");

        for identity in self.order {
            let (Some(record), Some(id)) = (self.graph.get(identity), self.module_id(identity)) else {
                continue;
            };
            if self.mode == Mode::Development {
                bundle.push_str(&format!(
                    "\n// {}\n",
                    identity.readable_name(&self.graph.context)
                ));
            }
            let (module, exports) = match record.format {
                ModuleFormat::EsModule => (ESM_MODULE, ESM_EXPORTS),
                ModuleFormat::CommonJs | ModuleFormat::Json => ("module", "exports"),
            };
            bundle.push_str(&format!(
                "{}: (function ({}, {}, {}) {{\n",
                id, module, exports, RUNTIME_REQUIRE
            ));
            bundle.push_str(&self.render_body(record));
            bundle.push_str("\n}),\n");
        }

        bundle.push_str("};\n");
        bundle.push_str(RUNTIME);
        bundle.push_str(&format!(
            "{}({});\n",
            RUNTIME_REQUIRE,
            self.module_id(&self.graph.entry).unwrap_or("undefined")
        ));
        bundle.push_str("})();\n");
        bundle
    }

    fn render_body(&self, record: &ModuleRecord) -> String {
        match record.format {
            // Parsed at runtime so keys like `__proto__` stay plain data
            ModuleFormat::Json => format!(
                "module.exports = JSON.parse({});",
                string_literal(record.source_text.trim())
            ),
            ModuleFormat::CommonJs => self.apply_edits(record),
            ModuleFormat::EsModule => {
                let mut body = self.esm_prologue(record);
                body.push_str(&self.apply_edits(record));
                body
            }
        }
    }

    fn esm_prologue(&self, record: &ModuleRecord) -> String {
        let mut prologue = String::from("\"use strict\";\n");
        prologue.push_str(&format!("{}.r({});\n", RUNTIME_REQUIRE, ESM_EXPORTS));

        if !record.exports.is_empty() {
            prologue.push_str(&format!("{}.d({}, {{\n", RUNTIME_REQUIRE, ESM_EXPORTS));
            for export in &record.exports {
                let getter = match &export.target {
                    ExportTarget::Local(name) => name.clone(),
                    ExportTarget::Imported {
                        specifier,
                        imported,
                    } => self.binding_expression(record, specifier, imported),
                };
                prologue.push_str(&format!(
                    "  {}: () => {},\n",
                    string_literal(&export.exported),
                    getter
                ));
            }
            prologue.push_str("});\n");
        }

        for item in &record.prologue {
            match item {
                PrologueItem::Import(specifier) => prologue.push_str(&format!(
                    "var {} = {};\n",
                    namespace_binding(record, specifier),
                    self.require_expression(record, specifier)
                )),
                PrologueItem::ExportStar(specifier) => prologue.push_str(&format!(
                    "{}.s({}, {});\n",
                    RUNTIME_REQUIRE,
                    ESM_EXPORTS,
                    namespace_binding(record, specifier)
                )),
            }
        }

        prologue
    }

    /// Splice the scanner's edits into the original source
    fn apply_edits(&self, record: &ModuleRecord) -> String {
        let source = record.source_text.as_str();
        let mut output = String::with_capacity(source.len());
        let mut cursor = 0usize;

        for edit in &record.edits {
            let (start, end) = (edit.start as usize, edit.end as usize);
            if start < cursor || end > source.len() {
                continue;
            }
            output.push_str(&source[cursor..start]);
            match &edit.replacement {
                Replacement::Remove => {}
                Replacement::Text(text) => output.push_str(text),
                Replacement::Require(specifier) => {
                    output.push_str(&self.require_expression(record, specifier))
                }
                Replacement::Binding {
                    specifier,
                    imported,
                    call,
                } => {
                    let expression = self.binding_expression(record, specifier, imported);
                    if *call && *imported != ImportedName::Namespace {
                        output.push_str(&format!("(0, {})", expression));
                    } else {
                        output.push_str(&expression);
                    }
                }
                Replacement::ShorthandBinding {
                    key,
                    specifier,
                    imported,
                } => output.push_str(&format!(
                    "{}: {}",
                    key,
                    self.binding_expression(record, specifier, imported)
                )),
            }
            cursor = end;
        }

        output.push_str(&source[cursor..]);
        output
    }

    fn target_of(&self, record: &ModuleRecord, specifier: &ModuleSpecifier) -> Option<&ModuleRecord> {
        record
            .resolved
            .get(specifier)
            .and_then(|identity| self.graph.get(identity))
    }

    fn require_expression(&self, record: &ModuleRecord, specifier: &ModuleSpecifier) -> String {
        let id = record
            .resolved
            .get(specifier)
            .and_then(|identity| self.module_id(identity));

        match id {
            Some(id) => format!("{}({})", RUNTIME_REQUIRE, id),
            None => missing_module(specifier),
        }
    }

    fn binding_expression(
        &self,
        record: &ModuleRecord,
        specifier: &ModuleSpecifier,
        imported: &ImportedName,
    ) -> String {
        let namespace = namespace_binding(record, specifier);
        match imported {
            ImportedName::Namespace => namespace,
            ImportedName::Named(name) => property_access(&namespace, name),
            ImportedName::Default => match self.target_of(record, specifier).map(|t| t.format) {
                Some(ModuleFormat::EsModule) => property_access(&namespace, "default"),
                // CommonJS and JSON: the whole `module.exports` unless flagged `__esModule`
                _ => format!("{}.n({})", RUNTIME_REQUIRE, namespace),
            },
        }
    }
}

fn namespace_binding(record: &ModuleRecord, specifier: &ModuleSpecifier) -> String {
    let index = record
        .references
        .iter()
        .position(|reference| reference == specifier)
        .unwrap_or(record.references.len());
    format!("__packrat_import_{}__", index)
}

fn missing_module(specifier: &ModuleSpecifier) -> String {
    format!(
        "(() => {{ var e = new Error({}); e.code = \"MODULE_NOT_FOUND\"; throw e; }})()",
        string_literal(&format!("Cannot find module '{}'", specifier))
    )
}

fn property_access(object: &str, name: &str) -> String {
    if is_identifier_name(name) {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, string_literal(name))
    }
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}

/// A JSON string is a valid JavaScript string literal
fn string_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
