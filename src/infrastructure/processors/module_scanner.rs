use crate::core::interfaces::ModuleScanner;
use crate::core::models::*;
use crate::utils::{ErrorContext, ParseError};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_parser::{ParseOptions, Parser};
use oxc_semantic::{ScopeFlags, Scoping, SemanticBuilder, SymbolId};
use oxc_span::{GetSpan, SourceType, Span};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Local binding that holds an anonymous `export default` value
pub const DEFAULT_EXPORT_BINDING: &str = "__packrat_default_export__";

/// Static reference extraction with oxc.
///
/// Follows `import`/`export ... from` declarations and `require("<literal>")`
/// calls to the global `require`. `import()` and computed `require` calls are
/// recorded as dynamic references and left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct OxcModuleScanner;

impl OxcModuleScanner {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleScanner for OxcModuleScanner {
    fn scan(&self, path: &Path, source: &str) -> Result<ModuleAnalysis, ParseError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => scan_json(path, source),
            _ => scan_script(path, source),
        }
    }
}

fn scan_json(path: &Path, source: &str) -> Result<ModuleAnalysis, ParseError> {
    serde_json::from_str::<serde_json::Value>(source).map_err(|err| {
        let context = ErrorContext::new()
            .with_file(path.to_path_buf())
            .with_location(err.line(), err.column())
            .with_snippet_around(source, err.line());
        ParseError::new(path.to_path_buf(), err.to_string()).with_context(context)
    })?;

    Ok(ModuleAnalysis {
        format: Some(ModuleFormat::Json),
        ..ModuleAnalysis::default()
    })
}

fn source_type_for(path: &Path) -> SourceType {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("mjs") => SourceType::mjs(),
        Some("cjs") => SourceType::cjs(),
        // Module or script is decided by the presence of import/export
        _ => SourceType::unambiguous(),
    }
}

fn scan_script(path: &Path, source: &str) -> Result<ModuleAnalysis, ParseError> {
    let allocator = Allocator::default();
    let source_type = source_type_for(path);
    // CommonJS bodies run inside a function, so top-level `return` is legal there
    let options = ParseOptions {
        allow_return_outside_function: !source_type.is_module(),
        ..ParseOptions::default()
    };
    let parsed = Parser::new(&allocator, source, source_type)
        .with_options(options)
        .parse();

    if parsed.panicked || !parsed.errors.is_empty() {
        let message = parsed
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(ParseError::new(path.to_path_buf(), message));
    }

    let program = parsed.program;
    let semantic = SemanticBuilder::new().build(&program).semantic;

    let mut scan = ReferenceScan::new(semantic.scoping());
    scan.collect_import_bindings(&program);
    if let Some(hashbang) = &program.hashbang {
        scan.push_edit(hashbang.span.start, hashbang.span.end, Replacement::Remove);
    }
    scan.visit_program(&program);

    Ok(scan.finish())
}

struct ReferenceScan<'s> {
    scoping: &'s Scoping,
    import_bindings: HashMap<SymbolId, (ModuleSpecifier, ImportedName)>,
    /// (source offset, specifier) of every static reference site
    sites: Vec<(u32, ModuleSpecifier)>,
    edits: Vec<SourceEdit>,
    exports: Vec<ExportEntry>,
    prologue: Vec<PrologueItem>,
    dynamic_references: Vec<String>,
    has_module_syntax: bool,
    /// Depth of non-arrow functions and classes around the current node
    this_scope_depth: u32,
    top_level_this: Vec<Span>,
}

impl<'s> ReferenceScan<'s> {
    fn new(scoping: &'s Scoping) -> Self {
        Self {
            scoping,
            import_bindings: HashMap::new(),
            sites: Vec::new(),
            edits: Vec::new(),
            exports: Vec::new(),
            prologue: Vec::new(),
            dynamic_references: Vec::new(),
            has_module_syntax: false,
            this_scope_depth: 0,
            top_level_this: Vec::new(),
        }
    }

    /// Imports are hoisted, so bindings are known before any reference is visited
    fn collect_import_bindings(&mut self, program: &Program<'_>) {
        for stmt in &program.body {
            let Statement::ImportDeclaration(decl) = stmt else {
                continue;
            };
            let Some(specifiers) = &decl.specifiers else {
                continue;
            };
            let specifier = ModuleSpecifier::new(decl.source.value.as_str());

            for import in specifiers {
                let (local, imported) = match import {
                    ImportDeclarationSpecifier::ImportSpecifier(s) => {
                        (&s.local, imported_name(export_name(&s.imported)))
                    }
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                        (&s.local, ImportedName::Default)
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                        (&s.local, ImportedName::Namespace)
                    }
                };
                if let Some(symbol_id) = local.symbol_id.get() {
                    self.import_bindings
                        .insert(symbol_id, (specifier.clone(), imported));
                }
            }
        }
    }

    fn push_edit(&mut self, start: u32, end: u32, replacement: Replacement) {
        self.edits.push(SourceEdit {
            start,
            end,
            replacement,
        });
    }

    fn add_site(&mut self, offset: u32, specifier: &ModuleSpecifier) {
        self.sites.push((offset, specifier.clone()));
    }

    fn add_prologue(&mut self, item: PrologueItem) {
        if !self.prologue.contains(&item) {
            self.prologue.push(item);
        }
    }

    fn import_binding_of(&self, ident: &IdentifierReference<'_>) -> Option<(ModuleSpecifier, ImportedName)> {
        let reference_id = ident.reference_id.get()?;
        let symbol_id = self.scoping.get_reference(reference_id).symbol_id()?;
        self.import_bindings.get(&symbol_id).cloned()
    }

    fn is_global(&self, ident: &IdentifierReference<'_>) -> bool {
        ident
            .reference_id
            .get()
            .map(|id| self.scoping.get_reference(id).symbol_id().is_none())
            .unwrap_or(true)
    }

    fn scan_import(&mut self, decl: &ImportDeclaration<'_>) {
        self.has_module_syntax = true;
        let specifier = ModuleSpecifier::new(decl.source.value.as_str());
        self.add_site(decl.span.start, &specifier);
        self.push_edit(decl.span.start, decl.span.end, Replacement::Remove);
        self.add_prologue(PrologueItem::Import(specifier));
    }

    fn scan_export_all(&mut self, decl: &ExportAllDeclaration<'_>) {
        self.has_module_syntax = true;
        let specifier = ModuleSpecifier::new(decl.source.value.as_str());
        self.add_site(decl.span.start, &specifier);
        self.push_edit(decl.span.start, decl.span.end, Replacement::Remove);
        self.add_prologue(PrologueItem::Import(specifier.clone()));

        match &decl.exported {
            Some(exported) => self.exports.push(ExportEntry {
                exported: export_name(exported).to_string(),
                target: ExportTarget::Imported {
                    specifier,
                    imported: ImportedName::Namespace,
                },
            }),
            None => self.add_prologue(PrologueItem::ExportStar(specifier)),
        }
    }

    fn scan_export_named<'a>(&mut self, decl: &ExportNamedDeclaration<'a>) {
        self.has_module_syntax = true;

        if let Some(declaration) = &decl.declaration {
            // `export const a = 1` keeps the declaration and publishes its bindings
            self.push_edit(decl.span.start, declaration.span().start, Replacement::Remove);
            for name in declared_names(declaration) {
                self.exports.push(ExportEntry {
                    exported: name.clone(),
                    target: ExportTarget::Local(name),
                });
            }
            walk::walk_export_named_declaration(self, decl);
            return;
        }

        self.push_edit(decl.span.start, decl.span.end, Replacement::Remove);

        if let Some(source) = &decl.source {
            let specifier = ModuleSpecifier::new(source.value.as_str());
            self.add_site(decl.span.start, &specifier);
            self.add_prologue(PrologueItem::Import(specifier.clone()));
            for spec in &decl.specifiers {
                self.exports.push(ExportEntry {
                    exported: export_name(&spec.exported).to_string(),
                    target: ExportTarget::Imported {
                        specifier: specifier.clone(),
                        imported: imported_name(export_name(&spec.local)),
                    },
                });
            }
            return;
        }

        for spec in &decl.specifiers {
            let target = match &spec.local {
                ModuleExportName::IdentifierReference(ident) => match self.import_binding_of(ident) {
                    Some((specifier, imported)) => ExportTarget::Imported {
                        specifier,
                        imported,
                    },
                    None => ExportTarget::Local(ident.name.to_string()),
                },
                other => ExportTarget::Local(export_name(other).to_string()),
            };
            self.exports.push(ExportEntry {
                exported: export_name(&spec.exported).to_string(),
                target,
            });
        }
    }

    fn scan_export_default<'a>(&mut self, decl: &ExportDefaultDeclaration<'a>) {
        self.has_module_syntax = true;
        let value_start = decl.declaration.span().start;

        let named_class = match &decl.declaration {
            ExportDefaultDeclarationKind::ClassDeclaration(class) => class.id.as_ref(),
            _ => None,
        };

        let local = match (&decl.declaration, named_class) {
            (_, Some(id)) => {
                self.push_edit(decl.span.start, value_start, Replacement::Remove);
                id.name.to_string()
            }
            // Declarations stay declarations, so functions remain hoisted
            (ExportDefaultDeclarationKind::FunctionDeclaration(func), None) => {
                self.push_edit(decl.span.start, value_start, Replacement::Remove);
                match &func.id {
                    Some(id) => id.name.to_string(),
                    None => {
                        self.push_edit(
                            func.params.span.start,
                            func.params.span.start,
                            Replacement::Text(format!(" {}", DEFAULT_EXPORT_BINDING)),
                        );
                        self.push_edit(
                            decl.span.end,
                            decl.span.end,
                            Replacement::Text(format!("\n{}", default_name_fix())),
                        );
                        DEFAULT_EXPORT_BINDING.to_string()
                    }
                }
            }
            (kind, None) => {
                self.push_edit(
                    decl.span.start,
                    value_start,
                    Replacement::Text(format!("const {} = ", DEFAULT_EXPORT_BINDING)),
                );
                let tail = if is_anonymous_definition(kind) {
                    format!(";\n{}", default_name_fix())
                } else {
                    ";".to_string()
                };
                self.push_edit(decl.span.end, decl.span.end, Replacement::Text(tail));
                DEFAULT_EXPORT_BINDING.to_string()
            }
        };

        self.exports.push(ExportEntry {
            exported: "default".to_string(),
            target: ExportTarget::Local(local),
        });
        walk::walk_export_default_declaration(self, decl);
    }

    fn scan_require<'a>(&mut self, call: &CallExpression<'a>) {
        match &call.arguments[..] {
            [Argument::StringLiteral(literal)] => {
                let specifier = ModuleSpecifier::new(literal.value.as_str());
                self.add_site(call.span.start, &specifier);
                self.push_edit(call.span.start, call.span.end, Replacement::Require(specifier));
            }
            _ => {
                self.dynamic_references
                    .push(format!("require(...) at offset {}", call.span.start));
                for argument in &call.arguments {
                    self.visit_argument(argument);
                }
            }
        }
    }

    fn finish(mut self) -> ModuleAnalysis {
        // Top-level `this` is undefined in an ES module
        if self.has_module_syntax {
            for span in std::mem::take(&mut self.top_level_this) {
                self.push_edit(span.start, span.end, Replacement::Text("undefined".to_string()));
            }
        }

        // Insertions sort before replacements that start at the same offset
        self.edits.sort_by_key(|edit| (edit.start, edit.end));
        debug_assert!(self.edits.windows(2).all(|pair| pair[0].end <= pair[1].start));

        self.sites.sort_by_key(|(offset, _)| *offset);
        let mut seen = HashSet::new();
        let references = self
            .sites
            .into_iter()
            .map(|(_, specifier)| specifier)
            .filter(|specifier| seen.insert(specifier.clone()))
            .collect();

        ModuleAnalysis {
            format: Some(if self.has_module_syntax {
                ModuleFormat::EsModule
            } else {
                ModuleFormat::CommonJs
            }),
            references,
            edits: self.edits,
            exports: self.exports,
            prologue: self.prologue,
            dynamic_references: self.dynamic_references,
        }
    }
}

impl<'a> Visit<'a> for ReferenceScan<'_> {
    fn visit_statement(&mut self, stmt: &Statement<'a>) {
        match stmt {
            Statement::ImportDeclaration(decl) => self.scan_import(decl),
            Statement::ExportAllDeclaration(decl) => self.scan_export_all(decl),
            Statement::ExportNamedDeclaration(decl) => self.scan_export_named(decl),
            Statement::ExportDefaultDeclaration(decl) => self.scan_export_default(decl),
            _ => walk::walk_statement(self, stmt),
        }
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if let Some((specifier, imported)) = self.import_binding_of(ident) {
            self.push_edit(
                ident.span.start,
                ident.span.end,
                Replacement::Binding {
                    specifier,
                    imported,
                    call: false,
                },
            );
        }
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                if let Some((specifier, imported)) = self.import_binding_of(ident) {
                    self.push_edit(
                        prop.span.start,
                        prop.span.end,
                        Replacement::ShorthandBinding {
                            key: ident.name.to_string(),
                            specifier,
                            imported,
                        },
                    );
                    return;
                }
            }
        }
        walk::walk_object_property(self, prop);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &call.callee {
            if callee.name.as_str() == "require" && self.is_global(callee) {
                self.scan_require(call);
                return;
            }

            // Imported functions are called without the namespace as `this`
            if let Some((specifier, imported)) = self.import_binding_of(callee) {
                self.push_edit(
                    callee.span.start,
                    callee.span.end,
                    Replacement::Binding {
                        specifier,
                        imported,
                        call: true,
                    },
                );
                for argument in &call.arguments {
                    self.visit_argument(argument);
                }
                return;
            }
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        self.this_scope_depth += 1;
        walk::walk_function(self, func, flags);
        self.this_scope_depth -= 1;
    }

    fn visit_class(&mut self, class: &Class<'a>) {
        self.this_scope_depth += 1;
        walk::walk_class(self, class);
        self.this_scope_depth -= 1;
    }

    fn visit_this_expression(&mut self, expr: &ThisExpression) {
        if self.this_scope_depth == 0 {
            self.top_level_this.push(expr.span);
        }
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        let site = match &expr.source {
            Expression::StringLiteral(literal) => format!("import(\"{}\")", literal.value),
            _ => format!("import(...) at offset {}", expr.span.start),
        };
        self.dynamic_references.push(site);
        walk::walk_import_expression(self, expr);
    }
}

/// Anonymous functions and classes exported as default are named "default"
fn is_anonymous_definition(kind: &ExportDefaultDeclarationKind<'_>) -> bool {
    match kind {
        ExportDefaultDeclarationKind::ClassDeclaration(class) => {
            class.id.is_none() && !has_static_name(class)
        }
        ExportDefaultDeclarationKind::ArrowFunctionExpression(_) => true,
        ExportDefaultDeclarationKind::FunctionExpression(func) => func.id.is_none(),
        ExportDefaultDeclarationKind::ClassExpression(class) => {
            class.id.is_none() && !has_static_name(class)
        }
        _ => false,
    }
}

/// A static `name` member already decides the class's name
fn has_static_name(class: &Class<'_>) -> bool {
    class.body.body.iter().any(|element| {
        element.r#static()
            && element
                .property_key()
                .and_then(|key| key.static_name())
                .is_some_and(|name| name == "name")
    })
}

fn default_name_fix() -> String {
    format!(
        "Object.defineProperty({}, \"name\", {{ value: \"default\", configurable: true }});",
        DEFAULT_EXPORT_BINDING
    )
}

fn export_name<'b>(name: &'b ModuleExportName<'_>) -> &'b str {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.as_str(),
        ModuleExportName::IdentifierReference(ident) => ident.name.as_str(),
        ModuleExportName::StringLiteral(literal) => literal.value.as_str(),
    }
}

fn imported_name(name: &str) -> ImportedName {
    if name == "default" {
        ImportedName::Default
    } else {
        ImportedName::Named(name.to_string())
    }
}

fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|declarator| declarator.id.get_binding_identifiers())
            .map(|ident| ident.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(func) => {
            func.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        _ => Vec::new(),
    }
}
