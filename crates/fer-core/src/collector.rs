//! The collector (spec.md §4.2, component **C**): populates every
//! top-level symbol of a module into its top-level scope before any
//! cross-module reference is resolved. Never inspects initializer or
//! function-body expressions.

use std::collections::HashSet;

use log::debug;

use crate::{
    ast::{FileAst, ItemAst, ParamAst, TypeExprAst},
    context::AnalysisContext,
    diagnostics::{Category, Diag, Phase as DiagPhase, Severity},
    module::{ImportBinding, Module, ModuleKey},
    scope::ScopeId,
    symbol::{Symbol, SymbolKind},
};

/// Runs the collector over `module_key`'s AST, which must already be
/// registered. Declares every top-level symbol into the module's top-level
/// scope, a child scope per named struct/interface/function-type alias, and
/// a child scope per function/method (with parameters pre-populated).
pub fn collect(ctx: &mut AnalysisContext, module_key: &ModuleKey) {
    let ast = ctx.registry.get(module_key).expect("module must be registered before collection").ast.clone();
    let top_scope = ctx.registry.get(module_key).expect("module registered").top_scope;

    collect_imports(ctx, module_key, &ast);

    // Types first: a method's receiver-eligibility check needs every type
    // alias's underlying shape to already be visible in scope.
    for item in &ast.items {
        if let ItemAst::TypeAlias(type_alias) = item {
            declare_type_alias(ctx, top_scope, type_alias);
        }
    }

    for item in &ast.items {
        match item {
            ItemAst::TypeAlias(_) => {}
            ItemAst::Function(function) => declare_function(ctx, top_scope, function),
            ItemAst::Method(method) => declare_method(ctx, module_key, top_scope, method),
            ItemAst::Variable(variable) => declare_variable(ctx, top_scope, variable),
        }
    }

    debug!("collected module {module_key}: {} items", ast.items.len());

    if let Some(cycle) = find_import_cycle(ctx, module_key) {
        let names = cycle.iter().map(|k| k.0.as_str()).collect::<Vec<_>>().join(" -> ");
        ctx.report.push(
            Diag::new(
                Category::Critical,
                Severity::CriticalError,
                DiagPhase::Collector,
                format!("import cycle detected: {names}"),
                ast.file.clone(),
                0..0,
            )
            .with_label("cyclic import"),
        );
        for participant in &cycle {
            if let Some(module) = ctx.registry.get_mut(participant) {
                module.blocked = true;
            }
        }
    }
}

/// Whether `module_key` can reach itself through the import graph, using
/// only edges already known (an uncollected module's imports are empty, so
/// this only fires once every module on the cycle has itself been
/// collected). Returns the path `module_key -> ... -> module_key` if so.
///
/// This, not phase re-entrance, is what actually catches cycles: the
/// orchestrator always asks an import for a phase strictly behind the
/// phase currently being advanced to (spec.md §2), so two modules that
/// import each other simply advance in lockstep through Collected, never
/// colliding on the same in-progress phase.
fn find_import_cycle(ctx: &AnalysisContext, module_key: &ModuleKey) -> Option<Vec<ModuleKey>> {
    fn walk(ctx: &AnalysisContext, target: &ModuleKey, current: &ModuleKey, seen: &mut HashSet<ModuleKey>, path: &mut Vec<ModuleKey>) -> bool {
        let Some(module) = ctx.registry.get(current) else { return false };
        for next in module.referenced_modules() {
            path.push(next.clone());
            if &next == target {
                return true;
            }
            if seen.insert(next.clone()) && walk(ctx, target, &next, seen, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    let mut seen = HashSet::new();
    seen.insert(module_key.clone());
    let mut path = vec![module_key.clone()];
    if walk(ctx, module_key, module_key, &mut seen, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn collect_imports(ctx: &mut AnalysisContext, module_key: &ModuleKey, ast: &FileAst) {
    for import in &ast.imports {
        let classification = crate::import::classify(&import.path, &ctx.project_name);
        let target = match crate::import::resolve(
            &import.path,
            &ctx.project_name,
            crate::import::Policy { remote_enabled: ctx.remote_enabled },
        ) {
            Ok(key) => key,
            Err(err) => {
                ctx.report.push(
                    Diag::new(
                        Category::Critical,
                        Severity::CriticalError,
                        DiagPhase::Collector,
                        err.to_string(),
                        ast.file.clone(),
                        import.position.clone(),
                    )
                    .with_label("unresolved import"),
                );
                continue;
            }
        };

        if classification == crate::import::Classification::Remote {
            let remote_share = ctx.registry.get(&target).map(|m| m.remote_share).unwrap_or(true);
            if let Err(err) = crate::import::check_share_policy(remote_share, &import.path) {
                ctx.report.push(
                    Diag::new(Category::Critical, Severity::CriticalError, DiagPhase::Collector, err.to_string(), ast.file.clone(), import.position.clone())
                        .with_label("import denied"),
                );
                continue;
            }
        }

        let module = ctx.registry.get_mut(module_key).expect("module registered");
        let binding_name = import.binding_name().to_string();
        if module.imports.contains_key(&binding_name) {
            ctx.report.push(
                Diag::new(
                    Category::Structure,
                    Severity::SemanticError,
                    DiagPhase::Collector,
                    format!("import alias '{binding_name}' is already declared in this module"),
                    ast.file.clone(),
                    import.position.clone(),
                )
                .with_label("duplicate import alias"),
            );
            continue;
        }
        module.imports.insert(
            binding_name,
            ImportBinding { target, position: import.position.clone(), used: false },
        );
    }
}

fn declare_type_alias(ctx: &mut AnalysisContext, top_scope: ScopeId, type_alias: &crate::ast::TypeAliasAst) {
    let child_scope = if matches!(type_alias.underlying, TypeExprAst::Struct { .. }) {
        let module = ctx.scopes.get(top_scope).module.clone();
        Some(ctx.scopes.create(module, None))
    } else {
        None
    };

    let mut symbol = Symbol::new(type_alias.name.clone(), SymbolKind::Type, type_alias.name_position.clone());
    if let Some(scope) = child_scope {
        symbol = symbol.with_child_scope(scope);
    }

    if let Err(earlier) = ctx.scopes.get_mut(top_scope).types.declare(type_alias.name.clone(), symbol) {
        report_redeclaration(ctx, top_scope, &type_alias.name, type_alias.name_position.clone(), earlier);
    }
}

fn declare_function(ctx: &mut AnalysisContext, top_scope: ScopeId, function: &crate::ast::FunctionAst) {
    let module = ctx.scopes.get(top_scope).module.clone();
    let fn_scope = ctx.scopes.create(module, Some(top_scope));
    declare_params(ctx, fn_scope, &function.params);

    let symbol = Symbol::new(function.name.clone(), SymbolKind::Function, function.name_position.clone())
        .with_child_scope(fn_scope);

    if let Err(earlier) = ctx.scopes.get_mut(top_scope).values.declare(function.name.clone(), symbol) {
        report_redeclaration(ctx, top_scope, &function.name, function.name_position.clone(), earlier);
    }
}

fn declare_method(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, method: &crate::ast::MethodAst) {
    let Some(receiver_symbol) = ctx.scopes.get(top_scope).types.get(&method.receiver_type) else {
        ctx.report.push(
            Diag::new(
                Category::Shape,
                Severity::SemanticError,
                DiagPhase::Collector,
                format!("method receiver type '{}' is not declared in this module", method.receiver_type),
                module_source(ctx, module_key),
                method.receiver_position.clone(),
            )
            .with_label("unknown receiver type"),
        );
        return;
    };

    let Some(receiver_scope) = receiver_symbol.child_scope else {
        ctx.report.push(
            Diag::new(
                Category::Shape,
                Severity::SemanticError,
                DiagPhase::Collector,
                format!(
                    "cannot declare a method on '{}': only named struct types may have methods",
                    method.receiver_type
                ),
                module_source(ctx, module_key),
                method.receiver_position.clone(),
            )
            .with_label("invalid method receiver")
            .with_help("methods may only be attached to a named struct type alias declared in this module"),
        );
        return;
    };

    let module = ctx.scopes.get(top_scope).module.clone();
    let fn_scope = ctx.scopes.create(module, Some(receiver_scope));
    declare_params(ctx, fn_scope, &method.function.params);

    let symbol = Symbol::new(
        method.function.name.clone(),
        SymbolKind::Method,
        method.function.name_position.clone(),
    )
    .with_child_scope(fn_scope);

    if let Err(earlier) = ctx.scopes.get_mut(receiver_scope).values.declare(method.function.name.clone(), symbol) {
        report_redeclaration(ctx, top_scope, &method.function.name, method.function.name_position.clone(), earlier);
    }
}

fn declare_params(ctx: &mut AnalysisContext, fn_scope: ScopeId, params: &[ParamAst]) {
    for param in params {
        let symbol = Symbol::new(param.name.clone(), SymbolKind::Var, param.position.clone());
        if let Err(earlier) = ctx.scopes.get_mut(fn_scope).values.declare(param.name.clone(), symbol) {
            report_redeclaration(ctx, fn_scope, &param.name, param.position.clone(), earlier);
        }
    }
}

fn declare_variable(ctx: &mut AnalysisContext, top_scope: ScopeId, variable: &crate::ast::VariableAst) {
    let symbol = Symbol::new(variable.name.clone(), SymbolKind::Var, variable.name_position.clone());
    if let Err(earlier) = ctx.scopes.get_mut(top_scope).values.declare(variable.name.clone(), symbol) {
        report_redeclaration(ctx, top_scope, &variable.name, variable.name_position.clone(), earlier);
    }
}

fn report_redeclaration(
    ctx: &mut AnalysisContext,
    scope: ScopeId,
    name: &str,
    position: std::ops::Range<usize>,
    earlier: std::ops::Range<usize>,
) {
    let module_key = ctx.scopes.get(scope).module.clone();
    let source = module_source_by_key(ctx, &module_key);
    ctx.report.push(
        Diag::new(
            Category::Structure,
            Severity::SemanticError,
            DiagPhase::Collector,
            format!("'{name}' is already declared in this scope"),
            source,
            position,
        )
        .with_label("duplicate declaration")
        .with_related(earlier, "first declared here"),
    );
}

fn module_source(ctx: &AnalysisContext, module_key: &ModuleKey) -> crate::file::SourceFile {
    module_source_by_key(ctx, module_key)
}

fn module_source_by_key(ctx: &AnalysisContext, module_key: &ModuleKey) -> crate::file::SourceFile {
    ctx.registry
        .get(module_key)
        .map(|m| m.ast.file.clone())
        .unwrap_or_else(|| crate::file::SourceFile::new(vec![module_key.0.clone()], String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{FileAst, FunctionAst, TypeAliasAst},
        file::SourceFile,
        module::{Category as ModuleCategory, Module},
    };

    fn file() -> SourceFile {
        SourceFile::new(vec!["m".into()], "struct Point { x: i32, y: i32 }".to_string())
    }

    fn register(ctx: &mut AnalysisContext, ast: FileAst) -> ModuleKey {
        let key = ModuleKey::new("m".to_string());
        let top_scope = ctx.new_module_scope(key.clone());
        ctx.registry.insert(Module::new(key.clone(), std::rc::Rc::new(ast), top_scope, ModuleCategory::Local));
        key
    }

    #[test]
    fn duplicate_function_name_reports_first_declaration() {
        let mut ctx = AnalysisContext::new("m", false);
        let ast = FileAst {
            file: file(),
            imports: vec![],
            items: vec![
                ItemAst::Function(FunctionAst {
                    name: "f".into(),
                    name_position: 0..1,
                    params: vec![],
                    return_type: None,
                    body: None,
                    position: 0..1,
                }),
                ItemAst::Function(FunctionAst {
                    name: "f".into(),
                    name_position: 10..11,
                    params: vec![],
                    return_type: None,
                    body: None,
                    position: 10..11,
                }),
            ],
        };
        let key = register(&mut ctx, ast);
        collect(&mut ctx, &key);
        assert_eq!(ctx.report.len(), 1);
    }

    #[test]
    fn method_on_struct_alias_declares_into_its_child_scope() {
        let mut ctx = AnalysisContext::new("m", false);
        let ast = FileAst {
            file: file(),
            imports: vec![],
            items: vec![
                ItemAst::TypeAlias(TypeAliasAst {
                    name: "Point".into(),
                    name_position: 0..1,
                    underlying: TypeExprAst::Struct { fields: vec![], position: 0..1 },
                    position: 0..1,
                }),
                ItemAst::Method(crate::ast::MethodAst {
                    receiver_type: "Point".into(),
                    receiver_position: 5..6,
                    function: FunctionAst {
                        name: "len".into(),
                        name_position: 5..8,
                        params: vec![],
                        return_type: None,
                        body: None,
                        position: 5..8,
                    },
                    position: 5..8,
                }),
            ],
        };
        let key = register(&mut ctx, ast);
        collect(&mut ctx, &key);
        assert!(ctx.report.is_empty());

        let top_scope = ctx.registry.get(&key).unwrap().top_scope;
        let point = ctx.scopes.get(top_scope).types.get("Point").unwrap();
        let receiver_scope = point.child_scope.unwrap();
        assert!(ctx.scopes.get(receiver_scope).values.contains_key("len"));
    }

    #[test]
    fn method_on_primitive_alias_is_rejected() {
        let mut ctx = AnalysisContext::new("m", false);
        let ast = FileAst {
            file: file(),
            imports: vec![],
            items: vec![
                ItemAst::TypeAlias(TypeAliasAst {
                    name: "Age".into(),
                    name_position: 0..1,
                    underlying: TypeExprAst::Primitive { name: "i32".into(), position: 0..1 },
                    position: 0..1,
                }),
                ItemAst::Method(crate::ast::MethodAst {
                    receiver_type: "Age".into(),
                    receiver_position: 5..6,
                    function: FunctionAst {
                        name: "next".into(),
                        name_position: 5..8,
                        params: vec![],
                        return_type: None,
                        body: None,
                        position: 5..8,
                    },
                    position: 5..8,
                }),
            ],
        };
        let key = register(&mut ctx, ast);
        collect(&mut ctx, &key);
        assert_eq!(ctx.report.len(), 1);
    }

    #[test]
    fn self_import_is_reported_as_a_degenerate_cycle() {
        let mut ctx = AnalysisContext::new("m", false);
        let ast = FileAst { file: file(), imports: vec![], items: vec![] };
        let key = register(&mut ctx, ast);
        ctx.registry.get_mut(&key).unwrap().imports.insert(
            "self".to_string(),
            ImportBinding { target: key.clone(), position: 0..1, used: true },
        );
        collect(&mut ctx, &key);
        assert!(ctx.registry.get(&key).unwrap().blocked);
    }

    #[test]
    fn mutual_import_cycle_blocks_both_participants() {
        let mut ctx = AnalysisContext::new("m", false);
        let a = register(&mut ctx, FileAst { file: file(), imports: vec![], items: vec![] });
        let b_ast = FileAst { file: SourceFile::new(vec!["b".into()], String::new()), imports: vec![], items: vec![] };
        let b = ModuleKey::new("b".to_string());
        let top_scope = ctx.new_module_scope(b.clone());
        ctx.registry.insert(Module::new(b.clone(), std::rc::Rc::new(b_ast), top_scope, ModuleCategory::Local));

        ctx.registry.get_mut(&a).unwrap().imports.insert(
            "b".to_string(),
            ImportBinding { target: b.clone(), position: 0..1, used: true },
        );
        ctx.registry.get_mut(&b).unwrap().imports.insert(
            "a".to_string(),
            ImportBinding { target: a.clone(), position: 0..1, used: true },
        );

        collect(&mut ctx, &a);

        assert!(ctx.registry.get(&a).unwrap().blocked);
        assert!(ctx.registry.get(&b).unwrap().blocked);
        assert!(ctx.report.iter().any(|d| d.message.contains("import cycle detected")));
    }
}
