//! The resolver (spec.md §4.3, component **R**): binds every identifier and
//! type reference to a symbol, translates written type annotations into
//! semantic [`Type`]s, and enforces the forward-reference rules.

use std::{cmp::Ordering, ops::Range};

use indexmap::IndexMap;
use log::debug;

use crate::{
    ast::{BlockAst, ElseAst, ExprAst, FileAst, IfAst, ItemAst, StmtAst, TypeExprAst},
    context::AnalysisContext,
    diagnostics::{Category, Diag, Phase as DiagPhase, Severity},
    file::SourceFile,
    module::{ModuleKey, Phase as ModulePhase},
    scope::ScopeId,
    symbol::{Symbol, SymbolKind},
    types::{FunctionType, InterfaceType, Primitive, StructType, Type},
};

/// Resolves a previously collected module: fixes explicit type annotations
/// onto symbols, walks function bodies to resolve identifier references,
/// and tracks which import aliases get used.
///
/// The caller (the orchestrator) is responsible for first advancing every
/// imported module through [`ModulePhase::Collected`] (spec.md §2:
/// resolving a module only requires its imports be collected, one phase
/// behind, not resolved themselves). A qualified type reference to a
/// specific import is the exception: `resolve_qualified_type` pulls that one
/// import the rest of the way to `Resolved` itself, on demand, since only a
/// resolved type alias has its `Symbol::ty` filled in (spec.md §4.3).
pub fn resolve(ctx: &mut AnalysisContext, module_key: &ModuleKey) {
    let ast = ctx.registry.get(module_key).expect("module registered").ast.clone();
    let top_scope = ctx.registry.get(module_key).expect("module registered").top_scope;

    for item in &ast.items {
        match item {
            ItemAst::TypeAlias(type_alias) => resolve_type_alias(ctx, module_key, top_scope, type_alias),
            ItemAst::Function(function) => resolve_function(ctx, module_key, top_scope, function),
            ItemAst::Method(method) => resolve_method(ctx, module_key, top_scope, method),
            ItemAst::Variable(variable) => resolve_top_level_variable(ctx, module_key, top_scope, variable),
        }
    }

    report_unused_imports(ctx, module_key, &ast);
    debug!("resolved module {module_key}");
}

fn resolve_type_alias(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, type_alias: &crate::ast::TypeAliasAst) {
    let resolved = translate_type(ctx, module_key, top_scope, &type_alias.underlying);
    if let Some(symbol) = ctx.scopes.get_mut(top_scope).types.get_mut(&type_alias.name) {
        symbol.ty = Some(resolved);
    }
}

fn resolve_function(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, function: &crate::ast::FunctionAst) {
    let fn_scope = ctx
        .scopes
        .get(top_scope)
        .values
        .get(&function.name)
        .and_then(|s| s.child_scope)
        .expect("collector always attaches a child scope to functions");

    let sig = build_function_signature(ctx, module_key, top_scope, fn_scope, function);
    if let Some(symbol) = ctx.scopes.get_mut(top_scope).values.get_mut(&function.name) {
        symbol.ty = Some(Type::Function(sig));
    }

    if let Some(body) = &function.body {
        resolve_block(ctx, module_key, top_scope, fn_scope, body);
    }
}

fn resolve_method(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, method: &crate::ast::MethodAst) {
    let Some(receiver_scope) = ctx
        .scopes
        .get(top_scope)
        .types
        .get(&method.receiver_type)
        .and_then(|s| s.child_scope)
    else {
        return; // collector already reported this receiver as invalid
    };

    let Some(fn_scope) = ctx
        .scopes
        .get(receiver_scope)
        .values
        .get(&method.function.name)
        .and_then(|s| s.child_scope)
    else {
        return;
    };

    let sig = build_function_signature(ctx, module_key, top_scope, fn_scope, &method.function);

    if let Some(Type::User(handle)) = ctx.scopes.get(top_scope).types.get(&method.receiver_type).and_then(|s| s.ty.clone()) {
        handle.0.borrow_mut().methods.insert(method.function.name.clone(), sig.clone());
    }

    if let Some(symbol) = ctx.scopes.get_mut(receiver_scope).values.get_mut(&method.function.name) {
        symbol.ty = Some(Type::Function(sig));
    }

    if let Some(body) = &method.function.body {
        resolve_block(ctx, module_key, top_scope, fn_scope, body);
    }
}

fn resolve_top_level_variable(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, variable: &crate::ast::VariableAst) {
    if let Some(declared) = &variable.declared_type {
        let ty = translate_type(ctx, module_key, top_scope, declared);
        if let Some(symbol) = ctx.scopes.get_mut(top_scope).values.get_mut(&variable.name) {
            symbol.ty = Some(ty);
        }
    }
    resolve_expr(ctx, module_key, top_scope, top_scope, &variable.initializer);
}

fn build_function_signature(
    ctx: &mut AnalysisContext,
    module_key: &ModuleKey,
    top_scope: ScopeId,
    fn_scope: ScopeId,
    function: &crate::ast::FunctionAst,
) -> FunctionType {
    let mut params = Vec::new();
    for param in &function.params {
        let ty = translate_type(ctx, module_key, top_scope, &param.type_expr);
        if let Some(symbol) = ctx.scopes.get_mut(fn_scope).values.get_mut(&param.name) {
            symbol.ty = Some(ty.clone());
        }
        params.push((param.name.clone(), ty));
    }
    let return_type = function
        .return_type
        .as_ref()
        .map(|expr| std::rc::Rc::new(translate_type(ctx, module_key, top_scope, expr)));
    FunctionType { params, return_type }
}

/// Translates a written type annotation into a semantic [`Type`], resolving
/// `Named`/`ScopeQualified` references against `top_scope` (type names are
/// only ever declared at module top level, per spec.md §3.3).
pub(crate) fn translate_type(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, expr: &TypeExprAst) -> Type {
    match expr {
        TypeExprAst::Primitive { name, position } => match Primitive::from_name(name) {
            Some(p) => Type::Primitive(p),
            None => {
                report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position.clone(), format!("unknown primitive type '{name}'"));
                Type::Invalid
            }
        },
        TypeExprAst::Array { element, .. } => Type::Array(std::rc::Rc::new(translate_type(ctx, module_key, top_scope, element))),
        TypeExprAst::Struct { fields, .. } => {
            let mut map = IndexMap::new();
            for (name, field_expr) in fields {
                map.insert(name.clone(), translate_type(ctx, module_key, top_scope, field_expr));
            }
            Type::Struct(StructType { fields: map })
        }
        TypeExprAst::Interface { methods, .. } => {
            let mut map = IndexMap::new();
            for (name, sig) in methods {
                map.insert(name.clone(), translate_function_sig(ctx, module_key, top_scope, sig));
            }
            Type::Interface(InterfaceType { methods: map })
        }
        TypeExprAst::Function(sig) => Type::Function(translate_function_sig(ctx, module_key, top_scope, sig)),
        TypeExprAst::Named { module: Some(qualifier), name, position } => {
            resolve_qualified_type(ctx, module_key, qualifier, name, position.clone())
        }
        TypeExprAst::Named { module: None, name, position } => resolve_named_type(ctx, module_key, top_scope, name, position.clone()),
    }
}

fn translate_function_sig(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, sig: &crate::ast::FunctionSigAst) -> FunctionType {
    let params = sig
        .params
        .iter()
        .map(|(name, ty)| (name.clone(), translate_type(ctx, module_key, top_scope, ty)))
        .collect();
    let return_type = sig.return_type.as_ref().map(|expr| std::rc::Rc::new(translate_type(ctx, module_key, top_scope, expr)));
    FunctionType { params, return_type }
}

/// Resolves an unqualified named type reference. Forward references among
/// module-level types are allowed (spec.md §4.3: any type may reference any
/// other type declared anywhere in the module); the use-before-declaration
/// restriction applies to *variables*, not type names, so this only checks
/// that the name is declared at all.
fn resolve_named_type(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, name: &str, position: Range<usize>) -> Type {
    let Some((declared_at, resolved_ty)) = ctx.scopes.get(top_scope).types.get(name).map(|s| (s.declared_at.clone(), s.ty.clone())) else {
        report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position, format!("unknown type '{name}'"));
        return Type::Invalid;
    };

    // Type names may reference any other type declared anywhere in the
    // module, but using one before its declaration position is an error
    // (spec.md §4.3); functions/methods have no such restriction.
    let file = module_source(ctx, module_key);
    if file.position_order(position.start, declared_at.start) == Ordering::Less {
        report(ctx, module_key, Category::Structure, DiagPhase::Resolver, position.clone(), format!("type '{name}' is used before its declaration"));
    }

    match resolved_ty {
        Some(ty) => ty,
        None => Type::User(crate::types::UserTypeHandle::new(name.to_string())),
    }
}

fn resolve_qualified_type(ctx: &mut AnalysisContext, module_key: &ModuleKey, qualifier: &str, name: &str, position: Range<usize>) -> Type {
    let Some(target) = import_target(ctx, module_key, qualifier) else {
        report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position, format!("'{qualifier}' is not an imported module"));
        return Type::Invalid;
    };
    mark_import_used(ctx, module_key, qualifier);

    // A qualified type reference needs the target module's own type aliases
    // already resolved (their `Symbol::ty` is only filled in by that
    // module's `resolve_type_alias`), not merely collected, so advance it
    // one phase further than the orchestrator's usual import prerequisite
    // (spec.md §4.3: "import statements trigger recursive advancement of the
    // imported module through the Resolved phase before the current
    // module's resolution continues").
    if let Err(err) = crate::orchestrator::advance(ctx, &target, ModulePhase::Resolved) {
        report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position, format!("module '{target}' could not be resolved: {err}"));
        return Type::Invalid;
    }

    let Some(target_top) = ctx.registry.get(&target).map(|m| m.top_scope) else {
        report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position, format!("module '{target}' could not be loaded"));
        return Type::Invalid;
    };

    match ctx.lookup_qualified_type(target_top, name) {
        Some(symbol) => symbol.ty.clone().unwrap_or(Type::Invalid),
        None => {
            report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position, format!("'{name}' is not declared in module '{qualifier}'"));
            Type::Invalid
        }
    }
}

fn import_target(ctx: &AnalysisContext, module_key: &ModuleKey, alias: &str) -> Option<ModuleKey> {
    ctx.registry.get(module_key)?.imports.get(alias).map(|b| b.target.clone())
}

fn mark_import_used(ctx: &mut AnalysisContext, module_key: &ModuleKey, alias: &str) {
    if let Some(module) = ctx.registry.get_mut(module_key) {
        module.mark_used(alias);
    }
}

/// Walks a block in its own child scope, so names declared in one `if`
/// branch never leak into a sibling branch or the code after the block.
fn resolve_block(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, parent_scope: ScopeId, block: &BlockAst) {
    let module = ctx.scopes.get(parent_scope).module.clone();
    let block_scope = ctx.scopes.create(module, Some(parent_scope));
    for stmt in &block.statements {
        resolve_stmt(ctx, module_key, top_scope, block_scope, stmt);
    }
}

fn resolve_stmt(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, scope: ScopeId, stmt: &StmtAst) {
    match stmt {
        StmtAst::Expr(expr) => resolve_expr(ctx, module_key, top_scope, scope, expr),
        StmtAst::VarDecl(variable) => resolve_local_variable(ctx, module_key, top_scope, scope, variable),
        StmtAst::Assign { targets, values, .. } => {
            for expr in targets.iter().chain(values.iter()) {
                resolve_expr(ctx, module_key, top_scope, scope, expr);
            }
        }
        StmtAst::If(if_ast) => resolve_if(ctx, module_key, top_scope, scope, if_ast),
        StmtAst::Return { value, .. } => {
            if let Some(expr) = value {
                resolve_expr(ctx, module_key, top_scope, scope, expr);
            }
        }
        StmtAst::Block(block) => resolve_block(ctx, module_key, top_scope, scope, block),
    }
}

fn resolve_if(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, scope: ScopeId, if_ast: &IfAst) {
    resolve_expr(ctx, module_key, top_scope, scope, &if_ast.condition);
    resolve_block(ctx, module_key, top_scope, scope, &if_ast.then_block);
    match &if_ast.else_branch {
        Some(else_branch) => match else_branch.as_ref() {
            ElseAst::Block(block) => resolve_block(ctx, module_key, top_scope, scope, block),
            ElseAst::If(nested) => resolve_if(ctx, module_key, top_scope, scope, nested),
        },
        None => {}
    }
}

fn resolve_local_variable(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, scope: ScopeId, variable: &crate::ast::VariableAst) {
    let symbol = Symbol::new(variable.name.clone(), SymbolKind::Var, variable.name_position.clone());
    if let Err(earlier) = ctx.scopes.get_mut(scope).values.declare(variable.name.clone(), symbol) {
        let source = module_source(ctx, module_key);
        ctx.report.push(
            Diag::new(
                Category::Structure,
                Severity::SemanticError,
                DiagPhase::Resolver,
                format!("'{}' is already declared in this scope", variable.name),
                source,
                variable.name_position.clone(),
            )
            .with_label("duplicate declaration")
            .with_related(earlier, "first declared here"),
        );
    }

    if let Some(declared) = &variable.declared_type {
        let ty = translate_type(ctx, module_key, top_scope, declared);
        if let Some(symbol) = ctx.scopes.get_mut(scope).values.get_mut(&variable.name) {
            symbol.ty = Some(ty);
        }
    }
    resolve_expr(ctx, module_key, top_scope, scope, &variable.initializer);
}

fn resolve_expr(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, scope: ScopeId, expr: &ExprAst) {
    match expr {
        ExprAst::IntLiteral(..)
        | ExprAst::FloatLiteral(..)
        | ExprAst::ByteLiteral(..)
        | ExprAst::StringLiteral(..)
        | ExprAst::BoolLiteral(..) => {}
        ExprAst::Identifier(name, position) => resolve_identifier(ctx, module_key, scope, name, position.clone()),
        ExprAst::ScopeQualified { module, name, position } => {
            resolve_scope_qualified_value(ctx, module_key, module, name, position.clone());
        }
        ExprAst::Binary { left, right, .. } => {
            resolve_expr(ctx, module_key, top_scope, scope, left);
            resolve_expr(ctx, module_key, top_scope, scope, right);
        }
        ExprAst::Unary { operand, .. } | ExprAst::PrefixIncDec { operand, .. } | ExprAst::PostfixIncDec { operand, .. } => {
            resolve_expr(ctx, module_key, top_scope, scope, operand);
        }
        ExprAst::ArrayLiteral { elements, .. } => {
            for element in elements {
                resolve_expr(ctx, module_key, top_scope, scope, element);
            }
        }
        ExprAst::Index { base, index, .. } => {
            resolve_expr(ctx, module_key, top_scope, scope, base);
            resolve_expr(ctx, module_key, top_scope, scope, index);
        }
        ExprAst::Call { callee, args, .. } => {
            resolve_expr(ctx, module_key, top_scope, scope, callee);
            for arg in args {
                resolve_expr(ctx, module_key, top_scope, scope, arg);
            }
        }
        ExprAst::Field { base, .. } => resolve_expr(ctx, module_key, top_scope, scope, base),
        ExprAst::StructLiteral { fields, type_name, position } => {
            if let Some(name) = type_name {
                if ctx.scopes.get(top_scope).types.get(name).is_none() {
                    report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position.clone(), format!("unknown struct type '{name}'"));
                }
            }
            for (_, value) in fields {
                resolve_expr(ctx, module_key, top_scope, scope, value);
            }
        }
        ExprAst::Cast { expr, target, .. } => {
            resolve_expr(ctx, module_key, top_scope, scope, expr);
            let _ = translate_type(ctx, module_key, top_scope, target);
        }
    }
}

fn resolve_identifier(ctx: &mut AnalysisContext, module_key: &ModuleKey, scope: ScopeId, name: &str, position: Range<usize>) {
    let Some((kind, declared_at)) = ctx.scopes.lookup_value(scope, name).map(|s| (s.kind, s.declared_at.clone())) else {
        report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position, format!("undeclared identifier '{name}'"));
        return;
    };

    // Forward references are unrestricted for functions/methods (spec.md
    // §4.3); a variable used before its declaration in the *same* scope is
    // an error. A variable visible only through an enclosing scope was
    // necessarily declared (and fully processed) before this scope existed.
    if kind != SymbolKind::Var || !ctx.scopes.declares_value_locally(scope, name) {
        return;
    }
    let file = module_source(ctx, module_key);
    if file.position_order(position.start, declared_at.start) == Ordering::Less {
        report(ctx, module_key, Category::Structure, DiagPhase::Resolver, position, format!("'{name}' is used before its declaration"));
    }
}

fn resolve_scope_qualified_value(ctx: &mut AnalysisContext, module_key: &ModuleKey, module: &str, name: &str, position: Range<usize>) {
    let Some(target) = import_target(ctx, module_key, module) else {
        report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position, format!("'{module}' is not an imported module"));
        return;
    };
    mark_import_used(ctx, module_key, module);

    let Some(target_top) = ctx.registry.get(&target).map(|m| m.top_scope) else {
        report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position, format!("module '{target}' could not be loaded"));
        return;
    };
    if ctx.lookup_qualified_value(target_top, name).is_none() {
        report(ctx, module_key, Category::Lookup, DiagPhase::Resolver, position, format!("'{name}' is not declared in module '{module}'"));
    }
}

fn report_unused_imports(ctx: &mut AnalysisContext, module_key: &ModuleKey, ast: &FileAst) {
    let Some(module) = ctx.registry.get(module_key) else { return };
    let unused: Vec<(String, Range<usize>)> = module.unused_imports().into_iter().map(|(a, p)| (a.to_string(), p)).collect();
    for (alias, position) in unused {
        ctx.report.push(
            Diag::new(
                Category::Policy,
                Severity::Warning,
                DiagPhase::Resolver,
                format!("unused import '{alias}'"),
                ast.file.clone(),
                position,
            )
            .with_label("imported but never referenced"),
        );
    }
}

fn module_source(ctx: &AnalysisContext, module_key: &ModuleKey) -> SourceFile {
    ctx.registry.get(module_key).map(|m| m.ast.file.clone()).unwrap_or_else(|| SourceFile::new(vec![module_key.0.clone()], String::new()))
}

fn report(ctx: &mut AnalysisContext, module_key: &ModuleKey, category: Category, phase: DiagPhase, position: Range<usize>, message: String) {
    let source = module_source(ctx, module_key);
    ctx.report.push(Diag::new(category, Severity::SemanticError, phase, message, source, position).with_label("here"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{FileAst, FunctionAst, TypeAliasAst, VariableAst},
        module::{Category as ModuleCategory, ImportBinding, Module},
    };

    fn file() -> SourceFile {
        SourceFile::new(vec!["m".into()], "irrelevant for position-free tests".to_string())
    }

    fn register(ctx: &mut AnalysisContext, ast: FileAst) -> ModuleKey {
        let key = ModuleKey::new("m".to_string());
        let top_scope = ctx.new_module_scope(key.clone());
        ctx.registry.insert(Module::new(key.clone(), std::rc::Rc::new(ast), top_scope, ModuleCategory::Local));
        key
    }

    #[test]
    fn undeclared_identifier_is_reported() {
        let mut ctx = AnalysisContext::new("m", false);
        let ast = FileAst {
            file: file(),
            imports: vec![],
            items: vec![ItemAst::Function(FunctionAst {
                name: "f".into(),
                name_position: 0..1,
                params: vec![],
                return_type: None,
                body: Some(BlockAst {
                    statements: vec![StmtAst::Expr(ExprAst::Identifier("missing".into(), 5..12))],
                    position: 0..1,
                }),
                position: 0..1,
            })],
        };
        let key = register(&mut ctx, ast);
        crate::collector::collect(&mut ctx, &key);
        resolve(&mut ctx, &key);
        assert_eq!(ctx.report.len(), 1);
    }

    #[test]
    fn unused_import_produces_warning() {
        let mut ctx = AnalysisContext::new("m", false);
        let ast = FileAst {
            file: file(),
            imports: vec![crate::ast::ImportAst { path: "m/util".into(), alias: None, position: 0..1 }],
            items: vec![ItemAst::Variable(VariableAst {
                name: "x".into(),
                name_position: 10..11,
                declared_type: None,
                initializer: ExprAst::IntLiteral(1, 12..13),
                position: 10..13,
            })],
        };
        let key = register(&mut ctx, ast);
        crate::collector::collect(&mut ctx, &key);
        resolve(&mut ctx, &key);
        assert!(ctx.report.iter().any(|d| d.message.contains("unused import")));
    }

    #[test]
    fn qualified_type_reference_forces_the_import_to_resolved() {
        let mut ctx = AnalysisContext::new("m", false);

        let other_key = ModuleKey::new("other".to_string());
        let other_top = ctx.new_module_scope(other_key.clone());
        let other_ast = FileAst {
            file: SourceFile::new(vec!["other".into()], String::new()),
            imports: vec![],
            items: vec![ItemAst::TypeAlias(TypeAliasAst {
                name: "Thing".into(),
                name_position: 0..1,
                underlying: TypeExprAst::Primitive { name: "i32".into(), position: 0..1 },
                position: 0..1,
            })],
        };
        ctx.registry.insert(Module::new(other_key.clone(), std::rc::Rc::new(other_ast), other_top, ModuleCategory::Local));

        let ast = FileAst {
            file: file(),
            imports: vec![],
            items: vec![ItemAst::Variable(VariableAst {
                name: "x".into(),
                name_position: 10..11,
                declared_type: Some(TypeExprAst::Named { module: Some("other".into()), name: "Thing".into(), position: 12..17 }),
                initializer: ExprAst::IntLiteral(1, 18..19),
                position: 10..19,
            })],
        };
        let key = register(&mut ctx, ast);
        ctx.registry.get_mut(&key).unwrap().imports.insert(
            "other".to_string(),
            ImportBinding { target: other_key.clone(), position: 0..1, used: false },
        );

        resolve(&mut ctx, &key);

        assert_eq!(ctx.registry.get(&other_key).unwrap().phase(), ModulePhase::Resolved);
        let top_scope = ctx.registry.get(&key).unwrap().top_scope;
        let symbol = ctx.scopes.get(top_scope).values.get("x").unwrap();
        assert_eq!(symbol.ty.as_ref().unwrap().pretty(), "i32");
        assert!(!ctx.report.iter().any(|d| d.message.contains("not declared")), "report: {:?}", ctx.report);
    }
}
