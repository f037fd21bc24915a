//! The type checker (spec.md §4.4, component **T**): expression type
//! derivation, assignability, casting, arithmetic, struct/interface
//! compatibility, control-flow return analysis, assignment and variable
//! declaration checking.

pub mod cast;
pub mod expr;
pub mod returns;

use std::ops::Range;

use log::debug;

use crate::{
    ast::{BlockAst, ElseAst, IfAst, ItemAst, StmtAst},
    context::AnalysisContext,
    diagnostics::{Category, Diag, Phase as DiagPhase, Severity},
    module::ModuleKey,
    scope::ScopeId,
    types::Type,
};

use cast::{explicit_castable, implicit_castable};
use expr::{derive, TypeCheckCtx};

/// Type-checks every function, method, and top-level variable in a
/// resolved module.
pub fn typecheck(ctx: &mut AnalysisContext, module_key: &ModuleKey) {
    let ast = ctx.registry.get(module_key).expect("module registered").ast.clone();
    let top_scope = ctx.registry.get(module_key).expect("module registered").top_scope;

    for item in &ast.items {
        match item {
            ItemAst::Variable(variable) => {
                check_variable_decl(ctx, module_key, top_scope, top_scope, variable);
            }
            ItemAst::Function(function) => check_function(ctx, module_key, top_scope, function),
            ItemAst::Method(method) => check_method(ctx, module_key, top_scope, method),
            ItemAst::TypeAlias(_) => {}
        }
    }

    debug!("typechecked module {module_key}: {} items", ast.items.len());
}

fn check_function(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, function: &crate::ast::FunctionAst) {
    let Some(body) = &function.body else { return };
    let fn_scope = ctx
        .scopes
        .get(top_scope)
        .values
        .get(&function.name)
        .and_then(|s| s.child_scope)
        .expect("resolver always attaches a child scope to functions");
    let return_type = ctx.scopes.get(top_scope).values.get(&function.name).and_then(|s| s.ty.clone()).and_then(|t| match t {
        Type::Function(sig) => sig.return_type.map(|r| r.as_ref().clone()),
        _ => None,
    });
    check_body(ctx, module_key, top_scope, fn_scope, body, return_type.as_ref(), &function.position);
}

fn check_method(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, method: &crate::ast::MethodAst) {
    let Some(body) = &method.function.body else { return };
    let Some(receiver_scope) = ctx.scopes.get(top_scope).types.get(&method.receiver_type).and_then(|s| s.child_scope) else {
        return;
    };
    let Some(fn_scope) = ctx.scopes.get(receiver_scope).values.get(&method.function.name).and_then(|s| s.child_scope) else {
        return;
    };
    let return_type = ctx.scopes.get(receiver_scope).values.get(&method.function.name).and_then(|s| s.ty.clone()).and_then(|t| match t {
        Type::Function(sig) => sig.return_type.map(|r| r.as_ref().clone()),
        _ => None,
    });
    check_body(ctx, module_key, top_scope, fn_scope, body, return_type.as_ref(), &method.function.position);
}

fn check_body(
    ctx: &mut AnalysisContext,
    module_key: &ModuleKey,
    top_scope: ScopeId,
    fn_scope: ScopeId,
    body: &BlockAst,
    return_type: Option<&Type>,
    fn_position: &Range<usize>,
) {
    let mut tcc = TypeCheckCtx { ctx, module_key: module_key.clone(), top_scope };
    check_block_statements(&mut tcc, fn_scope, body, return_type);

    let is_void = return_type.map_or(true, Type::is_void);
    if !is_void {
        let (returns, missing) = returns::analyze_block(body);
        if !returns {
            let source = tcc.ctx.registry.get(module_key).expect("module registered").ast.file.clone();
            let mut diag = Diag::new(
                Category::ControlFlow,
                Severity::SemanticError,
                DiagPhase::Typecheck,
                "not all paths return a value",
                source,
                fn_position.clone(),
            )
            .with_label("function declared here");
            for location in missing {
                diag = diag.with_related(location, "missing return on this path");
            }
            tcc.ctx.report.push(diag);
        }
    }
}

fn check_block_statements(tcc: &mut TypeCheckCtx, scope: ScopeId, block: &BlockAst, return_type: Option<&Type>) {
    let mut seen_return = false;
    for stmt in &block.statements {
        if seen_return {
            let source = tcc.ctx.registry.get(&tcc.module_key).expect("module registered").ast.file.clone();
            tcc.ctx.report.push(
                Diag::new(
                    Category::ControlFlow,
                    Severity::Warning,
                    DiagPhase::Typecheck,
                    "unreachable statement after return",
                    source,
                    stmt_position(stmt),
                )
                .with_label("unreachable"),
            );
            continue;
        }
        check_stmt(tcc, scope, stmt, return_type);
        if matches!(stmt, StmtAst::Return { .. }) {
            seen_return = true;
        }
    }
}

fn stmt_position(stmt: &StmtAst) -> Range<usize> {
    match stmt {
        StmtAst::Expr(e) => e.position(),
        StmtAst::VarDecl(v) => v.position.clone(),
        StmtAst::Assign { position, .. } => position.clone(),
        StmtAst::If(if_ast) => if_ast.position.clone(),
        StmtAst::Return { position, .. } => position.clone(),
        StmtAst::Block(b) => b.position.clone(),
    }
}

fn check_stmt(tcc: &mut TypeCheckCtx, scope: ScopeId, stmt: &StmtAst, return_type: Option<&Type>) {
    match stmt {
        StmtAst::Expr(expr) => {
            derive(tcc, scope, expr);
        }
        StmtAst::VarDecl(variable) => check_variable_decl(tcc.ctx, &tcc.module_key.clone(), tcc.top_scope, scope, variable),
        StmtAst::Assign { targets, values, position } => check_assignment(tcc, scope, targets, values, position.clone()),
        StmtAst::If(if_ast) => check_if(tcc, scope, if_ast, return_type),
        StmtAst::Return { value, position } => check_return(tcc, scope, value.as_ref(), return_type, position.clone()),
        StmtAst::Block(block) => check_block_statements(tcc, scope, block, return_type),
    }
}

fn check_if(tcc: &mut TypeCheckCtx, scope: ScopeId, if_ast: &IfAst, return_type: Option<&Type>) {
    let cond_ty = derive(tcc, scope, &if_ast.condition);
    if !cond_ty.is_invalid() && !cond_ty.is_bool() {
        tcc.report(Category::Compatibility, if_ast.condition.position(), format!("if-condition must be 'bool', got '{}'", cond_ty.pretty()));
    }
    check_block_statements(tcc, scope, &if_ast.then_block, return_type);
    match &if_ast.else_branch {
        Some(else_branch) => match else_branch.as_ref() {
            ElseAst::Block(block) => check_block_statements(tcc, scope, block, return_type),
            ElseAst::If(nested) => check_if(tcc, scope, nested, return_type),
        },
        None => {}
    }
}

fn check_return(tcc: &mut TypeCheckCtx, scope: ScopeId, value: Option<&crate::ast::ExprAst>, return_type: Option<&Type>, position: Range<usize>) {
    let is_void_fn = return_type.map_or(true, Type::is_void);
    match (is_void_fn, value) {
        (true, Some(expr)) => {
            derive(tcc, scope, expr);
            tcc.report(Category::ControlFlow, position, "a void function cannot return a value");
        }
        (true, None) => {}
        (false, None) => {
            tcc.report(Category::ControlFlow, position, "a non-void function must return a value");
        }
        (false, Some(expr)) => {
            let value_ty = derive(tcc, scope, expr);
            let declared = return_type.expect("non-void implies a declared return type");
            if !value_ty.is_invalid() && !implicit_castable(&value_ty, declared) {
                let hint = explicit_castable(&value_ty, declared).then(|| format!("an explicit cast to '{}' would succeed", declared.pretty()));
                let message = format!("returned type '{}' is not assignable to declared return type '{}'", value_ty.pretty(), declared.pretty());
                match hint {
                    Some(hint) => tcc.report_with_hint(Category::Compatibility, position, message, hint),
                    None => tcc.report(Category::Compatibility, position, message),
                }
            }
        }
    }
}

/// Assignment checking (spec.md §4.4.7): parallel target/value lists, each
/// target must be a valid assignee, each value implicit-castable to its
/// partner's type.
fn check_assignment(tcc: &mut TypeCheckCtx, scope: ScopeId, targets: &[crate::ast::ExprAst], values: &[crate::ast::ExprAst], position: Range<usize>) {
    if targets.len() != values.len() {
        tcc.report(
            Category::Structure,
            position,
            format!("assignment has {} target(s) but {} value(s)", targets.len(), values.len()),
        );
        return;
    }

    for (target, value) in targets.iter().zip(values.iter()) {
        if !target.is_valid_assignee() {
            tcc.report(Category::Structure, target.position(), "left-hand side of an assignment must be an identifier, index, or field access");
        }
        let target_ty = derive(tcc, scope, target);
        let value_ty = derive(tcc, scope, value);
        if value_ty.is_void() {
            tcc.report(Category::Compatibility, value.position(), "cannot assign a void value");
            continue;
        }
        if !target_ty.is_invalid() && !value_ty.is_invalid() && !implicit_castable(&value_ty, &target_ty) {
            let hint = explicit_castable(&value_ty, &target_ty).then(|| format!("an explicit cast to '{}' would succeed", target_ty.pretty()));
            let message = format!("value of type '{}' is not assignable to target of type '{}'", value_ty.pretty(), target_ty.pretty());
            match hint {
                Some(hint) => tcc.report_with_hint(Category::Compatibility, value.position(), message, hint),
                None => tcc.report(Category::Compatibility, value.position(), message),
            }
        }
    }
}

/// Variable declaration checking (spec.md §4.4.8): infers the type from the
/// initializer when no explicit annotation is present, or checks
/// assignability against the declared one.
fn check_variable_decl(ctx: &mut AnalysisContext, module_key: &ModuleKey, top_scope: ScopeId, scope: ScopeId, variable: &crate::ast::VariableAst) {
    let mut tcc = TypeCheckCtx { ctx, module_key: module_key.clone(), top_scope };
    let initializer_ty = derive(&mut tcc, scope, &variable.initializer);

    if initializer_ty.is_void() {
        tcc.report(Category::Compatibility, variable.initializer.position(), "a variable cannot be initialized with a void value");
        return;
    }

    let declared_ty = tcc.ctx.scopes.get(scope).values.get(&variable.name).and_then(|s| s.ty.clone());

    match declared_ty {
        Some(declared) if declared.is_void() => {
            tcc.report(Category::Shape, variable.position.clone(), "a variable cannot be declared with type 'void'");
        }
        Some(declared) => {
            if !initializer_ty.is_invalid() && !implicit_castable(&initializer_ty, &declared) {
                let hint = explicit_castable(&initializer_ty, &declared).then(|| format!("an explicit cast to '{}' would succeed", declared.pretty()));
                let message = format!(
                    "initializer of type '{}' is not assignable to declared type '{}'",
                    initializer_ty.pretty(),
                    declared.pretty()
                );
                match hint {
                    Some(hint) => tcc.report_with_hint(Category::Compatibility, variable.initializer.position(), message, hint),
                    None => tcc.report(Category::Compatibility, variable.initializer.position(), message),
                }
            }
        }
        None => {
            if let Some(symbol) = tcc.ctx.scopes.get_mut(scope).values.get_mut(&variable.name) {
                symbol.ty = Some(initializer_ty);
            }
        }
    }
}
