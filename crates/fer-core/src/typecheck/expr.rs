//! Expression type derivation (spec.md §4.4.1, §4.4.3) and the shared
//! per-function type-checking context.

use std::ops::Range;

use crate::{
    ast::{BinaryOp, ExprAst, UnaryOp},
    context::AnalysisContext,
    diagnostics::{Category, Diag, Phase as DiagPhase, Severity},
    file::SourceFile,
    module::ModuleKey,
    scope::ScopeId,
    types::{Primitive, Type},
};

use super::cast::{explicit_castable, implicit_castable};

pub struct TypeCheckCtx<'a> {
    pub ctx: &'a mut AnalysisContext,
    pub module_key: ModuleKey,
    pub top_scope: ScopeId,
}

impl<'a> TypeCheckCtx<'a> {
    fn source(&self) -> SourceFile {
        self.ctx.registry.get(&self.module_key).map(|m| m.ast.file.clone()).expect("module registered")
    }

    pub fn report(&mut self, category: Category, position: Range<usize>, message: impl Into<String>) {
        let source = self.source();
        self.ctx.report.push(
            Diag::new(category, Severity::SemanticError, DiagPhase::Typecheck, message.into(), source, position).with_label("here"),
        );
    }

    pub fn report_with_hint(&mut self, category: Category, position: Range<usize>, message: impl Into<String>, hint: impl Into<String>) {
        let source = self.source();
        self.ctx.report.push(
            Diag::new(category, Severity::SemanticError, DiagPhase::Typecheck, message.into(), source, position)
                .with_label("here")
                .with_help(hint.into()),
        );
    }
}

/// Derives the semantic type of `expr` within `scope`, reporting any
/// violation along the way. Always returns a usable `Type` (`Invalid` on
/// error) so callers never need to branch on failure.
pub fn derive(tcc: &mut TypeCheckCtx, scope: ScopeId, expr: &ExprAst) -> Type {
    match expr {
        ExprAst::IntLiteral(..) => Type::Primitive(Primitive::I32),
        ExprAst::FloatLiteral(..) => Type::Primitive(Primitive::F64),
        ExprAst::ByteLiteral(..) => Type::Primitive(Primitive::Byte),
        ExprAst::StringLiteral(..) => Type::Primitive(Primitive::Str),
        ExprAst::BoolLiteral(..) => Type::Primitive(Primitive::Bool),
        ExprAst::Identifier(name, position) => derive_identifier(tcc, scope, name, position.clone()),
        ExprAst::ScopeQualified { module, name, position } => derive_scope_qualified(tcc, module, name, position.clone()),
        ExprAst::Binary { op, left, right, position } => derive_binary(tcc, scope, *op, left, right, position.clone()),
        ExprAst::Unary { op, operand, position } => derive_unary(tcc, scope, *op, operand, position.clone()),
        ExprAst::PrefixIncDec { operand, position, .. } | ExprAst::PostfixIncDec { operand, position, .. } => {
            let ty = derive(tcc, scope, operand);
            if !ty.is_numeric() && !ty.is_invalid() {
                tcc.report(Category::Compatibility, position.clone(), format!("cannot increment/decrement a value of type '{}'", ty.pretty()));
                return Type::Invalid;
            }
            ty
        }
        ExprAst::ArrayLiteral { elements, position } => derive_array_literal(tcc, scope, elements, position.clone()),
        ExprAst::Index { base, index, position } => derive_index(tcc, scope, base, index, position.clone()),
        ExprAst::Call { callee, args, position } => derive_call(tcc, scope, callee, args, position.clone()),
        ExprAst::Field { base, field, field_position, .. } => derive_field(tcc, scope, base, field, field_position.clone()),
        ExprAst::StructLiteral { type_name, fields, position } => derive_struct_literal(tcc, scope, type_name.as_deref(), fields, position.clone()),
        ExprAst::Cast { expr, target, position } => derive_cast(tcc, scope, expr, target, position.clone()),
    }
}

fn derive_identifier(tcc: &mut TypeCheckCtx, scope: ScopeId, name: &str, position: Range<usize>) -> Type {
    match tcc.ctx.scopes.lookup_value(scope, name) {
        Some(symbol) => symbol.ty.clone().unwrap_or(Type::Invalid),
        None => {
            tcc.report(Category::Lookup, position, format!("undeclared identifier '{name}'"));
            Type::Invalid
        }
    }
}

fn derive_scope_qualified(tcc: &mut TypeCheckCtx, module: &str, name: &str, position: Range<usize>) -> Type {
    let Some(target) = tcc.ctx.registry.get(&tcc.module_key).and_then(|m| m.imports.get(module)).map(|b| b.target.clone()) else {
        tcc.report(Category::Lookup, position, format!("'{module}' is not an imported module"));
        return Type::Invalid;
    };
    if let Some(m) = tcc.ctx.registry.get_mut(&tcc.module_key) {
        m.mark_used(module);
    }
    let Some(target_top) = tcc.ctx.registry.get(&target).map(|m| m.top_scope) else {
        tcc.report(Category::Lookup, position, format!("module '{target}' could not be loaded"));
        return Type::Invalid;
    };
    match tcc.ctx.lookup_qualified_value(target_top, name) {
        Some(symbol) => symbol.ty.clone().unwrap_or(Type::Invalid),
        None => {
            tcc.report(Category::Lookup, position, format!("'{name}' is not declared in module '{module}'"));
            Type::Invalid
        }
    }
}

/// The common-numeric-type rule (spec.md §4.4.3): the higher-rank operand's
/// type wins; equal rank with differing names favors the left operand
/// (spec.md §9 Open Question 2).
pub fn common_numeric_type(left: Primitive, right: Primitive) -> Primitive {
    if left.rank() >= right.rank() {
        left
    } else {
        right
    }
}

fn derive_binary(tcc: &mut TypeCheckCtx, scope: ScopeId, op: BinaryOp, left: &ExprAst, right: &ExprAst, position: Range<usize>) -> Type {
    let left_ty = derive(tcc, scope, left);
    let right_ty = derive(tcc, scope, right);
    if left_ty.is_invalid() || right_ty.is_invalid() {
        return Type::Invalid;
    }

    match op {
        BinaryOp::Add if left_ty.is_str() && right_ty.is_str() => Type::Primitive(Primitive::Str),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
            derive_arithmetic(tcc, left_ty, right_ty, position)
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            if implicit_castable(&left_ty, &right_ty) || implicit_castable(&right_ty, &left_ty) {
                Type::Primitive(Primitive::Bool)
            } else {
                tcc.report(
                    Category::Compatibility,
                    position,
                    format!("cannot compare '{}' and '{}'", left_ty.pretty(), right_ty.pretty()),
                );
                Type::Invalid
            }
        }
        BinaryOp::And | BinaryOp::Or => {
            if left_ty.is_bool() && right_ty.is_bool() {
                Type::Primitive(Primitive::Bool)
            } else {
                tcc.report(Category::Compatibility, position, "both operands of a boolean operator must be 'bool'");
                Type::Invalid
            }
        }
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr => {
            if left_ty.is_integer() && right_ty.is_integer() {
                let (Type::Primitive(a), Type::Primitive(b)) = (&left_ty, &right_ty) else { unreachable!() };
                Type::Primitive(common_numeric_type(*a, *b))
            } else {
                tcc.report(Category::Compatibility, position, "both operands of a bitwise operator must be integers");
                Type::Invalid
            }
        }
    }
}

fn derive_arithmetic(tcc: &mut TypeCheckCtx, left: Type, right: Type, position: Range<usize>) -> Type {
    match (&left, &right) {
        (Type::Primitive(a), Type::Primitive(b)) if a.is_numeric() && b.is_numeric() => Type::Primitive(common_numeric_type(*a, *b)),
        _ => {
            tcc.report(
                Category::Compatibility,
                position,
                format!("arithmetic requires two numeric operands (or two strings for '+'); got '{}' and '{}'", left.pretty(), right.pretty()),
            );
            Type::Invalid
        }
    }
}

fn derive_unary(tcc: &mut TypeCheckCtx, scope: ScopeId, op: UnaryOp, operand: &ExprAst, position: Range<usize>) -> Type {
    let ty = derive(tcc, scope, operand);
    if ty.is_invalid() {
        return Type::Invalid;
    }
    match op {
        UnaryOp::Not if ty.is_bool() => Type::Primitive(Primitive::Bool),
        UnaryOp::Not => {
            tcc.report(Category::Compatibility, position, format!("'!' requires a 'bool' operand, got '{}'", ty.pretty()));
            Type::Invalid
        }
        UnaryOp::Neg if ty.is_numeric() => ty,
        UnaryOp::Neg => {
            tcc.report(Category::Compatibility, position, format!("unary '-' requires a numeric operand, got '{}'", ty.pretty()));
            Type::Invalid
        }
    }
}

fn derive_array_literal(tcc: &mut TypeCheckCtx, scope: ScopeId, elements: &[ExprAst], position: Range<usize>) -> Type {
    let Some(first) = elements.first() else {
        tcc.report(Category::Shape, position, "an array literal must have at least one element");
        return Type::Invalid;
    };
    let elem_ty = derive(tcc, scope, first);
    for element in &elements[1..] {
        let ty = derive(tcc, scope, element);
        if !ty.is_invalid() && !implicit_castable(&ty, &elem_ty) {
            tcc.report(
                Category::Compatibility,
                element.position(),
                format!("array element of type '{}' is not compatible with inferred element type '{}'", ty.pretty(), elem_ty.pretty()),
            );
        }
    }
    Type::Array(std::rc::Rc::new(elem_ty))
}

fn derive_index(tcc: &mut TypeCheckCtx, scope: ScopeId, base: &ExprAst, index: &ExprAst, position: Range<usize>) -> Type {
    let base_ty = derive(tcc, scope, base);
    let index_ty = derive(tcc, scope, index);
    if !index_ty.is_invalid() && !index_ty.is_integer() {
        tcc.report(Category::Compatibility, index.position(), format!("index must be an integer, got '{}'", index_ty.pretty()));
    }
    match &base_ty {
        Type::Array(elem) => elem.as_ref().clone(),
        Type::Primitive(Primitive::Str) => Type::Primitive(Primitive::Byte),
        Type::Invalid => Type::Invalid,
        other => {
            tcc.report(Category::Shape, position, format!("cannot index into a value of type '{}'", other.pretty()));
            Type::Invalid
        }
    }
}

fn derive_call(tcc: &mut TypeCheckCtx, scope: ScopeId, callee: &ExprAst, args: &[ExprAst], position: Range<usize>) -> Type {
    let callee_ty = derive(tcc, scope, callee);
    let arg_tys: Vec<Type> = args.iter().map(|a| derive(tcc, scope, a)).collect();
    let Type::Function(sig) = &callee_ty else {
        if !callee_ty.is_invalid() {
            tcc.report(Category::Shape, position, format!("cannot call a value of type '{}'", callee_ty.pretty()));
        }
        return Type::Invalid;
    };

    if sig.params.len() != arg_tys.len() {
        tcc.report(
            Category::Shape,
            position,
            format!("expected {} argument(s), got {}", sig.params.len(), arg_tys.len()),
        );
        return sig.return_type.as_ref().map(|r| r.as_ref().clone()).unwrap_or(Type::void());
    }

    for (index, ((_, param_ty), arg_ty)) in sig.params.iter().zip(arg_tys.iter()).enumerate() {
        if !arg_ty.is_invalid() && !implicit_castable(arg_ty, param_ty) {
            let hint = explicit_castable(arg_ty, param_ty).then(|| format!("an explicit cast to '{}' would succeed", param_ty.pretty()));
            let message = format!("argument {} of type '{}' is not assignable to parameter of type '{}'", index + 1, arg_ty.pretty(), param_ty.pretty());
            match hint {
                Some(hint) => tcc.report_with_hint(Category::Compatibility, args[index].position(), message, hint),
                None => tcc.report(Category::Compatibility, args[index].position(), message),
            }
        }
    }

    sig.return_type.as_ref().map(|r| r.as_ref().clone()).unwrap_or(Type::void())
}

fn derive_field(tcc: &mut TypeCheckCtx, scope: ScopeId, base: &ExprAst, field: &str, field_position: Range<usize>) -> Type {
    let base_ty = derive(tcc, scope, base);
    match base_ty.unwrap_fully() {
        Type::Struct(struct_ty) => {
            if let Some(ty) = struct_ty.fields.get(field) {
                return ty.clone();
            }
            if let Type::User(handle) = &base_ty {
                if let Some(sig) = handle.0.borrow().methods.get(field) {
                    return Type::Function(sig.clone());
                }
            }
            tcc.report(Category::Shape, field_position, format!("no field or method '{field}' on '{}'", base_ty.pretty()));
            Type::Invalid
        }
        Type::Invalid => Type::Invalid,
        other => {
            if let Type::User(handle) = &base_ty {
                if let Some(sig) = handle.0.borrow().methods.get(field) {
                    return Type::Function(sig.clone());
                }
            }
            tcc.report(Category::Shape, field_position, format!("no field or method '{field}' on '{}'", other.pretty()));
            Type::Invalid
        }
    }
}

fn derive_struct_literal(
    tcc: &mut TypeCheckCtx,
    scope: ScopeId,
    type_name: Option<&str>,
    fields: &[(String, ExprAst)],
    position: Range<usize>,
) -> Type {
    let provided: Vec<(String, Type)> = fields.iter().map(|(name, expr)| (name.clone(), derive(tcc, scope, expr))).collect();

    let Some(name) = type_name else {
        let mut map = indexmap::IndexMap::new();
        for (name, ty) in provided {
            map.insert(name, ty);
        }
        return Type::Struct(crate::types::StructType { fields: map });
    };

    let Some(symbol) = tcc.ctx.scopes.get(tcc.top_scope).types.get(name).cloned() else {
        tcc.report(Category::Lookup, position, format!("unknown struct type '{name}'"));
        return Type::Invalid;
    };
    let Some(named_ty) = symbol.ty.clone() else {
        tcc.report(Category::Shape, position, format!("'{name}' is not a struct type"));
        return Type::Invalid;
    };
    let Type::Struct(declared) = named_ty.unwrap_fully() else {
        tcc.report(Category::Shape, position, format!("'{name}' is not a struct type"));
        return Type::Invalid;
    };

    for declared_name in declared.fields.keys() {
        if !provided.iter().any(|(n, _)| n == declared_name) {
            tcc.report(Category::Shape, position.clone(), format!("missing field '{declared_name}' in literal for struct '{name}'"));
        }
    }
    for (provided_name, provided_ty) in &provided {
        match declared.fields.get(provided_name) {
            None => tcc.report(Category::Shape, position.clone(), format!("'{name}' has no field '{provided_name}'")),
            Some(declared_ty) if !provided_ty.is_invalid() && !implicit_castable(provided_ty, declared_ty) => tcc.report(
                Category::Compatibility,
                position.clone(),
                format!("field '{provided_name}' of type '{}' is not assignable to declared type '{}'", provided_ty.pretty(), declared_ty.pretty()),
            ),
            _ => {}
        }
    }

    named_ty
}

fn derive_cast(tcc: &mut TypeCheckCtx, scope: ScopeId, expr: &ExprAst, target_expr: &crate::ast::TypeExprAst, position: Range<usize>) -> Type {
    let source_ty = derive(tcc, scope, expr);
    let target_ty = crate::resolver::translate_type(tcc.ctx, &tcc.module_key, tcc.top_scope, target_expr);
    if source_ty.is_invalid() || target_ty.is_invalid() {
        return target_ty;
    }
    if !explicit_castable(&source_ty, &target_ty) {
        tcc.report(
            Category::Compatibility,
            position,
            format!("cannot cast '{}' to '{}'", source_ty.pretty(), target_ty.pretty()),
        );
        return Type::Invalid;
    }
    target_ty
}
