//! Abstract Syntax Tree definitions consumed by the semantic analysis core.
//!
//! Lexing and parsing are out of scope for this crate (spec.md §1): source
//! text never reaches this module. Instead, an external parser (or, for
//! `ferc`, a JSON deserializer — see [`crate::loader`]) produces a
//! [`FileAst`] directly. Every node that can participate in a diagnostic
//! carries its byte-offset `Range<usize>` position within the owning
//! [`crate::file::SourceFile`]; positions are the only location information
//! a node stores; everything else about "where" a thing is comes from
//! walking back to the enclosing `FileAst`.
//!
//! # Organization
//!
//! - [`FileAst`] — one parsed module: its imports and its top-level items.
//! - [`ImportAst`] — a `use` statement.
//! - [`ItemAst`] — a top-level declaration (type alias, function, method,
//!   variable).
//! - [`TypeExprAst`] — a type annotation as written in source, before
//!   semantic resolution.
//! - [`ExprAst`] / [`StmtAst`] — expressions and statements inside function
//!   and method bodies.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::file::SourceFile;

pub type Pos = Range<usize>;

/// One parsed source module: the unit the orchestrator advances through
/// phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAst {
    pub file: SourceFile,
    pub imports: Vec<ImportAst>,
    pub items: Vec<ItemAst>,
}

/// A `use <path> [as <alias>];` statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportAst {
    pub path: String,
    pub alias: Option<String>,
    pub position: Pos,
}

impl ImportAst {
    /// The binding name other code in the module uses to refer to this
    /// import: the explicit alias if given, otherwise the path's last
    /// segment.
    pub fn binding_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias.as_str(),
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

/// A top-level declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ItemAst {
    TypeAlias(TypeAliasAst),
    Function(FunctionAst),
    Method(MethodAst),
    Variable(VariableAst),
}

impl ItemAst {
    pub fn name(&self) -> &str {
        match self {
            ItemAst::TypeAlias(item) => &item.name,
            ItemAst::Function(item) => &item.name,
            ItemAst::Method(item) => &item.function.name,
            ItemAst::Variable(item) => &item.name,
        }
    }

    pub fn position(&self) -> Pos {
        match self {
            ItemAst::TypeAlias(item) => item.position.clone(),
            ItemAst::Function(item) => item.position.clone(),
            ItemAst::Method(item) => item.position.clone(),
            ItemAst::Variable(item) => item.position.clone(),
        }
    }
}

/// `type Name = <underlying>;`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeAliasAst {
    pub name: String,
    pub name_position: Pos,
    pub underlying: TypeExprAst,
    pub position: Pos,
}

/// A standalone function declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionAst {
    pub name: String,
    pub name_position: Pos,
    pub params: Vec<ParamAst>,
    pub return_type: Option<TypeExprAst>,
    pub body: Option<BlockAst>,
    pub position: Pos,
}

/// A method: a function plus the name of the user type it's declared on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodAst {
    pub receiver_type: String,
    pub receiver_position: Pos,
    pub function: FunctionAst,
    pub position: Pos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamAst {
    pub name: String,
    pub type_expr: TypeExprAst,
    pub position: Pos,
}

/// A top-level or local `var` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableAst {
    pub name: String,
    pub name_position: Pos,
    pub declared_type: Option<TypeExprAst>,
    pub initializer: ExprAst,
    pub position: Pos,
}

/// A type annotation as written in source, before semantic resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeExprAst {
    Primitive {
        name: String,
        position: Pos,
    },
    Array {
        element: Box<TypeExprAst>,
        position: Pos,
    },
    Struct {
        fields: Vec<(String, TypeExprAst)>,
        position: Pos,
    },
    Interface {
        methods: Vec<(String, FunctionSigAst)>,
        position: Pos,
    },
    Function(FunctionSigAst),
    /// A named reference, optionally module-qualified (`Module::Name`).
    Named {
        module: Option<String>,
        name: String,
        position: Pos,
    },
}

impl TypeExprAst {
    pub fn position(&self) -> Pos {
        match self {
            TypeExprAst::Primitive { position, .. } => position.clone(),
            TypeExprAst::Array { position, .. } => position.clone(),
            TypeExprAst::Struct { position, .. } => position.clone(),
            TypeExprAst::Interface { position, .. } => position.clone(),
            TypeExprAst::Function(sig) => sig.position.clone(),
            TypeExprAst::Named { position, .. } => position.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSigAst {
    pub params: Vec<(String, TypeExprAst)>,
    pub return_type: Option<Box<TypeExprAst>>,
    pub position: Pos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAst {
    pub statements: Vec<StmtAst>,
    pub position: Pos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtAst {
    Expr(ExprAst),
    VarDecl(VariableAst),
    Assign {
        targets: Vec<ExprAst>,
        values: Vec<ExprAst>,
        position: Pos,
    },
    If(IfAst),
    Return {
        value: Option<ExprAst>,
        position: Pos,
    },
    Block(BlockAst),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfAst {
    pub condition: ExprAst,
    pub then_block: BlockAst,
    pub else_branch: Option<Box<ElseAst>>,
    pub position: Pos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElseAst {
    Block(BlockAst),
    If(IfAst),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncDecOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprAst {
    IntLiteral(i64, Pos),
    FloatLiteral(f64, Pos),
    ByteLiteral(u8, Pos),
    StringLiteral(String, Pos),
    BoolLiteral(bool, Pos),
    Identifier(String, Pos),
    ScopeQualified {
        module: String,
        name: String,
        position: Pos,
    },
    Binary {
        op: BinaryOp,
        left: Box<ExprAst>,
        right: Box<ExprAst>,
        position: Pos,
    },
    Unary {
        op: UnaryOp,
        operand: Box<ExprAst>,
        position: Pos,
    },
    PrefixIncDec {
        op: IncDecOp,
        operand: Box<ExprAst>,
        position: Pos,
    },
    PostfixIncDec {
        op: IncDecOp,
        operand: Box<ExprAst>,
        position: Pos,
    },
    ArrayLiteral {
        elements: Vec<ExprAst>,
        position: Pos,
    },
    Index {
        base: Box<ExprAst>,
        index: Box<ExprAst>,
        position: Pos,
    },
    Call {
        callee: Box<ExprAst>,
        args: Vec<ExprAst>,
        position: Pos,
    },
    Field {
        base: Box<ExprAst>,
        field: String,
        field_position: Pos,
        position: Pos,
    },
    StructLiteral {
        type_name: Option<String>,
        fields: Vec<(String, ExprAst)>,
        position: Pos,
    },
    Cast {
        expr: Box<ExprAst>,
        target: TypeExprAst,
        position: Pos,
    },
}

impl ExprAst {
    pub fn position(&self) -> Pos {
        match self {
            ExprAst::IntLiteral(_, p)
            | ExprAst::FloatLiteral(_, p)
            | ExprAst::ByteLiteral(_, p)
            | ExprAst::StringLiteral(_, p)
            | ExprAst::BoolLiteral(_, p)
            | ExprAst::Identifier(_, p) => p.clone(),
            ExprAst::ScopeQualified { position, .. }
            | ExprAst::Binary { position, .. }
            | ExprAst::Unary { position, .. }
            | ExprAst::PrefixIncDec { position, .. }
            | ExprAst::PostfixIncDec { position, .. }
            | ExprAst::ArrayLiteral { position, .. }
            | ExprAst::Index { position, .. }
            | ExprAst::Call { position, .. }
            | ExprAst::Field { position, .. }
            | ExprAst::StructLiteral { position, .. }
            | ExprAst::Cast { position, .. } => position.clone(),
        }
    }

    /// A reference expression is a valid assignment target iff it is an
    /// identifier, an index, or a field access (spec.md §4.4.7).
    pub fn is_valid_assignee(&self) -> bool {
        matches!(
            self,
            ExprAst::Identifier(..) | ExprAst::Index { .. } | ExprAst::Field { .. }
        )
    }
}
