//! The semantic type lattice (spec.md §3.1-§3.2).
//!
//! A [`Type`] is a tagged union over primitives, arrays, structs,
//! interfaces, functions, and named user-type aliases, plus the `Invalid`
//! sentinel used to propagate already-reported errors without cascading
//! further diagnostics. Types are deliberately location-free (spec.md §9,
//! "Location-carrying types vs. pure types") — every diagnostic's position
//! comes from the AST node under inspection, never from the type itself,
//! which keeps equality trivial to reason about.

use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;
use strum_macros::EnumDiscriminants;

/// The closed set of primitive type names (spec.md §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumDiscriminants)]
#[strum_discriminants(name(PrimitiveKind))]
pub enum Primitive {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Byte,
    F32,
    F64,
    Bool,
    Str,
    Void,
}

impl Primitive {
    pub const ALL: &'static [Primitive] = &[
        Primitive::I8,
        Primitive::I16,
        Primitive::I32,
        Primitive::I64,
        Primitive::U8,
        Primitive::U16,
        Primitive::U32,
        Primitive::U64,
        Primitive::Byte,
        Primitive::F32,
        Primitive::F64,
        Primitive::Bool,
        Primitive::Str,
        Primitive::Void,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::Byte => "byte",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
            Primitive::Bool => "bool",
            Primitive::Str => "str",
            Primitive::Void => "void",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Primitive::I8
                | Primitive::I16
                | Primitive::I32
                | Primitive::I64
                | Primitive::U8
                | Primitive::U16
                | Primitive::U32
                | Primitive::U64
                | Primitive::Byte
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::U64 | Primitive::Byte
        )
    }

    /// Rank used for the common-numeric-type rule (spec.md §4.4.3):
    /// `{i8,u8,byte}=1, {i16,u16}=2, {i32,u32}=3, {i64,u64}=4, f32=5, f64=6`.
    pub fn rank(self) -> u8 {
        match self {
            Primitive::I8 | Primitive::U8 | Primitive::Byte => 1,
            Primitive::I16 | Primitive::U16 => 2,
            Primitive::I32 | Primitive::U32 => 3,
            Primitive::I64 | Primitive::U64 => 4,
            Primitive::F32 => 5,
            Primitive::F64 => 6,
            Primitive::Bool | Primitive::Str | Primitive::Void => 0,
        }
    }
}

/// An ordered struct field set. Equality is structural: field order does
/// not matter, only the (name, type) pairs present.
#[derive(Debug, Clone, Default)]
pub struct StructType {
    pub fields: IndexMap<String, Type>,
}

impl PartialEq for StructType {
    fn eq(&self, other: &Self) -> bool {
        if self.fields.len() != other.fields.len() {
            return false;
        }
        self.fields
            .iter()
            .all(|(name, ty)| other.fields.get(name).is_some_and(|other_ty| ty == other_ty))
    }
}

/// An interface's method set: method name -> signature. No inheritance.
#[derive(Debug, Clone, Default)]
pub struct InterfaceType {
    pub methods: IndexMap<String, FunctionType>,
}

impl PartialEq for InterfaceType {
    fn eq(&self, other: &Self) -> bool {
        if self.methods.len() != other.methods.len() {
            return false;
        }
        self.methods
            .iter()
            .all(|(name, sig)| other.methods.get(name).is_some_and(|other_sig| sig == other_sig))
    }
}

/// A function's type: parameter names are carried for diagnostics but are
/// not part of identity (spec.md §3.1).
#[derive(Debug, Clone)]
pub struct FunctionType {
    pub params: Vec<(String, Type)>,
    pub return_type: Option<Rc<Type>>,
}

impl PartialEq for FunctionType {
    fn eq(&self, other: &Self) -> bool {
        if self.params.len() != other.params.len() {
            return false;
        }
        let params_match = self
            .params
            .iter()
            .zip(other.params.iter())
            .all(|((_, a), (_, b))| a == b);
        params_match
            && match (&self.return_type, &other.return_type) {
                (None, None) => true,
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
    }
}

/// The mutable payload of a named user type: its underlying type (filled
/// in once the collector/resolver reach its declaration) and its method
/// set (filled in as method declarations are collected). Shared via `Rc`
/// so every reference to the same named type observes later mutation —
/// this is how alias chains and "declare now, attach methods later" work
/// without a central signature table.
#[derive(Debug)]
pub struct UserTypeData {
    pub name: String,
    pub underlying: Option<Type>,
    pub methods: IndexMap<String, FunctionType>,
}

#[derive(Debug, Clone)]
pub struct UserTypeHandle(pub Rc<RefCell<UserTypeData>>);

impl UserTypeHandle {
    pub fn new(name: String) -> Self {
        Self(Rc::new(RefCell::new(UserTypeData {
            name,
            underlying: None,
            methods: IndexMap::new(),
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }
}

impl PartialEq for UserTypeHandle {
    /// UserType equality is nominal (spec.md §3.1): same name, regardless
    /// of underlying structure or identity.
    fn eq(&self, other: &Self) -> bool {
        self.0.borrow().name == other.0.borrow().name
    }
}

/// The semantic type of an expression, declaration, or type annotation.
#[derive(Debug, Clone)]
pub enum Type {
    Primitive(Primitive),
    Array(Rc<Type>),
    Struct(StructType),
    Interface(InterfaceType),
    Function(FunctionType),
    User(UserTypeHandle),
    /// Sentinel for error propagation. Never equal to anything, including
    /// itself, so it never triggers a cascade of further diagnostics (the
    /// caller that produced it has already reported an error).
    Invalid,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Invalid, _) | (_, Type::Invalid) => false,
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (Type::Array(a), Type::Array(b)) => a == b,
            (Type::Struct(a), Type::Struct(b)) => a == b,
            (Type::Interface(a), Type::Interface(b)) => a == b,
            (Type::Function(a), Type::Function(b)) => a == b,
            (Type::User(a), Type::User(b)) => a == b,
            _ => false,
        }
    }
}

impl Type {
    pub fn void() -> Type {
        Type::Primitive(Primitive::Void)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Void))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Primitive(p) if p.is_numeric())
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Primitive(p) if p.is_integer())
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Bool))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Str))
    }

    /// Peels away exactly one layer of user-type aliasing, if any.
    pub fn unwrap_once(&self) -> Option<Type> {
        match self {
            Type::User(handle) => handle.0.borrow().underlying.clone(),
            _ => None,
        }
    }

    /// Repeatedly unwraps user-type aliases until reaching a non-`User`
    /// type. Terminates in at most as many steps as there are distinct
    /// `UserType` nodes in the program (spec.md §8, "Unwrap termination"):
    /// the `seen` guard enforces that even a malformed, cyclic alias chain
    /// cannot loop forever.
    pub fn unwrap_fully(&self) -> Type {
        let mut current = self.clone();
        let mut seen = std::collections::HashSet::new();
        loop {
            match &current {
                Type::User(handle) => {
                    let name = handle.name();
                    if !seen.insert(name) {
                        return Type::Invalid;
                    }
                    match current.unwrap_once() {
                        Some(next) => current = next,
                        None => return current,
                    }
                }
                _ => return current,
            }
        }
    }

    pub fn pretty(&self) -> String {
        match self {
            Type::Primitive(p) => p.name().to_string(),
            Type::Array(elem) => format!("[{}]", elem.pretty()),
            Type::Struct(s) => {
                let fields = s
                    .fields
                    .iter()
                    .map(|(name, ty)| format!("{name}: {}", ty.pretty()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("struct{{{fields}}}")
            }
            Type::Interface(i) => {
                let methods = i
                    .methods
                    .iter()
                    .map(|(name, sig)| format!("{name}{}", pretty_function_suffix(sig)))
                    .collect::<Vec<_>>()
                    .join("; ");
                format!("interface{{{methods}}}")
            }
            Type::Function(sig) => format!("fn{}", pretty_function_suffix(sig)),
            Type::User(handle) => handle.name(),
            Type::Invalid => "<invalid>".to_string(),
        }
    }
}

fn pretty_function_suffix(sig: &FunctionType) -> String {
    let params = sig
        .params
        .iter()
        .map(|(name, ty)| format!("{name}: {}", ty.pretty()))
        .collect::<Vec<_>>()
        .join(", ");
    match &sig.return_type {
        Some(ret) => format!("({params}) -> {}", ret.pretty()),
        None => format!("({params})"),
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Primitive::I8, true)]
    #[case(Primitive::Byte, true)]
    #[case(Primitive::F64, true)]
    #[case(Primitive::Bool, false)]
    #[case(Primitive::Str, false)]
    #[case(Primitive::Void, false)]
    fn numeric_predicate(#[case] p: Primitive, #[case] expected: bool) {
        assert_eq!(p.is_numeric(), expected);
    }

    #[test]
    fn struct_equality_ignores_field_order() {
        let mut a = IndexMap::new();
        a.insert("x".to_string(), Type::Primitive(Primitive::I32));
        a.insert("y".to_string(), Type::Primitive(Primitive::Str));

        let mut b = IndexMap::new();
        b.insert("y".to_string(), Type::Primitive(Primitive::Str));
        b.insert("x".to_string(), Type::Primitive(Primitive::I32));

        assert_eq!(Type::Struct(StructType { fields: a }), Type::Struct(StructType { fields: b }));
    }

    #[test]
    fn invalid_never_equals_itself() {
        assert_ne!(Type::Invalid, Type::Invalid);
    }

    #[test]
    fn user_type_equality_is_nominal() {
        let a = UserTypeHandle::new("File".to_string());
        let b = UserTypeHandle::new("File".to_string());
        assert_eq!(Type::User(a), Type::User(b));
    }

    #[test]
    fn alias_chain_unwraps_to_terminal() {
        let inner = UserTypeHandle::new("Inner".to_string());
        inner.0.borrow_mut().underlying = Some(Type::Primitive(Primitive::I32));

        let outer = UserTypeHandle::new("Outer".to_string());
        outer.0.borrow_mut().underlying = Some(Type::User(inner));

        assert_eq!(Type::User(outer).unwrap_fully(), Type::Primitive(Primitive::I32));
    }

    #[test]
    fn cyclic_alias_terminates_as_invalid() {
        let a = UserTypeHandle::new("A".to_string());
        let b = UserTypeHandle::new("B".to_string());
        a.0.borrow_mut().underlying = Some(Type::User(b.clone()));
        b.0.borrow_mut().underlying = Some(Type::User(a.clone()));

        assert!(Type::User(a).unwrap_fully().is_invalid());
    }
}
