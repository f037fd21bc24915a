//! Implicit and explicit cast rules (spec.md §4.4.2, §4.4.4, §4.4.5).

use crate::types::{Primitive, Type};

/// The numeric promotion table (spec.md §4.4.2): `source` may implicitly
/// widen to any of these targets; signed/unsigned never cross, and
/// integer-to-float never promotes implicitly.
fn implicit_numeric_targets(source: Primitive) -> &'static [Primitive] {
    use Primitive::*;
    match source {
        I8 => &[I16, I32, I64],
        I16 => &[I32, I64],
        I32 => &[I64],
        U8 | Byte => &[U16, U32, U64],
        U16 => &[U32, U64],
        U32 => &[U64],
        F32 => &[F64],
        _ => &[],
    }
}

/// Whether `source` may be implicitly cast to `target` (spec.md §4.4.2).
pub fn implicit_castable(source: &Type, target: &Type) -> bool {
    if source == target {
        return true;
    }
    match (source, target) {
        (Type::Invalid, _) | (_, Type::Invalid) => true, // already reported; don't cascade
        (Type::Primitive(a), Type::Primitive(b)) => implicit_numeric_targets(*a).contains(b),
        (Type::Array(a), Type::Array(b)) => implicit_castable(a, b),
        (Type::Function(a), Type::Function(b)) => {
            a.params.len() == b.params.len()
                && a.params
                    .iter()
                    .zip(b.params.iter())
                    // parameters are contravariant: target's param must accept source's caller,
                    // i.e. source's declared parameter type must be castable *from* target's.
                    .all(|((_, a_param), (_, b_param))| implicit_castable(b_param, a_param))
                && match (&a.return_type, &b.return_type) {
                    (None, None) => true,
                    (Some(a_ret), Some(b_ret)) => implicit_castable(a_ret, b_ret),
                    _ => false,
                }
        }
        (Type::User(source_handle), Type::Interface(target_iface)) => {
            let data = source_handle.0.borrow();
            target_iface.methods.iter().all(|(name, target_sig)| {
                data.methods.get(name).is_some_and(|source_sig| function_conforms(source_sig, target_sig))
            })
        }
        (Type::Struct(source_struct), Type::Struct(target_struct)) => {
            // Extra fields in source are disallowed for implicit cast
            // (spec.md §4.4.4, Open Question 1): field sets must match
            // exactly, each shared field implicit-castable.
            source_struct.fields.len() == target_struct.fields.len()
                && target_struct.fields.iter().all(|(name, target_ty)| {
                    source_struct.fields.get(name).is_some_and(|source_ty| implicit_castable(source_ty, target_ty))
                })
        }
        (Type::User(_), _) => source.unwrap_once().is_some_and(|unwrapped| implicit_castable(&unwrapped, target)),
        (_, Type::User(_)) => target.unwrap_once().is_some_and(|unwrapped| implicit_castable(source, &unwrapped)),
        _ => false,
    }
}

/// A user-type method's signature is compatible with an interface method's
/// signature when it's implicit-castable as a function type.
fn function_conforms(source: &crate::types::FunctionType, target: &crate::types::FunctionType) -> bool {
    implicit_castable(&Type::Function(source.clone()), &Type::Function(target.clone()))
}

/// Whether `source` may be explicitly cast (`as`) to `target` (spec.md
/// §4.4.5). A superset of implicit casts.
pub fn explicit_castable(source: &Type, target: &Type) -> bool {
    if implicit_castable(source, target) {
        return true;
    }
    match (source, target) {
        (Type::Invalid, _) | (_, Type::Invalid) => true,
        (Type::Primitive(a), Type::Primitive(b)) => a.is_numeric() && b.is_numeric() || a == b,
        (Type::Array(a), Type::Array(b)) => explicit_castable(a, b),
        (Type::User(source_handle), Type::Interface(target_iface)) => {
            let data = source_handle.0.borrow();
            target_iface.methods.iter().all(|(name, target_sig)| {
                data.methods.get(name).is_some_and(|source_sig| function_conforms(source_sig, target_sig))
            })
        }
        (Type::Struct(source_struct), Type::Struct(target_struct)) => {
            // Explicit struct cast: target's fields must be a *subset* of
            // source's (spec.md §4.4.4), each shared field explicit-castable.
            target_struct.fields.iter().all(|(name, target_ty)| {
                source_struct.fields.get(name).is_some_and(|source_ty| explicit_castable(source_ty, target_ty))
            })
        }
        (Type::User(_), _) => source.unwrap_once().is_some_and(|unwrapped| explicit_castable(&unwrapped, target)),
        (_, Type::User(_)) => target.unwrap_once().is_some_and(|unwrapped| explicit_castable(source, &unwrapped)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FunctionType, InterfaceType, StructType, UserTypeHandle};
    use indexmap::IndexMap;
    use rstest::rstest;

    #[rstest]
    #[case(Primitive::I8, Primitive::I32, true)]
    #[case(Primitive::I32, Primitive::I8, false)]
    #[case(Primitive::I32, Primitive::U32, false)]
    #[case(Primitive::F32, Primitive::F64, true)]
    #[case(Primitive::I32, Primitive::F32, false)]
    fn numeric_promotion(#[case] source: Primitive, #[case] target: Primitive, #[case] expected: bool) {
        assert_eq!(implicit_castable(&Type::Primitive(source), &Type::Primitive(target)), expected);
    }

    #[test]
    fn struct_with_extra_source_fields_rejected_for_implicit_cast() {
        let mut target_fields = IndexMap::new();
        target_fields.insert("x".to_string(), Type::Primitive(Primitive::I32));
        let target = Type::Struct(StructType { fields: target_fields });

        let mut source_fields = IndexMap::new();
        source_fields.insert("x".to_string(), Type::Primitive(Primitive::I32));
        source_fields.insert("y".to_string(), Type::Primitive(Primitive::I32));
        let source = Type::Struct(StructType { fields: source_fields });

        assert!(!implicit_castable(&source, &target));
    }

    #[test]
    fn struct_with_exact_fields_is_implicit_castable() {
        let mut fields = IndexMap::new();
        fields.insert("x".to_string(), Type::Primitive(Primitive::I32));
        let target = Type::Struct(StructType { fields: fields.clone() });
        let source = Type::Struct(StructType { fields });
        assert!(implicit_castable(&source, &target));
    }

    #[test]
    fn explicit_struct_cast_allows_target_subset_of_source() {
        let mut target_fields = IndexMap::new();
        target_fields.insert("x".to_string(), Type::Primitive(Primitive::I32));
        let target = Type::Struct(StructType { fields: target_fields });

        let mut source_fields = IndexMap::new();
        source_fields.insert("x".to_string(), Type::Primitive(Primitive::I32));
        source_fields.insert("y".to_string(), Type::Primitive(Primitive::I32));
        let source = Type::Struct(StructType { fields: source_fields });

        assert!(explicit_castable(&source, &target));
        assert!(!implicit_castable(&source, &target));
    }

    #[test]
    fn named_struct_satisfies_interface_by_method_set() {
        let handle = UserTypeHandle::new("Reader".to_string());
        handle.0.borrow_mut().methods.insert(
            "read".to_string(),
            FunctionType { params: vec![], return_type: Some(std::rc::Rc::new(Type::Primitive(Primitive::I32))) },
        );

        let mut methods = IndexMap::new();
        methods.insert(
            "read".to_string(),
            FunctionType { params: vec![], return_type: Some(std::rc::Rc::new(Type::Primitive(Primitive::I32))) },
        );
        let iface = Type::Interface(InterfaceType { methods });

        assert!(implicit_castable(&Type::User(handle), &iface));
    }

    #[test]
    fn anonymous_struct_never_satisfies_interface() {
        let iface = Type::Interface(InterfaceType { methods: IndexMap::new() });
        let anon = Type::Struct(StructType { fields: IndexMap::new() });
        // A struct type itself never implicit-casts to an interface; only a
        // named UserType carrying a method set can (spec.md §4.4.2 rule 5).
        assert!(!implicit_castable(&anon, &iface));
    }
}
