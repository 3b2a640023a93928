//! Structural type algebra
//!
//! Value-less types used by the resolver for inference and checking. Every
//! function here is pure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

//==============================================================================
// Type representation
//==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForgeType {
    Any,
    Unknown,
    Void,
    Null,
    Boolean,
    Number,
    String,
    LiteralString { value: String },
    LiteralNumber { value: f64 },
    LiteralBoolean { value: bool },
    Array { element: Box<ForgeType> },
    Object {
        props: BTreeMap<String, ForgeType>,
        open: bool,
    },
    Function {
        params: Vec<ForgeType>,
        returns: Box<ForgeType>,
    },
    /// Always built through [`ForgeType::union`]: flat and duplicate-free
    Union { types: Vec<ForgeType> },
}

/// Coarse classification used after widening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Any,
    Unknown,
    Void,
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
    Function,
    Union,
}

impl ForgeType {
    pub fn literal_string(value: impl Into<String>) -> Self {
        ForgeType::LiteralString {
            value: value.into(),
        }
    }

    pub fn literal_number(value: f64) -> Self {
        ForgeType::LiteralNumber { value }
    }

    pub fn literal_boolean(value: bool) -> Self {
        ForgeType::LiteralBoolean { value }
    }

    pub fn array(element: ForgeType) -> Self {
        ForgeType::Array {
            element: Box::new(element),
        }
    }

    pub fn object(props: BTreeMap<String, ForgeType>, open: bool) -> Self {
        ForgeType::Object { props, open }
    }

    pub fn function(params: Vec<ForgeType>, returns: ForgeType) -> Self {
        ForgeType::Function {
            params,
            returns: Box::new(returns),
        }
    }

    /// Build a union: nested unions are flattened, structural duplicates
    /// dropped, zero members give `unknown` and one member gives itself.
    pub fn union<I>(members: I) -> Self
    where
        I: IntoIterator<Item = ForgeType>,
    {
        let mut flat: Vec<ForgeType> = Vec::new();
        for member in members {
            match member {
                ForgeType::Union { types } => {
                    for inner in types {
                        push_unique(&mut flat, inner);
                    }
                }
                other => push_unique(&mut flat, other),
            }
        }
        match flat.len() {
            0 => ForgeType::Unknown,
            1 => flat.pop().unwrap_or(ForgeType::Unknown),
            _ => ForgeType::Union { types: flat },
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            ForgeType::Any => TypeKind::Any,
            ForgeType::Unknown => TypeKind::Unknown,
            ForgeType::Void => TypeKind::Void,
            ForgeType::Null => TypeKind::Null,
            ForgeType::Boolean | ForgeType::LiteralBoolean { .. } => TypeKind::Boolean,
            ForgeType::Number | ForgeType::LiteralNumber { .. } => TypeKind::Number,
            ForgeType::String | ForgeType::LiteralString { .. } => TypeKind::String,
            ForgeType::Array { .. } => TypeKind::Array,
            ForgeType::Object { .. } => TypeKind::Object,
            ForgeType::Function { .. } => TypeKind::Function,
            ForgeType::Union { .. } => TypeKind::Union,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            ForgeType::LiteralString { .. }
                | ForgeType::LiteralNumber { .. }
                | ForgeType::LiteralBoolean { .. }
        )
    }

    /// Literal types become their base type; everything else is a fixed point
    pub fn widen(&self) -> ForgeType {
        match self {
            ForgeType::LiteralString { .. } => ForgeType::String,
            ForgeType::LiteralNumber { .. } => ForgeType::Number,
            ForgeType::LiteralBoolean { .. } => ForgeType::Boolean,
            other => other.clone(),
        }
    }

    /// Whether `self` is known to accept no member access at all
    pub fn is_primitive(&self) -> bool {
        matches!(
            self.kind(),
            TypeKind::Void | TypeKind::Null | TypeKind::Boolean | TypeKind::Number
        )
    }
}

fn push_unique(list: &mut Vec<ForgeType>, ty: ForgeType) {
    if !list.iter().any(|existing| types_equal(existing, &ty)) {
        list.push(ty);
    }
}

impl PartialEq for ForgeType {
    fn eq(&self, other: &Self) -> bool {
        types_equal(self, other)
    }
}

impl fmt::Display for ForgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgeType::Any => f.write_str("any"),
            ForgeType::Unknown => f.write_str("unknown"),
            ForgeType::Void => f.write_str("void"),
            ForgeType::Null => f.write_str("null"),
            ForgeType::Boolean => f.write_str("boolean"),
            ForgeType::Number => f.write_str("number"),
            ForgeType::String => f.write_str("string"),
            ForgeType::LiteralString { value } => write!(f, "'{}'", value),
            ForgeType::LiteralNumber { value } => write!(f, "{}", value),
            ForgeType::LiteralBoolean { value } => write!(f, "{}", value),
            ForgeType::Array { element } => match element.as_ref() {
                ForgeType::Union { .. } | ForgeType::Function { .. } => {
                    write!(f, "({})[]", element)
                }
                _ => write!(f, "{}[]", element),
            },
            ForgeType::Object { props, open } => {
                if props.is_empty() {
                    return f.write_str(if *open { "{ ... }" } else { "{}" });
                }
                f.write_str("{ ")?;
                for (i, (name, ty)) in props.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                if *open {
                    f.write_str(", ...")?;
                }
                f.write_str(" }")
            }
            ForgeType::Function { params, returns } => {
                f.write_str("(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") => {}", returns)
            }
            ForgeType::Union { types } => {
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", t)?;
                }
                Ok(())
            }
        }
    }
}

//==============================================================================
// Equality, assignability, unification
//==============================================================================

/// Structural equality; unions compare as sets
pub fn types_equal(a: &ForgeType, b: &ForgeType) -> bool {
    use ForgeType::*;
    match (a, b) {
        (Any, Any)
        | (Unknown, Unknown)
        | (Void, Void)
        | (Null, Null)
        | (Boolean, Boolean)
        | (Number, Number)
        | (String, String) => true,
        (LiteralString { value: x }, LiteralString { value: y }) => x == y,
        // NaN literals compare equal to each other
        (LiteralNumber { value: x }, LiteralNumber { value: y }) => {
            x == y || (x.is_nan() && y.is_nan())
        }
        (LiteralBoolean { value: x }, LiteralBoolean { value: y }) => x == y,
        (Array { element: x }, Array { element: y }) => types_equal(x, y),
        (
            Object {
                props: pa,
                open: oa,
            },
            Object {
                props: pb,
                open: ob,
            },
        ) => {
            oa == ob
                && pa.len() == pb.len()
                && pa
                    .iter()
                    .all(|(k, v)| pb.get(k).is_some_and(|w| types_equal(v, w)))
        }
        (
            Function {
                params: pa,
                returns: ra,
            },
            Function {
                params: pb,
                returns: rb,
            },
        ) => {
            pa.len() == pb.len()
                && pa.iter().zip(pb).all(|(x, y)| types_equal(x, y))
                && types_equal(ra, rb)
        }
        (Union { types: ta }, Union { types: tb }) => {
            ta.len() == tb.len() && ta.iter().all(|x| tb.iter().any(|y| types_equal(x, y)))
        }
        _ => false,
    }
}

/// Whether a value of type `from` may flow into a slot of type `to`.
///
/// Object rule: when `to` is open, properties missing from `from` are
/// tolerated. Properties present on both sides must still be assignable.
pub fn is_assignable(from: &ForgeType, to: &ForgeType) -> bool {
    use ForgeType::*;

    if matches!(to, Any) || matches!(from, Any) {
        return true;
    }
    if matches!(from, Unknown) {
        return matches!(to, Unknown);
    }
    if matches!(to, Unknown) {
        return true;
    }
    // A source union is decomposed first so that `U` is assignable to itself.
    if let Union { types } = from {
        return types.iter().all(|member| is_assignable(member, to));
    }
    if let Union { types } = to {
        return types.iter().any(|member| is_assignable(from, member));
    }

    let wide_from = from.widen();
    let wide_to = to.widen();
    if wide_from.kind() != wide_to.kind() {
        return false;
    }

    match (&wide_from, &wide_to) {
        (Array { element: ef }, Array { element: et }) => is_assignable(ef, et),
        (
            Object { props: pf, .. },
            Object {
                props: pt,
                open: to_open,
            },
        ) => pt.iter().all(|(name, target)| match pf.get(name) {
            Some(source) => is_assignable(source, target),
            None => *to_open,
        }),
        (
            Function {
                params: pf,
                returns: rf,
            },
            Function {
                params: pt,
                returns: rt,
            },
        ) => {
            pf.len() == pt.len()
                && pt.iter().zip(pf).all(|(t, f)| is_assignable(t, f))
                && is_assignable(rf, rt)
        }
        _ => true,
    }
}

/// Merge two types into one both could have been (branch joins)
pub fn unify(a: &ForgeType, b: &ForgeType) -> ForgeType {
    use ForgeType::*;

    if matches!(a, Any) || matches!(b, Any) {
        return Any;
    }
    if matches!(a, Unknown) {
        return b.clone();
    }
    if matches!(b, Unknown) {
        return a.clone();
    }
    if types_equal(a, b) {
        return a.clone();
    }
    if a.is_literal() || b.is_literal() {
        return ForgeType::union([a.clone(), b.clone()]);
    }

    match (a, b) {
        (Array { element: ea }, Array { element: eb }) => ForgeType::array(unify(ea, eb)),
        (
            Object {
                props: pa,
                open: oa,
            },
            Object {
                props: pb,
                open: ob,
            },
        ) => {
            let mut props = pa.clone();
            for (name, tb) in pb {
                let merged = match pa.get(name) {
                    Some(ta) => unify(ta, tb),
                    None => tb.clone(),
                };
                props.insert(name.clone(), merged);
            }
            ForgeType::object(props, *oa || *ob)
        }
        _ => ForgeType::union([a.clone(), b.clone()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(props: &[(&str, ForgeType)], open: bool) -> ForgeType {
        ForgeType::object(
            props
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            open,
        )
    }

    fn samples() -> Vec<ForgeType> {
        vec![
            ForgeType::Any,
            ForgeType::Void,
            ForgeType::Null,
            ForgeType::Boolean,
            ForgeType::Number,
            ForgeType::String,
            ForgeType::literal_string("dog"),
            ForgeType::literal_number(3.0),
            ForgeType::literal_boolean(true),
            ForgeType::array(ForgeType::Number),
            obj(&[("name", ForgeType::String)], false),
            obj(&[("age", ForgeType::Number)], true),
            ForgeType::function(vec![ForgeType::Number], ForgeType::String),
            ForgeType::union([ForgeType::Number, ForgeType::String]),
        ]
    }

    #[test]
    fn test_union_flattens_and_dedupes() {
        let inner = ForgeType::union([ForgeType::Number, ForgeType::String]);
        let u = ForgeType::union([inner, ForgeType::Number, ForgeType::Boolean]);
        match &u {
            ForgeType::Union { types } => {
                assert_eq!(types.len(), 3);
                assert!(types.iter().all(|t| !matches!(t, ForgeType::Union { .. })));
            }
            other => panic!("expected union, got {}", other),
        }
    }

    #[test]
    fn test_union_collapses() {
        assert_eq!(ForgeType::union(Vec::new()), ForgeType::Unknown);
        assert_eq!(
            ForgeType::union([ForgeType::Number, ForgeType::Number]),
            ForgeType::Number
        );
    }

    #[test]
    fn test_union_equality_ignores_order() {
        let a = ForgeType::union([ForgeType::Number, ForgeType::String]);
        let b = ForgeType::union([ForgeType::String, ForgeType::Number]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_object_equality_checks_open_flag() {
        assert_ne!(
            obj(&[("a", ForgeType::Number)], true),
            obj(&[("a", ForgeType::Number)], false)
        );
    }

    #[test]
    fn test_reflexive_assignability() {
        for t in samples() {
            assert!(is_assignable(&t, &t), "{} should accept itself", t);
        }
    }

    #[test]
    fn test_any_is_universal() {
        let mut all = samples();
        all.push(ForgeType::Unknown);
        for t in all {
            assert!(is_assignable(&t, &ForgeType::Any));
            assert!(is_assignable(&ForgeType::Any, &t));
        }
    }

    #[test]
    fn test_unknown_rules() {
        assert!(is_assignable(&ForgeType::Unknown, &ForgeType::Unknown));
        assert!(!is_assignable(&ForgeType::Unknown, &ForgeType::Number));
        assert!(is_assignable(&ForgeType::Number, &ForgeType::Unknown));
    }

    #[test]
    fn test_literal_widening() {
        assert!(is_assignable(&ForgeType::literal_string("a"), &ForgeType::String));
        assert!(is_assignable(&ForgeType::String, &ForgeType::literal_string("a")));
        assert!(!is_assignable(&ForgeType::literal_number(1.0), &ForgeType::String));
    }

    #[test]
    fn test_null_only_into_null() {
        assert!(is_assignable(&ForgeType::Null, &ForgeType::Null));
        assert!(!is_assignable(&ForgeType::Null, &ForgeType::String));
        assert!(!is_assignable(
            &ForgeType::Null,
            &obj(&[("a", ForgeType::Number)], true)
        ));
    }

    #[test]
    fn test_union_target_and_source() {
        let num_or_str = ForgeType::union([ForgeType::Number, ForgeType::String]);
        assert!(is_assignable(&ForgeType::Number, &num_or_str));
        assert!(!is_assignable(&num_or_str, &ForgeType::Number));
        assert!(!is_assignable(&ForgeType::Boolean, &num_or_str));
    }

    #[test]
    fn test_open_target_tolerates_missing_properties() {
        let target_open = obj(
            &[("name", ForgeType::String), ("age", ForgeType::Number)],
            true,
        );
        let target_closed = obj(
            &[("name", ForgeType::String), ("age", ForgeType::Number)],
            false,
        );
        let source = obj(&[("name", ForgeType::String)], false);

        // Open governs missing required properties, not extra ones.
        assert!(is_assignable(&source, &target_open));
        assert!(!is_assignable(&source, &target_closed));

        // Present properties are still checked on an open target.
        let wrong = obj(&[("name", ForgeType::Number)], false);
        assert!(!is_assignable(&wrong, &target_open));

        // Extra source properties are always fine.
        let wider = obj(
            &[
                ("name", ForgeType::String),
                ("age", ForgeType::Number),
                ("extra", ForgeType::Boolean),
            ],
            false,
        );
        assert!(is_assignable(&wider, &target_closed));
    }

    #[test]
    fn test_function_variance() {
        let takes_any = ForgeType::function(vec![ForgeType::Any], ForgeType::literal_string("x"));
        let takes_num = ForgeType::function(vec![ForgeType::Number], ForgeType::String);
        assert!(is_assignable(&takes_any, &takes_num));

        let takes_str = ForgeType::function(vec![ForgeType::String], ForgeType::String);
        assert!(!is_assignable(&takes_str, &takes_num));

        let two = ForgeType::function(vec![ForgeType::Any, ForgeType::Any], ForgeType::Void);
        let one = ForgeType::function(vec![ForgeType::Any], ForgeType::Void);
        assert!(!is_assignable(&two, &one));
    }

    #[test]
    fn test_unify_identity() {
        for t in samples() {
            assert_eq!(unify(&t, &t), t);
        }
    }

    #[test]
    fn test_unify_special_operands() {
        assert_eq!(unify(&ForgeType::Any, &ForgeType::Number), ForgeType::Any);
        assert_eq!(unify(&ForgeType::Unknown, &ForgeType::Number), ForgeType::Number);
        assert_eq!(unify(&ForgeType::String, &ForgeType::Unknown), ForgeType::String);
    }

    #[test]
    fn test_unify_literals_make_union() {
        let u = unify(&ForgeType::literal_number(1.0), &ForgeType::literal_number(2.0));
        assert_eq!(
            u,
            ForgeType::union([ForgeType::literal_number(1.0), ForgeType::literal_number(2.0)])
        );
    }

    #[test]
    fn test_unify_arrays_and_objects() {
        let a = ForgeType::array(ForgeType::Number);
        let b = ForgeType::array(ForgeType::String);
        assert_eq!(
            unify(&a, &b),
            ForgeType::array(ForgeType::union([ForgeType::Number, ForgeType::String]))
        );

        let x = obj(&[("a", ForgeType::Number)], false);
        let y = obj(&[("a", ForgeType::String), ("b", ForgeType::Boolean)], true);
        assert_eq!(
            unify(&x, &y),
            obj(
                &[
                    ("a", ForgeType::union([ForgeType::Number, ForgeType::String])),
                    ("b", ForgeType::Boolean),
                ],
                true
            )
        );
    }

    #[test]
    fn test_display() {
        let t = ForgeType::function(
            vec![ForgeType::array(ForgeType::Number)],
            ForgeType::union([ForgeType::String, ForgeType::Null]),
        );
        assert_eq!(t.to_string(), "(number[]) => string | null");
    }

    #[test]
    fn test_nan_literal_is_reflexive() {
        let nan = ForgeType::literal_number(f64::NAN);
        assert!(types_equal(&nan, &nan));
        assert!(types_equal(&unify(&nan, &nan), &nan));
        assert!(types_equal(&ForgeType::union([nan.clone(), nan.clone()]), &nan));
        assert!(!types_equal(&nan, &ForgeType::literal_number(0.0)));
        assert!(types_equal(
            &ForgeType::literal_number(0.0),
            &ForgeType::literal_number(-0.0)
        ));
    }
}
