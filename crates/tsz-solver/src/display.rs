//! Rendering a [`Type`] back to source-like text for diagnostic messages
//! (e.g. `Assign`'s "Type 'X' is not assignable to type 'Y'.").
//!
//! This is a best-effort renderer, not a faithful pretty-printer: it exists
//! so diagnostics read naturally, not to round-trip through the compiler.

use crate::extends::chain_members;
use crate::pool::TypeArena;
use crate::types::{Kind, Type, TypeFlags, TypeId};

#[must_use]
pub fn type_text(arena: &TypeArena, id: TypeId) -> String {
    let ty = arena.type_ref(id);
    match ty.kind {
        Kind::Any => "any".to_string(),
        Kind::Unknown => "unknown".to_string(),
        Kind::Never => "never".to_string(),
        Kind::Null => "null".to_string(),
        Kind::Undefined => "undefined".to_string(),
        Kind::String => "string".to_string(),
        Kind::Number => "number".to_string(),
        Kind::BigInt => "bigint".to_string(),
        Kind::Boolean => "boolean".to_string(),
        Kind::Symbol => "symbol".to_string(),
        Kind::Literal => literal_text(ty),
        Kind::Union => join_members(arena, ty, " | "),
        Kind::Array => format!("{}[]", child_text(arena, ty)),
        Kind::Rest => format!("...{}", child_text(arena, ty)),
        Kind::Tuple => format!("[{}]", join_members(arena, ty, ", ")),
        Kind::TupleMember => child_text(arena, ty),
        Kind::ObjectLiteral => object_text(arena, ty),
        Kind::PropertySignature => child_text(arena, ty),
        Kind::TemplateLiteral => "string".to_string(),
        Kind::Parameter => child_text(arena, ty),
        Kind::Function | Kind::FunctionRef => "Function".to_string(),
        Kind::Class => "typeof Class".to_string(),
        Kind::ClassInstance => "object".to_string(),
        Kind::IndexSignature => "IndexSignature".to_string(),
        Kind::Method => "Method".to_string(),
    }
}

fn child_text(arena: &TypeArena, ty: &Type) -> String {
    ty.single_child().map_or_else(|| "unknown".to_string(), |c| type_text(arena, c))
}

fn join_members(arena: &TypeArena, ty: &Type, sep: &str) -> String {
    chain_members(arena, ty)
        .into_iter()
        .map(|m| type_text(arena, m))
        .collect::<Vec<_>>()
        .join(sep)
}

fn object_text(arena: &TypeArena, ty: &Type) -> String {
    let props = chain_members(arena, ty)
        .into_iter()
        .map(|p| {
            let prop = arena.type_ref(p);
            let name = prop.text.as_deref().unwrap_or("");
            let optional = if prop.flags.contains(TypeFlags::OPTIONAL) { "?" } else { "" };
            format!("{name}{optional}: {}", child_text(arena, prop))
        })
        .collect::<Vec<_>>()
        .join("; ");
    if props.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {props} }}")
    }
}

fn literal_text(ty: &Type) -> String {
    if ty.flags.contains(TypeFlags::TRUE) {
        return "true".to_string();
    }
    if ty.flags.contains(TypeFlags::FALSE) {
        return "false".to_string();
    }
    if ty.flags.contains(TypeFlags::STRING_LITERAL) {
        return format!("\"{}\"", ty.text.as_deref().unwrap_or(""));
    }
    ty.text.as_deref().unwrap_or("").to_string()
}
