//! Structural assignability: does `left` extend `right`.
//!
//! Dispatch is right-driven -- `right`'s kind decides which shape of
//! structural match applies -- except that a `left` union always
//! distributes first, since every branch below implicitly assumes `left`
//! names a single type.

use crate::error::{VmError, VmResult};
use crate::pool::TypeArena;
use crate::types::{Children, Kind, Type, TypeId};
use tsz_common::limits::MAX_EXTENDS_DEPTH;

/// `left extends right`.
pub fn extends(arena: &TypeArena, left: TypeId, right: TypeId) -> VmResult<bool> {
    extends_at(arena, left, right, 0)
}

fn extends_at(arena: &TypeArena, left: TypeId, right: TypeId, depth: u32) -> VmResult<bool> {
    if depth > MAX_EXTENDS_DEPTH {
        return Err(VmError::ExtendsDepthExceeded);
    }
    let l = arena.type_ref(left);
    let r = arena.type_ref(right);

    if l.kind == Kind::Union {
        return chain_members(arena, l)
            .into_iter()
            .try_fold(true, |acc, member| Ok(acc && extends_at(arena, member, right, depth + 1)?));
    }

    if l.kind == Kind::Never {
        return Ok(true);
    }

    match r.kind {
        Kind::Any | Kind::Unknown => Ok(true),
        Kind::Never => Ok(l.kind == Kind::Never),
        Kind::Literal => Ok(l.kind == Kind::Literal && literal_matches(l, r)),
        Kind::String => Ok(l.kind == Kind::String || l.is_literal_string() || l.kind == Kind::TemplateLiteral),
        Kind::Number => Ok(l.kind == Kind::Number || l.is_literal_number()),
        Kind::Boolean => Ok(l.kind == Kind::Boolean || l.is_literal_boolean()),
        Kind::BigInt => Ok(l.kind == Kind::BigInt || l.is_literal_bigint()),
        Kind::Symbol => Ok(l.kind == Kind::Symbol),
        Kind::Null => Ok(l.kind == Kind::Null),
        Kind::Undefined => Ok(l.kind == Kind::Undefined),

        Kind::Union => {
            for member in chain_members(arena, r) {
                if extends_at(arena, left, member, depth + 1)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }

        Kind::Tuple => tuple_extends(arena, left, l, right, r, depth),
        Kind::Array => array_extends(arena, left, l, right, r, depth),
        Kind::ObjectLiteral => object_extends(arena, left, l, right, r, depth),

        // Classes, functions, methods and index signatures have no
        // structural-assignability rule defined here; every candidate
        // fails closed rather than guessing.
        _ => Ok(false),
    }
}

fn literal_matches(l: &Type, r: &Type) -> bool {
    l.hash == r.hash && l.flags.bits() & LITERAL_FLAVOR_MASK == r.flags.bits() & LITERAL_FLAVOR_MASK
}

const LITERAL_FLAVOR_MASK: u16 = {
    use crate::types::TypeFlags;
    (TypeFlags::STRING_LITERAL.bits()
        | TypeFlags::NUMBER_LITERAL.bits()
        | TypeFlags::BOOLEAN_LITERAL.bits()
        | TypeFlags::BIGINT_LITERAL.bits()
        | TypeFlags::TRUE.bits()
        | TypeFlags::FALSE.bits())
};

/// Walk a `Children::Chain` into a flat member list, outermost first. Shared
/// with [`crate::vm`] so Distribute's union walk and Length's tuple-arity
/// count don't duplicate this traversal.
pub(crate) fn chain_members(arena: &TypeArena, ty: &Type) -> Vec<TypeId> {
    let mut out = Vec::new();
    if let Children::Chain(mut cursor) = ty.children {
        while let Some(cell) = cursor {
            let r = arena.ref_ref(cell);
            out.push(r.target);
            cursor = r.next;
        }
    }
    out
}

/// A tuple element: `single_child` either the plain element type or a
/// `Rest`-wrapped one (`...T`), its `OPTIONAL` flag set for `T?`.
fn array_extends(arena: &TypeArena, left: TypeId, l: &Type, _right: TypeId, r: &Type, depth: u32) -> VmResult<bool> {
    let Some(r_elem) = r.single_child() else {
        return Ok(false);
    };
    match l.kind {
        Kind::Array => {
            let Some(l_elem) = l.single_child() else {
                return Ok(false);
            };
            extends_at(arena, l_elem, r_elem, depth + 1)
        }
        Kind::Tuple => {
            for member in chain_members(arena, l) {
                let member_ty = arena.type_ref(member);
                let Some(el) = element_of(arena, member_ty) else {
                    return Ok(false);
                };
                if !extends_at(arena, el, r_elem, depth + 1)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => {
            let _ = left;
            Ok(false)
        }
    }
}

fn element_of(arena: &TypeArena, member: &Type) -> Option<TypeId> {
    let child = member.single_child()?;
    let child_ty = arena.type_ref(child);
    if child_ty.kind == Kind::Rest {
        child_ty.single_child()
    } else {
        Some(child)
    }
}

fn tuple_extends(arena: &TypeArena, left: TypeId, l: &Type, right: TypeId, r: &Type, depth: u32) -> VmResult<bool> {
    if l.kind != Kind::Tuple {
        let _ = (left, right);
        return Ok(false);
    }
    let l_members = chain_members(arena, l);
    let r_members = chain_members(arena, r);

    let mut li = 0usize;
    for (ri, &r_member_id) in r_members.iter().enumerate() {
        let r_member = arena.type_ref(r_member_id);
        let r_is_rest = r_member
            .single_child()
            .map(|c| arena.type_ref(c).kind == Kind::Rest)
            .unwrap_or(false);

        if r_is_rest {
            let r_el = element_of(arena, r_member).expect("rest member always has an element");
            let r_el_ty = arena.type_ref(r_el);
            if r_el_ty.kind == Kind::Tuple {
                // `...A` where `A` is itself a fixed-arity tuple splices `A`'s
                // own members into this position rather than matching a
                // trailing variadic -- the rest contributes exactly `A`'s
                // arity, so a member can still follow it.
                for &spliced_id in &chain_members(arena, r_el_ty) {
                    if li >= l_members.len() {
                        return Ok(false);
                    }
                    let l_member = arena.type_ref(l_members[li]);
                    let Some(l_el) = element_of(arena, l_member) else {
                        return Ok(false);
                    };
                    let spliced_member = arena.type_ref(spliced_id);
                    let Some(spliced_el) = element_of(arena, spliced_member) else {
                        return Ok(false);
                    };
                    if !extends_at(arena, l_el, spliced_el, depth + 1)? {
                        return Ok(false);
                    }
                    li += 1;
                }
                continue;
            }
            // Otherwise (e.g. `...number[]`) a trailing rest matches every
            // remaining left element.
            while li < l_members.len() {
                let l_member = arena.type_ref(l_members[li]);
                let Some(l_el) = element_of(arena, l_member) else {
                    return Ok(false);
                };
                if !extends_at(arena, l_el, r_el, depth + 1)? {
                    return Ok(false);
                }
                li += 1;
            }
            continue;
        }

        let r_optional = r_member.flags.contains(crate::types::TypeFlags::OPTIONAL);
        if li >= l_members.len() {
            if r_optional {
                continue;
            }
            return Ok(false);
        }
        let l_member = arena.type_ref(l_members[li]);
        let Some(l_el) = element_of(arena, l_member) else {
            return Ok(false);
        };
        let Some(r_el) = element_of(arena, r_member) else {
            return Ok(false);
        };
        if !extends_at(arena, l_el, r_el, depth + 1)? {
            return Ok(false);
        }
        li += 1;
        let _ = ri;
    }

    Ok(li >= l_members.len())
}

fn object_extends(arena: &TypeArena, left: TypeId, l: &Type, _right: TypeId, r: &Type, depth: u32) -> VmResult<bool> {
    if l.kind != Kind::ObjectLiteral {
        let _ = left;
        return Ok(false);
    }
    let l_props = chain_members(arena, l);
    let r_props = chain_members(arena, r);

    for r_prop_id in r_props {
        let r_prop = arena.type_ref(r_prop_id);
        let r_name = r_prop.text.as_deref().unwrap_or("");
        let r_optional = r_prop.flags.contains(crate::types::TypeFlags::OPTIONAL);
        let Some(r_value) = r_prop.single_child() else {
            return Ok(false);
        };

        let found = l_props.iter().find_map(|&id| {
            let p = arena.type_ref(id);
            if p.text.as_deref() == Some(r_name) {
                p.single_child()
            } else {
                None
            }
        });

        match found {
            Some(l_value) => {
                if !extends_at(arena, l_value, r_value, depth + 1)? {
                    return Ok(false);
                }
            }
            None if r_optional => {}
            None => return Ok(false),
        }
    }
    Ok(true)
}
