//! The `extends` laws from the testable-properties section: reflexivity,
//! `Never`/`Any`/`Unknown` absorption, and the two union distribution laws.

use tsz_solver::extends::extends;
use tsz_solver::pool::TypeArena;
use tsz_solver::types::{Kind, Type, TypeFlags, TypeId, TypeRef};

fn atomic(arena: &mut TypeArena, kind: Kind) -> TypeId {
    arena.alloc_type(Type::atomic(kind, TypeFlags::empty(), 0, 0))
}

fn string_literal(arena: &mut TypeArena, text: &str) -> TypeId {
    let hash = xxhash_rust::xxh64::xxh64(text.as_bytes(), 0);
    let mut ty = Type::atomic(Kind::Literal, TypeFlags::STRING_LITERAL, hash, 0);
    ty.text = Some(text.into());
    arena.alloc_type(ty)
}

fn union_of(arena: &mut TypeArena, members: &[TypeId]) -> TypeId {
    let mut head = None;
    for &m in members.iter().rev() {
        arena.retain_type(m);
        head = Some(arena.alloc_ref(TypeRef::new(m, head)));
    }
    arena.alloc_type(Type::with_chain(Kind::Union, TypeFlags::empty(), 0, 0, head))
}

/// `extends(A, A)` is true for every kind this suite exercises.
#[test]
fn reflexivity_holds_for_every_kind() {
    let mut arena = TypeArena::new();
    for kind in [Kind::Any, Kind::Unknown, Kind::Never, Kind::Null, Kind::Undefined, Kind::String, Kind::Number, Kind::Boolean, Kind::BigInt, Kind::Symbol] {
        let a = atomic(&mut arena, kind);
        assert!(extends(&arena, a, a).unwrap(), "{kind:?} should extend itself");
    }
    let lit = string_literal(&mut arena, "abc");
    assert!(extends(&arena, lit, lit).unwrap());
}

/// `extends(A, Never)` is false unless `A` is `Never` itself.
#[test]
fn nothing_but_never_extends_never() {
    let mut arena = TypeArena::new();
    let never = atomic(&mut arena, Kind::Never);
    assert!(extends(&arena, never, never).unwrap());

    let string = atomic(&mut arena, Kind::String);
    assert!(!extends(&arena, string, never).unwrap());
}

/// `extends(Never, A)` is true for any `A`.
#[test]
fn never_extends_everything() {
    let mut arena = TypeArena::new();
    let never = atomic(&mut arena, Kind::Never);
    for kind in [Kind::Any, Kind::Unknown, Kind::String, Kind::Number, Kind::Boolean] {
        let target = atomic(&mut arena, kind);
        assert!(extends(&arena, never, target).unwrap());
    }
}

/// `extends(A, Any)` and `extends(A, Unknown)` are true for all `A`.
#[test]
fn any_and_unknown_absorb_everything() {
    let mut arena = TypeArena::new();
    let any = atomic(&mut arena, Kind::Any);
    let unknown = atomic(&mut arena, Kind::Unknown);
    for kind in [Kind::Never, Kind::Null, Kind::Undefined, Kind::String, Kind::Number, Kind::Boolean, Kind::BigInt, Kind::Symbol] {
        let a = atomic(&mut arena, kind);
        assert!(extends(&arena, a, any).unwrap());
        assert!(extends(&arena, a, unknown).unwrap());
    }
}

/// For a Union `U` with members `m_i`, `extends(m_i, U)` holds for each `i`.
#[test]
fn every_member_extends_its_own_union() {
    let mut arena = TypeArena::new();
    let string = atomic(&mut arena, Kind::String);
    let number = atomic(&mut arena, Kind::Number);
    let boolean = atomic(&mut arena, Kind::Boolean);
    let u = union_of(&mut arena, &[string, number, boolean]);

    assert!(extends(&arena, string, u).unwrap());
    assert!(extends(&arena, number, u).unwrap());
    assert!(extends(&arena, boolean, u).unwrap());
}

/// `extends(U, T)` holds iff every member of `U` extends `T`.
#[test]
fn union_extends_target_iff_every_member_does() {
    let mut arena = TypeArena::new();
    let a = string_literal(&mut arena, "a");
    let b = string_literal(&mut arena, "b");
    let u = union_of(&mut arena, &[a, b]);
    let string = atomic(&mut arena, Kind::String);
    assert!(extends(&arena, u, string).unwrap());

    let mut arena = TypeArena::new();
    let a = string_literal(&mut arena, "a");
    let number = atomic(&mut arena, Kind::Number);
    let mixed = union_of(&mut arena, &[a, number]);
    let string = atomic(&mut arena, Kind::String);
    assert!(!extends(&arena, mixed, string).unwrap());
}
