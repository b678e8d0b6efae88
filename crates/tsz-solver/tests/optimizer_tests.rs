//! End-to-end exercise of the section/optimizer pass (spec §4.4) through the
//! full compiler, as distinct from `optimizer::tests`' unit-level
//! `SectionTree` fixtures: these check the bytes the compiler actually
//! produces for realistic alias shapes.

mod common;

use common::*;
use tsz_solver::compile_source_file;
use tsz_solver::isa::Op;

/// `type A = string; type B = A;` -- `B`'s body is a zero-argument call to
/// `A` immediately followed by `Return`, a terminal position, so the
/// optimizer rewrites it to a `TailCall`.
#[test]
fn terminal_alias_reference_becomes_a_tail_call() {
    let a = type_alias(0, 10, "A", vec![], ty_string());
    let b = type_alias(10, 20, "B", vec![], ty_ref("A", vec![]));
    let prog = program(vec![a, b]);

    let module = compile_source_file(&prog).expect("compiles");
    let b_sub = module.subroutine(2);
    let body_addr = b_sub.body_addr as usize;
    assert_eq!(Op::from_byte(module.code()[body_addr]), Some(Op::TailCall));
}

/// A plain (non-generic) type alias is marked cacheable so its zero-arg
/// calls short-circuit through the subroutine's `result` cache.
#[test]
fn non_generic_alias_blocks_tail_call_elision_on_itself() {
    let a = type_alias(0, 10, "A", vec![], ty_string());
    let prog = program(vec![a]);

    let module = compile_source_file(&prog).expect("compiles");
    let a_sub = module.subroutine(1);
    assert!(a_sub.blocks_tail_call());
}

/// A generic alias is never treated as cacheable -- each instantiation can
/// produce a different result, so its calls are never candidates for the
/// zero-arg cache short-circuit.
#[test]
fn generic_alias_does_not_block_tail_call_elision() {
    let t = type_param("T", None, None);
    let f = type_alias(0, 10, "F", vec![t], ty_ref("T", vec![]));
    let prog = program(vec![f]);

    let module = compile_source_file(&prog).expect("compiles");
    let f_sub = module.subroutine(1);
    assert!(!f_sub.blocks_tail_call());
}

/// A tuple's trailing `Rest` over a plain type reference, consumed exactly
/// once, is rewritten to `RestReuse`.
#[test]
fn single_use_rest_becomes_rest_reuse() {
    let t = type_param("T", None, None);
    let alias = type_alias(0, 10, "A", vec![t], ty_tuple(vec![tuple_element(ty_ref("T", vec![]), false, true)]));
    let prog = program(vec![alias]);

    let module = compile_source_file(&prog).expect("compiles");
    let body = module.code();
    let sub = module.subroutine(1);
    let body_region = &body[sub.body_addr as usize..];

    let has_rest_reuse = body_region.iter().any(|&b| Op::from_byte(b) == Some(Op::RestReuse));
    let has_rest = body_region.iter().any(|&b| Op::from_byte(b) == Some(Op::Rest));
    assert!(has_rest_reuse, "expected a RestReuse opcode in A's body");
    assert!(!has_rest, "Rest should have been fully rewritten to RestReuse");
}
