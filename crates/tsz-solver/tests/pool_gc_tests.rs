//! `Vm::clear`'s lifecycle property from the testable-properties section:
//! "for every successful `run`, after `clear(module)` and a final stack-GC
//! flush, the pool's `active` counter returns to zero" -- and that `run` is
//! idempotent across a `clear`/`run` cycle.

mod common;

use common::*;
use tsz_solver::{compile_source_file, Vm};

/// A single cached 0-arg routine (spec §8 scenario 1): `active` is 1 right
/// after `run`, and 0 once `clear` releases the cache.
#[test]
fn clear_after_run_returns_active_to_zero() {
    let prog = program(vec![var_stmt(0, 30, "v1", Some(ty_string()), expr_string(20, 25, "abc"))]);
    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();

    vm.run(&mut module).expect("runs");
    assert_eq!(vm.arena.types().active(), 1);

    vm.clear(&mut module);
    assert_eq!(vm.arena.types().active(), 0);
    assert_eq!(module.diagnostics().len(), 0);
}

/// A diagnostic-producing run also leaves the pool clean after `clear`: the
/// failed assignment's operands are released by `Assign` itself, and the
/// routine caches it set up along the way are released by `clear`.
#[test]
fn clear_after_a_failing_run_returns_active_to_zero() {
    let prog = program(vec![var_stmt(0, 30, "v1", Some(ty_number()), expr_string(20, 25, "abc"))]);
    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();

    vm.run(&mut module).expect("runs");
    assert_eq!(module.diagnostics().len(), 1);

    vm.clear(&mut module);
    assert_eq!(vm.arena.types().active(), 0);
}

/// `run` is idempotent: `clear` then `run` again yields the same
/// diagnostics in the same order.
#[test]
fn run_is_idempotent_across_a_clear_cycle() {
    let t = type_param("T", None, None);
    let conditional = ty_conditional(ty_ref("T", vec![]), ty_string(), ty_string_lit("yes"), ty_string_lit("no"));
    let alias = type_alias(0, 10, "a", vec![t], conditional);
    let v1 = var_stmt(20, 40, "v1", Some(ty_ref("a", vec![ty_number()])), expr_string(35, 40, "no"));
    let v2 = var_stmt(50, 70, "v2", Some(ty_ref("a", vec![ty_string()])), expr_string(65, 70, "nope"));

    let prog = program(vec![alias, v1, v2]);
    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();

    vm.run(&mut module).expect("first run");
    let first: Vec<_> = module.diagnostics().to_vec();
    assert_eq!(first.len(), 1);

    vm.clear(&mut module);
    assert_eq!(vm.arena.types().active(), 0);

    vm.run(&mut module).expect("second run");
    let second: Vec<_> = module.diagnostics().to_vec();
    assert_eq!(first, second);
}
