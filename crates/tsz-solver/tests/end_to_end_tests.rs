//! The six literal compile-and-run scenarios from the end-to-end section of
//! the testable-properties table: fixed AST inputs with fixed expected
//! diagnostics and, where specified, a fixed final pool `active` count.

mod common;

use common::*;
use tsz_common::diagnostics::diagnostic_codes;
use tsz_solver::ast::TemplateLiteralSpan;
use tsz_solver::{compile_source_file, Vm};

/// `const v1: string = "abc";` -- no assignability failure, and after the
/// run the only live type is the cached `string` behind `v1`'s declared-type
/// routine (the literal `"abc"` is released once `Assign` is done with it).
#[test]
fn literal_assignment() {
    let prog = program(vec![var_stmt(0, 30, "v1", Some(ty_string()), expr_string(20, 25, "abc"))]);

    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();
    vm.run(&mut module).expect("runs");

    assert_eq!(module.diagnostics().len(), 0);
    assert_eq!(vm.arena.types().active(), 1);
}

/// `type a<T> = T extends string ? 'yes' : 'no'; const v1: a<number> = 'no';
/// const v2: a<string> = 'yes'; const v3: a<string> = 'nope';` -- exactly one
/// diagnostic, on `v3`'s initializer.
#[test]
fn distributive_conditional() {
    let t = type_param("T", None, None);
    let conditional = ty_conditional(ty_ref("T", vec![]), ty_string(), ty_string_lit("yes"), ty_string_lit("no"));
    let alias = type_alias(0, 10, "a", vec![t], conditional);

    let v1 = var_stmt(20, 40, "v1", Some(ty_ref("a", vec![ty_number()])), expr_string(35, 40, "no"));
    let v2 = var_stmt(50, 70, "v2", Some(ty_ref("a", vec![ty_string()])), expr_string(65, 70, "yes"));
    let v3 = var_stmt(80, 100, "v3", Some(ty_ref("a", vec![ty_string()])), expr_string(95, 100, "nope"));

    let prog = program(vec![alias, v1, v2, v3]);
    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();
    vm.run(&mut module).expect("runs");

    let diagnostics = module.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, Some(diagnostic_codes::TYPE_NOT_ASSIGNABLE as u16));
    assert_eq!(diagnostics[0].source_pos, 95);
    assert_eq!(diagnostics[0].source_end, 100);
}

/// `type a<T> = T | (string | number); const v1: a<true> = 'yes'; const v2:
/// a<true> = true; const v3: a<true> = false;` -- exactly one diagnostic, on
/// `v3`.
#[test]
fn union_with_generic() {
    let t = type_param("T", None, None);
    let union = ty_union(vec![ty_ref("T", vec![]), ty_union(vec![ty_string(), ty_number()])]);
    let alias = type_alias(0, 10, "a", vec![t], union);

    let v1 = var_stmt(20, 40, "v1", Some(ty_ref("a", vec![ty_true()])), expr_string(35, 40, "yes"));
    let v2 = var_stmt(50, 70, "v2", Some(ty_ref("a", vec![ty_true()])), expr_true(65, 70));
    let v3 = var_stmt(80, 100, "v3", Some(ty_ref("a", vec![ty_true()])), expr_false(95, 100));

    let prog = program(vec![alias, v1, v2, v3]);
    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();
    vm.run(&mut module).expect("runs");

    let diagnostics = module.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].source_pos, 95);
    assert_eq!(diagnostics[0].source_end, 100);
}

/// ``type A = [1]; type L = `${A['length']}`; const var1: L = "1"; const
/// var2: L = "10";`` -- `A['length']` realizes to the number literal `1`, so
/// `L` is the string literal `"1"`; one diagnostic, on `var2`.
#[test]
fn tuple_length_template_literal() {
    let a_alias = type_alias(0, 10, "A", vec![], ty_tuple(vec![tuple_element(ty_number_lit(1.0), false, false)]));
    let length_access = ty_indexed_access(ty_ref("A", vec![]), ty_string_lit("length"));
    let l_alias = type_alias(10, 20, "L", vec![], ty_template(vec![TemplateLiteralSpan::Type(length_access)]));

    let var1 = var_stmt(30, 50, "var1", Some(ty_ref("L", vec![])), expr_string(45, 50, "1"));
    let var2 = var_stmt(60, 80, "var2", Some(ty_ref("L", vec![])), expr_string(75, 80, "10"));

    let prog = program(vec![a_alias, l_alias, var1, var2]);
    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();
    vm.run(&mut module).expect("runs");

    let diagnostics = module.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].source_pos, 75);
    assert_eq!(diagnostics[0].source_end, 80);
}

/// `type A = [1, 2]; type L = [...A, 3]; const var1: L = [1, 2, 3]; const
/// var2: L = [1, 2];` -- the rest splices `A`'s two members in place, so `L`
/// requires exactly three elements; one diagnostic, on `var2`.
#[test]
fn rest_in_tuple() {
    let a_alias = type_alias(
        0,
        10,
        "A",
        vec![],
        ty_tuple(vec![tuple_element(ty_number_lit(1.0), false, false), tuple_element(ty_number_lit(2.0), false, false)]),
    );
    let l_alias = type_alias(
        10,
        20,
        "L",
        vec![],
        ty_tuple(vec![tuple_element(ty_ref("A", vec![]), false, true), tuple_element(ty_number_lit(3.0), false, false)]),
    );

    let var1 = var_stmt(30, 60, "var1", Some(ty_ref("L", vec![])), expr_array(45, 60, vec![expr_number(0, 0, 1.0), expr_number(0, 0, 2.0), expr_number(0, 0, 3.0)]));
    let var2 = var_stmt(70, 90, "var2", Some(ty_ref("L", vec![])), expr_array(80, 90, vec![expr_number(0, 0, 1.0), expr_number(0, 0, 2.0)]));

    let prog = program(vec![a_alias, l_alias, var1, var2]);
    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();
    vm.run(&mut module).expect("runs");

    let diagnostics = module.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].source_pos, 80);
    assert_eq!(diagnostics[0].source_end, 90);
}

/// `type F<T> = T; const var1: F<string> = 'abc';` -- no diagnostics, and
/// after the run the only live type is the cached plain `string` behind
/// `var1`'s declared-type routine.
#[test]
fn cached_subroutine() {
    let t = type_param("T", None, None);
    let alias = type_alias(0, 10, "F", vec![t], ty_ref("T", vec![]));
    let var1 = var_stmt(20, 40, "var1", Some(ty_ref("F", vec![ty_string()])), expr_string(35, 40, "abc"));

    let prog = program(vec![alias, var1]);
    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();
    vm.run(&mut module).expect("runs");

    assert_eq!(module.diagnostics().len(), 0);
    assert_eq!(vm.arena.types().active(), 1);
}

/// `function identity<T>(): T {} const v1: string = identity<string>();` --
/// generic call instantiation is a scope cut this implementation doesn't
/// perform (see DESIGN.md's `tsz-solver::vm` entry): `identity`'s callee
/// operand is always resolved with zero type arguments (the `Identifier`
/// compiler arm never looks at the surrounding `Call`'s type arguments), so
/// `T` comes back `Unknown` regardless of the `<string>` written at the call
/// site, and assigning that `Unknown` to the declared type `string` fails.
/// This pins that documented behavior rather than the ideal "generic call
/// returns `string`" result a full implementation would produce.
#[test]
fn call_expression_ignores_type_arguments() {
    let t = type_param("T", None, None);
    let identity = fn_decl(0, 10, "identity", vec![t], vec![], Some(ty_ref("T", vec![])));
    let call = expr_call(30, 50, expr_identifier(30, 38, "identity"), vec![ty_string()], vec![]);
    let v1 = var_stmt(20, 50, "v1", Some(ty_string()), call);

    let prog = program(vec![identity, v1]);
    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();
    vm.run(&mut module).expect("runs");

    let diagnostics = module.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, Some(diagnostic_codes::TYPE_NOT_ASSIGNABLE as u16));
}
