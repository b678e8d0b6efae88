//! Compiler and VM microbenchmarks: compile-only cost, a cold run, and a
//! `clear`-then-rerun cycle, across a few representative program shapes.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tsz_solver::ast::{Expression, Program, Span, Statement, TemplateLiteralSpan, TupleElement, TypeNode, TypeParameter};
use tsz_solver::{Vm, compile_source_file};

fn span(pos: u32, end: u32) -> Span {
    Span { pos, end }
}

fn type_param(name: &str) -> TypeParameter {
    TypeParameter { span: span(0, 0), name: name.to_string(), constraint: None, default: None }
}

fn ty_string() -> TypeNode {
    TypeNode::StringKeyword { span: span(0, 0) }
}

fn ty_string_lit(value: &str) -> TypeNode {
    TypeNode::StringLiteral { span: span(0, 0), value: value.to_string() }
}

fn ty_ref(name: &str, type_arguments: Vec<TypeNode>) -> TypeNode {
    TypeNode::TypeReference { span: span(0, 0), name: name.to_string(), type_arguments }
}

fn ty_number_lit(value: f64) -> TypeNode {
    TypeNode::NumberLiteral { span: span(0, 0), value }
}

fn tuple_element(value: TypeNode, rest: bool) -> TupleElement {
    TupleElement { span: span(0, 0), value, optional: false, rest }
}

fn ty_tuple(elements: Vec<TupleElement>) -> TypeNode {
    TypeNode::TupleType { span: span(0, 0), elements }
}

fn ty_indexed_access(object: TypeNode, index: TypeNode) -> TypeNode {
    TypeNode::IndexedAccessType { span: span(0, 0), object: Box::new(object), index: Box::new(index) }
}

fn ty_template(spans: Vec<TemplateLiteralSpan>) -> TypeNode {
    TypeNode::TemplateLiteralType { span: span(0, 0), spans }
}

fn ty_conditional(check: TypeNode, extends: TypeNode, true_type: TypeNode, false_type: TypeNode) -> TypeNode {
    TypeNode::ConditionalType {
        span: span(0, 0),
        check: Box::new(check),
        extends: Box::new(extends),
        true_type: Box::new(true_type),
        false_type: Box::new(false_type),
    }
}

fn type_alias(name: &str, type_parameters: Vec<TypeParameter>, value: TypeNode) -> Statement {
    Statement::TypeAlias { span: span(0, 10), name: name.to_string(), type_parameters, value }
}

fn var_stmt(name: &str, declared_type: Option<TypeNode>, initializer: Expression) -> Statement {
    Statement::VariableStatement { span: span(0, 10), name: name.to_string(), declared_type, initializer }
}

fn expr_string(value: &str) -> Expression {
    Expression::StringLiteral { span: span(0, 5), value: value.to_string() }
}

/// A single plain alias plus one literal assignment -- the cheapest shape
/// that exercises compile, run, and the subroutine result cache.
fn literal_assignment_program() -> Program {
    Program { statements: vec![var_stmt("v1", Some(ty_string()), expr_string("abc"))] }
}

/// A generic alias with a distributive conditional body, instantiated
/// across several variable declarations -- exercises `Distribute` and the
/// union-member loop in `extends`.
fn distributive_conditional_program() -> Program {
    let t = type_param("T");
    let conditional = ty_conditional(ty_ref("T", vec![]), ty_string(), ty_string_lit("yes"), ty_string_lit("no"));
    let alias = type_alias("a", vec![t], conditional);

    let mut statements = vec![alias];
    for i in 0..16 {
        let name = format!("v{i}");
        statements.push(var_stmt(&name, Some(ty_ref("a", vec![ty_string()])), expr_string("yes")));
    }
    Program { statements }
}

/// A tuple-rest-splice plus an indexed-access-driven template literal --
/// exercises `Tuple`/`Rest`/`IndexAccess`/`TemplateLiteral` together.
fn tuple_and_template_program() -> Program {
    let a_alias = type_alias("A", vec![], ty_tuple(vec![tuple_element(ty_number_lit(1.0), false), tuple_element(ty_number_lit(2.0), false)]));
    let l_alias = type_alias("L", vec![], ty_tuple(vec![tuple_element(ty_ref("A", vec![]), true), tuple_element(ty_number_lit(3.0), false)]));
    let length_access = ty_indexed_access(ty_ref("A", vec![]), ty_string_lit("length"));
    let s_alias = type_alias("S", vec![], ty_template(vec![TemplateLiteralSpan::Type(length_access)]));
    let v1 = var_stmt("v1", Some(ty_ref("L", vec![])), expr_string("ignored"));
    Program { statements: vec![a_alias, l_alias, s_alias, v1] }
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    group.bench_function("literal_assignment", |b| {
        let prog = literal_assignment_program();
        b.iter(|| black_box(compile_source_file(&prog).expect("compiles")));
    });
    group.bench_function("distributive_conditional", |b| {
        let prog = distributive_conditional_program();
        b.iter(|| black_box(compile_source_file(&prog).expect("compiles")));
    });
    group.bench_function("tuple_and_template", |b| {
        let prog = tuple_and_template_program();
        b.iter(|| black_box(compile_source_file(&prog).expect("compiles")));
    });
    group.finish();
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    group.bench_function("literal_assignment", |b| {
        let prog = literal_assignment_program();
        b.iter(|| {
            let mut module = compile_source_file(&prog).expect("compiles");
            let mut vm = Vm::new();
            vm.run(&mut module).expect("runs");
            black_box(module.diagnostics().len())
        });
    });
    group.bench_function("distributive_conditional", |b| {
        let prog = distributive_conditional_program();
        b.iter(|| {
            let mut module = compile_source_file(&prog).expect("compiles");
            let mut vm = Vm::new();
            vm.run(&mut module).expect("runs");
            black_box(module.diagnostics().len())
        });
    });
    group.bench_function("tuple_and_template", |b| {
        let prog = tuple_and_template_program();
        b.iter(|| {
            let mut module = compile_source_file(&prog).expect("compiles");
            let mut vm = Vm::new();
            vm.run(&mut module).expect("runs");
            black_box(module.diagnostics().len())
        });
    });
    group.finish();
}

/// The `clear`/rerun cycle a long-lived language-service process drives on
/// every keystroke: same module, repeated runs, pool returned to zero
/// between each.
fn bench_clear_and_rerun(c: &mut Criterion) {
    let prog = distributive_conditional_program();
    let mut module = compile_source_file(&prog).expect("compiles");
    let mut vm = Vm::new();

    c.bench_function("clear_and_rerun_distributive_conditional", |b| {
        b.iter(|| {
            vm.run(&mut module).expect("runs");
            black_box(module.diagnostics().len());
            vm.clear(&mut module);
        });
    });
}

criterion_group!(vm_benches, bench_compile, bench_run, bench_clear_and_rerun);
criterion_main!(vm_benches);
