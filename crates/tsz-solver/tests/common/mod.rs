//! Shared AST fixture builders for the integration suites.
//!
//! There is no parser in scope (spec §1), so every fixture here builds the
//! [`tsz_solver::ast`] tree directly -- these helpers exist only to keep
//! that construction readable, not to model real syntax.

#![allow(dead_code)]

use tsz_solver::ast::{
    Expression, FunctionParameter, Program, PropertySignatureNode, Span, Statement, TemplateLiteralSpan, TupleElement, TypeNode, TypeParameter,
};

pub fn fn_decl(pos: u32, end: u32, name: &str, type_parameters: Vec<TypeParameter>, parameters: Vec<FunctionParameter>, return_type: Option<TypeNode>) -> Statement {
    Statement::FunctionDeclaration { span: span(pos, end), name: name.to_string(), type_parameters, parameters, return_type }
}

pub fn span(pos: u32, end: u32) -> Span {
    Span { pos, end }
}

pub fn program(statements: Vec<Statement>) -> Program {
    Program { statements }
}

pub fn type_alias(pos: u32, end: u32, name: &str, type_parameters: Vec<TypeParameter>, value: TypeNode) -> Statement {
    Statement::TypeAlias { span: span(pos, end), name: name.to_string(), type_parameters, value }
}

pub fn var_stmt(pos: u32, end: u32, name: &str, declared_type: Option<TypeNode>, initializer: Expression) -> Statement {
    Statement::VariableStatement { span: span(pos, end), name: name.to_string(), declared_type, initializer }
}

pub fn type_param(name: &str, constraint: Option<TypeNode>, default: Option<TypeNode>) -> TypeParameter {
    TypeParameter { span: span(0, 0), name: name.to_string(), constraint, default }
}

pub fn fn_param(name: &str, declared_type: Option<TypeNode>, optional: bool) -> FunctionParameter {
    FunctionParameter { span: span(0, 0), name: name.to_string(), declared_type, optional }
}

// --- type nodes ----------------------------------------------------------

pub fn ty_string() -> TypeNode {
    TypeNode::StringKeyword { span: span(0, 0) }
}

pub fn ty_number() -> TypeNode {
    TypeNode::NumberKeyword { span: span(0, 0) }
}

pub fn ty_true() -> TypeNode {
    TypeNode::TrueLiteral { span: span(0, 0) }
}

pub fn ty_false() -> TypeNode {
    TypeNode::FalseLiteral { span: span(0, 0) }
}

pub fn ty_string_lit(value: &str) -> TypeNode {
    TypeNode::StringLiteral { span: span(0, 0), value: value.to_string() }
}

pub fn ty_number_lit(value: f64) -> TypeNode {
    TypeNode::NumberLiteral { span: span(0, 0), value }
}

pub fn ty_ref(name: &str, type_arguments: Vec<TypeNode>) -> TypeNode {
    TypeNode::TypeReference { span: span(0, 0), name: name.to_string(), type_arguments }
}

pub fn ty_union(members: Vec<TypeNode>) -> TypeNode {
    TypeNode::UnionType { span: span(0, 0), members }
}

pub fn tuple_element(value: TypeNode, optional: bool, rest: bool) -> TupleElement {
    TupleElement { span: span(0, 0), value, optional, rest }
}

pub fn ty_tuple(elements: Vec<TupleElement>) -> TypeNode {
    TypeNode::TupleType { span: span(0, 0), elements }
}

pub fn ty_array(element: TypeNode) -> TypeNode {
    TypeNode::ArrayType { span: span(0, 0), element: Box::new(element) }
}

pub fn property(name: &str, value: TypeNode, optional: bool, readonly: bool) -> PropertySignatureNode {
    PropertySignatureNode { span: span(0, 0), name: name.to_string(), value, optional, readonly }
}

pub fn ty_object(members: Vec<PropertySignatureNode>) -> TypeNode {
    TypeNode::ObjectLiteralType { span: span(0, 0), members }
}

pub fn ty_template(spans: Vec<TemplateLiteralSpan>) -> TypeNode {
    TypeNode::TemplateLiteralType { span: span(0, 0), spans }
}

pub fn ty_conditional(check: TypeNode, extends: TypeNode, true_type: TypeNode, false_type: TypeNode) -> TypeNode {
    TypeNode::ConditionalType {
        span: span(0, 0),
        check: Box::new(check),
        extends: Box::new(extends),
        true_type: Box::new(true_type),
        false_type: Box::new(false_type),
    }
}

pub fn ty_indexed_access(object: TypeNode, index: TypeNode) -> TypeNode {
    TypeNode::IndexedAccessType { span: span(0, 0), object: Box::new(object), index: Box::new(index) }
}

pub fn ty_rest(element: TypeNode) -> TypeNode {
    TypeNode::RestType { span: span(0, 0), element: Box::new(element) }
}

// --- expressions -----------------------------------------------------------

pub fn expr_string(pos: u32, end: u32, value: &str) -> Expression {
    Expression::StringLiteral { span: span(pos, end), value: value.to_string() }
}

pub fn expr_number(pos: u32, end: u32, value: f64) -> Expression {
    Expression::NumberLiteral { span: span(pos, end), value }
}

pub fn expr_true(pos: u32, end: u32) -> Expression {
    Expression::TrueLiteral { span: span(pos, end) }
}

pub fn expr_false(pos: u32, end: u32) -> Expression {
    Expression::FalseLiteral { span: span(pos, end) }
}

pub fn expr_array(pos: u32, end: u32, elements: Vec<Expression>) -> Expression {
    Expression::ArrayLiteral { span: span(pos, end), elements }
}

pub fn expr_identifier(pos: u32, end: u32, name: &str) -> Expression {
    Expression::Identifier { span: span(pos, end), name: name.to_string() }
}

pub fn expr_call(pos: u32, end: u32, callee: Expression, type_arguments: Vec<TypeNode>, arguments: Vec<Expression>) -> Expression {
    Expression::Call { span: span(pos, end), callee: Box::new(callee), type_arguments, arguments }
}
