//! The input AST shape the compiler consumes (spec §6, "Compiler entry").
//!
//! The parser front-end that produces this tree is out of scope; this
//! module only fixes the wire shape so fixtures and tests can build one
//! directly from JSON via `serde`. Every node carries a `pos`/`end` byte
//! range into the original source, threaded through to the compiled
//! module's source map.

use serde::{Deserialize, Serialize};

pub type NodeId = u32;

/// A full parsed source file: a flat list of top-level statements.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    pub pos: u32,
    pub end: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Statement {
    /// `type Name<Params> = TypeNode;`
    TypeAlias {
        span: Span,
        name: String,
        type_parameters: Vec<TypeParameter>,
        value: TypeNode,
    },
    /// `const name: TypeNode = Expression;` (also covers `let`/`var`).
    VariableStatement {
        span: Span,
        name: String,
        declared_type: Option<TypeNode>,
        initializer: Expression,
    },
    /// `function name<Params>(params): ReturnType { ... }` -- only the type
    /// signature is modeled; function bodies are out of scope.
    FunctionDeclaration {
        span: Span,
        name: String,
        type_parameters: Vec<TypeParameter>,
        parameters: Vec<FunctionParameter>,
        return_type: Option<TypeNode>,
    },
}

impl Statement {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Statement::TypeAlias { span, .. }
            | Statement::VariableStatement { span, .. }
            | Statement::FunctionDeclaration { span, .. } => *span,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeParameter {
    pub span: Span,
    pub name: String,
    pub constraint: Option<TypeNode>,
    pub default: Option<TypeNode>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub span: Span,
    pub name: String,
    pub declared_type: Option<TypeNode>,
    pub optional: bool,
}

/// A type-position node.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TypeNode {
    AnyKeyword { span: Span },
    UnknownKeyword { span: Span },
    NeverKeyword { span: Span },
    NullKeyword { span: Span },
    UndefinedKeyword { span: Span },
    StringKeyword { span: Span },
    NumberKeyword { span: Span },
    BooleanKeyword { span: Span },
    BigIntKeyword { span: Span },
    SymbolKeyword { span: Span },

    StringLiteral { span: Span, value: String },
    NumberLiteral { span: Span, value: f64 },
    BigIntLiteral { span: Span, value: String },
    TrueLiteral { span: Span },
    FalseLiteral { span: Span },

    /// `Name<Arguments>` -- a reference to a type alias, a type parameter,
    /// or (with no arguments) a bare identifier.
    TypeReference {
        span: Span,
        name: String,
        type_arguments: Vec<TypeNode>,
    },

    UnionType { span: Span, members: Vec<TypeNode> },
    TupleType { span: Span, elements: Vec<TupleElement> },
    ArrayType { span: Span, element: Box<TypeNode> },
    ObjectLiteralType { span: Span, members: Vec<PropertySignatureNode> },
    TemplateLiteralType { span: Span, spans: Vec<TemplateLiteralSpan> },

    /// `CheckType extends ExtendsType ? TrueType : FalseType`.
    ConditionalType {
        span: Span,
        check: Box<TypeNode>,
        extends: Box<TypeNode>,
        true_type: Box<TypeNode>,
        false_type: Box<TypeNode>,
    },

    /// `Target['key']` -- only `Tuple['length']` is implemented (spec §9,
    /// open questions); other combinations resolve to `Never`.
    IndexedAccessType {
        span: Span,
        object: Box<TypeNode>,
        index: Box<TypeNode>,
    },

    RestType { span: Span, element: Box<TypeNode> },
}

impl TypeNode {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            TypeNode::AnyKeyword { span }
            | TypeNode::UnknownKeyword { span }
            | TypeNode::NeverKeyword { span }
            | TypeNode::NullKeyword { span }
            | TypeNode::UndefinedKeyword { span }
            | TypeNode::StringKeyword { span }
            | TypeNode::NumberKeyword { span }
            | TypeNode::BooleanKeyword { span }
            | TypeNode::BigIntKeyword { span }
            | TypeNode::SymbolKeyword { span }
            | TypeNode::StringLiteral { span, .. }
            | TypeNode::NumberLiteral { span, .. }
            | TypeNode::BigIntLiteral { span, .. }
            | TypeNode::TrueLiteral { span }
            | TypeNode::FalseLiteral { span }
            | TypeNode::TypeReference { span, .. }
            | TypeNode::UnionType { span, .. }
            | TypeNode::TupleType { span, .. }
            | TypeNode::ArrayType { span, .. }
            | TypeNode::ObjectLiteralType { span, .. }
            | TypeNode::TemplateLiteralType { span, .. }
            | TypeNode::ConditionalType { span, .. }
            | TypeNode::IndexedAccessType { span, .. }
            | TypeNode::RestType { span, .. } => *span,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TupleElement {
    pub span: Span,
    pub value: TypeNode,
    pub optional: bool,
    /// `...Rest` spread element.
    pub rest: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropertySignatureNode {
    pub span: Span,
    pub name: String,
    pub value: TypeNode,
    pub optional: bool,
    pub readonly: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TemplateLiteralSpan {
    Text(String),
    Type(TypeNode),
}

/// A value-position expression. Only what's needed to type an initializer
/// is modeled -- this is not a general expression language.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expression {
    StringLiteral { span: Span, value: String },
    NumberLiteral { span: Span, value: f64 },
    BigIntLiteral { span: Span, value: String },
    TrueLiteral { span: Span },
    FalseLiteral { span: Span },
    NullLiteral { span: Span },
    Identifier { span: Span, name: String },
    ArrayLiteral { span: Span, elements: Vec<Expression> },
    ObjectLiteral { span: Span, properties: Vec<(String, Expression)> },
    /// `callee<TypeArguments>(arguments)` -- a call in value position whose
    /// return type is computed by `CallExpression`.
    Call {
        span: Span,
        callee: Box<Expression>,
        type_arguments: Vec<TypeNode>,
        arguments: Vec<Expression>,
    },
}

impl Expression {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Expression::StringLiteral { span, .. }
            | Expression::NumberLiteral { span, .. }
            | Expression::BigIntLiteral { span, .. }
            | Expression::TrueLiteral { span }
            | Expression::FalseLiteral { span }
            | Expression::NullLiteral { span }
            | Expression::Identifier { span, .. }
            | Expression::ArrayLiteral { span, .. }
            | Expression::ObjectLiteral { span, .. }
            | Expression::Call { span, .. } => *span,
        }
    }
}
