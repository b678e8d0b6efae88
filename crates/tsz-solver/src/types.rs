//! The type graph: [`Type`] nodes linked by [`TypeRef`] chains.
//!
//! Both are pool-allocated (see [`crate::pool`]) and reference-counted via
//! `users`; nothing here owns memory directly, everything is an index into
//! a [`crate::vm::TypeArena`].

use bitflags::bitflags;

/// Index of a [`Type`] inside a [`crate::pool::Pool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Index of a [`TypeRef`] inside its own pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRefId(pub u32);

/// The kind of a type node. See spec §3 for the full catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Unknown,
    Never,
    Any,
    Null,
    Undefined,
    String,
    Number,
    BigInt,
    Boolean,
    Symbol,
    Literal,
    PropertySignature,
    ObjectLiteral,
    Union,
    Array,
    Rest,
    Tuple,
    TupleMember,
    TemplateLiteral,
    Parameter,
    Function,
    FunctionRef,
    Class,
    ClassInstance,
    IndexSignature,
    Method,
}

bitflags! {
    /// Per-`Type` flag bits. Several flags are mutually informative rather
    /// than mutually exclusive: a `Literal` type additionally carries one of
    /// `STRING_LITERAL` / `NUMBER_LITERAL` / `BOOLEAN_LITERAL` / `BIGINT_LITERAL`
    /// so `extends` can dispatch on the literal's primitive family without a
    /// second match on `text`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TypeFlags: u16 {
        const READONLY             = 1 << 0;
        const OPTIONAL             = 1 << 1;
        const STRING_LITERAL       = 1 << 2;
        const NUMBER_LITERAL       = 1 << 3;
        const BOOLEAN_LITERAL      = 1 << 4;
        const BIGINT_LITERAL       = 1 << 5;
        const TRUE                 = 1 << 6;
        const FALSE                = 1 << 7;
        const STORED               = 1 << 8;
        const REST_REUSE           = 1 << 9;
        const UNPROVIDED_ARGUMENT  = 1 << 10;
    }
}

/// The owned-child slot of a compound [`Type`].
///
/// Most kinds own either nothing, a single child (`Array`'s element,
/// `Rest`'s operand, ...), or a chain of [`TypeRef`] cells (`Union`'s
/// members, `ObjectLiteral`'s properties, ...). Modeling this as an enum
/// rather than always allocating a chain keeps single-child kinds from
/// paying for a TypeRef cell they never needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Children {
    None,
    Single(TypeId),
    Chain(Option<TypeRefId>),
}

/// A node in the type graph.
#[derive(Clone, Debug)]
pub struct Type {
    pub kind: Kind,
    pub flags: TypeFlags,
    pub hash: u64,
    pub text: Option<Box<str>>,
    /// Bytecode position at which this type was produced, used to attach
    /// diagnostics to a source location via the module's source map.
    pub ip: u32,
    pub children: Children,
    pub users: u32,
}

impl Type {
    #[must_use]
    pub fn atomic(kind: Kind, flags: TypeFlags, hash: u64, ip: u32) -> Self {
        Type {
            kind,
            flags,
            hash,
            text: None,
            ip,
            children: Children::None,
            users: 0,
        }
    }

    #[must_use]
    pub fn with_single_child(
        kind: Kind,
        flags: TypeFlags,
        hash: u64,
        ip: u32,
        child: TypeId,
    ) -> Self {
        Type {
            kind,
            flags,
            hash,
            text: None,
            ip,
            children: Children::Single(child),
            users: 0,
        }
    }

    #[must_use]
    pub fn with_chain(kind: Kind, flags: TypeFlags, hash: u64, ip: u32, head: Option<TypeRefId>) -> Self {
        Type {
            kind,
            flags,
            hash,
            text: None,
            ip,
            children: Children::Chain(head),
            users: 0,
        }
    }

    #[must_use]
    pub fn single_child(&self) -> Option<TypeId> {
        match self.children {
            Children::Single(id) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn chain_head(&self) -> Option<TypeRefId> {
        match self.children {
            Children::Chain(head) => head,
            _ => None,
        }
    }

    #[must_use]
    pub fn is_literal_string(&self) -> bool {
        self.kind == Kind::Literal && self.flags.contains(TypeFlags::STRING_LITERAL)
    }

    #[must_use]
    pub fn is_literal_number(&self) -> bool {
        self.kind == Kind::Literal && self.flags.contains(TypeFlags::NUMBER_LITERAL)
    }

    #[must_use]
    pub fn is_literal_boolean(&self) -> bool {
        self.kind == Kind::Literal
            && (self.flags.contains(TypeFlags::TRUE) || self.flags.contains(TypeFlags::FALSE))
    }

    #[must_use]
    pub fn is_literal_bigint(&self) -> bool {
        self.kind == Kind::Literal && self.flags.contains(TypeFlags::BIGINT_LITERAL)
    }
}

/// A reference cell linking [`Type`]s into a chain.
///
/// `TypeRef` is itself pool-allocated and independently user-counted: a
/// chain is released one cell at a time, each cell's release dropping one
/// user off its `target` and enqueuing its `next` cell for release in turn.
#[derive(Clone, Copy, Debug)]
pub struct TypeRef {
    pub target: TypeId,
    pub next: Option<TypeRefId>,
    pub users: u32,
}

impl TypeRef {
    #[must_use]
    pub fn new(target: TypeId, next: Option<TypeRefId>) -> Self {
        TypeRef {
            target,
            next,
            users: 0,
        }
    }
}
