//! Centralized limits and thresholds for the bytecode compiler and VM.
//!
//! Recursion limits and capacity bounds live here rather than scattered at
//! call sites so they can be tuned from one place and so the rationale for
//! each value is documented once. Every constant below is reachable from
//! either `tsz-solver`'s compiler (walking the AST) or its VM (walking the
//! bytecode, the call stack, or the type graph).

/// Maximum depth of the compiler's recursive descent over a `TypeNode` or
/// `Expression` tree.
///
/// A deeply nested union/conditional/tuple literal is the only way a
/// malicious or generated source file can blow the compiler's native stack
/// before a single opcode is emitted; this bounds that recursion instead of
/// letting it run until the process stack overflows.
///
/// # Example
///
/// ```typescript
/// type Nested = [1, [2, [3, [4, /* ... hundreds of levels ... */]]]];
/// ```
pub const MAX_AST_DEPTH: u32 = 500;

/// Maximum depth of the VM's active-subroutine stack.
///
/// A subroutine that calls itself (directly or through a chain of type
/// aliases) without ever reaching a non-recursive branch would otherwise
/// grow this stack without bound. Exceeded depth is a VM invariant
/// violation (`VmError`), not a recoverable diagnostic -- spec §7 taxonomy 3.
///
/// # Example
///
/// ```typescript
/// type Forever<T> = Forever<T>; // every Call recurses into itself
/// ```
pub const MAX_CALL_DEPTH: u32 = 512;

/// Maximum recursion depth of the `extends` relation (spec §4.7).
///
/// `extends` recurses once per compound member (union arm, tuple element,
/// object property); a cyclic or very deep type graph is bounded here
/// rather than by the native call stack so the failure mode is a
/// `VmError`, not a segfault.
pub const MAX_EXTENDS_DEPTH: u32 = 256;

/// Maximum number of union members a single `Distribute` loop will iterate
/// (spec §4.6, "Distribute").
///
/// Bounds the cost of a distributive conditional over a union synthesized
/// from a combinatorial source (e.g. a long template literal union)
/// rather than letting one subroutine call iterate unboundedly.
pub const MAX_DISTRIBUTION_SIZE: usize = 10_000;

/// Cap on the cartesian product size when realizing a `TemplateLiteral`
/// whose segments include union-typed placeholders (spec §9, open
/// question: `handleTemplateLiteral`).
///
/// `` `${'a'|'b'}-${'c'|'d'|'e'}` `` expands to 6 literal members; this
/// bounds how large that expansion is allowed to grow before the VM stops
/// distributing and keeps the placeholder widened instead.
pub const TEMPLATE_LITERAL_EXPANSION_LIMIT: usize = 2_000;

/// Flush the GC queue once it holds this many pending releases.
///
/// Shared with [`crate`]'s consumers as the canonical default; `tsz-solver`'s
/// pool keeps its own copy in `pool.rs` sized for its own test fixtures, but
/// production callers constructing a `TypeArena` with a custom bound should
/// start from this value.
pub const GC_QUEUE_BOUND: usize = 1024;
