//! Common types and utilities shared across the tsz crates.
//!
//! This crate provides foundational types used by both the compiler and the
//! virtual machine:
//! - Source spans (`Span`, `Spanned`, `SpanBuilder`, `ByteSpan`)
//! - Compiler/VM limits and thresholds
//! - Position/Range types for source locations (byte offset <-> line/column)
//! - Diagnostic message catalog

// Span - Source location tracking (byte offsets)
pub mod span;
pub use span::{ByteSpan, Span, SpanBuilder, Spanned};

// Centralized limits and thresholds
pub mod limits;

// Position/Range types for line/column source locations
pub mod position;
pub use position::{LineMap, Location, Position, Range, SourceLocation};

// Numeric literal parsing helpers
pub mod numeric;

// Diagnostic types and message catalog
pub mod diagnostics;
