//! Diagnostic message data for the structural type checker.
//!
//! Unlike a full TypeScript front-end, this checker only ever reports a
//! small, closed set of diagnostics: the compiler's `Error` opcode rejects
//! an unresolved reference or an unsupported construct before a single byte
//! of bytecode is emitted for it, and the VM's `Assign` instruction reports
//! structural assignability failures. Every code below is reachable from
//! one of those two call sites.

use super::DiagnosticCategory;
use super::DiagnosticMessage;

/// All diagnostic messages this checker can produce, keyed by code.
pub static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: 2300,
        category: DiagnosticCategory::Error,
        message: "Duplicate identifier '{0}'.",
    },
    DiagnosticMessage {
        code: 2304,
        category: DiagnosticCategory::Error,
        message: "Cannot find name '{0}'.",
    },
    DiagnosticMessage {
        code: 2314,
        category: DiagnosticCategory::Error,
        message: "Generic type '{0}' requires {1} type argument(s).",
    },
    DiagnosticMessage {
        code: 2315,
        category: DiagnosticCategory::Error,
        message: "Type '{0}' is not generic.",
    },
    DiagnosticMessage {
        code: 2322,
        category: DiagnosticCategory::Error,
        message: "Type '{0}' is not assignable to type '{1}'.",
    },
    DiagnosticMessage {
        code: 2339,
        category: DiagnosticCategory::Error,
        message: "Property '{0}' does not exist on type '{1}'.",
    },
    DiagnosticMessage {
        code: 2345,
        category: DiagnosticCategory::Error,
        message: "Argument of type '{0}' is not assignable to parameter of type '{1}'.",
    },
    DiagnosticMessage {
        code: 2349,
        category: DiagnosticCategory::Error,
        message: "This expression is not callable.",
    },
    DiagnosticMessage {
        code: 2355,
        category: DiagnosticCategory::Error,
        message: "A function whose declared type is neither 'void' nor 'any' must return a value.",
    },
    DiagnosticMessage {
        code: 2393,
        category: DiagnosticCategory::Error,
        message: "Duplicate function implementation.",
    },
    DiagnosticMessage {
        code: 2454,
        category: DiagnosticCategory::Error,
        message: "Variable '{0}' is used before being assigned.",
    },
    DiagnosticMessage {
        code: 2493,
        category: DiagnosticCategory::Error,
        message: "Tuple type '{0}' of length '{1}' has no element at index '{2}'.",
    },
    DiagnosticMessage {
        code: 2536,
        category: DiagnosticCategory::Error,
        message: "Type '{0}' cannot be used to index type '{1}'.",
    },
    DiagnosticMessage {
        code: 2559,
        category: DiagnosticCategory::Error,
        message: "Type '{0}' has no properties in common with type '{1}'.",
    },
    DiagnosticMessage {
        code: 2740,
        category: DiagnosticCategory::Error,
        message: "Type '{0}' is missing the following properties from type '{1}': {2}.",
    },
    DiagnosticMessage {
        code: 2741,
        category: DiagnosticCategory::Error,
        message: "Property '{0}' is missing in type '{1}' but required in type '{2}'.",
    },
    DiagnosticMessage {
        code: 9000,
        category: DiagnosticCategory::Error,
        message: "This construct is not supported by the compiler: {0}.",
    },
    DiagnosticMessage {
        code: 9001,
        category: DiagnosticCategory::Error,
        message: "Template literal type computation is not implemented for this segment shape.",
    },
    DiagnosticMessage {
        code: 9002,
        category: DiagnosticCategory::Error,
        message: "Class and class-instance type semantics are not implemented.",
    },
    DiagnosticMessage {
        code: 9003,
        category: DiagnosticCategory::Error,
        message: "Index access is only implemented for tuple '{0}length{1}'; this access falls back to 'never'.",
    },
    DiagnosticMessage {
        code: 9004,
        category: DiagnosticCategory::Warning,
        message: "Recursion depth exceeded while evaluating type '{0}'; result widened to 'any'.",
    },
];

/// Message text constants, one per diagnostic, named after the English template.
///
/// Mirrors the shape of `diagnostic_messages` catalogs generated from a
/// locale file: callers that want the raw template string without a lookup
/// can reference these directly instead of scanning `DIAGNOSTIC_MESSAGES`.
pub mod diagnostic_messages {
    pub const DUPLICATE_IDENTIFIER: &str = "Duplicate identifier '{0}'.";
    pub const CANNOT_FIND_NAME: &str = "Cannot find name '{0}'.";
    pub const GENERIC_TYPE_REQUIRES_TYPE_ARGUMENTS: &str =
        "Generic type '{0}' requires {1} type argument(s).";
    pub const TYPE_IS_NOT_GENERIC: &str = "Type '{0}' is not generic.";
    pub const TYPE_NOT_ASSIGNABLE: &str = "Type '{0}' is not assignable to type '{1}'.";
    pub const PROPERTY_DOES_NOT_EXIST: &str = "Property '{0}' does not exist on type '{1}'.";
    pub const ARGUMENT_NOT_ASSIGNABLE: &str =
        "Argument of type '{0}' is not assignable to parameter of type '{1}'.";
    pub const NOT_CALLABLE: &str = "This expression is not callable.";
    pub const MUST_RETURN_A_VALUE: &str =
        "A function whose declared type is neither 'void' nor 'any' must return a value.";
    pub const DUPLICATE_FUNCTION_IMPLEMENTATION: &str = "Duplicate function implementation.";
    pub const USED_BEFORE_BEING_ASSIGNED: &str = "Variable '{0}' is used before being assigned.";
    pub const TUPLE_HAS_NO_ELEMENT_AT_INDEX: &str =
        "Tuple type '{0}' of length '{1}' has no element at index '{2}'.";
    pub const CANNOT_BE_USED_TO_INDEX: &str = "Type '{0}' cannot be used to index type '{1}'.";
    pub const NO_PROPERTIES_IN_COMMON: &str =
        "Type '{0}' has no properties in common with type '{1}'.";
    pub const MISSING_PROPERTIES_FROM_TYPE: &str =
        "Type '{0}' is missing the following properties from type '{1}': {2}.";
    pub const PROPERTY_MISSING_BUT_REQUIRED: &str =
        "Property '{0}' is missing in type '{1}' but required in type '{2}'.";
    pub const CONSTRUCT_NOT_SUPPORTED: &str =
        "This construct is not supported by the compiler: {0}.";
    pub const TEMPLATE_LITERAL_NOT_IMPLEMENTED: &str =
        "Template literal type computation is not implemented for this segment shape.";
    pub const CLASS_SEMANTICS_NOT_IMPLEMENTED: &str =
        "Class and class-instance type semantics are not implemented.";
    pub const INDEX_ACCESS_FALLS_BACK_TO_NEVER: &str =
        "Index access is only implemented for tuple '{0}length{1}'; this access falls back to 'never'.";
    pub const RECURSION_DEPTH_EXCEEDED: &str =
        "Recursion depth exceeded while evaluating type '{0}'; result widened to 'any'.";
}

/// Numeric diagnostic codes, named after their message.
pub mod diagnostic_codes {
    pub const DUPLICATE_IDENTIFIER: u32 = 2300;
    pub const CANNOT_FIND_NAME: u32 = 2304;
    pub const GENERIC_TYPE_REQUIRES_TYPE_ARGUMENTS: u32 = 2314;
    pub const TYPE_IS_NOT_GENERIC: u32 = 2315;
    pub const TYPE_NOT_ASSIGNABLE: u32 = 2322;
    pub const PROPERTY_DOES_NOT_EXIST: u32 = 2339;
    pub const ARGUMENT_NOT_ASSIGNABLE: u32 = 2345;
    pub const NOT_CALLABLE: u32 = 2349;
    pub const MUST_RETURN_A_VALUE: u32 = 2355;
    pub const DUPLICATE_FUNCTION_IMPLEMENTATION: u32 = 2393;
    pub const USED_BEFORE_BEING_ASSIGNED: u32 = 2454;
    pub const TUPLE_HAS_NO_ELEMENT_AT_INDEX: u32 = 2493;
    pub const CANNOT_BE_USED_TO_INDEX: u32 = 2536;
    pub const NO_PROPERTIES_IN_COMMON: u32 = 2559;
    pub const MISSING_PROPERTIES_FROM_TYPE: u32 = 2740;
    pub const PROPERTY_MISSING_BUT_REQUIRED: u32 = 2741;
    pub const CONSTRUCT_NOT_SUPPORTED: u32 = 9000;
    pub const TEMPLATE_LITERAL_NOT_IMPLEMENTED: u32 = 9001;
    pub const CLASS_SEMANTICS_NOT_IMPLEMENTED: u32 = 9002;
    pub const INDEX_ACCESS_FALLS_BACK_TO_NEVER: u32 = 9003;
    pub const RECURSION_DEPTH_EXCEEDED: u32 = 9004;
}
