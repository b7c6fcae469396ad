//! Diagnostic types and message lookup for the type checker.
//!
//! Failures inside the constraint solver never panic and never carry their
//! own formatting; they push entries into an optional [`DiagSink`] and
//! surface as boolean `false` results. Message templates use `{0}`, `{1}`,
//! etc. placeholders filled by [`format_message`].

use serde::Serialize;

// =============================================================================
// Diagnostic codes
// =============================================================================

/// Numeric diagnostic codes for solver failures.
pub mod diagnostic_codes {
    /// Source type incompatible with a type variable's current bounds.
    pub const ASSIGNMENT_MISMATCH: u32 = 9001;
    /// Candidate type violates the variable's declared bound.
    pub const BOUND_VIOLATION: u32 = 9002;
    /// No single value constraint covers the source type.
    pub const CONSTRAINED_MISMATCH: u32 = 9003;
    /// ParamSpec target incompatible with the incoming signature.
    pub const PARAM_SPEC_MISMATCH: u32 = 9004;
    /// Protocol member absent from the candidate type.
    pub const PROTOCOL_MEMBER_MISSING: u32 = 9010;
    /// Protocol member present but type-incompatible.
    pub const PROTOCOL_MEMBER_TYPE_MISMATCH: u32 = 9011;
    /// Mutable protocol member requires an invariant match.
    pub const PROTOCOL_MEMBER_INVARIANCE: u32 = 9012;
    /// Member is Final in the protocol but not in the candidate.
    pub const PROTOCOL_MEMBER_FINAL_NOT_IN: u32 = 9013;
    /// Member is Final in the candidate but not in the protocol.
    pub const PROTOCOL_MEMBER_FINAL_IN: u32 = 9014;
    /// ClassVar-ness of a member disagrees with the candidate's role.
    pub const PROTOCOL_MEMBER_CLASS_VAR_MISMATCH: u32 = 9015;
    /// Writable protocol member backed by a read-only candidate member.
    pub const PROTOCOL_MEMBER_WRITABILITY: u32 = 9016;
    /// Property accessor missing or incompatible.
    pub const PROPERTY_ACCESSOR_MISMATCH: u32 = 9017;
}

/// Message templates for solver failures.
pub mod diagnostic_messages {
    pub const ASSIGNMENT_MISMATCH: &str =
        "Type \"{0}\" is not assignable to type variable \"{1}\"";
    pub const BOUND_VIOLATION: &str =
        "Type \"{0}\" is not assignable to the bound \"{1}\" of type variable \"{2}\"";
    pub const CONSTRAINED_MISMATCH: &str =
        "Type \"{0}\" is not compatible with the constraints of type variable \"{1}\"";
    pub const PARAM_SPEC_MISMATCH: &str =
        "Parameter specification \"{0}\" is not compatible with \"{1}\"";
    pub const PROTOCOL_MEMBER_MISSING: &str = "\"{0}\" is not present";
    pub const PROTOCOL_MEMBER_TYPE_MISMATCH: &str =
        "\"{0}\" is an incompatible type: \"{1}\" is not assignable to \"{2}\"";
    pub const PROTOCOL_MEMBER_INVARIANCE: &str =
        "\"{0}\" is mutable and its type \"{1}\" must match \"{2}\" exactly";
    pub const PROTOCOL_MEMBER_FINAL_NOT_IN: &str = "\"{0}\" is marked Final in the protocol";
    pub const PROTOCOL_MEMBER_FINAL_IN: &str = "\"{0}\" is marked Final in the implementation";
    pub const PROTOCOL_MEMBER_CLASS_VAR_MISMATCH: &str =
        "\"{0}\" is a ClassVar in the protocol but not in the implementation";
    pub const PROTOCOL_MEMBER_WRITABILITY: &str =
        "\"{0}\" is writable in the protocol but read-only in the implementation";
    pub const PROPERTY_ACCESSOR_MISMATCH: &str = "property accessor \"{0}\" is incompatible";
}

// =============================================================================
// Diagnostic types
// =============================================================================

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Message = 2,
}

/// One recorded failure, with optional nested detail entries.
///
/// Nested entries mirror the structure of the failure: a protocol mismatch
/// carries one nested entry per incompatible member.
#[derive(Clone, Debug, Serialize)]
pub struct Diag {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message_text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<Diag>,
}

impl Diag {
    #[must_use]
    pub const fn error(code: u32, message: String) -> Self {
        Diag {
            code,
            category: DiagnosticCategory::Error,
            message_text: message,
            related: Vec::new(),
        }
    }

    /// Attach a nested detail entry.
    #[must_use]
    pub fn with_related(mut self, related: Diag) -> Self {
        self.related.push(related);
        self
    }
}

/// Accumulator handed down through solver calls.
///
/// Callers that only need the boolean verdict pass `None`; the solver
/// short-circuits formatting work when no sink is present.
#[derive(Debug, Default)]
pub struct DiagSink {
    entries: Vec<Diag>,
}

impl DiagSink {
    pub fn new() -> Self {
        DiagSink {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, diag: Diag) {
        self.entries.push(diag);
    }

    /// Record an error from a template and arguments.
    pub fn error(&mut self, code: u32, template: &str, args: &[&str]) {
        self.entries
            .push(Diag::error(code, format_message(template, args)));
    }

    pub fn entries(&self) -> &[Diag] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Move all entries out of the sink.
    pub fn take(&mut self) -> Vec<Diag> {
        std::mem::take(&mut self.entries)
    }
}

/// Format a diagnostic message by replacing {0}, {1}, etc. with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}
