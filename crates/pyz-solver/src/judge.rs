//! The judge: the solver's handle on the type system.
//!
//! A [`Judge`] bundles the type database, the ambient environment, the
//! per-worker protocol recursion stack, the protocol-compatibility cache,
//! and an optional cancellation token. The assignability relation, the
//! constraint recorder, the solver, expected-type seeding, and the protocol
//! matcher are all `impl Judge` methods, spread across their modules.

use std::cell::{Cell, RefCell};

use bitflags::bitflags;
use pyz_common::CancellationToken;

use crate::db::{TypeDatabase, TypeEnvironment};
use crate::protocol::ProtocolCompatCache;
use crate::types::{TypeId, TypeKey};

bitflags! {
    /// Flags steering one assignability obligation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AssignFlags: u32 {
        /// Require an exact (bidirectional) match.
        const INVARIANT = 1 << 0;
        /// The obligation updates upper bounds rather than lower bounds.
        const CONTRAVARIANT = 1 << 1;
        /// Seed bounds from an expected type without overwriting entries.
        const POPULATE_EXPECTED_TYPE = 1 << 2;
        /// During seeding, ignore `Unknown` sources.
        const SKIP_POPULATE_UNKNOWN_EXPECTED_TYPE = 1 << 3;
        /// Accept classes whose type arguments are implicit.
        const ALLOW_UNSPECIFIED_TYPE_ARGS = 1 << 4;
        /// Keep literal values in the solved type.
        const RETAIN_LITERALS_FOR_TYPE_VAR = 1 << 5;
        /// Overload-overlap checking: gradual types lose their wildcard role.
        const OVERLOAD_OVERLAP = 1 << 6;
        const PARTIAL_OVERLOAD_OVERLAP = 1 << 7;
        const SKIP_RETURN_TYPE_CHECK = 1 << 8;
    }
}

impl AssignFlags {
    /// Flags that persist into nested type-argument obligations.
    pub(crate) fn persistent(self) -> AssignFlags {
        self & (AssignFlags::POPULATE_EXPECTED_TYPE
            | AssignFlags::SKIP_POPULATE_UNKNOWN_EXPECTED_TYPE
            | AssignFlags::ALLOW_UNSPECIFIED_TYPE_ARGS
            | AssignFlags::RETAIN_LITERALS_FOR_TYPE_VAR
            | AssignFlags::OVERLOAD_OVERLAP
            | AssignFlags::PARTIAL_OVERLOAD_OVERLAP)
    }
}

/// Evaluator handle passed through every solver operation.
pub struct Judge<'a> {
    db: &'a dyn TypeDatabase,
    env: &'a TypeEnvironment,
    /// Active (protocol, candidate) pairs; breaks recursive protocols.
    pub(crate) protocol_stack: RefCell<Vec<(TypeId, TypeId)>>,
    pub(crate) compat_cache: ProtocolCompatCache,
    cancellation: Option<CancellationToken>,
    cancelled: Cell<bool>,
}

impl<'a> Judge<'a> {
    pub fn new(db: &'a dyn TypeDatabase, env: &'a TypeEnvironment) -> Self {
        Judge {
            db,
            env,
            protocol_stack: RefCell::new(Vec::new()),
            compat_cache: ProtocolCompatCache::new(),
            cancellation: None,
            cancelled: Cell::new(false),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn db(&self) -> &'a dyn TypeDatabase {
        self.db
    }

    pub fn env(&self) -> &'a TypeEnvironment {
        self.env
    }

    /// Poll the cancellation token. Once observed, the flag is sticky so
    /// callers can discard partial state after the unwind.
    pub(crate) fn check_cancelled(&self) -> bool {
        if self.cancelled.get() {
            return true;
        }
        if let Some(token) = &self.cancellation {
            if token.is_cancelled() {
                self.cancelled.set(true);
                return true;
            }
        }
        false
    }

    /// Did a cancellation unwind occur? Results observed after a `true`
    /// here must be discarded.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Drop the compatibility cache entries involving `class_ty`; must be
    /// called when a class's declarations are mutated by reanalysis.
    pub fn invalidate_protocol_cache(&self, class_ty: TypeId) {
        self.compat_cache.invalidate(self.db, class_ty);
    }

    /// Unwrap lazy `Ref` indirections, bounded.
    pub(crate) fn resolve_ref(&self, ty: TypeId) -> TypeId {
        let mut current = ty;
        for _ in 0..8 {
            match self.db.lookup(current) {
                Some(TypeKey::Ref(def)) => match self.env.resolve_def(def) {
                    Some(resolved) if resolved != current => current = resolved,
                    _ => return TypeId::UNKNOWN,
                },
                _ => return current,
            }
        }
        current
    }

    /// Convenience wrapper: plain assignability with no recording.
    pub fn is_subtype(&self, dest: TypeId, src: TypeId) -> bool {
        self.assign_type(dest, src, None, None, AssignFlags::empty(), 0)
    }
}
