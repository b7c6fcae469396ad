//! Structural (protocol) subtyping.
//!
//! A protocol destination is matched member-by-member against a candidate
//! class or module. The walk drives the constraint recorder so a generic
//! protocol's type parameters are inferred from the members that satisfy
//! it, then bridged back into the caller's tracker. Results are memoized in
//! a per-judge compatibility cache keyed by generic-class identity.

use dashmap::DashMap;
use pyz_common::DiagSink;
use pyz_common::diagnostics::{diagnostic_codes, diagnostic_messages};
use pyz_common::limits::MAX_PROTOCOL_COMPAT_CACHE_ENTRIES;
use pyz_common::Atom;
use tracing::trace;

use crate::constraints::ConstraintTracker;
use crate::db::TypeDatabase;
use crate::equality::are_types_identical;
use crate::instantiate::convert_to_instance;
use crate::judge::{AssignFlags, Judge};
use crate::printer::print_type;
use crate::solver::SolveOptions;
use crate::types::{
    ClassFlags, MemberFlags, TypeId, TypeKey, TypeVarKey,
};

// =============================================================================
// Compatibility cache
// =============================================================================

/// Snapshot of the caller tracker's main-set bounds at match entry.
type PreConstraints = Vec<(TypeVarKey, Option<TypeId>, Option<TypeId>)>;

#[derive(Clone, Debug)]
pub(crate) struct ProtocolCompatEntry {
    dest_type: TypeId,
    /// `None` marks "this destination rejects this source regardless of
    /// specialization".
    src_type: Option<TypeId>,
    flags: AssignFlags,
    pre_constraints: Option<PreConstraints>,
    is_compatible: bool,
}

/// Per-judge memo of protocol compatibility results, keyed by the source
/// and destination generic-class identities.
pub(crate) struct ProtocolCompatCache {
    map: DashMap<(Atom, Atom), Vec<ProtocolCompatEntry>>,
}

impl ProtocolCompatCache {
    pub(crate) fn new() -> Self {
        ProtocolCompatCache {
            map: DashMap::new(),
        }
    }

    fn lookup(
        &self,
        key: (Atom, Atom),
        dest: TypeId,
        src: TypeId,
        flags: AssignFlags,
        pre: &Option<PreConstraints>,
    ) -> Option<bool> {
        let entries = self.map.get(&key)?;
        for entry in entries.iter() {
            match entry.src_type {
                Some(cached_src) => {
                    if cached_src == src
                        && entry.dest_type == dest
                        && entry.flags == flags
                        && entry.pre_constraints == *pre
                    {
                        return Some(entry.is_compatible);
                    }
                }
                // Always-incompatible shortcut: matches any specialization.
                None => return Some(false),
            }
        }
        None
    }

    fn store(&self, key: (Atom, Atom), entry: ProtocolCompatEntry) {
        let mut entries = self.map.entry(key).or_default();
        if entries.len() >= MAX_PROTOCOL_COMPAT_CACHE_ENTRIES {
            entries.remove(0);
        }
        entries.push(entry);
    }

    /// Drop every entry involving the class, in either role.
    pub(crate) fn invalidate(&self, db: &dyn TypeDatabase, class_ty: TypeId) {
        let Some(shape) = db.class_of(class_ty) else {
            return;
        };
        let name = shape.full_name;
        self.map.retain(|(src, dest), _| *src != name && *dest != name);
    }
}

// =============================================================================
// Protocol matching
// =============================================================================

impl<'a> Judge<'a> {
    /// Does `src` structurally satisfy the protocol class `protocol`?
    pub fn assign_class_to_protocol(
        &self,
        protocol: TypeId,
        src: TypeId,
        mut tracker: Option<&mut ConstraintTracker>,
        mut diag: Option<&mut DiagSink>,
        flags: AssignFlags,
    ) -> bool {
        if self.check_cancelled() {
            return false;
        }
        let db = self.db();
        let Some(protocol_shape) = db.class_of(protocol) else {
            return false;
        };
        let Some(src_shape) = db.class_of(src) else {
            return false;
        };

        // Literals never change protocol matching; cache on the stripped form.
        let src = if src_shape.literal.is_some() {
            let mut stripped = (*src_shape).clone();
            stripped.literal = None;
            db.class(stripped)
        } else {
            src
        };

        if flags.contains(AssignFlags::INVARIANT) {
            return are_types_identical(db, protocol, src);
        }

        // Recursive protocols succeed at the back-edge.
        if self
            .protocol_stack
            .borrow()
            .iter()
            .any(|&(p, s)| p == protocol && s == src)
        {
            return true;
        }

        let src_full = db.class_of(src).expect("class key").full_name;
        let cache_key = (src_full, protocol_shape.full_name);
        // The cache carries no inferred bindings, so a generic protocol
        // being actively solved bypasses it.
        let cacheable = protocol_shape.type_params.is_empty() || tracker.is_none();
        let pre = tracker
            .as_deref()
            .map(|t| snapshot_constraints(t));
        if cacheable {
            if let Some(hit) = self.compat_cache.lookup(cache_key, protocol, src, flags, &pre) {
                if !hit && diag.is_none() {
                    return false;
                }
                if hit {
                    return true;
                }
                // Negative with a diagnostic request: fall through and
                // re-run so the sink gets the member detail.
            }
        }

        self.protocol_stack.borrow_mut().push((protocol, src));
        let result = self.protocol_match_inner(
            protocol,
            src,
            tracker.as_deref_mut(),
            diag.as_deref_mut(),
            flags,
        );
        self.protocol_stack.borrow_mut().pop();

        if cacheable {
            self.compat_cache.store(
                cache_key,
                ProtocolCompatEntry {
                    dest_type: protocol,
                    src_type: Some(src),
                    flags,
                    pre_constraints: pre,
                    is_compatible: result,
                },
            );
            if !result {
                // If even the self-specialized generic forms are
                // incompatible, no specialization can ever match.
                let generic_protocol = generic_form(db, protocol);
                let generic_src = generic_form(db, src);
                if (generic_protocol != protocol || generic_src != src)
                    && !self.assign_class_to_protocol(
                        generic_protocol,
                        generic_src,
                        None,
                        None,
                        flags,
                    )
                {
                    self.compat_cache.store(
                        cache_key,
                        ProtocolCompatEntry {
                            dest_type: generic_protocol,
                            src_type: None,
                            flags,
                            pre_constraints: None,
                            is_compatible: false,
                        },
                    );
                }
            }
        }
        result
    }

    /// Does `module` structurally satisfy the protocol class `protocol`?
    pub fn assign_module_to_protocol(
        &self,
        protocol: TypeId,
        module: TypeId,
        tracker: Option<&mut ConstraintTracker>,
        diag: Option<&mut DiagSink>,
        flags: AssignFlags,
    ) -> bool {
        if self.check_cancelled() {
            return false;
        }
        let db = self.db();
        if db.class_of(protocol).is_none() {
            return false;
        }
        if !matches!(db.lookup(module), Some(TypeKey::Module(_))) {
            return false;
        }
        self.protocol_stack.borrow_mut().push((protocol, module));
        let result = self.protocol_match_inner(protocol, module, tracker, diag, flags);
        self.protocol_stack.borrow_mut().pop();
        result
    }

    fn protocol_match_inner(
        &self,
        protocol: TypeId,
        src: TypeId,
        mut tracker: Option<&mut ConstraintTracker>,
        mut diag: Option<&mut DiagSink>,
        flags: AssignFlags,
    ) -> bool {
        let db = self.db();
        let protocol_shape = db.class_of(protocol).expect("class key");

        // Accumulate the protocol's own type-parameter bindings here. The
        // protocol tracker also solves the caller's scopes: a specialized
        // protocol's members mention the caller's variables directly.
        let mut protocol_tracker = ConstraintTracker::new();
        for &param in &protocol_shape.type_params {
            if let Some(scope) = db.type_var_of(param).and_then(|v| v.scope_id) {
                protocol_tracker.add_solve_scope(scope);
            }
        }
        if let Some(caller) = tracker.as_deref() {
            for &scope in caller.solve_scopes() {
                protocol_tracker.add_solve_scope(scope);
            }
        }

        let src_is_class_object = db
            .class_of(src)
            .is_some_and(|s| s.is_instantiable());

        // Walk the protocol and its protocol bases, leaves first.
        let mut chain: Vec<TypeId> = vec![protocol];
        for &base in &protocol_shape.mro {
            let base = self.resolve_ref(base);
            if db.class_of(base).is_some_and(|b| b.is_protocol()) {
                chain.push(base);
            }
        }

        let mut checked: Vec<Atom> = Vec::new();
        for &chain_class in &chain {
            if self.check_cancelled() {
                return false;
            }
            let Some(chain_shape) = db.class_of(chain_class) else {
                continue;
            };
            for member in chain_shape.members.clone() {
                if checked.contains(&member.name) {
                    continue;
                }
                checked.push(member.name);
                let member_name = db.resolve_atom(member.name);
                if member_name == "__slots__" {
                    continue;
                }
                if member_name == "__class_getitem__" && !src_is_class_object {
                    continue;
                }
                if !self.match_protocol_member(
                    protocol,
                    src,
                    &member,
                    src_is_class_object,
                    &mut protocol_tracker,
                    diag.as_deref_mut(),
                ) {
                    return false;
                }
            }
        }

        // Bridge the inferred bindings back to the caller: the protocol's
        // own parameters flow through its explicit type arguments, and any
        // caller-scope entries (picked up from a specialized protocol's
        // members) are handed over directly.
        if !protocol_shape.type_params.is_empty() {
            if let Some(args) = &protocol_shape.type_args {
                let solution = self.solve_constraints(&protocol_tracker, SolveOptions::default());
                let solution = solution.main_set();
                for (index, &param) in protocol_shape.type_params.iter().enumerate() {
                    let Some(var) = db.type_var_of(param) else {
                        continue;
                    };
                    let Some(resolved) = solution.resolve(TypeVarKey::of(&var)) else {
                        continue;
                    };
                    let Some(&arg) = args.get(index) else {
                        continue;
                    };
                    if !self.assign_type(
                        arg,
                        resolved,
                        diag.as_deref_mut(),
                        tracker.as_deref_mut(),
                        flags.persistent(),
                        0,
                    ) {
                        return false;
                    }
                }
            }
        }
        if let Some(caller) = tracker.as_deref_mut() {
            let entries: Vec<_> = protocol_tracker
                .main_set()
                .entries()
                .filter(|(key, _)| caller.is_solving_scope(key.scope))
                .map(|(key, entry)| (*key, entry.clone()))
                .collect();
            for (key, entry) in entries {
                for set in caller.sets_mut() {
                    set.record(key, entry.clone());
                }
            }
        }
        true
    }

    fn match_protocol_member(
        &self,
        protocol: TypeId,
        src: TypeId,
        member: &crate::types::ClassMember,
        src_is_class_object: bool,
        protocol_tracker: &mut ConstraintTracker,
        mut diag: Option<&mut DiagSink>,
    ) -> bool {
        let db = self.db();
        let member_name = db.resolve_atom(member.name);

        let Some((src_member_ty, src_member_flags)) =
            self.lookup_member(src, member.name, src_is_class_object)
        else {
            if let Some(sink) = diag {
                sink.error(
                    diagnostic_codes::PROTOCOL_MEMBER_MISSING,
                    diagnostic_messages::PROTOCOL_MEMBER_MISSING,
                    &[&member_name],
                );
            }
            trace!(member = %member_name, "protocol member missing");
            return false;
        };

        // Final-ness must agree.
        if member.flags.contains(MemberFlags::FINAL) != src_member_flags.contains(MemberFlags::FINAL)
        {
            if let Some(sink) = diag {
                let (code, template) = if member.flags.contains(MemberFlags::FINAL) {
                    (
                        diagnostic_codes::PROTOCOL_MEMBER_FINAL_NOT_IN,
                        diagnostic_messages::PROTOCOL_MEMBER_FINAL_NOT_IN,
                    )
                } else {
                    (
                        diagnostic_codes::PROTOCOL_MEMBER_FINAL_IN,
                        diagnostic_messages::PROTOCOL_MEMBER_FINAL_IN,
                    )
                };
                sink.error(code, template, &[&member_name]);
            }
            return false;
        }

        // A ClassVar in the protocol needs a ClassVar in an instance
        // candidate.
        if member.flags.contains(MemberFlags::CLASS_VAR)
            && !src_member_flags.contains(MemberFlags::CLASS_VAR)
            && !src_is_class_object
        {
            if let Some(sink) = diag {
                sink.error(
                    diagnostic_codes::PROTOCOL_MEMBER_CLASS_VAR_MISMATCH,
                    diagnostic_messages::PROTOCOL_MEMBER_CLASS_VAR_MISMATCH,
                    &[&member_name],
                );
            }
            return false;
        }

        // Substitute `Self` with the candidate before any comparison.
        let dest_member_ty = self.substitute_self(member.ty, convert_to_instance(db, src));
        let src_member_ty = self.substitute_self(src_member_ty, convert_to_instance(db, src));

        // Property members compare accessor-by-accessor.
        let dest_is_property = db
            .class_of(dest_member_ty)
            .is_some_and(|c| c.flags.contains(ClassFlags::PROPERTY_CLASS));
        if dest_is_property {
            return self.assign_property_member(
                dest_member_ty,
                src_member_ty,
                src_member_flags,
                src,
                &member_name,
                protocol_tracker,
                diag,
            );
        }

        // Writable data members require a writable implementation.
        let dest_is_method = matches!(
            db.lookup(dest_member_ty),
            Some(TypeKey::Function(_)) | Some(TypeKey::Overloaded(_))
        );
        if !dest_is_method
            && !member.flags.contains(MemberFlags::READ_ONLY)
            && !member.flags.contains(MemberFlags::FINAL)
            && src_member_flags.contains(MemberFlags::READ_ONLY)
        {
            if let Some(sink) = diag {
                sink.error(
                    diagnostic_codes::PROTOCOL_MEMBER_WRITABILITY,
                    diagnostic_messages::PROTOCOL_MEMBER_WRITABILITY,
                    &[&member_name],
                );
            }
            return false;
        }

        // Bind methods to the candidate. Module-level functions have no
        // receiver and are compared unbound.
        let is_static = member.flags.contains(MemberFlags::STATIC_METHOD);
        let bind_as_class = member.flags.contains(MemberFlags::CLASS_METHOD);
        let src_is_module = matches!(db.lookup(src), Some(TypeKey::Module(_)));
        let (dest_cmp, src_cmp) = if dest_is_method && !is_static {
            let dest_bound = self
                .bind_function_to_class_or_object(src, dest_member_ty, bind_as_class)
                .unwrap_or(dest_member_ty);
            let src_bound = if src_is_module {
                src_member_ty
            } else {
                self.bind_function_to_class_or_object(src, src_member_ty, bind_as_class)
                    .unwrap_or(src_member_ty)
            };
            (dest_bound, src_bound)
        } else {
            (dest_member_ty, src_member_ty)
        };

        // Mutable attributes must match invariantly.
        let mutable = !dest_is_method
            && !member.flags.contains(MemberFlags::READ_ONLY)
            && !member.flags.contains(MemberFlags::FINAL);
        let cmp_flags = if mutable {
            AssignFlags::INVARIANT
        } else {
            AssignFlags::empty()
        };

        if !self.assign_type(
            dest_cmp,
            src_cmp,
            None,
            Some(protocol_tracker),
            cmp_flags,
            0,
        ) {
            if let Some(sink) = diag {
                let (code, template) = if mutable {
                    (
                        diagnostic_codes::PROTOCOL_MEMBER_INVARIANCE,
                        diagnostic_messages::PROTOCOL_MEMBER_INVARIANCE,
                    )
                } else {
                    (
                        diagnostic_codes::PROTOCOL_MEMBER_TYPE_MISMATCH,
                        diagnostic_messages::PROTOCOL_MEMBER_TYPE_MISMATCH,
                    )
                };
                sink.error(
                    code,
                    template,
                    &[
                        &member_name,
                        &print_type(db, src_cmp),
                        &print_type(db, dest_cmp),
                    ],
                );
            }
            let _ = protocol;
            return false;
        }
        true
    }

    /// Find a member on a candidate class (through its MRO and metaclass)
    /// or module.
    fn lookup_member(
        &self,
        src: TypeId,
        name: Atom,
        as_class_object: bool,
    ) -> Option<(TypeId, MemberFlags)> {
        let db = self.db();
        match db.lookup(src) {
            Some(TypeKey::Class(class_id)) => {
                let shape = db.class_shape(class_id);
                let mut chain = vec![src];
                chain.extend(shape.mro.iter().map(|&b| self.resolve_ref(b)));
                for link in chain {
                    if let Some(link_shape) = db.class_of(link) {
                        if let Some(member) = link_shape.member(name) {
                            if as_class_object
                                && member.flags.contains(MemberFlags::INSTANCE_MEMBER)
                            {
                                continue;
                            }
                            return Some((member.ty, member.flags));
                        }
                    }
                }
                if as_class_object {
                    if let Some(metaclass) = shape.metaclass {
                        return self.lookup_member(self.resolve_ref(metaclass), name, false);
                    }
                }
                None
            }
            Some(TypeKey::Module(module_id)) => {
                let shape = db.module_shape(module_id);
                shape.member(name).map(|ty| (ty, MemberFlags::empty()))
            }
            _ => None,
        }
    }
}

/// Snapshot of a tracker's main-set bounds, for cache keying.
fn snapshot_constraints(tracker: &ConstraintTracker) -> PreConstraints {
    tracker
        .main_set()
        .entries()
        .map(|(key, entry)| (*key, entry.lower_bound, entry.upper_bound))
        .collect()
}

/// The self-specialized generic form of a class (arguments erased back to
/// its own parameters).
fn generic_form(db: &dyn TypeDatabase, class_ty: TypeId) -> TypeId {
    let Some(shape) = db.class_of(class_ty) else {
        return class_ty;
    };
    if shape.type_params.is_empty() || shape.type_args.is_none() {
        return class_ty;
    }
    let mut generic = (*shape).clone();
    generic.type_args = None;
    crate::instantiate::self_specialized(db, db.class(generic))
}
