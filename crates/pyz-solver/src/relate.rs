//! The general assignability relation.
//!
//! `assign_type(dest, src, …)` answers "may a value of `src` flow into a
//! slot of `dest`?", recording type-variable bounds into the tracker along
//! the way. The constraint recorder (`assign_type_var`), the protocol
//! matcher, and this relation are mutually recursive; recursion is bounded
//! by depth with a conservative `true` at the cap.

use pyz_common::DiagSink;
use tracing::trace;

use crate::constraints::ConstraintTracker;
use crate::db::TypeDatabase;
use crate::equality::are_types_identical;
use crate::instantiate::{concretize, free_type_vars};
use crate::judge::{AssignFlags, Judge};
use crate::recursion::RecursionProfile;
use crate::types::{
    ClassShape, FunctionShape, ParamInfo, ParamKind, TupleElement, TypeId, TypeKey, TypeVarFlags,
};

impl<'a> Judge<'a> {
    /// The general assignability relation.
    ///
    /// `diag` and `tracker` are optional; without a tracker the call is a
    /// pure query. Reaching the recursion bound returns `true`
    /// conservatively.
    pub fn assign_type(
        &self,
        dest: TypeId,
        src: TypeId,
        diag: Option<&mut DiagSink>,
        tracker: Option<&mut ConstraintTracker>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        if self.check_cancelled() {
            return false;
        }
        if depth > RecursionProfile::SubtypeCheck.max_depth() {
            return true;
        }
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || {
            self.assign_type_inner(dest, src, diag, tracker, flags, depth + 1)
        })
    }

    fn assign_type_inner(
        &self,
        dest: TypeId,
        src: TypeId,
        mut diag: Option<&mut DiagSink>,
        mut tracker: Option<&mut ConstraintTracker>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        let db = self.db();
        let dest = self.resolve_ref(dest);
        let src = self.resolve_ref(src);
        if dest == src {
            return true;
        }

        // Destination type variable: delegate to the constraint recorder.
        if matches!(db.lookup(dest), Some(TypeKey::TypeVar(_))) {
            return self.assign_type_var(dest, src, diag, tracker, flags, depth);
        }

        // Gradual wildcards.
        if db.is_any_or_unknown(dest) {
            return true;
        }
        if db.is_any_or_unknown(src) {
            // Overload-overlap checks compare shapes, not gradual holes.
            return !flags
                .intersects(AssignFlags::OVERLOAD_OVERLAP | AssignFlags::PARTIAL_OVERLOAD_OVERLAP);
        }
        if src == TypeId::NEVER {
            return !flags.contains(AssignFlags::INVARIANT);
        }
        if src == TypeId::UNBOUND || dest == TypeId::NEVER || dest == TypeId::UNBOUND {
            return false;
        }

        // Source type variable.
        if let Some(src_var) = db.type_var_of(src) {
            // A free in-scope variable in contravariant position takes an
            // upper bound from the destination.
            let in_scope = src_var.is_free()
                && tracker
                    .as_deref()
                    .is_some_and(|t| t.is_solving_scope(src_var.scope_id));
            if flags.contains(AssignFlags::CONTRAVARIANT) && in_scope {
                return self.assign_type_var(src, dest, diag, tracker, flags, depth);
            }
            let concrete = concretize(db, src);
            if concrete != src {
                return self.assign_type(dest, concrete, diag, tracker, flags, depth);
            }
            return false;
        }

        // Invariance across unions is an identity question.
        if flags.contains(AssignFlags::INVARIANT)
            && (matches!(db.lookup(dest), Some(TypeKey::Union(_)))
                || matches!(db.lookup(src), Some(TypeKey::Union(_))))
        {
            return are_types_identical(db, dest, src);
        }

        // Every source subtype must be individually assignable.
        if let Some(TypeKey::Union(src_members)) = db.lookup(src) {
            return src_members.iter().all(|&member| {
                self.assign_type(
                    dest,
                    member,
                    diag.as_deref_mut(),
                    tracker.as_deref_mut(),
                    flags,
                    depth,
                )
            });
        }

        // Any destination subtype may accept the source. Probe without
        // recording first so a failed branch leaves no bounds behind.
        if let Some(TypeKey::Union(dest_members)) = db.lookup(dest) {
            if dest_members.contains(&src) {
                return true;
            }
            for &member in &dest_members {
                if self.assign_type(member, src, None, None, flags, depth) {
                    return self.assign_type(
                        member,
                        src,
                        diag.as_deref_mut(),
                        tracker.as_deref_mut(),
                        flags,
                        depth,
                    );
                }
            }
            // No member matched as a pure query; retry the members that can
            // still absorb the source through their free variables.
            for &member in &dest_members {
                if !free_type_vars(db, member).is_empty()
                    && self.assign_type(
                        member,
                        src,
                        diag.as_deref_mut(),
                        tracker.as_deref_mut(),
                        flags,
                        depth,
                    )
                {
                    return true;
                }
            }
            return false;
        }

        match (db.lookup(dest), db.lookup(src)) {
            (Some(TypeKey::Class(_)), Some(TypeKey::Class(_))) => {
                self.assign_class(dest, src, diag, tracker, flags, depth)
            }
            (Some(TypeKey::Class(class_id)), Some(TypeKey::Module(_))) => {
                let shape = db.class_shape(class_id);
                if shape.is_protocol() {
                    self.assign_module_to_protocol(dest, src, tracker, diag, flags)
                } else {
                    !shape.is_instantiable() && self.is_object_class(&shape)
                }
            }
            (
                Some(TypeKey::Class(class_id)),
                Some(TypeKey::Function(_)) | Some(TypeKey::Overloaded(_)),
            ) => {
                let shape = db.class_shape(class_id);
                if !shape.is_instantiable() && self.is_object_class(&shape) {
                    return true;
                }
                if shape.is_protocol() {
                    // A callable matches a protocol through its __call__ slot.
                    let call_name = db.intern_string("__call__");
                    if let Some(member) = shape.member(call_name) {
                        let bound = self
                            .bind_function_to_class_or_object(dest, member.ty, false)
                            .unwrap_or(member.ty);
                        return self.assign_type(bound, src, diag, tracker, flags, depth);
                    }
                }
                false
            }
            (Some(TypeKey::Function(_)), Some(TypeKey::Function(_))) => {
                self.assign_function(dest, src, diag, tracker, flags, depth)
            }
            (Some(TypeKey::Function(_)), Some(TypeKey::Overloaded(overload_id))) => {
                let shape = db.overload_shape(overload_id);
                for &overload in &shape.overloads {
                    if self.assign_type(dest, overload, None, None, flags, depth) {
                        return self.assign_type(
                            dest,
                            overload,
                            diag.as_deref_mut(),
                            tracker.as_deref_mut(),
                            flags,
                            depth,
                        );
                    }
                }
                false
            }
            (Some(TypeKey::Overloaded(overload_id)), Some(_)) => {
                // Every promised overload must be satisfiable by the source.
                let shape = db.overload_shape(overload_id);
                shape.overloads.iter().all(|&overload| {
                    self.assign_type(
                        overload,
                        src,
                        diag.as_deref_mut(),
                        tracker.as_deref_mut(),
                        flags,
                        depth,
                    )
                })
            }
            (Some(TypeKey::Function(function_id)), Some(TypeKey::Class(_))) => {
                // Class objects are callable, but constructor synthesis
                // lives outside the solver; only the gradual form accepts.
                db.function_shape(function_id).is_gradual()
            }
            _ => false,
        }
    }

    pub(crate) fn is_object_class(&self, shape: &ClassShape) -> bool {
        self.db().resolve_atom(shape.full_name) == "builtins.object"
    }

    fn is_type_class(&self, shape: &ClassShape) -> bool {
        self.db().resolve_atom(shape.full_name) == "builtins.type"
    }

    // =========================================================================
    // Class-to-class
    // =========================================================================

    fn assign_class(
        &self,
        dest: TypeId,
        src: TypeId,
        mut diag: Option<&mut DiagSink>,
        mut tracker: Option<&mut ConstraintTracker>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        let db = self.db();
        let dest_shape = db.class_of(dest).expect("class key");
        let src_shape = db.class_of(src).expect("class key");

        if dest_shape.is_instantiable() != src_shape.is_instantiable() {
            // Class objects are themselves instances of `type` and `object`.
            if !dest_shape.is_instantiable()
                && src_shape.is_instantiable()
                && (self.is_object_class(&dest_shape) || self.is_type_class(&dest_shape))
            {
                return true;
            }
            return false;
        }

        if flags.contains(AssignFlags::INVARIANT) {
            if dest_shape.full_name != src_shape.full_name
                || dest_shape.literal != src_shape.literal
            {
                return false;
            }
            return self.verify_type_args(dest, src, diag, tracker, flags, depth);
        }

        if let Some(dest_literal) = dest_shape.literal {
            return src_shape.literal == Some(dest_literal)
                && src_shape.full_name == dest_shape.full_name;
        }

        if !dest_shape.is_instantiable() && self.is_object_class(&dest_shape) {
            return true;
        }

        // Tuples with element vectors compare structurally.
        if dest_shape.full_name == src_shape.full_name {
            if let (Some(dest_elements), Some(src_elements)) =
                (&dest_shape.tuple_elements, &src_shape.tuple_elements)
            {
                return self.assign_tuple_elements(
                    dest_elements,
                    src_elements,
                    diag,
                    tracker,
                    flags,
                    depth,
                );
            }
            return self.verify_type_args(dest, src, diag, tracker, flags, depth);
        }

        // Nominal: find the destination's generic class in the source MRO.
        for &base in &src_shape.mro {
            let base = self.resolve_ref(base);
            if let Some(base_shape) = db.class_of(base) {
                if base_shape.full_name == dest_shape.full_name {
                    return self.verify_type_args(dest, base, diag, tracker, flags, depth);
                }
            }
        }

        // Classes deriving from Any/Unknown assign anywhere.
        if src_shape.mro.iter().any(|&base| db.is_any_or_unknown(base)) {
            return true;
        }

        if dest_shape.is_protocol() {
            return self.assign_class_to_protocol(dest, src, tracker, diag, flags);
        }

        trace!(
            dest = %crate::printer::print_type(db, dest),
            src = %crate::printer::print_type(db, src),
            "class assignment failed"
        );
        false
    }

    /// Compare explicit type arguments of two specializations of the same
    /// generic class, honoring each parameter's declared variance.
    pub(crate) fn verify_type_args(
        &self,
        dest: TypeId,
        src: TypeId,
        mut diag: Option<&mut DiagSink>,
        mut tracker: Option<&mut ConstraintTracker>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        let db = self.db();
        let dest_shape = db.class_of(dest).expect("class key");
        let src_shape = db.class_of(src).expect("class key");

        let Some(dest_args) = dest_shape.type_args.clone() else {
            // Unspecialized destination accepts any specialization.
            return true;
        };
        let src_args: Vec<TypeId> = match &src_shape.type_args {
            Some(args) => args.clone(),
            None => {
                if flags.contains(AssignFlags::ALLOW_UNSPECIFIED_TYPE_ARGS) {
                    return true;
                }
                vec![TypeId::UNKNOWN; dest_args.len()]
            }
        };

        let base = flags.persistent();
        for (index, (&dest_arg, &src_arg)) in dest_args.iter().zip(src_args.iter()).enumerate() {
            let declared = dest_shape
                .type_params
                .get(index)
                .and_then(|&p| db.type_var_of(p))
                .map(|v| v.variance)
                .unwrap_or(crate::types::Variance::Invariant);
            let variance = if flags.contains(AssignFlags::INVARIANT) {
                crate::types::Variance::Invariant
            } else {
                declared
            };
            let ok = match variance {
                crate::types::Variance::Covariant => self.assign_type(
                    dest_arg,
                    src_arg,
                    diag.as_deref_mut(),
                    tracker.as_deref_mut(),
                    base,
                    depth,
                ),
                crate::types::Variance::Invariant => self.assign_type(
                    dest_arg,
                    src_arg,
                    diag.as_deref_mut(),
                    tracker.as_deref_mut(),
                    base | AssignFlags::INVARIANT,
                    depth,
                ),
                crate::types::Variance::Contravariant => {
                    let record_upper = db.type_var_of(dest_arg).is_some_and(|v| {
                        v.is_free()
                            && tracker
                                .as_deref()
                                .is_some_and(|t| t.is_solving_scope(v.scope_id))
                    });
                    if record_upper {
                        self.assign_type(
                            dest_arg,
                            src_arg,
                            diag.as_deref_mut(),
                            tracker.as_deref_mut(),
                            base | AssignFlags::CONTRAVARIANT,
                            depth,
                        )
                    } else {
                        self.assign_type(
                            src_arg,
                            dest_arg,
                            diag.as_deref_mut(),
                            tracker.as_deref_mut(),
                            base,
                            depth,
                        )
                    }
                }
            };
            if !ok {
                return false;
            }
        }
        true
    }

    // =========================================================================
    // Tuples
    // =========================================================================

    fn assign_tuple_elements(
        &self,
        dest: &[TupleElement],
        src: &[TupleElement],
        mut diag: Option<&mut DiagSink>,
        mut tracker: Option<&mut ConstraintTracker>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        let base = flags.persistent();
        let unbounded_at = dest.iter().position(|e| e.is_unbounded);
        match unbounded_at {
            None => {
                if src.iter().any(|e| e.is_unbounded) || dest.len() != src.len() {
                    return false;
                }
                dest.iter().zip(src.iter()).all(|(d, s)| {
                    self.assign_type(
                        d.ty,
                        s.ty,
                        diag.as_deref_mut(),
                        tracker.as_deref_mut(),
                        base,
                        depth,
                    )
                })
            }
            Some(k) => {
                let suffix_len = dest.len() - k - 1;
                if src.len() + 1 < dest.len() {
                    return false;
                }
                for (d, s) in dest[..k].iter().zip(src[..k].iter()) {
                    if !self.assign_type(
                        d.ty,
                        s.ty,
                        diag.as_deref_mut(),
                        tracker.as_deref_mut(),
                        base,
                        depth,
                    ) {
                        return false;
                    }
                }
                for (d, s) in dest[k + 1..]
                    .iter()
                    .zip(src[src.len() - suffix_len..].iter())
                {
                    if !self.assign_type(
                        d.ty,
                        s.ty,
                        diag.as_deref_mut(),
                        tracker.as_deref_mut(),
                        base,
                        depth,
                    ) {
                        return false;
                    }
                }
                src[k..src.len() - suffix_len].iter().all(|s| {
                    self.assign_type(
                        dest[k].ty,
                        s.ty,
                        diag.as_deref_mut(),
                        tracker.as_deref_mut(),
                        base,
                        depth,
                    )
                })
            }
        }
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn assign_function(
        &self,
        dest: TypeId,
        src: TypeId,
        mut diag: Option<&mut DiagSink>,
        mut tracker: Option<&mut ConstraintTracker>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        let db = self.db();
        let dest_shape = db.function_of(dest).expect("function key");
        let src_shape = db.function_of(src).expect("function key");
        let base = flags.persistent();

        if flags.contains(AssignFlags::INVARIANT) {
            return are_types_identical(db, dest, src);
        }

        let params_ok = if dest_shape.is_gradual() || src_shape.is_gradual() {
            true
        } else {
            self.assign_function_params(
                &dest_shape,
                &src_shape,
                diag.as_deref_mut(),
                tracker.as_deref_mut(),
                flags,
                depth,
            )
        };
        if !params_ok {
            return false;
        }

        if flags.contains(AssignFlags::SKIP_RETURN_TYPE_CHECK) {
            return true;
        }
        self.assign_type(
            dest_shape.return_type,
            src_shape.return_type,
            diag,
            tracker,
            base,
            depth,
        )
    }

    fn assign_function_params(
        &self,
        dest_shape: &FunctionShape,
        src_shape: &FunctionShape,
        mut diag: Option<&mut DiagSink>,
        mut tracker: Option<&mut ConstraintTracker>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        let db = self.db();
        let base = flags.persistent();
        let dest_positional: Vec<&ParamInfo> = dest_shape
            .params
            .iter()
            .filter(|p| p.kind == ParamKind::Positional)
            .collect();
        let src_positional: Vec<&ParamInfo> = src_shape
            .params
            .iter()
            .filter(|p| p.kind == ParamKind::Positional)
            .collect();
        let dest_varargs = dest_shape.params.iter().find(|p| p.kind == ParamKind::VarArgs);
        let src_varargs = src_shape.params.iter().find(|p| p.kind == ParamKind::VarArgs);
        let dest_kwargs = dest_shape.params.iter().find(|p| p.kind == ParamKind::KwArgs);
        let src_kwargs = src_shape.params.iter().find(|p| p.kind == ParamKind::KwArgs);

        // Parameters are contravariant: each promised parameter type must
        // be accepted by the source's corresponding parameter.
        for (index, dest_param) in dest_positional.iter().enumerate() {
            let src_param_ty = match src_positional.get(index) {
                Some(src_param) => src_param.ty,
                None => match src_varargs {
                    Some(varargs) => varargs.ty,
                    None => {
                        if src_shape.param_spec.is_some() {
                            break;
                        }
                        return false;
                    }
                },
            };
            if !self.assign_type(
                src_param_ty,
                dest_param.ty,
                diag.as_deref_mut(),
                tracker.as_deref_mut(),
                base | AssignFlags::CONTRAVARIANT,
                depth,
            ) {
                return false;
            }
        }

        // Extra required source parameters have nowhere to come from.
        for src_param in src_positional.iter().skip(dest_positional.len()) {
            if !src_param.has_default && dest_varargs.is_none() && dest_shape.param_spec.is_none() {
                return false;
            }
        }

        if let Some(dest_va) = dest_varargs {
            let Some(src_va) = src_varargs else {
                return false;
            };
            if !self.assign_type(
                src_va.ty,
                dest_va.ty,
                diag.as_deref_mut(),
                tracker.as_deref_mut(),
                base | AssignFlags::CONTRAVARIANT,
                depth,
            ) {
                return false;
            }
        }
        if let Some(dest_kw) = dest_kwargs {
            let Some(src_kw) = src_kwargs else {
                return false;
            };
            if !self.assign_type(
                src_kw.ty,
                dest_kw.ty,
                diag.as_deref_mut(),
                tracker.as_deref_mut(),
                base | AssignFlags::CONTRAVARIANT,
                depth,
            ) {
                return false;
            }
        }

        if let Some(param_spec) = dest_shape.param_spec {
            // Bind the residual source signature to the ParamSpec.
            let residual_params: Vec<ParamInfo> = src_shape
                .params
                .iter()
                .filter(|p| p.kind != ParamKind::Positional)
                .copied()
                .chain(
                    src_positional
                        .iter()
                        .skip(dest_positional.len())
                        .map(|p| **p),
                )
                .collect();
            let mut residual = FunctionShape::new(
                src_shape.name,
                residual_params,
                src_shape.return_type,
            );
            residual.param_spec = src_shape.param_spec;
            residual.flags = src_shape.flags;
            let residual_ty = db.function(residual);
            if !self.assign_type_var(param_spec, residual_ty, diag, tracker, flags, depth) {
                return false;
            }
        } else if src_shape.param_spec.is_some() {
            return false;
        }
        true
    }

    // =========================================================================
    // Method binding
    // =========================================================================

    /// Return the descriptor-bound form of a method: the first positional
    /// parameter is consumed and `Self` is substituted with the receiver.
    ///
    /// `as_class_object` binds a classmethod-style receiver; static methods
    /// are returned unchanged by the caller before reaching here.
    pub fn bind_function_to_class_or_object(
        &self,
        self_ty: TypeId,
        member_ty: TypeId,
        as_class_object: bool,
    ) -> Option<TypeId> {
        let db = self.db();
        match db.lookup(member_ty) {
            Some(TypeKey::Function(function_id)) => {
                let shape = db.function_shape(function_id);
                let mut new_shape = (*shape).clone();
                if !new_shape.is_gradual() {
                    let first_positional = new_shape
                        .params
                        .iter()
                        .position(|p| p.kind == ParamKind::Positional)?;
                    new_shape.params.remove(first_positional);
                }
                let bound = db.function(new_shape);
                let receiver = if as_class_object {
                    crate::instantiate::convert_to_instance(db, self_ty)
                } else {
                    self_ty
                };
                Some(self.substitute_self(bound, receiver))
            }
            Some(TypeKey::Overloaded(overload_id)) => {
                let shape = db.overload_shape(overload_id);
                let bound: Option<Vec<TypeId>> = shape
                    .overloads
                    .iter()
                    .map(|&o| self.bind_function_to_class_or_object(self_ty, o, as_class_object))
                    .collect();
                let mut new_shape = (*shape).clone();
                new_shape.overloads = bound?;
                Some(db.overloaded(new_shape))
            }
            _ => None,
        }
    }

    /// Replace every `Self` variable reachable in `ty` with the receiver.
    pub(crate) fn substitute_self(&self, ty: TypeId, receiver: TypeId) -> TypeId {
        let db = self.db();
        let mut subst = crate::instantiate::TypeSubstitution::new();
        for var in free_type_vars(db, ty) {
            if let Some(shape) = db.type_var_of(var) {
                if shape.flags.contains(TypeVarFlags::IS_SELF) {
                    subst.insert(crate::types::TypeVarKey::of(&shape), receiver);
                }
            }
        }
        crate::instantiate::instantiate_type(db, ty, &subst)
    }
}
