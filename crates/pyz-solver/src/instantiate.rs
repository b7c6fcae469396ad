//! Type substitution and traversal.
//!
//! `instantiate_type` walks a type replacing free variables bound in a
//! [`TypeSubstitution`]. The same walker backs class specialization,
//! solution application, free-variable collection, literal stripping, and
//! concretization. `TypeKey::Ref` is opaque to every walk here; that is
//! what makes self-referential types terminate.

use rustc_hash::FxHashMap;

use crate::db::TypeDatabase;
use crate::recursion::{DepthCounter, RecursionGuard, RecursionProfile, RecursionResult};
use crate::types::{
    ClassFlags, FunctionFlags, TypeId, TypeKey, TypeVarFlags, TypeVarKey, TypeVarKind,
};

// =============================================================================
// TypeSubstitution
// =============================================================================

/// Mapping from type-variable keys to replacement types.
#[derive(Clone, Debug, Default)]
pub struct TypeSubstitution {
    map: FxHashMap<TypeVarKey, TypeId>,
}

impl TypeSubstitution {
    pub fn new() -> Self {
        TypeSubstitution {
            map: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, key: TypeVarKey, ty: TypeId) {
        self.map.insert(key, ty);
    }

    pub fn get(&self, key: TypeVarKey) -> Option<TypeId> {
        self.map.get(&key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Zip declared parameters (type-variable ids) with argument types.
    ///
    /// Extra parameters or arguments are ignored.
    pub fn from_args(db: &dyn TypeDatabase, params: &[TypeId], args: &[TypeId]) -> Self {
        let mut subst = TypeSubstitution::new();
        for (&param, &arg) in params.iter().zip(args.iter()) {
            if let Some(shape) = db.type_var_of(param) {
                subst.insert(TypeVarKey::of(&shape), arg);
            }
        }
        subst
    }
}

// =============================================================================
// Instantiation
// =============================================================================

/// Replace every variable bound in `subst`, structurally.
pub fn instantiate_type(db: &dyn TypeDatabase, ty: TypeId, subst: &TypeSubstitution) -> TypeId {
    if subst.is_empty() {
        return ty;
    }
    let mut depth = DepthCounter::with_profile(RecursionProfile::TypeTraversal);
    instantiate_inner(db, ty, subst, &mut depth)
}

fn instantiate_inner(
    db: &dyn TypeDatabase,
    ty: TypeId,
    subst: &TypeSubstitution,
    depth: &mut DepthCounter,
) -> TypeId {
    if !depth.enter() {
        return ty;
    }
    let result = match db.lookup(ty) {
        Some(TypeKey::TypeVar(var_id)) => {
            let shape = db.type_var_shape(var_id);
            match subst.get(TypeVarKey::of(&shape)) {
                Some(replacement) if shape.is_instantiable() => {
                    convert_to_instantiable(db, replacement).unwrap_or(replacement)
                }
                Some(replacement) => replacement,
                None => ty,
            }
        }
        Some(TypeKey::Class(class_id)) => {
            let shape = db.class_shape(class_id);
            let mut new_shape = (*shape).clone();
            let mut changed = false;
            if let Some(args) = &mut new_shape.type_args {
                for arg in args.iter_mut() {
                    let new_arg = instantiate_inner(db, *arg, subst, depth);
                    changed |= new_arg != *arg;
                    *arg = new_arg;
                }
            }
            if let Some(elements) = &mut new_shape.tuple_elements {
                for element in elements.iter_mut() {
                    let new_ty = instantiate_inner(db, element.ty, subst, depth);
                    changed |= new_ty != element.ty;
                    element.ty = new_ty;
                }
            }
            for member in &mut new_shape.members {
                let new_ty = instantiate_inner(db, member.ty, subst, depth);
                changed |= new_ty != member.ty;
                member.ty = new_ty;
            }
            for base in &mut new_shape.mro {
                let new_base = instantiate_inner(db, *base, subst, depth);
                changed |= new_base != *base;
                *base = new_base;
            }
            if changed { db.class(new_shape) } else { ty }
        }
        Some(TypeKey::Function(function_id)) => {
            let shape = db.function_shape(function_id);
            let mut new_shape = (*shape).clone();
            let mut changed = false;
            for param in &mut new_shape.params {
                let new_ty = instantiate_inner(db, param.ty, subst, depth);
                changed |= new_ty != param.ty;
                param.ty = new_ty;
            }
            let new_ret = instantiate_inner(db, new_shape.return_type, subst, depth);
            changed |= new_ret != new_shape.return_type;
            new_shape.return_type = new_ret;
            if let Some(param_spec) = new_shape.param_spec {
                if let Some(ps_shape) = db.type_var_of(param_spec) {
                    if let Some(replacement) = subst.get(TypeVarKey::of(&ps_shape)) {
                        changed = true;
                        splice_param_spec(db, &mut new_shape, replacement);
                    }
                }
            }
            if changed { db.function(new_shape) } else { ty }
        }
        Some(TypeKey::Overloaded(overload_id)) => {
            let shape = db.overload_shape(overload_id);
            let mut new_shape = (*shape).clone();
            let mut changed = false;
            for overload in &mut new_shape.overloads {
                let new_overload = instantiate_inner(db, *overload, subst, depth);
                changed |= new_overload != *overload;
                *overload = new_overload;
            }
            if changed { db.overloaded(new_shape) } else { ty }
        }
        Some(TypeKey::Union(members)) => {
            let new_members: Vec<TypeId> = members
                .iter()
                .map(|&m| instantiate_inner(db, m, subst, depth))
                .collect();
            if new_members == members {
                ty
            } else {
                db.union(new_members)
            }
        }
        _ => ty,
    };
    depth.leave();
    result
}

/// Replace a ParamSpec tail with its resolved value.
fn splice_param_spec(
    db: &dyn TypeDatabase,
    shape: &mut crate::types::FunctionShape,
    replacement: TypeId,
) {
    shape.param_spec = None;
    match db.lookup(replacement) {
        Some(TypeKey::Function(fid)) => {
            let resolved = db.function_shape(fid);
            shape.params.extend(resolved.params.iter().copied());
            shape.param_spec = resolved.param_spec;
            if resolved.is_gradual() {
                shape.flags |= FunctionFlags::GRADUAL_FORM;
            }
        }
        Some(TypeKey::TypeVar(_)) => {
            shape.param_spec = Some(replacement);
        }
        Some(TypeKey::Any) | Some(TypeKey::Unknown) => {
            shape.flags |= FunctionFlags::GRADUAL_FORM;
        }
        _ => {}
    }
}

// =============================================================================
// Class specialization
// =============================================================================

/// Specialize a generic class with explicit type arguments.
///
/// Substitutes the arguments through the member table, the MRO, and tuple
/// elements, and records the explicit argument vector.
pub fn specialize_class(db: &dyn TypeDatabase, class_ty: TypeId, args: Vec<TypeId>) -> Option<TypeId> {
    let shape = db.class_of(class_ty)?;
    let subst = TypeSubstitution::from_args(db, &shape.type_params, &args);
    let mut new_shape = (*shape).clone();
    new_shape.type_args = Some(args);
    let mut depth = DepthCounter::with_profile(RecursionProfile::TypeTraversal);
    for member in &mut new_shape.members {
        member.ty = instantiate_inner(db, member.ty, &subst, &mut depth);
    }
    for base in &mut new_shape.mro {
        *base = instantiate_inner(db, *base, &subst, &mut depth);
    }
    if let Some(elements) = &mut new_shape.tuple_elements {
        for element in elements.iter_mut() {
            element.ty = instantiate_inner(db, element.ty, &subst, &mut depth);
        }
    }
    Some(db.class(new_shape))
}

/// Specialize a generic class with its own type parameters as arguments.
pub fn self_specialized(db: &dyn TypeDatabase, class_ty: TypeId) -> TypeId {
    let Some(shape) = db.class_of(class_ty) else {
        return class_ty;
    };
    if shape.type_params.is_empty() || shape.type_args.is_some() {
        return class_ty;
    }
    let params = shape.type_params.clone();
    specialize_class(db, class_ty, params).unwrap_or(class_ty)
}

// =============================================================================
// Free variables
// =============================================================================

/// Collect the type variables transitively reachable through type
/// arguments, tuple elements, unions, overloads, and function signatures.
/// Deduplicated, insertion order.
pub fn free_type_vars(db: &dyn TypeDatabase, ty: TypeId) -> Vec<TypeId> {
    let mut guard: RecursionGuard<TypeId> =
        RecursionGuard::with_profile(RecursionProfile::TypeTraversal);
    let mut out = Vec::new();
    collect_type_vars(db, ty, &mut guard, &mut out);
    out
}

fn collect_type_vars(
    db: &dyn TypeDatabase,
    ty: TypeId,
    guard: &mut RecursionGuard<TypeId>,
    out: &mut Vec<TypeId>,
) {
    if guard.enter(ty) != RecursionResult::Entered {
        return;
    }
    match db.lookup(ty) {
        Some(TypeKey::TypeVar(_)) => {
            if !out.contains(&ty) {
                out.push(ty);
            }
        }
        Some(TypeKey::Class(class_id)) => {
            let shape = db.class_shape(class_id);
            if let Some(args) = &shape.type_args {
                for &arg in args {
                    collect_type_vars(db, arg, guard, out);
                }
            }
            if let Some(elements) = &shape.tuple_elements {
                for element in elements {
                    collect_type_vars(db, element.ty, guard, out);
                }
            }
        }
        Some(TypeKey::Function(function_id)) => {
            let shape = db.function_shape(function_id);
            for param in &shape.params {
                collect_type_vars(db, param.ty, guard, out);
            }
            collect_type_vars(db, shape.return_type, guard, out);
            if let Some(param_spec) = shape.param_spec {
                collect_type_vars(db, param_spec, guard, out);
            }
        }
        Some(TypeKey::Overloaded(overload_id)) => {
            let shape = db.overload_shape(overload_id);
            for &overload in &shape.overloads {
                collect_type_vars(db, overload, guard, out);
            }
        }
        Some(TypeKey::Union(members)) => {
            for member in members {
                collect_type_vars(db, member, guard, out);
            }
        }
        _ => {}
    }
    guard.leave(ty);
}

// =============================================================================
// Literal stripping
// =============================================================================

/// Strip literal values: top level, union-member-wise, and tuple-element-
/// wise (the latter is what variadic lower bounds need). Condition tags are
/// preserved.
pub fn strip_literals(db: &dyn TypeDatabase, ty: TypeId) -> TypeId {
    match db.lookup(ty) {
        Some(TypeKey::Class(class_id)) => {
            let shape = db.class_shape(class_id);
            let mut new_shape = (*shape).clone();
            let mut changed = false;
            if new_shape.literal.is_some() {
                new_shape.literal = None;
                changed = true;
            }
            if let Some(elements) = &mut new_shape.tuple_elements {
                for element in elements.iter_mut() {
                    let stripped = strip_literals(db, element.ty);
                    changed |= stripped != element.ty;
                    element.ty = stripped;
                }
            }
            if changed { db.class(new_shape) } else { ty }
        }
        Some(TypeKey::Union(members)) => {
            let stripped: Vec<TypeId> = members.iter().map(|&m| strip_literals(db, m)).collect();
            if stripped == members {
                ty
            } else {
                db.union(stripped)
            }
        }
        _ => ty,
    }
}

/// Drop condition tags, top level and union-member-wise.
pub fn strip_conditions(db: &dyn TypeDatabase, ty: TypeId) -> TypeId {
    match db.lookup(ty) {
        Some(TypeKey::Class(class_id)) => {
            let shape = db.class_shape(class_id);
            if shape.conditions.is_empty() {
                return ty;
            }
            let mut new_shape = (*shape).clone();
            new_shape.conditions.clear();
            db.class(new_shape)
        }
        Some(TypeKey::Union(members)) => {
            let stripped: Vec<TypeId> = members.iter().map(|&m| strip_conditions(db, m)).collect();
            if stripped == members {
                ty
            } else {
                db.union(stripped)
            }
        }
        _ => ty,
    }
}

// =============================================================================
// Concretization
// =============================================================================

/// Replace top-level free variables with their bounds (or the union of
/// their value constraints), falling back to `Unknown`.
pub fn concretize(db: &dyn TypeDatabase, ty: TypeId) -> TypeId {
    match db.lookup(ty) {
        Some(TypeKey::TypeVar(var_id)) => {
            let shape = db.type_var_shape(var_id);
            let concrete = match shape.kind {
                TypeVarKind::ParamSpec => {
                    let name = shape.name;
                    db.function(crate::types::FunctionShape::gradual(name, TypeId::UNKNOWN))
                }
                TypeVarKind::TypeVarTuple => TypeId::UNKNOWN,
                TypeVarKind::Ordinary => {
                    if !shape.constraints.is_empty() {
                        db.union(shape.constraints.clone())
                    } else {
                        shape.bound.unwrap_or(TypeId::UNKNOWN)
                    }
                }
            };
            if shape.is_instantiable() {
                convert_to_instantiable(db, concrete).unwrap_or(concrete)
            } else {
                concrete
            }
        }
        Some(TypeKey::Union(members)) => {
            let concrete: Vec<TypeId> = members.iter().map(|&m| concretize(db, m)).collect();
            db.union(concrete)
        }
        _ => ty,
    }
}

// =============================================================================
// Instance / instantiable conversion
// =============================================================================

/// Convert to the class-object (`type[...]`) form.
///
/// Returns `None` when the type has no instantiable form.
pub fn convert_to_instantiable(db: &dyn TypeDatabase, ty: TypeId) -> Option<TypeId> {
    match db.lookup(ty) {
        // type[Any] is Any.
        Some(TypeKey::Any) => Some(TypeId::ANY),
        Some(TypeKey::Unknown) => Some(TypeId::UNKNOWN),
        Some(TypeKey::Class(class_id)) => {
            let shape = db.class_shape(class_id);
            if shape.is_instantiable() {
                return Some(ty);
            }
            let mut new_shape = (*shape).clone();
            new_shape.flags |= ClassFlags::INSTANTIABLE;
            Some(db.class(new_shape))
        }
        Some(TypeKey::TypeVar(var_id)) => {
            let shape = db.type_var_shape(var_id);
            if shape.is_instantiable() {
                return Some(ty);
            }
            let mut new_shape = (*shape).clone();
            new_shape.flags |= TypeVarFlags::INSTANTIABLE;
            Some(db.type_var(new_shape))
        }
        Some(TypeKey::Function(function_id)) => {
            let shape = db.function_shape(function_id);
            if shape.flags.contains(FunctionFlags::INSTANTIABLE) {
                return Some(ty);
            }
            let mut new_shape = (*shape).clone();
            new_shape.flags |= FunctionFlags::INSTANTIABLE;
            Some(db.function(new_shape))
        }
        Some(TypeKey::Union(members)) => {
            let converted: Option<Vec<TypeId>> = members
                .iter()
                .map(|&m| convert_to_instantiable(db, m))
                .collect();
            converted.map(|members| db.union(members))
        }
        _ => None,
    }
}

/// Convert to the instance form, dropping the `type[...]` wrapper.
pub fn convert_to_instance(db: &dyn TypeDatabase, ty: TypeId) -> TypeId {
    match db.lookup(ty) {
        Some(TypeKey::Class(class_id)) => {
            let shape = db.class_shape(class_id);
            if !shape.is_instantiable() {
                return ty;
            }
            let mut new_shape = (*shape).clone();
            new_shape.flags -= ClassFlags::INSTANTIABLE;
            db.class(new_shape)
        }
        Some(TypeKey::TypeVar(var_id)) => {
            let shape = db.type_var_shape(var_id);
            if !shape.is_instantiable() {
                return ty;
            }
            let mut new_shape = (*shape).clone();
            new_shape.flags -= TypeVarFlags::INSTANTIABLE;
            db.type_var(new_shape)
        }
        Some(TypeKey::Union(members)) => {
            let converted: Vec<TypeId> =
                members.iter().map(|&m| convert_to_instance(db, m)).collect();
            db.union(converted)
        }
        _ => ty,
    }
}
