//! Database trait and type environment.
//!
//! Solver utilities take `&dyn TypeDatabase` so hosts can wrap the interner
//! (caching layers, instrumentation) without changing the algorithms. The
//! [`TypeEnvironment`] carries the ambient facts the solver cannot derive
//! from a type alone: registered builtins and lazy definition bindings.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use pyz_common::Atom;

use crate::intern::TypeInterner;
use crate::types::{
    ClassId, ClassShape, DefId, FunctionId, FunctionShape, ModuleId, ModuleShape, OverloadId,
    OverloadShape, ScopeId, TypeId, TypeKey, TypeVarId, TypeVarShape,
};

// =============================================================================
// TypeDatabase
// =============================================================================

/// Read/intern access to the type arena.
pub trait TypeDatabase {
    fn lookup(&self, id: TypeId) -> Option<TypeKey>;

    fn class_shape(&self, id: ClassId) -> Arc<ClassShape>;
    fn function_shape(&self, id: FunctionId) -> Arc<FunctionShape>;
    fn overload_shape(&self, id: OverloadId) -> Arc<OverloadShape>;
    fn module_shape(&self, id: ModuleId) -> Arc<ModuleShape>;
    fn type_var_shape(&self, id: TypeVarId) -> Arc<TypeVarShape>;

    fn class(&self, shape: ClassShape) -> TypeId;
    fn function(&self, shape: FunctionShape) -> TypeId;
    fn overloaded(&self, shape: OverloadShape) -> TypeId;
    fn module(&self, shape: ModuleShape) -> TypeId;
    fn type_var(&self, shape: TypeVarShape) -> TypeId;
    fn union(&self, members: Vec<TypeId>) -> TypeId;

    fn intern_string(&self, text: &str) -> Atom;
    fn resolve_atom(&self, atom: Atom) -> String;
    fn fresh_scope_id(&self) -> ScopeId;

    /// The class shape behind `id`, if it is a class type.
    fn class_of(&self, id: TypeId) -> Option<Arc<ClassShape>> {
        match self.lookup(id) {
            Some(TypeKey::Class(class_id)) => Some(self.class_shape(class_id)),
            _ => None,
        }
    }

    /// The function shape behind `id`, if it is a function type.
    fn function_of(&self, id: TypeId) -> Option<Arc<FunctionShape>> {
        match self.lookup(id) {
            Some(TypeKey::Function(function_id)) => Some(self.function_shape(function_id)),
            _ => None,
        }
    }

    /// The type-variable shape behind `id`, if it is a type variable.
    fn type_var_of(&self, id: TypeId) -> Option<Arc<TypeVarShape>> {
        match self.lookup(id) {
            Some(TypeKey::TypeVar(var_id)) => Some(self.type_var_shape(var_id)),
            _ => None,
        }
    }

    /// Union members of `id`, or a singleton list for any other type.
    fn union_members(&self, id: TypeId) -> Vec<TypeId> {
        match self.lookup(id) {
            Some(TypeKey::Union(members)) => members,
            _ => vec![id],
        }
    }

    fn is_any_or_unknown(&self, id: TypeId) -> bool {
        id == TypeId::ANY || id == TypeId::UNKNOWN
    }
}

impl TypeDatabase for TypeInterner {
    fn lookup(&self, id: TypeId) -> Option<TypeKey> {
        TypeInterner::lookup(self, id)
    }

    fn class_shape(&self, id: ClassId) -> Arc<ClassShape> {
        TypeInterner::class_shape(self, id)
    }

    fn function_shape(&self, id: FunctionId) -> Arc<FunctionShape> {
        TypeInterner::function_shape(self, id)
    }

    fn overload_shape(&self, id: OverloadId) -> Arc<OverloadShape> {
        TypeInterner::overload_shape(self, id)
    }

    fn module_shape(&self, id: ModuleId) -> Arc<ModuleShape> {
        TypeInterner::module_shape(self, id)
    }

    fn type_var_shape(&self, id: TypeVarId) -> Arc<TypeVarShape> {
        TypeInterner::type_var_shape(self, id)
    }

    fn class(&self, shape: ClassShape) -> TypeId {
        TypeInterner::class(self, shape)
    }

    fn function(&self, shape: FunctionShape) -> TypeId {
        TypeInterner::function(self, shape)
    }

    fn overloaded(&self, shape: OverloadShape) -> TypeId {
        TypeInterner::overloaded(self, shape)
    }

    fn module(&self, shape: ModuleShape) -> TypeId {
        TypeInterner::module(self, shape)
    }

    fn type_var(&self, shape: TypeVarShape) -> TypeId {
        TypeInterner::type_var(self, shape)
    }

    fn union(&self, members: Vec<TypeId>) -> TypeId {
        TypeInterner::union(self, members)
    }

    fn intern_string(&self, text: &str) -> Atom {
        TypeInterner::intern_string(self, text)
    }

    fn resolve_atom(&self, atom: Atom) -> String {
        TypeInterner::resolve_atom(self, atom)
    }

    fn fresh_scope_id(&self) -> ScopeId {
        TypeInterner::fresh_scope_id(self)
    }
}

// =============================================================================
// TypeEnvironment
// =============================================================================

/// Ambient bindings: builtins and lazy definition resolution.
///
/// Builtins are registered by the host (`object`, `type`, `tuple`, and
/// whatever primitive classes the program uses); the solver looks them up by
/// name. Definition bindings back the `TypeKey::Ref` indirection used for
/// self-referential types.
pub struct TypeEnvironment {
    builtins: DashMap<String, TypeId>,
    defs: DashMap<DefId, TypeId>,
    next_def: AtomicU32,
}

impl TypeEnvironment {
    pub fn new() -> Self {
        TypeEnvironment {
            builtins: DashMap::new(),
            defs: DashMap::new(),
            next_def: AtomicU32::new(0),
        }
    }

    pub fn register_builtin(&self, name: &str, ty: TypeId) {
        self.builtins.insert(name.to_string(), ty);
    }

    pub fn get_builtin(&self, name: &str) -> Option<TypeId> {
        self.builtins.get(name).map(|t| *t)
    }

    /// Allocate a fresh definition id with no binding yet.
    pub fn alloc_def(&self) -> DefId {
        DefId(self.next_def.fetch_add(1, Ordering::Relaxed))
    }

    pub fn insert_def(&self, def: DefId, ty: TypeId) {
        self.defs.insert(def, ty);
    }

    pub fn resolve_def(&self, def: DefId) -> Option<TypeId> {
        self.defs.get(&def).map(|t| *t)
    }
}

impl Default for TypeEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
