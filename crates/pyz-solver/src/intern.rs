//! The type interner.
//!
//! All types live in one append-only arena. Interning is structural: two
//! structurally identical shapes receive the same id, so type equality at
//! the id level is deep equality. The tables are sharded concurrent maps; a
//! host may share one interner across workers even though each solver pass
//! is single-threaded.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use pyz_common::{Atom, Interner};

use crate::types::{
    ClassId, ClassShape, FunctionId, FunctionShape, ModuleId, ModuleShape, OverloadId,
    OverloadShape, ScopeId, TypeId, TypeKey, TypeVarId, TypeVarShape,
};

// =============================================================================
// Shape table
// =============================================================================

/// Deduplicating append-only table of shape records.
struct ShapeTable<T: Hash + Eq> {
    items: RwLock<Vec<Arc<T>>>,
    map: DashMap<Arc<T>, u32>,
}

impl<T: Hash + Eq> ShapeTable<T> {
    fn new() -> Self {
        ShapeTable {
            items: RwLock::new(Vec::new()),
            map: DashMap::new(),
        }
    }

    fn intern(&self, shape: T) -> u32 {
        if let Some(existing) = self.map.get(&shape) {
            return *existing;
        }
        let shape = Arc::new(shape);
        *self
            .map
            .entry(Arc::clone(&shape))
            .or_insert_with(|| {
                let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
                let id = items.len() as u32;
                items.push(shape);
                id
            })
            .value()
    }

    fn get(&self, id: u32) -> Arc<T> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&items[id as usize])
    }
}

// =============================================================================
// Type interner
// =============================================================================

/// Shared arena of interned types.
pub struct TypeInterner {
    keys: RwLock<Vec<TypeKey>>,
    key_map: DashMap<TypeKey, TypeId>,
    class_shapes: ShapeTable<ClassShape>,
    function_shapes: ShapeTable<FunctionShape>,
    overload_shapes: ShapeTable<OverloadShape>,
    module_shapes: ShapeTable<ModuleShape>,
    type_var_shapes: ShapeTable<TypeVarShape>,
    strings: Interner,
    next_scope: AtomicU32,
}

impl TypeInterner {
    pub fn new() -> Self {
        let interner = TypeInterner {
            keys: RwLock::new(Vec::new()),
            key_map: DashMap::new(),
            class_shapes: ShapeTable::new(),
            function_shapes: ShapeTable::new(),
            overload_shapes: ShapeTable::new(),
            module_shapes: ShapeTable::new(),
            type_var_shapes: ShapeTable::new(),
            strings: Interner::new(),
            next_scope: AtomicU32::new(0),
        };
        // Pre-register the singleton keys so the TypeId constants hold.
        let any = interner.intern_key(TypeKey::Any);
        let unknown = interner.intern_key(TypeKey::Unknown);
        let never = interner.intern_key(TypeKey::Never);
        let unbound = interner.intern_key(TypeKey::Unbound);
        debug_assert_eq!(any, TypeId::ANY);
        debug_assert_eq!(unknown, TypeId::UNKNOWN);
        debug_assert_eq!(never, TypeId::NEVER);
        debug_assert_eq!(unbound, TypeId::UNBOUND);
        interner
    }

    /// Intern a key, returning its id. Idempotent.
    pub fn intern_key(&self, key: TypeKey) -> TypeId {
        if let Some(existing) = self.key_map.get(&key) {
            return *existing;
        }
        *self
            .key_map
            .entry(key.clone())
            .or_insert_with(|| {
                let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
                let id = TypeId(keys.len() as u32);
                keys.push(key);
                id
            })
            .value()
    }

    /// Resolve an id back to its key.
    pub fn lookup(&self, id: TypeId) -> Option<TypeKey> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.get(id.0 as usize).cloned()
    }

    // =========================================================================
    // Shape accessors
    // =========================================================================

    pub fn class_shape(&self, id: ClassId) -> Arc<ClassShape> {
        self.class_shapes.get(id.0)
    }

    pub fn function_shape(&self, id: FunctionId) -> Arc<FunctionShape> {
        self.function_shapes.get(id.0)
    }

    pub fn overload_shape(&self, id: OverloadId) -> Arc<OverloadShape> {
        self.overload_shapes.get(id.0)
    }

    pub fn module_shape(&self, id: ModuleId) -> Arc<ModuleShape> {
        self.module_shapes.get(id.0)
    }

    pub fn type_var_shape(&self, id: TypeVarId) -> Arc<TypeVarShape> {
        self.type_var_shapes.get(id.0)
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn class(&self, shape: ClassShape) -> TypeId {
        let id = ClassId(self.class_shapes.intern(shape));
        self.intern_key(TypeKey::Class(id))
    }

    pub fn function(&self, shape: FunctionShape) -> TypeId {
        let id = FunctionId(self.function_shapes.intern(shape));
        self.intern_key(TypeKey::Function(id))
    }

    pub fn overloaded(&self, shape: OverloadShape) -> TypeId {
        let id = OverloadId(self.overload_shapes.intern(shape));
        self.intern_key(TypeKey::Overloaded(id))
    }

    pub fn module(&self, shape: ModuleShape) -> TypeId {
        let id = ModuleId(self.module_shapes.intern(shape));
        self.intern_key(TypeKey::Module(id))
    }

    pub fn type_var(&self, shape: TypeVarShape) -> TypeId {
        let id = TypeVarId(self.type_var_shapes.intern(shape));
        self.intern_key(TypeKey::TypeVar(id))
    }

    /// Build a normalized union.
    ///
    /// Flattens nested unions, deduplicates, drops `Never`. `Any` absorbs
    /// everything; `Unknown` absorbs everything except `Any`. An empty
    /// result is `Never` and a singleton result is the member itself.
    pub fn union(&self, members: Vec<TypeId>) -> TypeId {
        let mut flat: Vec<TypeId> = Vec::with_capacity(members.len());
        let mut saw_unknown = false;
        for member in members {
            match self.lookup(member) {
                Some(TypeKey::Any) => return TypeId::ANY,
                Some(TypeKey::Unknown) => saw_unknown = true,
                Some(TypeKey::Never) => {}
                Some(TypeKey::Union(inner)) => {
                    for t in inner {
                        if t == TypeId::ANY {
                            return TypeId::ANY;
                        }
                        if t == TypeId::UNKNOWN {
                            saw_unknown = true;
                        } else if !flat.contains(&t) {
                            flat.push(t);
                        }
                    }
                }
                _ => {
                    if !flat.contains(&member) {
                        flat.push(member);
                    }
                }
            }
        }
        if saw_unknown {
            return TypeId::UNKNOWN;
        }
        match flat.len() {
            0 => TypeId::NEVER,
            1 => flat[0],
            _ => self.intern_key(TypeKey::Union(flat)),
        }
    }

    // =========================================================================
    // Strings and scopes
    // =========================================================================

    pub fn intern_string(&self, text: &str) -> Atom {
        self.strings.intern(text)
    }

    pub fn resolve_atom(&self, atom: Atom) -> String {
        self.strings.resolve(atom)
    }

    /// Allocate a fresh generic-definition scope id.
    pub fn fresh_scope_id(&self) -> ScopeId {
        ScopeId(self.next_scope.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}
