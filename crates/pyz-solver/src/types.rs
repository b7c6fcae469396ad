//! Core type definitions for the constraint solver.
//!
//! Types are immutable values deduplicated by the [`TypeInterner`]: a
//! [`TypeId`] names an interned [`TypeKey`], and the heavy variants point at
//! shape records stored in side tables. Comparing two type ids compares the
//! interned structure.
//!
//! [`TypeInterner`]: crate::intern::TypeInterner

use bitflags::bitflags;
use pyz_common::Atom;
use serde::Serialize;

// =============================================================================
// Type ID
// =============================================================================

/// Unique identifier for an interned type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(pub u32);

impl TypeId {
    /// The gradual "anything, checks disabled" type.
    pub const ANY: TypeId = TypeId(0);
    /// The implicit counterpart of `Any` produced by inference gaps.
    pub const UNKNOWN: TypeId = TypeId(1);
    /// The uninhabited bottom type.
    pub const NEVER: TypeId = TypeId(2);
    /// A name referenced before assignment.
    pub const UNBOUND: TypeId = TypeId(3);
}

// =============================================================================
// Shape IDs
// =============================================================================

macro_rules! shape_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
        pub struct $name(pub u32);
    };
}

shape_id!(
    /// Index into the interner's class-shape table.
    ClassId
);
shape_id!(
    /// Index into the interner's function-shape table.
    FunctionId
);
shape_id!(
    /// Index into the interner's overload-shape table.
    OverloadId
);
shape_id!(
    /// Index into the interner's module-shape table.
    ModuleId
);
shape_id!(
    /// Index into the interner's type-variable-shape table.
    TypeVarId
);

/// Identifier of the generic-definition scope that introduced a variable.
///
/// Entries in a constraint set are keyed by `(name, scope)`; a variable with
/// no scope id is never recorded (another layer diagnoses it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub u32);

/// Identifier of a lazily-resolved named definition.
///
/// `TypeKey::Ref(DefId)` breaks cycles in self-referential types; the
/// mapping to a concrete type lives in the
/// [`TypeEnvironment`](crate::db::TypeEnvironment).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DefId(pub u32);

// =============================================================================
// Literal values
// =============================================================================

/// A literal value carried by a class type (e.g. `Literal[1]`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum LiteralValue {
    Int(i64),
    Str(Atom),
    Bytes(Atom),
    Bool(bool),
}

// =============================================================================
// Variance
// =============================================================================

/// Declared variance of a type parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Variance {
    Invariant,
    Covariant,
    Contravariant,
}

// =============================================================================
// Conditions
// =============================================================================

/// Tag recording that a type was produced by matching value-constrained
/// variable `type_var` at `constraint_index`.
///
/// Conditions flow through subtype mapping and relax the single-index rule
/// when a value-constrained variable is matched against a union.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ConstraintCondition {
    pub type_var: TypeId,
    pub constraint_index: u32,
}

// =============================================================================
// Flags
// =============================================================================

bitflags! {
    /// Flags on a class shape.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClassFlags: u32 {
        /// The shape names the class object (`type[C]`) rather than an instance.
        const INSTANTIABLE = 1 << 0;
        /// Structural (duck-typed) matching applies.
        const PROTOCOL = 1 << 1;
        const TYPED_DICT = 1 << 2;
        const DATA_CLASS = 1 << 3;
        const FROZEN_DATA_CLASS = 1 << 4;
        /// The class is a property descriptor (`fget`/`fset`/`fdel` members).
        const PROPERTY_CLASS = 1 << 5;
        const READ_ONLY_INSTANCE_VARS = 1 << 6;
        /// Created internally (e.g. during expected-type seeding).
        const SYNTHESIZED = 1 << 7;
        /// An unpacked tuple form (`*tuple[int, str]`).
        const UNPACKED = 1 << 8;
    }
}

bitflags! {
    /// Flags on one class or module member.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MemberFlags: u32 {
        const CLASS_VAR = 1 << 0;
        const FINAL = 1 << 1;
        const READ_ONLY = 1 << 2;
        /// Declared on instances (includes dataclass fields).
        const INSTANCE_MEMBER = 1 << 3;
        const STATIC_METHOD = 1 << 4;
        const CLASS_METHOD = 1 << 5;
    }
}

bitflags! {
    /// Flags on a function shape.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FunctionFlags: u32 {
        /// The gradual `(...)` form: parameters are unchecked.
        const GRADUAL_FORM = 1 << 0;
        /// The shape names a callable class object rather than a plain function.
        const INSTANTIABLE = 1 << 1;
        const SYNTHESIZED = 1 << 2;
    }
}

bitflags! {
    /// Flags on a type-variable shape.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TypeVarFlags: u32 {
        /// The variable stands for `type[T]` rather than `T`.
        const INSTANTIABLE = 1 << 0;
        /// The built-in `Self` variable.
        const IS_SELF = 1 << 1;
        /// Created internally; failures are not reported to the user.
        const SYNTHESIZED = 1 << 2;
        /// An unpacked variadic form (`*Ts`).
        const UNPACKED = 1 << 3;
        /// The variable appears inside a union.
        const IN_UNION = 1 << 4;
        /// Value fixed by the enclosing context; the solver may not assign it.
        const IS_BOUND = 1 << 5;
        const EXEMPT_FROM_BOUND_CHECK = 1 << 6;
        /// A unification placeholder that may be assigned even when bound.
        const UNIFICATION = 1 << 7;
    }
}

// =============================================================================
// Shapes
// =============================================================================

/// One element of a tuple class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TupleElement {
    pub ty: TypeId,
    /// `tuple[int, ...]`-style element that matches any arity.
    pub is_unbounded: bool,
    pub is_optional: bool,
}

impl TupleElement {
    pub fn required(ty: TypeId) -> Self {
        TupleElement {
            ty,
            is_unbounded: false,
            is_optional: false,
        }
    }

    pub fn unbounded(ty: TypeId) -> Self {
        TupleElement {
            ty,
            is_unbounded: true,
            is_optional: false,
        }
    }
}

/// One entry of a class's ordered member table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClassMember {
    pub name: Atom,
    pub ty: TypeId,
    pub flags: MemberFlags,
}

impl ClassMember {
    pub fn new(name: Atom, ty: TypeId) -> Self {
        ClassMember {
            name,
            ty,
            flags: MemberFlags::empty(),
        }
    }

    pub fn with_flags(name: Atom, ty: TypeId, flags: MemberFlags) -> Self {
        ClassMember { name, ty, flags }
    }
}

/// A class type: nominal identity plus the structure the solver inspects.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassShape {
    pub name: Atom,
    /// Fully-qualified name; generic-class identity for caches.
    pub full_name: Atom,
    pub flags: ClassFlags,
    /// Declared type parameters (type-variable ids), in order.
    pub type_params: Vec<TypeId>,
    /// Explicit specialization; `None` means unspecialized (implicit args).
    pub type_args: Option<Vec<TypeId>>,
    /// Present only for tuple classes.
    pub tuple_elements: Option<Vec<TupleElement>>,
    /// Ordered member table.
    pub members: Vec<ClassMember>,
    /// Linearized base classes, nearest first. Excludes the class itself.
    pub mro: Vec<TypeId>,
    pub metaclass: Option<TypeId>,
    /// Literal carrier (`Literal[1]` is `int` with `literal = Int(1)`).
    pub literal: Option<LiteralValue>,
    /// Condition tags attached after value-constrained matching.
    pub conditions: Vec<ConstraintCondition>,
}

impl ClassShape {
    /// A bare, unspecialized class with no members.
    pub fn named(name: Atom, full_name: Atom) -> Self {
        ClassShape {
            name,
            full_name,
            flags: ClassFlags::empty(),
            type_params: Vec::new(),
            type_args: None,
            tuple_elements: None,
            members: Vec::new(),
            mro: Vec::new(),
            metaclass: None,
            literal: None,
            conditions: Vec::new(),
        }
    }

    pub fn is_instantiable(&self) -> bool {
        self.flags.contains(ClassFlags::INSTANTIABLE)
    }

    pub fn is_protocol(&self) -> bool {
        self.flags.contains(ClassFlags::PROTOCOL)
    }

    /// Look up a member declared directly on this class.
    pub fn member(&self, name: Atom) -> Option<&ClassMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Kind of one function parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ParamKind {
    Positional,
    /// `*args`-style catch-all.
    VarArgs,
    /// `**kwargs`-style catch-all.
    KwArgs,
}

/// One function parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ParamInfo {
    pub name: Option<Atom>,
    pub ty: TypeId,
    pub kind: ParamKind,
    pub has_default: bool,
}

impl ParamInfo {
    pub fn positional(name: Option<Atom>, ty: TypeId) -> Self {
        ParamInfo {
            name,
            ty,
            kind: ParamKind::Positional,
            has_default: false,
        }
    }
}

/// A function signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionShape {
    pub name: Atom,
    pub params: Vec<ParamInfo>,
    pub return_type: TypeId,
    pub type_params: Vec<TypeId>,
    pub flags: FunctionFlags,
    /// ParamSpec tail (`*args: P.args, **kwargs: P.kwargs`).
    pub param_spec: Option<TypeId>,
}

impl FunctionShape {
    pub fn new(name: Atom, params: Vec<ParamInfo>, return_type: TypeId) -> Self {
        FunctionShape {
            name,
            params,
            return_type,
            type_params: Vec::new(),
            flags: FunctionFlags::empty(),
            param_spec: None,
        }
    }

    /// The gradual `(...) -> ret` form.
    pub fn gradual(name: Atom, return_type: TypeId) -> Self {
        FunctionShape {
            name,
            params: Vec::new(),
            return_type,
            type_params: Vec::new(),
            flags: FunctionFlags::GRADUAL_FORM,
            param_spec: None,
        }
    }

    pub fn is_gradual(&self) -> bool {
        self.flags.contains(FunctionFlags::GRADUAL_FORM)
    }
}

/// An overloaded callable: two or more function types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OverloadShape {
    pub name: Atom,
    pub overloads: Vec<TypeId>,
}

/// A module type: a named bag of typed members.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleShape {
    pub name: Atom,
    pub members: Vec<(Atom, TypeId)>,
}

impl ModuleShape {
    pub fn member(&self, name: Atom) -> Option<TypeId> {
        self.members
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
    }
}

/// Kind of a type variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TypeVarKind {
    Ordinary,
    /// Stands for a parameter list.
    ParamSpec,
    /// Stands for a variable-length ordered sequence of types.
    TypeVarTuple,
}

/// A type variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeVarShape {
    pub name: Atom,
    pub kind: TypeVarKind,
    pub scope_id: Option<ScopeId>,
    pub variance: Variance,
    /// Declared upper bound (`TypeVar("T", bound=...)`).
    pub bound: Option<TypeId>,
    /// Value constraints (`TypeVar("T", str, bytes)`); ordinary kind only.
    pub constraints: Vec<TypeId>,
    pub flags: TypeVarFlags,
}

impl TypeVarShape {
    pub fn new(name: Atom, scope_id: Option<ScopeId>) -> Self {
        TypeVarShape {
            name,
            kind: TypeVarKind::Ordinary,
            scope_id,
            variance: Variance::Invariant,
            bound: None,
            constraints: Vec::new(),
            flags: TypeVarFlags::empty(),
        }
    }

    pub fn is_free(&self) -> bool {
        !self.flags.contains(TypeVarFlags::IS_BOUND)
    }

    pub fn is_unification(&self) -> bool {
        self.flags.contains(TypeVarFlags::UNIFICATION)
    }

    pub fn is_instantiable(&self) -> bool {
        self.flags.contains(TypeVarFlags::INSTANTIABLE)
    }
}

/// Key identifying a type variable across specializations: scoped name.
///
/// Two handles to the same declared variable (e.g. with different flag bits
/// after unpacking) share a key; entries in constraint sets and substitution
/// maps are stored per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TypeVarKey {
    pub name: Atom,
    pub scope: Option<ScopeId>,
}

impl TypeVarKey {
    pub fn of(shape: &TypeVarShape) -> Self {
        TypeVarKey {
            name: shape.name,
            scope: shape.scope_id,
        }
    }
}

// =============================================================================
// Type key
// =============================================================================

/// All interned type variants.
///
/// Large variants point at shape records so the key itself stays small and
/// hashable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Any,
    Unknown,
    Never,
    Unbound,
    Class(ClassId),
    Function(FunctionId),
    Overloaded(OverloadId),
    Module(ModuleId),
    /// Normalized member list: flattened, deduplicated, `Never`-free.
    Union(Vec<TypeId>),
    TypeVar(TypeVarId),
    /// Lazy reference to a named definition; breaks self-referential cycles.
    Ref(DefId),
}
