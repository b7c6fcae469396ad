//! Shared builders for solver tests: a minimal builtin universe and
//! shorthand constructors for classes, variables, and literals.

use crate::db::{TypeDatabase, TypeEnvironment};
use crate::intern::TypeInterner;
use crate::types::{ClassShape, LiteralValue, ScopeId, TypeId, TypeVarShape};

/// Ids of the registered builtin classes.
pub struct Builtins {
    pub object: TypeId,
    pub type_: TypeId,
    pub tuple: TypeId,
    pub int: TypeId,
    pub str_: TypeId,
    pub bytes: TypeId,
    pub bool_: TypeId,
}

/// Register a small builtin universe into the environment.
pub fn install_builtins(db: &TypeInterner, env: &TypeEnvironment) -> Builtins {
    let object = db.class(ClassShape::named(
        db.intern_string("object"),
        db.intern_string("builtins.object"),
    ));
    let mut make = |name: &str| {
        let mut shape = ClassShape::named(
            db.intern_string(name),
            db.intern_string(&format!("builtins.{name}")),
        );
        shape.mro = vec![object];
        db.class(shape)
    };
    let type_ = make("type");
    let tuple = make("tuple");
    let int = make("int");
    let str_ = make("str");
    let bytes = make("bytes");
    let bool_ = {
        let mut shape = ClassShape::named(
            db.intern_string("bool"),
            db.intern_string("builtins.bool"),
        );
        shape.mro = vec![int, object];
        db.class(shape)
    };
    env.register_builtin("object", object);
    env.register_builtin("type", type_);
    env.register_builtin("tuple", tuple);
    env.register_builtin("int", int);
    env.register_builtin("str", str_);
    env.register_builtin("bytes", bytes);
    env.register_builtin("bool", bool_);
    Builtins {
        object,
        type_,
        tuple,
        int,
        str_,
        bytes,
        bool_,
    }
}

/// A plain instance class deriving from `object`.
pub fn simple_class(db: &TypeInterner, name: &str, object: TypeId) -> TypeId {
    let mut shape = ClassShape::named(
        db.intern_string(name),
        db.intern_string(&format!("test.{name}")),
    );
    shape.mro = vec![object];
    db.class(shape)
}

/// An ordinary invariant type variable.
pub fn type_var(db: &TypeInterner, name: &str, scope: ScopeId) -> TypeId {
    db.type_var(TypeVarShape::new(db.intern_string(name), Some(scope)))
}

/// An ordinary type variable with extra shape tweaks.
pub fn type_var_with(
    db: &TypeInterner,
    name: &str,
    scope: ScopeId,
    tweak: impl FnOnce(&mut TypeVarShape),
) -> TypeId {
    let mut shape = TypeVarShape::new(db.intern_string(name), Some(scope));
    tweak(&mut shape);
    db.type_var(shape)
}

/// A literal type: the carrier class with a literal value attached.
pub fn literal(db: &TypeInterner, carrier: TypeId, value: LiteralValue) -> TypeId {
    let shape = db.class_of(carrier).expect("carrier class");
    let mut new_shape = (*shape).clone();
    new_shape.literal = Some(value);
    db.class(new_shape)
}

/// An int literal.
pub fn literal_int(db: &TypeInterner, int_class: TypeId, value: i64) -> TypeId {
    literal(db, int_class, LiteralValue::Int(value))
}
