//! Shared builders for integration tests.
#![allow(dead_code)]

use pyz_solver::{
    ClassShape, LiteralValue, ScopeId, TypeDatabase, TypeEnvironment, TypeId, TypeInterner,
    TypeVarShape,
};

pub struct Builtins {
    pub object: TypeId,
    pub type_: TypeId,
    pub tuple: TypeId,
    pub int: TypeId,
    pub str_: TypeId,
    pub bytes: TypeId,
    pub bool_: TypeId,
}

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

pub fn simple_class(db: &TypeInterner, name: &str, object: TypeId) -> TypeId {
    let mut shape = ClassShape::named(
        db.intern_string(name),
        db.intern_string(&format!("test.{name}")),
    );
    shape.mro = vec![object];
    db.class(shape)
}

pub fn type_var(db: &TypeInterner, name: &str, scope: ScopeId) -> TypeId {
    db.type_var(TypeVarShape::new(db.intern_string(name), Some(scope)))
}

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

#[allow(dead_code)]
pub fn literal_int(db: &TypeInterner, int_class: TypeId, value: i64) -> TypeId {
    let shape = db.class_of(int_class).expect("carrier class");
    let mut new_shape = (*shape).clone();
    new_shape.literal = Some(LiteralValue::Int(value));
    db.class(new_shape)
}
