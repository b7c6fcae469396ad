//! Expected-type seeding: mapping a contextual type's arguments back onto
//! a target class's type parameters.

mod common;

use common::{install_builtins, type_var};
use pyz_solver::{
    ClassShape, ConstraintTracker, Judge, SolveOptions, TypeDatabase, TypeEnvironment, TypeId,
    TypeInterner, TypeVarKey, specialize_class,
};

struct Hierarchy {
    base_generic: TypeId,
    derived_generic: TypeId,
    x: TypeId,
    y: TypeId,
}

/// `class Base[XB]` and `class Derived[X, Y](Base[X])`.
fn build_hierarchy(interner: &TypeInterner, object: TypeId) -> Hierarchy {
    let base_scope = interner.fresh_scope_id();
    let xb = type_var(interner, "XB", base_scope);
    let mut base_shape = ClassShape::named(
        interner.intern_string("Base"),
        interner.intern_string("test.Base"),
    );
    base_shape.type_params = vec![xb];
    base_shape.mro = vec![object];
    let base_generic = interner.class(base_shape);

    let derived_scope = interner.fresh_scope_id();
    let x = type_var(interner, "X", derived_scope);
    let y = type_var(interner, "Y", derived_scope);
    let base_x = specialize_class(interner, base_generic, vec![x]).unwrap();
    let mut derived_shape = ClassShape::named(
        interner.intern_string("Derived"),
        interner.intern_string("test.Derived"),
    );
    derived_shape.type_params = vec![x, y];
    derived_shape.mro = vec![base_x, object];
    let derived_generic = interner.class(derived_shape);

    Hierarchy {
        base_generic,
        derived_generic,
        x,
        y,
    }
}

fn key_of(interner: &TypeInterner, var: TypeId) -> TypeVarKey {
    TypeVarKey::of(&interner.type_var_of(var).unwrap())
}

#[test]
fn seeding_from_a_specialized_base_recovers_the_parameter() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let h = build_hierarchy(&interner, builtins.object);

    let expected = specialize_class(&interner, h.base_generic, vec![builtins.int]).unwrap();
    let mut tracker = ConstraintTracker::new();
    assert!(judge.seed_from_expected_type(h.derived_generic, expected, &mut tracker, None));

    let solution = judge.solve_constraints(&tracker, SolveOptions::default());
    assert_eq!(solution.resolve(key_of(&interner, h.x)), Some(builtins.int));
    // Y picked up no constraint and stays unresolved.
    assert_eq!(solution.resolve(key_of(&interner, h.y)), None);

    // Applying the solution leaves Y as Unknown.
    let applied = solution
        .main_set()
        .apply_defaulting_unknown(&interner, h.y);
    assert_eq!(applied, TypeId::UNKNOWN);
}

#[test]
fn seeding_from_the_same_generic_class_reads_args_directly() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let h = build_hierarchy(&interner, builtins.object);

    let expected =
        specialize_class(&interner, h.derived_generic, vec![builtins.int, builtins.str_]).unwrap();
    let mut tracker = ConstraintTracker::new();
    assert!(judge.seed_from_expected_type(h.derived_generic, expected, &mut tracker, None));

    let solution = judge.solve_constraints(&tracker, SolveOptions::default());
    assert_eq!(solution.resolve(key_of(&interner, h.x)), Some(builtins.int));
    assert_eq!(solution.resolve(key_of(&interner, h.y)), Some(builtins.str_));
}

#[test]
fn seed_recovers_identity() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let h = build_hierarchy(&interner, builtins.object);

    // Seeding C[X, Y] from C[X, Y] solves every parameter to itself.
    let self_specialized =
        specialize_class(&interner, h.derived_generic, vec![h.x, h.y]).unwrap();
    let mut tracker = ConstraintTracker::new();
    assert!(judge.seed_from_expected_type(
        h.derived_generic,
        self_specialized,
        &mut tracker,
        None
    ));
    let solution = judge.solve_constraints(&tracker, SolveOptions::default());
    assert_eq!(solution.resolve(key_of(&interner, h.x)), Some(h.x));
    assert_eq!(solution.resolve(key_of(&interner, h.y)), Some(h.y));
}

#[test]
fn seeding_from_any_makes_everything_any() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let h = build_hierarchy(&interner, builtins.object);

    let mut tracker = ConstraintTracker::new();
    assert!(judge.seed_from_expected_type(h.derived_generic, TypeId::ANY, &mut tracker, None));
    let solution = judge.solve_constraints(&tracker, SolveOptions::default());
    assert_eq!(solution.resolve(key_of(&interner, h.x)), Some(TypeId::ANY));
    assert_eq!(solution.resolve(key_of(&interner, h.y)), Some(TypeId::ANY));
}

#[test]
fn seeding_from_a_non_class_fails() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let h = build_hierarchy(&interner, builtins.object);

    let mut tracker = ConstraintTracker::new();
    assert!(!judge.seed_from_expected_type(h.derived_generic, TypeId::NEVER, &mut tracker, None));
}

#[test]
fn live_scope_filter_limits_recording() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let h = build_hierarchy(&interner, builtins.object);

    let expected =
        specialize_class(&interner, h.derived_generic, vec![builtins.int, builtins.str_]).unwrap();
    let dead_scope = interner.fresh_scope_id();
    let mut tracker = ConstraintTracker::new();
    assert!(judge.seed_from_expected_type(
        h.derived_generic,
        expected,
        &mut tracker,
        Some(&[dead_scope])
    ));
    assert!(tracker.main_set().is_empty());
}
