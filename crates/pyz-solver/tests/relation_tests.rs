//! Assignability-relation behavior: gradual wildcards, unions, nominal
//! subtyping, literals, functions, tuples, and variance.

mod common;

use common::{install_builtins, literal_int, simple_class, type_var, type_var_with};
use pyz_solver::{
    AssignFlags, ClassFlags, ClassShape, ConstraintTracker, FunctionShape, Judge, ParamInfo,
    SolveOptions, TupleElement, TypeDatabase, TypeEnvironment, TypeId, TypeInterner, TypeVarKey,
    Variance, convert_to_instantiable, specialize_class,
};

/// Opt into solver trace output with `RUST_LOG=pyz_solver=trace`.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn gradual_wildcards_assign_both_ways() {
    init_tracing();
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    assert!(judge.is_subtype(TypeId::ANY, builtins.int));
    assert!(judge.is_subtype(builtins.int, TypeId::ANY));
    assert!(judge.is_subtype(TypeId::UNKNOWN, builtins.int));
    assert!(judge.is_subtype(builtins.int, TypeId::UNKNOWN));
}

#[test]
fn never_assigns_everywhere_except_invariantly() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    assert!(judge.is_subtype(builtins.int, TypeId::NEVER));
    assert!(!judge.is_subtype(TypeId::NEVER, builtins.int));
    assert!(!judge.assign_type(
        builtins.int,
        TypeId::NEVER,
        None,
        None,
        AssignFlags::INVARIANT,
        0
    ));
}

#[test]
fn nominal_subtyping_follows_the_mro() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    assert!(judge.is_subtype(builtins.int, builtins.bool_));
    assert!(!judge.is_subtype(builtins.bool_, builtins.int));
    assert!(judge.is_subtype(builtins.object, builtins.bool_));
}

#[test]
fn literals_assign_to_their_carrier() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let one = literal_int(&interner, builtins.int, 1);
    let two = literal_int(&interner, builtins.int, 2);

    assert!(judge.is_subtype(builtins.int, one));
    assert!(!judge.is_subtype(one, builtins.int));
    assert!(!judge.is_subtype(one, two));
    assert!(judge.is_subtype(one, one));
}

#[test]
fn unions_require_every_source_member() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let int_or_str = interner.union(vec![builtins.int, builtins.str_]);

    assert!(judge.is_subtype(int_or_str, builtins.int));
    assert!(judge.is_subtype(int_or_str, int_or_str));
    let with_bytes = interner.union(vec![builtins.int, builtins.bytes]);
    assert!(!judge.is_subtype(int_or_str, with_bytes));
    assert!(!judge.is_subtype(builtins.int, int_or_str));
}

#[test]
fn class_objects_are_instances_of_type_and_object() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let type_int = convert_to_instantiable(&interner, builtins.int).unwrap();

    assert!(judge.is_subtype(builtins.object, type_int));
    assert!(judge.is_subtype(builtins.type_, type_int));
    assert!(!judge.is_subtype(builtins.int, type_int));
    assert!(!judge.is_subtype(type_int, builtins.int));
}

#[test]
fn function_params_are_contravariant_and_returns_covariant() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    let wide = interner.function(FunctionShape::new(
        interner.intern_string("f"),
        vec![ParamInfo::positional(None, builtins.int)],
        builtins.bool_,
    ));
    let narrow = interner.function(FunctionShape::new(
        interner.intern_string("g"),
        vec![ParamInfo::positional(None, builtins.bool_)],
        builtins.int,
    ));
    // (int) -> bool is usable where (bool) -> int is expected.
    assert!(judge.is_subtype(narrow, wide));
    assert!(!judge.is_subtype(wide, narrow));
}

#[test]
fn gradual_callables_accept_any_signature() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    let gradual = interner.function(FunctionShape::gradual(
        interner.intern_string("g"),
        builtins.int,
    ));
    let concrete = interner.function(FunctionShape::new(
        interner.intern_string("f"),
        vec![ParamInfo::positional(None, builtins.str_)],
        builtins.bool_,
    ));
    assert!(judge.is_subtype(gradual, concrete));
    assert!(judge.is_subtype(concrete, gradual));
}

#[test]
fn tuple_elements_match_with_unbounded_expansion() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    let tuple_of = |elements: Vec<TupleElement>| {
        let shape = interner.class_of(builtins.tuple).unwrap();
        let mut new_shape = (*shape).clone();
        new_shape.tuple_elements = Some(elements);
        interner.class(new_shape)
    };

    let int_str = tuple_of(vec![
        TupleElement::required(builtins.int),
        TupleElement::required(builtins.str_),
    ]);
    let bool_str = tuple_of(vec![
        TupleElement::required(builtins.bool_),
        TupleElement::required(builtins.str_),
    ]);
    assert!(judge.is_subtype(int_str, bool_str));
    assert!(!judge.is_subtype(bool_str, int_str));

    let homogeneous = tuple_of(vec![TupleElement::unbounded(builtins.int)]);
    let three_ints = tuple_of(vec![
        TupleElement::required(builtins.int),
        TupleElement::required(builtins.int),
        TupleElement::required(builtins.int),
    ]);
    assert!(judge.is_subtype(homogeneous, three_ints));
    assert!(!judge.is_subtype(three_ints, homogeneous));
}

#[test]
fn declared_variance_steers_type_argument_checks() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let scope = interner.fresh_scope_id();

    let make_box = |name: &str, variance: Variance| {
        let param = type_var_with(&interner, "T", scope, |shape| {
            shape.variance = variance;
        });
        let mut shape = ClassShape::named(
            interner.intern_string(name),
            interner.intern_string(&format!("test.{name}")),
        );
        shape.type_params = vec![param];
        shape.mro = vec![builtins.object];
        interner.class(shape)
    };

    let invariant_box = make_box("Box", Variance::Invariant);
    let box_int = specialize_class(&interner, invariant_box, vec![builtins.int]).unwrap();
    let box_bool = specialize_class(&interner, invariant_box, vec![builtins.bool_]).unwrap();
    assert!(!judge.is_subtype(box_int, box_bool));
    assert!(judge.is_subtype(box_int, box_int));

    let covariant_box = make_box("CoBox", Variance::Covariant);
    let co_int = specialize_class(&interner, covariant_box, vec![builtins.int]).unwrap();
    let co_bool = specialize_class(&interner, covariant_box, vec![builtins.bool_]).unwrap();
    assert!(judge.is_subtype(co_int, co_bool));
    assert!(!judge.is_subtype(co_bool, co_int));
}

#[test]
fn generic_argument_inference_records_into_the_tracker() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let scope = interner.fresh_scope_id();
    let t = type_var(&interner, "T", scope);

    let mut shape = ClassShape::named(
        interner.intern_string("Box"),
        interner.intern_string("test.Box"),
    );
    shape.type_params = vec![t];
    shape.mro = vec![builtins.object];
    let box_generic = interner.class(shape);
    let box_t = specialize_class(&interner, box_generic, vec![t]).unwrap();
    let box_int = specialize_class(&interner, box_generic, vec![builtins.int]).unwrap();

    let mut tracker = ConstraintTracker::with_scope(scope);
    assert!(judge.assign_type(box_t, box_int, None, Some(&mut tracker), AssignFlags::empty(), 0));
    let solution = judge.solve_constraints(&tracker, SolveOptions::default());
    let key = TypeVarKey::of(&interner.type_var_of(t).unwrap());
    assert_eq!(solution.resolve(key), Some(builtins.int));
}

#[test]
fn classes_deriving_from_unknown_assign_anywhere() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    let mut shape = ClassShape::named(
        interner.intern_string("Dynamic"),
        interner.intern_string("test.Dynamic"),
    );
    shape.mro = vec![TypeId::UNKNOWN];
    let dynamic = interner.class(shape);
    assert!(judge.is_subtype(builtins.int, dynamic));
    assert!(judge.is_subtype(simple_class(&interner, "Other", builtins.object), dynamic));
}

#[test]
fn overload_overlap_disables_gradual_wildcards() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    assert!(judge.is_subtype(builtins.int, TypeId::ANY));
    assert!(!judge.assign_type(
        builtins.int,
        TypeId::ANY,
        None,
        None,
        AssignFlags::OVERLOAD_OVERLAP,
        0
    ));
}

#[test]
fn unpacked_class_flag_does_not_confuse_plain_tuples() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    let shape = interner.class_of(builtins.tuple).unwrap();
    let mut unpacked = (*shape).clone();
    unpacked.tuple_elements = Some(vec![TupleElement::required(builtins.int)]);
    unpacked.flags |= ClassFlags::UNPACKED;
    let unpacked = interner.class(unpacked);
    assert!(judge.is_subtype(unpacked, unpacked));
}
