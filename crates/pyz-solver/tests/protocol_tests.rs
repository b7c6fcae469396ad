//! Structural protocol matching: member lookup, generic inference,
//! invariance of mutable members, modules, recursion, and the cache.

mod common;

use common::{install_builtins, simple_class, type_var};
use pyz_common::DiagSink;
use pyz_common::diagnostics::diagnostic_codes;
use pyz_solver::{
    AssignFlags, ClassFlags, ClassMember, ClassShape, ConstraintTracker, FunctionShape, Judge,
    MemberFlags, ModuleShape, ParamInfo, SolveOptions, TypeDatabase, TypeEnvironment, TypeId,
    TypeInterner, TypeKey, TypeVarKey, specialize_class,
};

/// A protocol with one method `f(self) -> R`.
fn method_protocol(interner: &TypeInterner, name: &str, ret: TypeId, object: TypeId) -> TypeId {
    let f = interner.function(FunctionShape::new(
        interner.intern_string("f"),
        vec![ParamInfo::positional(
            Some(interner.intern_string("self")),
            TypeId::ANY,
        )],
        ret,
    ));
    let mut shape = ClassShape::named(
        interner.intern_string(name),
        interner.intern_string(&format!("test.{name}")),
    );
    shape.flags |= ClassFlags::PROTOCOL;
    shape.members = vec![ClassMember::new(interner.intern_string("f"), f)];
    shape.mro = vec![object];
    interner.class(shape)
}

/// A class with one method `f(self) -> R`.
fn method_class(interner: &TypeInterner, name: &str, ret: TypeId, object: TypeId) -> TypeId {
    let f = interner.function(FunctionShape::new(
        interner.intern_string("f"),
        vec![ParamInfo::positional(
            Some(interner.intern_string("self")),
            TypeId::ANY,
        )],
        ret,
    ));
    let mut shape = ClassShape::named(
        interner.intern_string(name),
        interner.intern_string(&format!("test.{name}")),
    );
    shape.members = vec![ClassMember::new(interner.intern_string("f"), f)];
    shape.mro = vec![object];
    interner.class(shape)
}

#[test]
fn protocol_reflexivity() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let protocol = method_protocol(&interner, "P", builtins.int, builtins.object);
    assert!(judge.assign_class_to_protocol(protocol, protocol, None, None, AssignFlags::empty()));
}

#[test]
fn structural_match_on_method_return() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let protocol = method_protocol(&interner, "P", builtins.int, builtins.object);

    let good = method_class(&interner, "Good", builtins.bool_, builtins.object);
    let bad = method_class(&interner, "Bad", builtins.str_, builtins.object);
    assert!(judge.assign_class_to_protocol(protocol, good, None, None, AssignFlags::empty()));
    assert!(!judge.assign_class_to_protocol(protocol, bad, None, None, AssignFlags::empty()));

    // The protocol dispatch also fires through plain assignability.
    assert!(judge.is_subtype(protocol, good));
}

#[test]
fn missing_member_is_reported() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let protocol = method_protocol(&interner, "P", builtins.int, builtins.object);
    let empty = simple_class(&interner, "Empty", builtins.object);

    let mut sink = DiagSink::new();
    assert!(!judge.assign_class_to_protocol(
        protocol,
        empty,
        None,
        Some(&mut sink),
        AssignFlags::empty()
    ));
    assert_eq!(
        sink.entries()[0].code,
        diagnostic_codes::PROTOCOL_MEMBER_MISSING
    );
}

#[test]
fn generic_protocol_inference_records_the_type_argument() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    // protocol P[T]: def f(self) -> T
    let protocol_scope = interner.fresh_scope_id();
    let t = type_var(&interner, "T", protocol_scope);
    let f = interner.function(FunctionShape::new(
        interner.intern_string("f"),
        vec![ParamInfo::positional(
            Some(interner.intern_string("self")),
            TypeId::ANY,
        )],
        t,
    ));
    let mut shape = ClassShape::named(
        interner.intern_string("P"),
        interner.intern_string("test.P"),
    );
    shape.flags |= ClassFlags::PROTOCOL;
    shape.type_params = vec![t];
    shape.members = vec![ClassMember::new(interner.intern_string("f"), f)];
    shape.mro = vec![builtins.object];
    let protocol = interner.class(shape);

    // The caller asks whether C satisfies P[T'] for its own free T'.
    let caller_scope = interner.fresh_scope_id();
    let t_prime = type_var(&interner, "T'", caller_scope);
    let specialized = specialize_class(&interner, protocol, vec![t_prime]).unwrap();
    let candidate = method_class(&interner, "C", builtins.int, builtins.object);

    let mut tracker = ConstraintTracker::with_scope(caller_scope);
    assert!(judge.assign_class_to_protocol(
        specialized,
        candidate,
        Some(&mut tracker),
        None,
        AssignFlags::empty()
    ));
    let solution = judge.solve_constraints(&tracker, SolveOptions::default());
    let key = TypeVarKey::of(&interner.type_var_of(t_prime).unwrap());
    assert_eq!(solution.resolve(key), Some(builtins.int));
}

#[test]
fn mutable_members_require_invariance() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    let attr_protocol = {
        let mut shape = ClassShape::named(
            interner.intern_string("HasX"),
            interner.intern_string("test.HasX"),
        );
        shape.flags |= ClassFlags::PROTOCOL;
        shape.members = vec![ClassMember::new(
            interner.intern_string("x"),
            builtins.int,
        )];
        shape.mro = vec![builtins.object];
        interner.class(shape)
    };
    let attr_class = |name: &str, ty: TypeId, flags: MemberFlags| {
        let mut shape = ClassShape::named(
            interner.intern_string(name),
            interner.intern_string(&format!("test.{name}")),
        );
        shape.members = vec![ClassMember::with_flags(
            interner.intern_string("x"),
            ty,
            flags,
        )];
        shape.mro = vec![builtins.object];
        interner.class(shape)
    };

    let exact = attr_class("Exact", builtins.int, MemberFlags::empty());
    assert!(judge.assign_class_to_protocol(attr_protocol, exact, None, None, AssignFlags::empty()));

    // A narrower mutable member is not invariant-compatible.
    let narrower = attr_class("Narrower", builtins.bool_, MemberFlags::empty());
    let mut sink = DiagSink::new();
    assert!(!judge.assign_class_to_protocol(
        attr_protocol,
        narrower,
        None,
        Some(&mut sink),
        AssignFlags::empty()
    ));
    assert_eq!(
        sink.entries()[0].code,
        diagnostic_codes::PROTOCOL_MEMBER_INVARIANCE
    );

    // A read-only implementation cannot back a writable protocol member.
    let read_only = attr_class("Frozen", builtins.int, MemberFlags::READ_ONLY);
    let mut sink = DiagSink::new();
    assert!(!judge.assign_class_to_protocol(
        attr_protocol,
        read_only,
        None,
        Some(&mut sink),
        AssignFlags::empty()
    ));
    assert_eq!(
        sink.entries()[0].code,
        diagnostic_codes::PROTOCOL_MEMBER_WRITABILITY
    );
}

#[test]
fn final_mismatch_is_rejected_in_both_directions() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    let protocol_with = |flags: MemberFlags| {
        let mut shape = ClassShape::named(
            interner.intern_string("HasC"),
            interner.intern_string("test.HasC"),
        );
        shape.flags |= ClassFlags::PROTOCOL;
        shape.members = vec![ClassMember::with_flags(
            interner.intern_string("c"),
            builtins.int,
            flags,
        )];
        shape.mro = vec![builtins.object];
        interner.class(shape)
    };
    let class_with = |name: &str, flags: MemberFlags| {
        let mut shape = ClassShape::named(
            interner.intern_string(name),
            interner.intern_string(&format!("test.{name}")),
        );
        shape.members = vec![ClassMember::with_flags(
            interner.intern_string("c"),
            builtins.int,
            flags,
        )];
        shape.mro = vec![builtins.object];
        interner.class(shape)
    };

    let final_protocol = protocol_with(MemberFlags::FINAL | MemberFlags::READ_ONLY);
    let plain_class = class_with("Plain", MemberFlags::empty());
    assert!(!judge.assign_class_to_protocol(
        final_protocol,
        plain_class,
        None,
        None,
        AssignFlags::empty()
    ));

    let plain_protocol = protocol_with(MemberFlags::READ_ONLY);
    let final_class = class_with("Fixed", MemberFlags::FINAL | MemberFlags::READ_ONLY);
    assert!(!judge.assign_class_to_protocol(
        plain_protocol,
        final_class,
        None,
        None,
        AssignFlags::empty()
    ));
}

#[test]
fn module_satisfies_a_function_protocol() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let protocol = method_protocol(&interner, "P", builtins.int, builtins.object);

    let module_fn = interner.function(FunctionShape::new(
        interner.intern_string("f"),
        vec![],
        builtins.int,
    ));
    let module = interner.module(ModuleShape {
        name: interner.intern_string("impl_mod"),
        members: vec![(interner.intern_string("f"), module_fn)],
    });
    assert!(judge.assign_module_to_protocol(protocol, module, None, None, AssignFlags::empty()));

    let wrong_fn = interner.function(FunctionShape::new(
        interner.intern_string("f"),
        vec![],
        builtins.str_,
    ));
    let wrong_module = interner.module(ModuleShape {
        name: interner.intern_string("wrong_mod"),
        members: vec![(interner.intern_string("f"), wrong_fn)],
    });
    assert!(!judge.assign_module_to_protocol(
        protocol,
        wrong_module,
        None,
        None,
        AssignFlags::empty()
    ));
}

#[test]
fn recursive_protocols_terminate_via_the_match_stack() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    // protocol Chain: def f(self) -> Chain
    let protocol_def = env.alloc_def();
    let protocol_ref = interner.intern_key(TypeKey::Ref(protocol_def));
    let protocol = method_protocol(&interner, "Chain", protocol_ref, builtins.object);
    env.insert_def(protocol_def, protocol);

    // class Link: def f(self) -> Link
    let link_def = env.alloc_def();
    let link_ref = interner.intern_key(TypeKey::Ref(link_def));
    let link = method_class(&interner, "Link", link_ref, builtins.object);
    env.insert_def(link_def, link);

    assert!(judge.assign_class_to_protocol(protocol, link, None, None, AssignFlags::empty()));
}

#[test]
fn property_members_compare_accessor_by_accessor() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    let property_class = |name: &str, value_ty: TypeId, with_setter: bool| {
        let self_param = ParamInfo::positional(Some(interner.intern_string("self")), TypeId::ANY);
        let fget = interner.function(FunctionShape::new(
            interner.intern_string("fget"),
            vec![self_param],
            value_ty,
        ));
        let mut members = vec![ClassMember::new(interner.intern_string("fget"), fget)];
        if with_setter {
            let fset = interner.function(FunctionShape::new(
                interner.intern_string("fset"),
                vec![
                    self_param,
                    ParamInfo::positional(Some(interner.intern_string("value")), value_ty),
                ],
                TypeId::ANY,
            ));
            members.push(ClassMember::new(interner.intern_string("fset"), fset));
        }
        let mut shape = ClassShape::named(
            interner.intern_string(name),
            interner.intern_string(&format!("test.{name}")),
        );
        shape.flags |= ClassFlags::PROPERTY_CLASS;
        shape.members = members;
        shape.mro = vec![builtins.object];
        interner.class(shape)
    };
    let class_with_property = |name: &str, property: TypeId| {
        let mut shape = ClassShape::named(
            interner.intern_string(name),
            interner.intern_string(&format!("test.{name}")),
        );
        shape.members = vec![ClassMember::new(interner.intern_string("value"), property)];
        shape.mro = vec![builtins.object];
        interner.class(shape)
    };

    let protocol = {
        let mut shape = ClassShape::named(
            interner.intern_string("HasValue"),
            interner.intern_string("test.HasValue"),
        );
        shape.flags |= ClassFlags::PROTOCOL;
        shape.members = vec![ClassMember::new(
            interner.intern_string("value"),
            property_class("ValueProp", builtins.int, true),
        )];
        shape.mro = vec![builtins.object];
        interner.class(shape)
    };

    let complete = class_with_property("Complete", property_class("P1", builtins.int, true));
    assert!(judge.assign_class_to_protocol(protocol, complete, None, None, AssignFlags::empty()));

    // Getter only: the protocol's setter has no counterpart.
    let getter_only = class_with_property("GetterOnly", property_class("P2", builtins.int, false));
    let mut sink = DiagSink::new();
    assert!(!judge.assign_class_to_protocol(
        protocol,
        getter_only,
        None,
        Some(&mut sink),
        AssignFlags::empty()
    ));
    assert_eq!(
        sink.entries()[0].code,
        diagnostic_codes::PROPERTY_ACCESSOR_MISMATCH
    );
}

#[test]
fn compatibility_results_are_stable_across_cache_hits() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);
    let protocol = method_protocol(&interner, "P", builtins.int, builtins.object);
    let good = method_class(&interner, "Good", builtins.int, builtins.object);
    let bad = method_class(&interner, "Bad", builtins.str_, builtins.object);

    for _ in 0..3 {
        assert!(judge.assign_class_to_protocol(protocol, good, None, None, AssignFlags::empty()));
        assert!(!judge.assign_class_to_protocol(protocol, bad, None, None, AssignFlags::empty()));
    }

    // Eviction does not change answers.
    judge.invalidate_protocol_cache(protocol);
    assert!(judge.assign_class_to_protocol(protocol, good, None, None, AssignFlags::empty()));
    assert!(!judge.assign_class_to_protocol(protocol, bad, None, None, AssignFlags::empty()));
}

#[test]
fn callable_protocol_matches_a_function_through_call_slot() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let judge = Judge::new(&interner, &env);

    // protocol IntCallable: def __call__(self, x: int) -> int
    let call = interner.function(FunctionShape::new(
        interner.intern_string("__call__"),
        vec![
            ParamInfo::positional(Some(interner.intern_string("self")), TypeId::ANY),
            ParamInfo::positional(Some(interner.intern_string("x")), builtins.int),
        ],
        builtins.int,
    ));
    let mut shape = ClassShape::named(
        interner.intern_string("IntCallable"),
        interner.intern_string("test.IntCallable"),
    );
    shape.flags |= ClassFlags::PROTOCOL;
    shape.members = vec![ClassMember::new(interner.intern_string("__call__"), call)];
    shape.mro = vec![builtins.object];
    let callable_protocol = interner.class(shape);

    let matching = interner.function(FunctionShape::new(
        interner.intern_string("f"),
        vec![ParamInfo::positional(None, builtins.int)],
        builtins.int,
    ));
    assert!(judge.is_subtype(callable_protocol, matching));

    let mismatched = interner.function(FunctionShape::new(
        interner.intern_string("g"),
        vec![ParamInfo::positional(None, builtins.str_)],
        builtins.int,
    ));
    assert!(!judge.is_subtype(callable_protocol, mismatched));
}
