use super::*;
use super::fixtures::{install_builtins, literal_int, simple_class};
use crate::db::TypeEnvironment;

#[test]
fn singleton_constants_are_preregistered() {
    let interner = TypeInterner::new();
    assert_eq!(interner.lookup(TypeId::ANY), Some(TypeKey::Any));
    assert_eq!(interner.lookup(TypeId::UNKNOWN), Some(TypeKey::Unknown));
    assert_eq!(interner.lookup(TypeId::NEVER), Some(TypeKey::Never));
    assert_eq!(interner.lookup(TypeId::UNBOUND), Some(TypeKey::Unbound));
}

#[test]
fn structural_deduplication() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);

    let a = literal_int(&interner, builtins.int, 1);
    let b = literal_int(&interner, builtins.int, 1);
    let c = literal_int(&interner, builtins.int, 2);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn atoms_deduplicate() {
    let interner = TypeInterner::new();
    let a = interner.intern_string("T");
    let b = interner.intern_string("T");
    let c = interner.intern_string("U");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(interner.resolve_atom(a), "T");
}

#[test]
fn union_single_member_is_the_member() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    assert_eq!(interner.union(vec![builtins.int]), builtins.int);
}

#[test]
fn union_any_dominates() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    assert_eq!(
        interner.union(vec![builtins.int, TypeId::ANY]),
        TypeId::ANY
    );
    assert_eq!(
        interner.union(vec![TypeId::ANY, TypeId::UNKNOWN]),
        TypeId::ANY
    );
}

#[test]
fn union_unknown_dominates_concrete_members() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    assert_eq!(
        interner.union(vec![builtins.int, TypeId::UNKNOWN]),
        TypeId::UNKNOWN
    );
}

#[test]
fn union_drops_never() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    assert_eq!(
        interner.union(vec![builtins.int, TypeId::NEVER]),
        builtins.int
    );
    assert_eq!(interner.union(vec![]), TypeId::NEVER);
}

#[test]
fn union_dedups_and_flattens() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let nested = interner.union(vec![builtins.int, builtins.str_]);
    let flattened = interner.union(vec![builtins.int, nested, builtins.int]);
    let expected = interner.union(vec![builtins.int, builtins.str_]);
    assert_eq!(flattened, expected);
}

#[test]
fn distinct_classes_get_distinct_ids() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let a = simple_class(&interner, "A", builtins.object);
    let b = simple_class(&interner, "B", builtins.object);
    assert_ne!(a, b);
    assert_eq!(a, simple_class(&interner, "A", builtins.object));
}

#[test]
fn fresh_scope_ids_are_unique() {
    let interner = TypeInterner::new();
    let a = interner.fresh_scope_id();
    let b = interner.fresh_scope_id();
    assert_ne!(a, b);
}

#[test]
fn concurrent_interning_is_deterministic() {
    use rayon::prelude::*;

    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);

    let ids: Vec<TypeId> = (0..64)
        .into_par_iter()
        .map(|i| literal_int(&interner, builtins.int, i % 4))
        .collect();
    // Only four distinct literals exist, however many threads interned them.
    let mut unique: Vec<TypeId> = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 4);
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(*id, literal_int(&interner, builtins.int, (i as i64) % 4));
    }
}
