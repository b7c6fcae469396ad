use super::*;
use super::fixtures::{install_builtins, literal, literal_int, type_var};
use crate::db::TypeEnvironment;

#[test]
fn prints_singletons() {
    let interner = TypeInterner::new();
    assert_eq!(print_type(&interner, TypeId::ANY), "Any");
    assert_eq!(print_type(&interner, TypeId::UNKNOWN), "Unknown");
    assert_eq!(print_type(&interner, TypeId::NEVER), "Never");
    assert_eq!(print_type(&interner, TypeId::UNBOUND), "Unbound");
}

#[test]
fn prints_classes_and_literals() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    assert_eq!(print_type(&interner, builtins.int), "int");
    assert_eq!(
        print_type(&interner, literal_int(&interner, builtins.int, 1)),
        "Literal[1]"
    );
    assert_eq!(
        print_type(
            &interner,
            literal(&interner, builtins.str_, LiteralValue::Str(interner.intern_string("x")))
        ),
        "Literal['x']"
    );
    assert_eq!(
        print_type(&interner, literal(&interner, builtins.bool_, LiteralValue::Bool(true))),
        "Literal[True]"
    );
}

#[test]
fn prints_specializations_and_type_forms() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let scope = interner.fresh_scope_id();
    let t = type_var(&interner, "T", scope);

    let mut shape = ClassShape::named(
        interner.intern_string("list"),
        interner.intern_string("builtins.list"),
    );
    shape.type_params = vec![t];
    shape.mro = vec![builtins.object];
    let list_generic = interner.class(shape);
    let list_int = specialize_class(&interner, list_generic, vec![builtins.int]).unwrap();
    assert_eq!(print_type(&interner, list_int), "list[int]");

    let type_int = convert_to_instantiable(&interner, builtins.int).unwrap();
    assert_eq!(print_type(&interner, type_int), "type[int]");
}

#[test]
fn prints_unions_in_member_order() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let union = interner.union(vec![builtins.int, builtins.str_]);
    assert_eq!(print_type(&interner, union), "int | str");
}

#[test]
fn prints_functions() {
    let interner = TypeInterner::new();
    let env = TypeEnvironment::new();
    let builtins = install_builtins(&interner, &env);
    let function = interner.function(FunctionShape::new(
        interner.intern_string("f"),
        vec![ParamInfo::positional(
            Some(interner.intern_string("x")),
            builtins.int,
        )],
        builtins.str_,
    ));
    assert_eq!(print_type(&interner, function), "(x: int) -> str");

    let gradual = interner.function(FunctionShape::gradual(
        interner.intern_string("g"),
        builtins.int,
    ));
    assert_eq!(print_type(&interner, gradual), "(...) -> int");
}

#[test]
fn prints_type_vars() {
    let interner = TypeInterner::new();
    let scope = interner.fresh_scope_id();
    let t = type_var(&interner, "T", scope);
    assert_eq!(print_type(&interner, t), "T");
}
