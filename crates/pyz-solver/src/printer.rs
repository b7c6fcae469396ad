//! Type rendering for diagnostics.
//!
//! `print_type` produces the short surface syntax used in error messages:
//! `int | str`, `list[int]`, `Literal[1]`, `(x: int) -> str`, `type[C]`.

use crate::db::TypeDatabase;
use crate::recursion::{DepthCounter, RecursionProfile};
use crate::types::{LiteralValue, ParamKind, TypeId, TypeKey, TypeVarFlags, TypeVarKind};

pub fn print_type(db: &dyn TypeDatabase, ty: TypeId) -> String {
    let mut depth = DepthCounter::with_profile(RecursionProfile::TypeTraversal);
    print_inner(db, ty, &mut depth)
}

fn print_inner(db: &dyn TypeDatabase, ty: TypeId, depth: &mut DepthCounter) -> String {
    if !depth.enter() {
        return "...".to_string();
    }
    let text = match db.lookup(ty) {
        Some(TypeKey::Any) => "Any".to_string(),
        Some(TypeKey::Unknown) => "Unknown".to_string(),
        Some(TypeKey::Never) => "Never".to_string(),
        Some(TypeKey::Unbound) => "Unbound".to_string(),
        Some(TypeKey::Ref(_)) => "<recursive>".to_string(),
        Some(TypeKey::Union(members)) => members
            .iter()
            .map(|&m| print_inner(db, m, depth))
            .collect::<Vec<_>>()
            .join(" | "),
        Some(TypeKey::Class(class_id)) => {
            let shape = db.class_shape(class_id);
            let body = if let Some(literal) = shape.literal {
                format!("Literal[{}]", print_literal(db, literal))
            } else if let Some(elements) = &shape.tuple_elements {
                let rendered: Vec<String> = elements
                    .iter()
                    .map(|e| {
                        let inner = print_inner(db, e.ty, depth);
                        if e.is_unbounded {
                            format!("{inner}, ...")
                        } else {
                            inner
                        }
                    })
                    .collect();
                format!("{}[{}]", db.resolve_atom(shape.name), rendered.join(", "))
            } else if let Some(args) = &shape.type_args {
                let rendered: Vec<String> =
                    args.iter().map(|&a| print_inner(db, a, depth)).collect();
                format!("{}[{}]", db.resolve_atom(shape.name), rendered.join(", "))
            } else {
                db.resolve_atom(shape.name)
            };
            if shape.is_instantiable() {
                format!("type[{body}]")
            } else {
                body
            }
        }
        Some(TypeKey::TypeVar(var_id)) => {
            let shape = db.type_var_shape(var_id);
            let name = db.resolve_atom(shape.name);
            let body = match shape.kind {
                TypeVarKind::TypeVarTuple
                    if shape.flags.contains(TypeVarFlags::UNPACKED) =>
                {
                    format!("*{name}")
                }
                _ => name,
            };
            if shape.is_instantiable() {
                format!("type[{body}]")
            } else {
                body
            }
        }
        Some(TypeKey::Function(function_id)) => {
            let shape = db.function_shape(function_id);
            let mut parts: Vec<String> = Vec::new();
            if shape.is_gradual() {
                parts.push("...".to_string());
            } else {
                for param in &shape.params {
                    let rendered = print_inner(db, param.ty, depth);
                    let named = match param.name {
                        Some(name) => format!("{}: {rendered}", db.resolve_atom(name)),
                        None => rendered,
                    };
                    match param.kind {
                        ParamKind::Positional => parts.push(named),
                        ParamKind::VarArgs => parts.push(format!("*{named}")),
                        ParamKind::KwArgs => parts.push(format!("**{named}")),
                    }
                }
                if let Some(param_spec) = shape.param_spec {
                    parts.push(format!("**{}", print_inner(db, param_spec, depth)));
                }
            }
            format!(
                "({}) -> {}",
                parts.join(", "),
                print_inner(db, shape.return_type, depth)
            )
        }
        Some(TypeKey::Overloaded(overload_id)) => {
            let shape = db.overload_shape(overload_id);
            let rendered: Vec<String> = shape
                .overloads
                .iter()
                .map(|&o| print_inner(db, o, depth))
                .collect();
            format!("Overload[{}]", rendered.join(", "))
        }
        Some(TypeKey::Module(module_id)) => {
            let shape = db.module_shape(module_id);
            format!("Module(\"{}\")", db.resolve_atom(shape.name))
        }
        None => "<invalid>".to_string(),
    };
    depth.leave();
    text
}

fn print_literal(db: &dyn TypeDatabase, literal: LiteralValue) -> String {
    match literal {
        LiteralValue::Int(value) => value.to_string(),
        LiteralValue::Str(atom) => format!("'{}'", db.resolve_atom(atom)),
        LiteralValue::Bytes(atom) => format!("b'{}'", db.resolve_atom(atom)),
        LiteralValue::Bool(value) => if value { "True" } else { "False" }.to_string(),
    }
}
