use crate::types::{FnTy, Ty, TypeEnv};
use smol_str::SmolStr;
use std::cell::RefCell;
use std::rc::Rc;

/// The unification primitive. An `Unknown` on either side is overwritten by
/// the other type and the comparison succeeds; otherwise the two types must
/// be structurally equivalent, with `Unknown` children fillable at any
/// depth. This is the only form of inference in the language.
pub fn unify(left: &mut Ty, right: &mut Ty) -> bool {
    if matches!(left, Ty::Unknown) {
        *left = right.clone();
        return true;
    }
    if matches!(right, Ty::Unknown) {
        *right = left.clone();
        return true;
    }
    match (left, right) {
        (Ty::Int, Ty::Int)
        | (Ty::Char, Ty::Char)
        | (Ty::Str, Ty::Str)
        | (Ty::Bool, Ty::Bool)
        | (Ty::Null, Ty::Null) => true,
        (Ty::List(a), Ty::List(b)) => unify(a, b),
        (Ty::Tuple(a), Ty::Tuple(b)) => {
            a.len() == b.len() && a.iter_mut().zip(b.iter_mut()).all(|(x, y)| unify(x, y))
        }
        (Ty::Fn(a), Ty::Fn(b)) => fn_equivalent(a, b),
        (Ty::Gen(a), Ty::Gen(b)) => a == b,
        (Ty::Class(a, _), Ty::Class(b, _)) => a == b,
        _ => false,
    }
}

/// Function types compare by arity plus pairwise parameter and return
/// equivalence, after α-renaming each side's own generics to positional
/// names. Holes inside them are tolerated but not filled; signatures are
/// never mutated through a shared handle.
fn fn_equivalent(a: &Rc<FnTy>, b: &Rc<FnTy>) -> bool {
    if a.params.len() != b.params.len() {
        return false;
    }
    let (a_params, a_ret) = rename_generics(a);
    let (b_params, b_ret) = rename_generics(b);
    for (x, y) in a_params.iter().zip(&b_params) {
        if !unify(&mut x.clone(), &mut y.clone()) {
            return false;
        }
    }
    unify(&mut a_ret.clone(), &mut b_ret.clone())
}

fn rename_generics(f: &FnTy) -> (Vec<Ty>, Ty) {
    let mut renames = TypeEnv::new();
    for (index, generic) in f.generics.iter().enumerate() {
        renames.insert(
            generic.clone(),
            Ty::Gen(SmolStr::new(format!("${}", index))),
        );
    }
    let params = f.params.iter().map(|t| resolve_type(t, &renames)).collect();
    (params, resolve_type(&f.ret, &renames))
}

/// Substitute every generic name bound in `env`, recursing through lists,
/// tuples, and function types. Returns a fresh type so substitutions never
/// leak between call sites.
pub fn resolve_type(ty: &Ty, env: &TypeEnv) -> Ty {
    match ty {
        Ty::Gen(name) => env.get(name.as_str()).cloned().unwrap_or_else(|| ty.clone()),
        Ty::List(elem) => Ty::List(Box::new(resolve_type(elem, env))),
        Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|t| resolve_type(t, env)).collect()),
        Ty::Fn(func) => Ty::Fn(Rc::new(FnTy {
            generics: func.generics.clone(),
            param_names: func.param_names.clone(),
            params: func.params.iter().map(|t| resolve_type(t, env)).collect(),
            ret: resolve_type(&func.ret, env),
            body: func.body,
            inner_env: RefCell::new(func.inner_env.borrow().clone()),
            builtin: func.builtin,
        })),
        other => other.clone(),
    }
}

/// Replace generic parameters that are still unresolved with fresh holes, so
/// that checking an argument against the result can fill them.
pub fn open_generics(ty: &Ty) -> Ty {
    match ty {
        Ty::Gen(_) => Ty::Unknown,
        Ty::List(elem) => Ty::List(Box::new(open_generics(elem))),
        Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(open_generics).collect()),
        Ty::Fn(func) => Ty::Fn(Rc::new(FnTy {
            generics: func.generics.clone(),
            param_names: func.param_names.clone(),
            params: func.params.iter().map(open_generics).collect(),
            ret: open_generics(&func.ret),
            body: func.body,
            inner_env: RefCell::new(func.inner_env.borrow().clone()),
            builtin: func.builtin,
        })),
        other => other.clone(),
    }
}

/// Record what each generic name stands for, given a declared type and the
/// actual type it matched. Existing concrete bindings are left alone, so
/// explicit generic arguments always win over inference.
pub fn bind_generics(declared: &Ty, actual: &Ty, bindings: &mut TypeEnv) {
    match (declared, actual) {
        (Ty::Gen(name), actual) => {
            let open = matches!(
                bindings.get(name.as_str()),
                None | Some(Ty::Unknown) | Some(Ty::Gen(_))
            );
            if open && !matches!(actual, Ty::Unknown) {
                bindings.insert(name.clone(), actual.clone());
            }
        }
        (Ty::List(d), Ty::List(a)) => bind_generics(d, a, bindings),
        (Ty::Tuple(ds), Ty::Tuple(actuals)) => {
            for (d, a) in ds.iter().zip(actuals) {
                bind_generics(d, a, bindings);
            }
        }
        (Ty::Fn(d), Ty::Fn(a)) => {
            for (dp, ap) in d.params.iter().zip(&a.params) {
                bind_generics(dp, ap, bindings);
            }
            bind_generics(&d.ret, &a.ret, bindings);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(elem: Ty) -> Ty {
        Ty::List(Box::new(elem))
    }

    #[test]
    fn concrete_types_unify_reflexively() {
        for ty in [
            Ty::Int,
            Ty::Char,
            Ty::Str,
            Ty::Bool,
            Ty::Null,
            list(Ty::Int),
            Ty::Tuple(vec![Ty::Int, Ty::Char]),
            Ty::Gen("T".into()),
        ] {
            assert!(unify(&mut ty.clone(), &mut ty.clone()), "{} != itself", ty);
        }
    }

    #[test]
    fn unknown_is_overwritten_on_either_side() {
        let mut hole = Ty::Unknown;
        let mut other = Ty::Int;
        assert!(unify(&mut hole, &mut other));
        assert!(matches!(hole, Ty::Int));

        let mut left = Ty::Bool;
        let mut hole = Ty::Unknown;
        assert!(unify(&mut left, &mut hole));
        assert!(matches!(hole, Ty::Bool));
    }

    #[test]
    fn list_element_holes_are_filled() {
        let mut inferred = list(Ty::Unknown);
        let mut concrete = list(Ty::Int);
        assert!(unify(&mut inferred, &mut concrete));
        assert!(matches!(inferred, Ty::List(elem) if matches!(*elem, Ty::Int)));
    }

    #[test]
    fn tuples_need_matching_arity() {
        let mut a = Ty::Tuple(vec![Ty::Int, Ty::Int]);
        let mut b = Ty::Tuple(vec![Ty::Int]);
        assert!(!unify(&mut a, &mut b));
    }

    #[test]
    fn mismatched_primitives_fail() {
        assert!(!unify(&mut Ty::Int, &mut Ty::Bool));
        assert!(!unify(&mut Ty::Gen("T".into()), &mut Ty::Gen("U".into())));
    }

    #[test]
    fn classes_compare_by_name() {
        let mut a = Ty::Class("Point".into(), vec![("x".into(), Ty::Int)]);
        let mut b = Ty::Class("Point".into(), Vec::new());
        assert!(unify(&mut a, &mut b));
        let mut c = Ty::Class("Size".into(), Vec::new());
        assert!(!unify(&mut a, &mut c));
    }

    #[test]
    fn function_types_compare_by_arity_and_parts() {
        let mut a = Ty::Fn(FnTy::signature(vec![Ty::Int], Ty::Int));
        let mut b = Ty::Fn(FnTy::signature(vec![Ty::Int], Ty::Int));
        let mut c = Ty::Fn(FnTy::signature(vec![Ty::Int, Ty::Int], Ty::Int));
        assert!(unify(&mut a, &mut b));
        assert!(!unify(&mut a, &mut c));
    }

    #[test]
    fn function_equivalence_ignores_generic_names() {
        fn generic_identity(name: &str) -> Ty {
            Ty::Fn(Rc::new(FnTy {
                generics: vec![name.into()],
                param_names: vec!["x".into()],
                params: vec![Ty::Gen(name.into())],
                ret: Ty::Gen(name.into()),
                body: None,
                inner_env: RefCell::new(TypeEnv::new()),
                builtin: None,
            }))
        }

        let mut a = generic_identity("T");
        let mut b = generic_identity("U");
        assert!(unify(&mut a, &mut b));
    }

    #[test]
    fn resolve_substitutes_bound_generics() {
        let mut env = TypeEnv::new();
        env.insert("T".into(), Ty::Int);
        let ty = list(Ty::Gen("T".into()));
        assert!(matches!(
            resolve_type(&ty, &env),
            Ty::List(elem) if matches!(*elem, Ty::Int)
        ));
        // unbound generics survive resolution
        let unbound = Ty::Gen("U".into());
        assert!(matches!(resolve_type(&unbound, &env), Ty::Gen(name) if name == "U"));
    }

    #[test]
    fn bind_generics_fills_only_open_names() {
        let mut bindings = TypeEnv::new();
        bindings.insert("T".into(), Ty::Gen("T".into()));
        bind_generics(&list(Ty::Gen("T".into())), &list(Ty::Char), &mut bindings);
        assert!(matches!(bindings.get("T"), Some(Ty::Char)));

        // an explicit binding is not overwritten
        bind_generics(&Ty::Gen("T".into()), &Ty::Int, &mut bindings);
        assert!(matches!(bindings.get("T"), Some(Ty::Char)));
    }
}
