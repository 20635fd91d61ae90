//! Bidirectional type checking. Expected types flow downward as unification
//! holes; every checked node's resolved type lands in a side table keyed by
//! its arena id. Checking continues past errors to surface as many
//! diagnostics as possible in one pass.

use crate::builtins::Builtin;
use crate::error::TypeError;
use crate::types::{FnTy, Ty, TypeEnv};
use crate::unify::{bind_generics, open_generics, resolve_type, unify};
use banter_ast::*;
use la_arena::ArenaMap;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

pub struct TypeCheckResult {
    pub errors: Vec<TypeError>,
    /// Non-fatal diagnostics (dead match cases).
    pub warnings: Vec<TypeError>,
    /// Resolved type of every checked expression.
    pub expr_types: ArenaMap<ExprId, Ty>,
    /// Lowered signature of every function definition.
    pub fn_types: ArenaMap<FunDefId, Ty>,
}

pub fn check(module: &Module) -> TypeCheckResult {
    let mut checker = TypeChecker::new(module);
    let mut env = TypeEnv::new();
    let mut expected = Ty::Unknown;
    checker.check_expr(module.root, &mut env, &mut expected);
    TypeCheckResult {
        errors: checker.errors,
        warnings: checker.warnings,
        expr_types: checker.expr_types,
        fn_types: checker.fn_types,
    }
}

struct TypeChecker<'a> {
    module: &'a Module,
    errors: Vec<TypeError>,
    warnings: Vec<TypeError>,
    expr_types: ArenaMap<ExprId, Ty>,
    fn_types: ArenaMap<FunDefId, Ty>,
    /// Call sites whose generic instantiation already re-checked the callee
    /// body, so later visits don't re-enter it.
    instantiated: HashSet<ExprId>,
}

impl<'a> TypeChecker<'a> {
    fn new(module: &'a Module) -> Self {
        Self {
            module,
            errors: Vec::new(),
            warnings: Vec::new(),
            expr_types: ArenaMap::default(),
            fn_types: ArenaMap::default(),
            instantiated: HashSet::new(),
        }
    }

    fn check_expr(&mut self, id: ExprId, env: &mut TypeEnv, expected: &mut Ty) {
        let module = self.module;
        let expr = &module.exprs[id];
        match &expr.kind {
            ExprKind::Program { functions, body } => {
                self.check_program(functions, *body, env, expected);
                self.expr_types.insert(id, expected.clone());
            }
            ExprKind::Lit(lit) => {
                let mut ty = literal_ty(lit);
                if !unify(&mut ty, expected) {
                    self.mismatch(&expr.pos, &ty, expected);
                }
                self.expr_types.insert(id, ty);
            }
            ExprKind::Primitive { op, lhs, rhs } => {
                let mut ty = self.check_primitive(&expr.pos, *op, *lhs, *rhs, env);
                if !unify(&mut ty, expected) {
                    self.mismatch(&expr.pos, &ty, expected);
                }
                self.expr_types.insert(id, ty);
            }
            ExprKind::Let {
                name,
                declared,
                value,
                body,
            } => {
                let mut value_ty = match declared {
                    Some(ty) => self.lower_type(*ty),
                    None => Ty::Unknown,
                };
                self.check_expr(*value, env, &mut value_ty);
                let mut body_env = env.clone();
                body_env.insert(name.clone(), value_ty);
                self.check_expr(*body, &mut body_env, expected);
                self.expr_types.insert(id, expected.clone());
            }
            ExprKind::Ref { name, field } => {
                self.check_ref(id, &expr.pos, name, field, env, expected);
            }
            ExprKind::Branch {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut cond_ty = Ty::Bool;
                self.check_expr(*condition, env, &mut cond_ty);
                // the else branch settles the expected type, then the then
                // branch must agree with it
                self.check_expr(*else_branch, env, expected);
                let mut else_ty = self
                    .expr_types
                    .get(*else_branch)
                    .cloned()
                    .unwrap_or(Ty::Unknown);
                self.check_expr(*then_branch, env, &mut else_ty);
                self.expr_types.insert(id, else_ty);
            }
            ExprKind::Application {
                callee,
                generic_args,
                args,
            } => {
                let mut callee_ty = Ty::Unknown;
                self.check_expr(*callee, env, &mut callee_ty);
                match callee_ty {
                    Ty::Fn(fn_ty) => {
                        self.check_call(id, &expr.pos, *callee, generic_args, args, fn_ty, env, expected);
                    }
                    Ty::Class(name, fields) => {
                        self.check_construction(id, &expr.pos, &name, &fields, args, env, expected);
                    }
                    Ty::List(elem) => {
                        self.check_indexing(id, &expr.pos, args, *elem, env, expected);
                    }
                    _ => {
                        self.error(&expr.pos, "Bad function or typeclass application".into());
                        self.expr_types.insert(id, Ty::Unknown);
                    }
                }
            }
            ExprKind::ListDef(values) => {
                let mut elem_expected = match &*expected {
                    Ty::List(elem) => (**elem).clone(),
                    other => other.clone(),
                };
                for &value in values {
                    self.check_expr(value, env, &mut elem_expected);
                }
                let mut ty = Ty::List(Box::new(elem_expected));
                if !unify(&mut ty, expected) {
                    self.mismatch(&expr.pos, &ty, expected);
                }
                self.expr_types.insert(id, ty);
            }
            ExprKind::TupleDef(values) => {
                let expected_elems: Vec<Ty> = match &*expected {
                    Ty::Tuple(elems) if elems.len() == values.len() => elems.clone(),
                    _ => vec![Ty::Unknown; values.len()],
                };
                let mut elem_tys = Vec::with_capacity(values.len());
                for (&value, mut elem_expected) in values.iter().zip(expected_elems) {
                    self.check_expr(value, env, &mut elem_expected);
                    elem_tys.push(elem_expected);
                }
                let mut ty = Ty::Tuple(elem_tys);
                if !unify(&mut ty, expected) {
                    self.mismatch(&expr.pos, &ty, expected);
                }
                self.expr_types.insert(id, ty);
            }
            ExprKind::ClassDef { name, fields } => {
                let field_tys: Vec<(SmolStr, Ty)> = fields
                    .iter()
                    .map(|f| (f.name.clone(), self.lower_type(f.ty)))
                    .collect();
                let mut ty = Ty::Class(name.clone(), field_tys);
                if !unify(&mut ty, expected) {
                    self.mismatch(&expr.pos, &ty, expected);
                }
                env.insert(name.clone(), ty.clone());
                self.expr_types.insert(id, ty);
            }
            ExprKind::Match { scrutinee, cases } => {
                let scrutinee_ty = self.get_name(&expr.pos, env, scrutinee);
                let mut any_seen = false;
                for case in cases {
                    if any_seen {
                        self.warnings.push(TypeError {
                            message: "case statement below 'any' is always ignored".into(),
                            pos: case.pos.clone(),
                        });
                    }
                    match &case.pattern {
                        CasePattern::Any => {
                            any_seen = true;
                            self.check_expr(case.body, env, expected);
                        }
                        CasePattern::Expr(pattern) => {
                            let mut pattern_ty = scrutinee_ty.clone();
                            self.check_expr(*pattern, env, &mut pattern_ty);
                            self.check_expr(case.body, env, expected);
                        }
                    }
                }
                self.expr_types.insert(id, expected.clone());
            }
            ExprKind::End => {
                self.expr_types.insert(id, Ty::Null);
            }
        }
    }

    // ── Programs ──────────────────────────────────────────────────

    fn check_program(
        &mut self,
        functions: &[FunDefId],
        body: ExprId,
        env: &mut TypeEnv,
        expected: &mut Ty,
    ) {
        let module = self.module;
        let mut declared: Vec<(FunDefId, Rc<FnTy>)> = Vec::with_capacity(functions.len());

        for &fid in functions {
            let def = &module.fun_defs[fid];
            let fn_ty = Rc::new(FnTy {
                generics: def.generics.clone(),
                param_names: def.params.iter().map(|p| p.name.clone()).collect(),
                params: def.params.iter().map(|p| self.lower_type(p.ty)).collect(),
                ret: self.lower_type(def.return_type),
                body: Some(def.body),
                inner_env: RefCell::new(TypeEnv::new()),
                builtin: Builtin::from_name(&def.name),
            });
            env.insert(def.name.clone(), Ty::Fn(Rc::clone(&fn_ty)));
            self.fn_types.insert(fid, Ty::Fn(Rc::clone(&fn_ty)));
            declared.push((fid, fn_ty));
        }

        // Each function captures the enclosing environment minus its own
        // name; recursion goes through the live binding at the call site.
        for (fid, fn_ty) in &declared {
            let def = &module.fun_defs[*fid];
            let mut inner = if fn_ty.builtin.is_some() {
                TypeEnv::new()
            } else {
                let mut inner = env.clone();
                inner.remove(&def.name);
                inner
            };
            for generic in &fn_ty.generics {
                inner
                    .entry(generic.clone())
                    .or_insert_with(|| Ty::Gen(generic.clone()));
            }
            for (name, ty) in fn_ty.param_names.iter().zip(&fn_ty.params) {
                let bound = match ty {
                    Ty::Gen(g) => inner.get(g.as_str()).cloned().unwrap_or_else(|| ty.clone()),
                    other => other.clone(),
                };
                inner.insert(name.clone(), bound);
            }
            *fn_ty.inner_env.borrow_mut() = inner;
        }

        self.check_expr(body, env, expected);
    }

    // ── References ────────────────────────────────────────────────

    fn check_ref(
        &mut self,
        id: ExprId,
        pos: &Pos,
        name: &SmolStr,
        field: &Option<SmolStr>,
        env: &mut TypeEnv,
        expected: &mut Ty,
    ) {
        let mut ty = self.get_name(pos, env, name);

        if let Some(field) = field {
            let projected = match &ty {
                Ty::Tuple(elems) => match field.parse::<usize>() {
                    Ok(index) => match elems.get(index) {
                        Some(elem) => elem.clone(),
                        None => {
                            self.error(
                                pos,
                                format!("Error: Index not in range of tuple: {}", index),
                            );
                            self.expr_types.insert(id, Ty::Unknown);
                            return;
                        }
                    },
                    Err(_) => {
                        self.error(pos, format!("Error: Tuple requires valid index: {}", field));
                        self.expr_types.insert(id, Ty::Unknown);
                        return;
                    }
                },
                Ty::Class(class_name, _) => {
                    // the declaration bound under the class name is the
                    // source of truth for its fields
                    let decl = self.get_name(pos, env, class_name);
                    let field_ty = match &decl {
                        Ty::Class(_, fields) => fields
                            .iter()
                            .find(|(f, _)| f == field)
                            .map(|(_, t)| t.clone()),
                        _ => None,
                    };
                    match field_ty {
                        Some(field_ty) => field_ty,
                        None => {
                            self.error(
                                pos,
                                format!(
                                    "Error: typeclass {} has no field {}",
                                    class_name, field
                                ),
                            );
                            self.expr_types.insert(id, Ty::Unknown);
                            return;
                        }
                    }
                }
                _ => {
                    self.error(pos, "Field given for non-typeclass or tuple type".into());
                    self.expr_types.insert(id, Ty::Unknown);
                    return;
                }
            };
            ty = projected;
        }

        let mut resolved = resolve_type(&ty, env);
        let mut resolved_expected = resolve_type(expected, env);
        if !unify(&mut resolved, &mut resolved_expected) {
            self.mismatch(pos, &resolved, &resolved_expected);
        }
        *expected = resolved_expected;
        self.expr_types.insert(id, resolved);
    }

    // ── Primitives ────────────────────────────────────────────────

    fn check_primitive(&mut self, pos: &Pos, op: Op, lhs: ExprId, rhs: ExprId, env: &mut TypeEnv) -> Ty {
        if op.is_boolean() {
            let mut lhs_ty = Ty::Bool;
            self.check_expr(lhs, env, &mut lhs_ty);
            let mut rhs_ty = Ty::Bool;
            self.check_expr(rhs, env, &mut rhs_ty);
            Ty::Bool
        } else if op.is_arithmetic() {
            let mut lhs_ty = Ty::Int;
            self.check_expr(lhs, env, &mut lhs_ty);
            let mut rhs_ty = Ty::Int;
            self.check_expr(rhs, env, &mut rhs_ty);
            Ty::Int
        } else {
            // comparisons take any primitive pair of the same type
            let mut operand_ty = Ty::Unknown;
            self.check_expr(lhs, env, &mut operand_ty);
            if !matches!(operand_ty, Ty::Unknown) && !operand_ty.is_primitive() {
                self.error(
                    pos,
                    "Binary operators can only be used on primitive types".into(),
                );
            }
            self.check_expr(rhs, env, &mut operand_ty);
            Ty::Bool
        }
    }

    // ── Applications ──────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn check_call(
        &mut self,
        id: ExprId,
        pos: &Pos,
        callee: ExprId,
        generic_args: &[TypeExprId],
        args: &[ExprId],
        fn_ty: Rc<FnTy>,
        env: &mut TypeEnv,
        expected: &mut Ty,
    ) {
        let module = self.module;
        let mut generic_tys: Vec<Ty> = generic_args.iter().map(|&g| self.lower_type(g)).collect();
        // a chained call sees the substitutions of the call it wraps
        if let ExprKind::Application {
            generic_args: inner,
            ..
        } = &module.exprs[callee].kind
        {
            generic_tys.extend(inner.iter().map(|&g| self.lower_type(g)));
        }

        if args.len() != fn_ty.params.len() {
            self.error(pos, "Function application does not match signature".into());
        }
        if fn_ty.generics.is_empty() && !generic_tys.is_empty() {
            self.error(pos, "Types provided for non-templated function".into());
        }
        if !fn_ty.generics.is_empty() && generic_tys.is_empty() && fn_ty.builtin.is_none() {
            self.error(pos, "No types provided for templated function".into());
        }

        let mut inner_env = fn_ty.inner_env.borrow().clone();
        for (name, ty) in fn_ty.generics.iter().zip(generic_tys) {
            inner_env.insert(name.clone(), ty);
        }

        for (index, (&arg, param)) in args.iter().zip(&fn_ty.params).enumerate() {
            let resolved = resolve_type(param, &inner_env);
            let mut arg_ty = open_generics(&resolved);
            self.check_expr(arg, env, &mut arg_ty);
            bind_generics(param, &arg_ty, &mut inner_env);
            if let Some(name) = fn_ty.param_names.get(index) {
                inner_env.insert(name.clone(), arg_ty);
            }
        }

        let mut ret = resolve_type(&fn_ty.ret, &inner_env);
        let instantiate = !self.instantiated.contains(&id)
            && fn_ty.builtin.is_none()
            && !fn_ty.generics.is_empty();
        if instantiate {
            if let Some(body) = fn_ty.body {
                self.check_expr(body, &mut inner_env, &mut ret);
            }
        }
        if !fn_ty.generics.is_empty() {
            ret = open_generics(&ret);
        }
        if !unify(&mut ret, expected) {
            self.mismatch(pos, &fn_ty.ret, expected);
        }
        self.instantiated.insert(id);
        self.expr_types.insert(id, ret);
    }

    fn check_construction(
        &mut self,
        id: ExprId,
        pos: &Pos,
        name: &SmolStr,
        fields: &[(SmolStr, Ty)],
        args: &[ExprId],
        env: &mut TypeEnv,
        expected: &mut Ty,
    ) {
        let mut ty = Ty::Class(name.clone(), fields.to_vec());
        if !unify(&mut ty, expected) {
            self.mismatch(pos, &ty, expected);
        }
        if args.len() != fields.len() {
            self.error(pos, "Typeclass construction does not match signature".into());
        }
        for (&arg, (_, field_ty)) in args.iter().zip(fields) {
            let mut field_expected = field_ty.clone();
            self.check_expr(arg, env, &mut field_expected);
        }
        self.expr_types.insert(id, ty);
    }

    fn check_indexing(
        &mut self,
        id: ExprId,
        pos: &Pos,
        args: &[ExprId],
        elem: Ty,
        env: &mut TypeEnv,
        expected: &mut Ty,
    ) {
        if args.is_empty() {
            self.error(pos, "List access needs integer argument".into());
            self.expr_types.insert(id, Ty::Unknown);
            return;
        }
        let mut index_ty = Ty::Int;
        self.check_expr(args[0], env, &mut index_ty);
        let mut elem = elem;
        if !unify(&mut elem, expected) {
            self.mismatch(pos, &elem, expected);
        }
        self.expr_types.insert(id, elem);
    }

    // ── Shared plumbing ───────────────────────────────────────────

    fn lower_type(&self, id: TypeExprId) -> Ty {
        let ty = &self.module.type_exprs[id];
        match &ty.kind {
            TypeExprKind::Int => Ty::Int,
            TypeExprKind::Bool => Ty::Bool,
            TypeExprKind::Char => Ty::Char,
            TypeExprKind::Str => Ty::Str,
            TypeExprKind::Null => Ty::Null,
            TypeExprKind::List(elem) => Ty::List(Box::new(self.lower_type(*elem))),
            TypeExprKind::Tuple(elems) => {
                Ty::Tuple(elems.iter().map(|&e| self.lower_type(e)).collect())
            }
            TypeExprKind::Fn { params, ret } => {
                let params = params.iter().map(|&p| self.lower_type(p)).collect();
                Ty::Fn(FnTy::signature(params, self.lower_type(*ret)))
            }
            TypeExprKind::Class(name) => Ty::Class(name.clone(), Vec::new()),
            TypeExprKind::Gen(name) => Ty::Gen(name.clone()),
            TypeExprKind::Unknown => Ty::Unknown,
        }
    }

    fn get_name(&mut self, pos: &Pos, env: &TypeEnv, name: &str) -> Ty {
        match env.get(name) {
            Some(ty) => ty.clone(),
            None => {
                self.error(pos, format!("Error: {} does not exist in this scope", name));
                Ty::Unknown
            }
        }
    }

    fn mismatch(&mut self, pos: &Pos, ty: &Ty, expected: &Ty) {
        self.error(
            pos,
            format!("Mismatched type: {}, Expected: {}", ty, expected),
        );
    }

    fn error(&mut self, pos: &Pos, message: String) {
        self.errors.push(TypeError {
            message,
            pos: pos.clone(),
        });
    }
}

fn literal_ty(lit: &Literal) -> Ty {
    match lit {
        Literal::Int(_) => Ty::Int,
        Literal::Bool(_) => Ty::Bool,
        Literal::Char(_) => Ty::Char,
        Literal::Str(_) => Ty::Str,
        Literal::Null => Ty::Null,
    }
}
