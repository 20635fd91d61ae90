use crate::builtins::Builtin;
use banter_ast::ExprId;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Name → type bindings with copy-on-branch semantics: cloned on scope
/// entry, shadowed on rebinding. The same shape carries generic parameter
/// substitutions at call sites.
pub type TypeEnv = HashMap<SmolStr, Ty>;

// ── Types ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Ty {
    Int,
    Char,
    Str,
    Bool,
    Null,
    List(Box<Ty>),
    Tuple(Vec<Ty>),
    /// Shared so every binding of a function name sees the environment the
    /// forward pass captures into it.
    Fn(Rc<FnTy>),
    /// A generic parameter, resolved per call site.
    Gen(SmolStr),
    /// Nominal record type: name plus ordered field declarations.
    Class(SmolStr, Vec<(SmolStr, Ty)>),
    /// Unification hole, overwritten by the first concrete type it meets.
    Unknown,
}

#[derive(Debug)]
pub struct FnTy {
    pub generics: Vec<SmolStr>,
    pub param_names: Vec<SmolStr>,
    pub params: Vec<Ty>,
    pub ret: Ty,
    /// AST body; absent for builtins and for function types written in
    /// signatures.
    pub body: Option<ExprId>,
    /// Lexical type environment captured by the program forward pass,
    /// excluding the function's own name. Cloned at every call site.
    pub inner_env: RefCell<TypeEnv>,
    pub builtin: Option<Builtin>,
}

impl FnTy {
    /// A bare function type as written in a signature: no generics, no body,
    /// no captured environment.
    pub fn signature(params: Vec<Ty>, ret: Ty) -> Rc<FnTy> {
        Rc::new(FnTy {
            generics: Vec::new(),
            param_names: Vec::new(),
            params,
            ret,
            body: None,
            inner_env: RefCell::new(TypeEnv::new()),
            builtin: None,
        })
    }
}

impl Ty {
    /// Primitive types (generics included) admit comparison operators.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Ty::Int | Ty::Char | Ty::Str | Ty::Bool | Ty::Gen(_)
        )
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "int"),
            Ty::Char => write!(f, "char"),
            Ty::Str => write!(f, "string"),
            Ty::Bool => write!(f, "bool"),
            Ty::Null => write!(f, "null"),
            Ty::List(elem) => write!(f, "List[{}]", elem),
            Ty::Tuple(elems) => {
                write!(f, "Tuple[")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, "]")
            }
            Ty::Fn(func) => {
                write!(f, "[")?;
                for (i, generic) in func.generics.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", generic)?;
                }
                write!(f, "](")?;
                for (i, param) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")->{}", func.ret)
            }
            Ty::Gen(name) => write!(f, "{}", name),
            Ty::Class(name, _) => write!(f, "{}", name),
            Ty::Unknown => write!(f, "unknown"),
        }
    }
}
