mod pretty;

use la_arena::{Arena, Idx};
use smol_str::SmolStr;

pub use banter_lexer::Pos;
pub use pretty::pretty_print;

// ── ID types ──────────────────────────────────────────────────────

pub type ExprId = Idx<Expr>;
pub type TypeExprId = Idx<TypeExpr>;
pub type FunDefId = Idx<FunDef>;

// ── Module ────────────────────────────────────────────────────────

/// A parsed program: arenas of nodes plus the root `Program` expression.
#[derive(Debug, Clone)]
pub struct Module {
    pub exprs: Arena<Expr>,
    pub type_exprs: Arena<TypeExpr>,
    pub fun_defs: Arena<FunDef>,
    pub root: ExprId,
}

impl Module {
    pub fn new() -> Self {
        let mut exprs = Arena::new();
        let root = exprs.alloc(Expr {
            kind: ExprKind::End,
            pos: Pos::none(),
        });
        Self {
            exprs,
            type_exprs: Arena::new(),
            fun_defs: Arena::new(),
            root,
        }
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

// ── Function definitions ──────────────────────────────────────────

/// `func name[T, ...](a: T, ...) -> R = body;`
#[derive(Debug, Clone)]
pub struct FunDef {
    pub name: SmolStr,
    pub pos: Pos,
    pub generics: Vec<SmolStr>,
    pub params: Vec<Param>,
    pub return_type: TypeExprId,
    pub body: ExprId,
}

/// A named, typed parameter or typeclass field.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: SmolStr,
    pub ty: TypeExprId,
    pub pos: Pos,
}

// ── Expressions ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Function definitions scoping over a tail expression. The whole source
    /// file is one of these; `func` in expression position nests another.
    Program {
        functions: Vec<FunDefId>,
        body: ExprId,
    },
    Lit(Literal),
    /// Binary operation. Unary `+`/`-`/`!` are desugared at parse time into
    /// a binary node whose left side is a zero or `false` literal.
    Primitive {
        op: Op,
        lhs: ExprId,
        rhs: ExprId,
    },
    /// `val name : T = value; body` — also used for plain `expr; body`
    /// sequences, with a fresh `$seqN` binder and no declared type.
    Let {
        name: SmolStr,
        declared: Option<TypeExprId>,
        value: ExprId,
        body: ExprId,
    },
    /// `name` or `name.field`; the field is kept as text and resolved
    /// semantically (numeric for tuples, named for typeclasses).
    Ref {
        name: SmolStr,
        field: Option<SmolStr>,
    },
    /// `if (condition) then_branch else else_branch`
    Branch {
        condition: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
    /// `callee[T, ...](args)` — chained calls nest, with the callee of the
    /// outer application being the inner application.
    Application {
        callee: ExprId,
        generic_args: Vec<TypeExprId>,
        args: Vec<ExprId>,
    },
    /// `List{a, b, c}`
    ListDef(Vec<ExprId>),
    /// `Tuple{a, b, c}`
    TupleDef(Vec<ExprId>),
    /// `type Name { field: T, ... }` — declares a nominal record type and
    /// binds its constructor in the enclosing scope.
    ClassDef {
        name: SmolStr,
        fields: Vec<Param>,
    },
    /// `match (name) { case pattern = { body }; ... }`
    Match {
        scrutinee: SmolStr,
        cases: Vec<Case>,
    },
    /// Missing trailing expression.
    End,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub pattern: CasePattern,
    pub body: ExprId,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub enum CasePattern {
    /// `case any` — matches everything.
    Any,
    /// A pattern expression compared against the scrutinee by value.
    Expr(ExprId),
}

#[derive(Debug, Clone)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Char(char),
    Str(String),
    Null,
}

// ── Operators ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Not,
}

impl Op {
    /// Binding strength for precedence climbing; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Op::Or => 1,
            Op::And => 2,
            Op::Lt | Op::Gt | Op::Le | Op::Ge | Op::Eq | Op::Ne => 3,
            Op::Add | Op::Sub => 4,
            Op::Mul | Op::Div | Op::Mod => 5,
            Op::Not => 6,
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod)
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, Op::Lt | Op::Gt | Op::Le | Op::Ge | Op::Eq | Op::Ne)
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, Op::And | Op::Or | Op::Not)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Ge => ">=",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::And => "&&",
            Op::Or => "||",
            Op::Not => "!",
        }
    }
}

// ── Type expressions ──────────────────────────────────────────────

/// Syntactic types as written in source. Lowered to semantic types by the
/// type checker.
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    Int,
    Bool,
    Char,
    Str,
    Null,
    /// `List[T]`
    List(TypeExprId),
    /// `Tuple[T, ...]`
    Tuple(Vec<TypeExprId>),
    /// `(T, ...) -> R` or the right-associated sugar `T -> R`
    Fn {
        params: Vec<TypeExprId>,
        ret: TypeExprId,
    },
    /// `type Name` — a typeclass by name; fields resolve via the scope.
    Class(SmolStr),
    /// A generic parameter in scope.
    Gen(SmolStr),
    /// Placeholder for parse errors and implicit sequence binders.
    Unknown,
}
