mod builtins;

use banter_ast::*;
use banter_typeck::{Builtin, Ty, TypeCheckResult};
use smol_str::SmolStr;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub pos: Pos,
    /// Rendered call stack at the point of failure.
    pub trace: String,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.pos.render(&self.message), self.trace)
    }
}

/// Why evaluation stopped before producing a value.
#[derive(Debug)]
pub enum Stop {
    /// The `halt` builtin: terminate successfully.
    Halt,
    /// A fatal runtime error; unwinds to the driver.
    Error(RuntimeError),
}

pub type EvalResult = Result<Value, Stop>;

// ── Values ───────────────────────────────────────────────────────

pub type ValueEnv = HashMap<SmolStr, Value>;

/// A runtime value tagged with its type; builtins consult the tag for their
/// element-type and printability checks.
#[derive(Debug, Clone)]
pub struct Value {
    pub ty: Ty,
    pub kind: ValueKind,
}

#[derive(Debug, Clone)]
pub enum ValueKind {
    Int(i64),
    Char(char),
    Str(String),
    Bool(bool),
    Null,
    /// Shared buffer so the in-place builtins mutate through every binding
    /// of the same list.
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Fn(Rc<FnValue>),
    Class(Rc<ClassValue>),
}

#[derive(Debug)]
pub struct FnValue {
    pub param_names: Vec<SmolStr>,
    pub body: Option<ExprId>,
    /// Snapshot of the defining environment, minus the function's own name;
    /// recursion resolves through the live environment at the call site.
    pub captured: ValueEnv,
    pub builtin: Option<Builtin>,
}

/// A typeclass instance; the declaration binds a prototype whose fields are
/// unset sentinels until a construction application fills them.
#[derive(Debug)]
pub struct ClassValue {
    pub name: SmolStr,
    pub fields: Vec<(SmolStr, Value)>,
}

impl Value {
    pub fn int(n: i64) -> Value {
        Value {
            ty: Ty::Int,
            kind: ValueKind::Int(n),
        }
    }

    pub fn character(c: char) -> Value {
        Value {
            ty: Ty::Char,
            kind: ValueKind::Char(c),
        }
    }

    pub fn string(s: String) -> Value {
        Value {
            ty: Ty::Str,
            kind: ValueKind::Str(s),
        }
    }

    pub fn boolean(b: bool) -> Value {
        Value {
            ty: Ty::Bool,
            kind: ValueKind::Bool(b),
        }
    }

    pub fn null() -> Value {
        Value {
            ty: Ty::Null,
            kind: ValueKind::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValueKind::Int(n) => write!(f, "{}", n),
            ValueKind::Char(c) => write!(f, "{}", c),
            ValueKind::Str(s) => write!(f, "{}", s),
            ValueKind::Bool(b) => write!(f, "{}", b),
            ValueKind::Null => write!(f, "null"),
            ValueKind::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            ValueKind::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            ValueKind::Fn(_) => write!(f, "<func>"),
            ValueKind::Class(instance) => write!(f, "<{}>", instance.name),
        }
    }
}

/// Structural agreement for runtime checks; holes and unresolved generics
/// match anything.
pub(crate) fn types_agree(a: &Ty, b: &Ty) -> bool {
    match (a, b) {
        (Ty::Unknown, _) | (_, Ty::Unknown) | (Ty::Gen(_), _) | (_, Ty::Gen(_)) => true,
        (Ty::Int, Ty::Int)
        | (Ty::Char, Ty::Char)
        | (Ty::Str, Ty::Str)
        | (Ty::Bool, Ty::Bool)
        | (Ty::Null, Ty::Null) => true,
        (Ty::List(x), Ty::List(y)) => types_agree(x, y),
        (Ty::Tuple(x), Ty::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| types_agree(a, b))
        }
        (Ty::Fn(x), Ty::Fn(y)) => x.params.len() == y.params.len(),
        (Ty::Class(x, _), Ty::Class(y, _)) => x == y,
        _ => false,
    }
}

// ── Interpreter ──────────────────────────────────────────────────

pub struct Interpreter<'a> {
    module: &'a Module,
    types: &'a TypeCheckResult,
    call_stack: Vec<(SmolStr, Pos)>,
    error_latch: bool,
    out: Box<dyn Write + 'a>,
    input: Box<dyn BufRead + 'a>,
}

impl<'a> Interpreter<'a> {
    pub fn new(module: &'a Module, types: &'a TypeCheckResult) -> Self {
        Self::with_io(
            module,
            types,
            Box::new(io::stdout()),
            Box::new(io::BufReader::new(io::stdin())),
        )
    }

    /// Injectable output sink and input source, so callers can observe the
    /// print builtins and feed the read builtins.
    pub fn with_io(
        module: &'a Module,
        types: &'a TypeCheckResult,
        out: Box<dyn Write + 'a>,
        input: Box<dyn BufRead + 'a>,
    ) -> Self {
        Self {
            module,
            types,
            call_stack: Vec::new(),
            error_latch: false,
            out,
            input,
        }
    }

    /// Evaluate the whole program. Builtin contract violations print
    /// immediately and set the error latch; fatal errors unwind with a
    /// stack trace.
    pub fn run(&mut self) -> EvalResult {
        let mut env = ValueEnv::new();
        self.eval(self.module.root, &mut env)
    }

    pub fn had_error(&self) -> bool {
        self.error_latch
    }

    fn eval(&mut self, id: ExprId, env: &mut ValueEnv) -> EvalResult {
        let module = self.module;
        let expr = &module.exprs[id];
        match &expr.kind {
            ExprKind::Program { functions, body } => {
                for &fid in functions {
                    let def = &module.fun_defs[fid];
                    let builtin = Builtin::from_name(&def.name);
                    let captured = if builtin.is_some() {
                        ValueEnv::new()
                    } else {
                        let mut captured = env.clone();
                        captured.remove(&def.name);
                        captured
                    };
                    let ty = self
                        .types
                        .fn_types
                        .get(fid)
                        .cloned()
                        .unwrap_or(Ty::Unknown);
                    let function = Value {
                        ty,
                        kind: ValueKind::Fn(Rc::new(FnValue {
                            param_names: def.params.iter().map(|p| p.name.clone()).collect(),
                            body: Some(def.body),
                            captured,
                            builtin,
                        })),
                    };
                    env.insert(def.name.clone(), function);
                }
                self.eval(*body, env)
            }
            ExprKind::Lit(lit) => Ok(literal_value(lit)),
            ExprKind::Primitive { op, lhs, rhs } => {
                let left = self.eval(*lhs, env)?;
                let right = self.eval(*rhs, env)?;
                self.apply_op(&expr.pos, *op, &left, &right)
            }
            ExprKind::Let {
                name, value, body, ..
            } => {
                let value = self.eval(*value, env)?;
                let mut body_env = env.clone();
                body_env.insert(name.clone(), value);
                self.eval(*body, &mut body_env)
            }
            ExprKind::Ref { name, field } => {
                let value = self.get_name(&expr.pos, env, name)?;
                match field {
                    None => Ok(value),
                    Some(field) => self.project_field(&expr.pos, &value, field),
                }
            }
            ExprKind::Branch {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.eval(*condition, env)?;
                match cond.kind {
                    ValueKind::Bool(true) => self.eval(*then_branch, env),
                    ValueKind::Bool(false) => self.eval(*else_branch, env),
                    _ => Err(self.fatal(&expr.pos, "Branch condition must be a bool".into())),
                }
            }
            ExprKind::Application { callee, args, .. } => {
                self.eval_application(&expr.pos, *callee, args, env)
            }
            ExprKind::ListDef(values) => {
                let mut items = Vec::with_capacity(values.len());
                for &value in values {
                    items.push(self.eval(value, env)?);
                }
                let ty = match items.first() {
                    Some(first) => Ty::List(Box::new(first.ty.clone())),
                    None => self
                        .types
                        .expr_types
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| Ty::List(Box::new(Ty::Unknown))),
                };
                Ok(Value {
                    ty,
                    kind: ValueKind::List(Rc::new(RefCell::new(items))),
                })
            }
            ExprKind::TupleDef(values) => {
                let mut items = Vec::with_capacity(values.len());
                for &value in values {
                    items.push(self.eval(value, env)?);
                }
                let ty = Ty::Tuple(items.iter().map(|v| v.ty.clone()).collect());
                Ok(Value {
                    ty,
                    kind: ValueKind::Tuple(Rc::new(items)),
                })
            }
            ExprKind::ClassDef { name, fields } => {
                let ty = self
                    .types
                    .expr_types
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| Ty::Class(name.clone(), Vec::new()));
                let fields = fields
                    .iter()
                    .map(|f| {
                        (
                            f.name.clone(),
                            Value {
                                ty: Ty::Unknown,
                                kind: ValueKind::Null,
                            },
                        )
                    })
                    .collect();
                let prototype = Value {
                    ty,
                    kind: ValueKind::Class(Rc::new(ClassValue {
                        name: name.clone(),
                        fields,
                    })),
                };
                env.insert(name.clone(), prototype.clone());
                Ok(prototype)
            }
            ExprKind::Match { scrutinee, cases } => {
                let value = self.get_name(&expr.pos, env, scrutinee)?;
                for case in cases {
                    match &case.pattern {
                        CasePattern::Any => return self.eval(case.body, env),
                        CasePattern::Expr(pattern) => {
                            let candidate = self.eval(*pattern, env)?;
                            if primitive_equal(&value, &candidate) {
                                return self.eval(case.body, env);
                            }
                        }
                    }
                }
                Ok(Value::null())
            }
            ExprKind::End => Ok(Value::null()),
        }
    }

    // ── Application ───────────────────────────────────────────────

    fn eval_application(
        &mut self,
        pos: &Pos,
        callee: ExprId,
        args: &[ExprId],
        env: &mut ValueEnv,
    ) -> EvalResult {
        let module = self.module;
        let callee_value = self.eval(callee, env)?;
        match &callee_value.kind {
            // construction: a fresh instance with the arguments as fields
            ValueKind::Class(prototype) => {
                let mut fields = Vec::with_capacity(prototype.fields.len());
                for (index, (name, sentinel)) in prototype.fields.iter().enumerate() {
                    let value = match args.get(index) {
                        Some(&arg) => self.eval(arg, env)?,
                        None => sentinel.clone(),
                    };
                    fields.push((name.clone(), value));
                }
                Ok(Value {
                    ty: callee_value.ty.clone(),
                    kind: ValueKind::Class(Rc::new(ClassValue {
                        name: prototype.name.clone(),
                        fields,
                    })),
                })
            }
            // indexing
            ValueKind::List(items) => {
                let Some(&index_expr) = args.first() else {
                    return Err(self.fatal(pos, "List access needs integer argument".into()));
                };
                let index_value = self.eval(index_expr, env)?;
                let ValueKind::Int(index) = index_value.kind else {
                    return Err(self.fatal(pos, "List access needs integer argument".into()));
                };
                let items = items.borrow();
                if index < 0 || index as usize >= items.len() {
                    return Err(self.fatal(
                        pos,
                        format!("Error: Out of bounds list access: {}", pos.line_text),
                    ));
                }
                Ok(items[index as usize].clone())
            }
            ValueKind::Fn(function) => {
                let function = Rc::clone(function);
                // named calls land on the diagnostic call stack; the frame
                // stays put on error so the trace includes it
                let framed = if let ExprKind::Ref { name, .. } = &module.exprs[callee].kind {
                    self.call_stack
                        .push((name.clone(), module.exprs[callee].pos.clone()));
                    true
                } else {
                    false
                };

                let mut arg_values = Vec::with_capacity(args.len());
                for &arg in args {
                    arg_values.push(self.eval(arg, env)?);
                }

                // callee environment: the caller's scope, overlaid with the
                // captured closure bindings, then the parameters
                let mut call_env = env.clone();
                for (name, value) in &function.captured {
                    if Builtin::from_name(name).is_none() {
                        call_env.insert(name.clone(), value.clone());
                    }
                }
                for (name, value) in function.param_names.iter().zip(arg_values) {
                    call_env.insert(name.clone(), value);
                }

                let result = if let Some(builtin) = function.builtin {
                    builtins::run(self, builtin, pos, &function, &mut call_env)
                } else if let Some(body) = function.body {
                    self.eval(body, &mut call_env)
                } else {
                    Err(self.fatal(pos, "Bad function or typeclass application".into()))
                };

                if framed && result.is_ok() {
                    self.call_stack.pop();
                }
                result
            }
            _ => Err(self.fatal(pos, "Bad function or typeclass application".into())),
        }
    }

    // ── Fields, operators, plumbing ───────────────────────────────

    fn project_field(&self, pos: &Pos, value: &Value, field: &SmolStr) -> EvalResult {
        match &value.kind {
            ValueKind::Tuple(items) => {
                let Ok(index) = field.parse::<usize>() else {
                    return Err(
                        self.fatal(pos, format!("Error: Tuple requires valid index: {}", field))
                    );
                };
                match items.get(index) {
                    Some(item) => Ok(item.clone()),
                    None => Err(self.fatal(
                        pos,
                        format!("Error: Index not in range of tuple: {}", index),
                    )),
                }
            }
            ValueKind::Class(instance) => {
                match instance.fields.iter().find(|(name, _)| name == field) {
                    Some((_, item)) => Ok(item.clone()),
                    None => Err(self.fatal(
                        pos,
                        format!(
                            "Error: typeclass {} has no field {}",
                            instance.name, field
                        ),
                    )),
                }
            }
            _ => Err(self.fatal(pos, "Field given for non-typeclass or tuple type".into())),
        }
    }

    fn apply_op(&self, pos: &Pos, op: Op, left: &Value, right: &Value) -> EvalResult {
        match (&left.kind, &right.kind) {
            (ValueKind::Int(a), ValueKind::Int(b)) => self.int_op(pos, op, *a, *b),
            (ValueKind::Char(a), ValueKind::Char(b)) => self.ord_op(pos, op, a, b),
            (ValueKind::Str(a), ValueKind::Str(b)) => self.ord_op(pos, op, a, b),
            (ValueKind::Bool(a), ValueKind::Bool(b)) => self.bool_op(pos, op, *a, *b),
            _ => Err(self.fatal(
                pos,
                format!("Error: Binary operator requires primitive types: {}", pos.line_text),
            )),
        }
    }

    fn int_op(&self, pos: &Pos, op: Op, a: i64, b: i64) -> EvalResult {
        let value = match op {
            Op::Add => Value::int(a.wrapping_add(b)),
            Op::Sub => Value::int(a.wrapping_sub(b)),
            Op::Mul => Value::int(a.wrapping_mul(b)),
            Op::Div => {
                if b == 0 {
                    return Err(self.fatal(pos, "Error: Division by zero!".into()));
                }
                Value::int(a / b)
            }
            Op::Mod => {
                if b == 0 {
                    return Err(self.fatal(pos, "Error: Division by zero!".into()));
                }
                Value::int(a % b)
            }
            Op::Lt => Value::boolean(a < b),
            Op::Gt => Value::boolean(a > b),
            Op::Le => Value::boolean(a <= b),
            Op::Ge => Value::boolean(a >= b),
            // unary `!` arrives desugared with a literal operand, making it
            // an equality check at this level
            Op::Eq | Op::Not => Value::boolean(a == b),
            Op::Ne => Value::boolean(a != b),
            Op::And | Op::Or => {
                return Err(self.fatal(pos, "Boolean operator requires bool operands".into()))
            }
        };
        Ok(value)
    }

    fn ord_op<T: PartialOrd>(&self, pos: &Pos, op: Op, a: &T, b: &T) -> EvalResult {
        let result = match op {
            Op::Lt => a < b,
            Op::Gt => a > b,
            Op::Le => a <= b,
            Op::Ge => a >= b,
            Op::Eq | Op::Not => a == b,
            Op::Ne => a != b,
            _ => {
                return Err(self.fatal(
                    pos,
                    format!("Error: Binary operator requires primitive types: {}", pos.line_text),
                ))
            }
        };
        Ok(Value::boolean(result))
    }

    fn bool_op(&self, pos: &Pos, op: Op, a: bool, b: bool) -> EvalResult {
        let value = match op {
            Op::And => Value::boolean(a && b),
            Op::Or => Value::boolean(a || b),
            Op::Eq | Op::Not => Value::boolean(a == b),
            Op::Ne => Value::boolean(a != b),
            _ => {
                return Err(self.fatal(
                    pos,
                    format!("Error: Binary operator requires primitive types: {}", pos.line_text),
                ))
            }
        };
        Ok(value)
    }

    fn get_name(&self, pos: &Pos, env: &ValueEnv, name: &str) -> EvalResult {
        match env.get(name) {
            Some(value) => Ok(value.clone()),
            None => Err(self.fatal(
                pos,
                format!("Error: {} does not exist in this scope", name),
            )),
        }
    }

    fn fatal(&self, pos: &Pos, message: String) -> Stop {
        Stop::Error(RuntimeError {
            message,
            pos: pos.clone(),
            trace: self.stack_trace(),
        })
    }

    fn stack_trace(&self) -> String {
        let mut trace = String::from("Fatal error occurred:\n");
        for (name, pos) in self.call_stack.iter().rev() {
            trace.push_str(&format!("\tat '{}' (Line: {})\n", name, pos.line));
        }
        trace
    }

    /// Builtin contract violation: report immediately, latch, keep going.
    pub(crate) fn soft_error(&mut self, pos: &Pos, message: String) -> Value {
        self.error_latch = true;
        eprintln!("{}", pos.render(&message));
        Value::null()
    }

    pub(crate) fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{}", line);
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(n) => Value::int(*n),
        Literal::Bool(b) => Value::boolean(*b),
        Literal::Char(c) => Value::character(*c),
        Literal::Str(s) => Value::string(s.clone()),
        Literal::Null => Value::null(),
    }
}

/// Structural equality over primitive values, used by `match`.
fn primitive_equal(a: &Value, b: &Value) -> bool {
    match (&a.kind, &b.kind) {
        (ValueKind::Int(x), ValueKind::Int(y)) => x == y,
        (ValueKind::Char(x), ValueKind::Char(y)) => x == y,
        (ValueKind::Str(x), ValueKind::Str(y)) => x == y,
        (ValueKind::Bool(x), ValueKind::Bool(y)) => x == y,
        (ValueKind::Null, ValueKind::Null) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests;
