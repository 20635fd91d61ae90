//! Native implementations of the prelude names. Arguments arrive through
//! the callee environment under the declared parameter names. Contract
//! violations report a soft error and evaluate to `Null`; only `halt` stops
//! the program.

use crate::{types_agree, EvalResult, FnValue, Interpreter, Stop, Value, ValueEnv, ValueKind};
use banter_ast::Pos;
use banter_typeck::{Builtin, Ty};
use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

pub(crate) fn run(
    interp: &mut Interpreter,
    builtin: Builtin,
    pos: &Pos,
    function: &FnValue,
    env: &mut ValueEnv,
) -> EvalResult {
    match builtin {
        Builtin::Insert => insert(interp, pos, function, env, false),
        Builtin::InsertInPlace => insert(interp, pos, function, env, true),
        Builtin::Remove => remove(interp, pos, function, env, false),
        Builtin::RemoveInPlace => remove(interp, pos, function, env, true),
        Builtin::Replace => replace(interp, pos, function, env, false),
        Builtin::ReplaceInPlace => replace(interp, pos, function, env, true),
        Builtin::PushFront => push(interp, pos, function, env, true),
        Builtin::PushBack => push(interp, pos, function, env, false),
        Builtin::Front => pick(interp, pos, function, env, true),
        Builtin::Back => pick(interp, pos, function, env, false),
        Builtin::Head => crop(interp, pos, function, env, true),
        Builtin::Tail => crop(interp, pos, function, env, false),
        Builtin::Combine => concat(interp, pos, function, env, false),
        Builtin::Append => concat(interp, pos, function, env, true),
        Builtin::Size => size(interp, pos, function, env),
        Builtin::IsEmpty => is_empty(interp, pos, function, env),
        Builtin::Range => range(interp, pos, function, env),
        Builtin::IntToChar => int_to_char(interp, pos, function, env),
        Builtin::CharToInt => char_to_int(interp, pos, function, env),
        Builtin::StringToCharList => string_to_char_list(interp, pos, function, env),
        Builtin::CharListToString => char_list_to_string(interp, pos, function, env),
        Builtin::PrintInt
        | Builtin::PrintBool
        | Builtin::PrintChar
        | Builtin::PrintString => print_primitive(interp, function, env),
        Builtin::PrintList => print_list(interp, pos, function, env),
        Builtin::Print2Tuple => print_tuple(interp, pos, function, env, "print2Tuple"),
        Builtin::Print3Tuple => print_tuple(interp, pos, function, env, "print3Tuple"),
        Builtin::Print4Tuple => print_tuple(interp, pos, function, env, "print4Tuple"),
        Builtin::ReadChar => read_char(interp),
        Builtin::ReadString => read_string(interp),
        Builtin::Halt => Err(Stop::Halt),
    }
}

// ── Argument plumbing ────────────────────────────────────────────

fn arg(function: &FnValue, env: &ValueEnv, index: usize) -> Value {
    function
        .param_names
        .get(index)
        .and_then(|name| env.get(name))
        .cloned()
        .unwrap_or_else(Value::null)
}

fn list_items(value: &Value) -> Option<Rc<RefCell<Vec<Value>>>> {
    match &value.kind {
        ValueKind::List(items) => Some(Rc::clone(items)),
        _ => None,
    }
}

fn int_value(value: &Value) -> Option<i64> {
    match value.kind {
        ValueKind::Int(n) => Some(n),
        _ => None,
    }
}

fn elem_ty(list: &Value) -> Ty {
    match &list.ty {
        Ty::List(elem) => (**elem).clone(),
        _ => Ty::Unknown,
    }
}

/// New list value sharing the input's element type.
fn make_list(list: &Value, items: Vec<Value>) -> Value {
    Value {
        ty: list.ty.clone(),
        kind: ValueKind::List(Rc::new(RefCell::new(items))),
    }
}

fn bad_element(interp: &mut Interpreter, pos: &Pos) -> Value {
    interp.soft_error(
        pos,
        format!("Error: Element type must match list type: {}", pos.line_text),
    )
}

fn out_of_bounds(interp: &mut Interpreter, pos: &Pos) -> Value {
    interp.soft_error(
        pos,
        format!("Error: Out of bounds list access: {}", pos.line_text),
    )
}

fn not_a_list(interp: &mut Interpreter, pos: &Pos) -> Value {
    interp.soft_error(pos, format!("Error: Expected a list: {}", pos.line_text))
}

// ── List manipulation ────────────────────────────────────────────

fn insert(
    interp: &mut Interpreter,
    pos: &Pos,
    function: &FnValue,
    env: &ValueEnv,
    in_place: bool,
) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    let element = arg(function, env, 1);
    if !types_agree(&element.ty, &elem_ty(&list)) {
        return Ok(bad_element(interp, pos));
    }
    let Some(index) = int_value(&arg(function, env, 2)) else {
        return Ok(out_of_bounds(interp, pos));
    };

    let len = items.borrow().len();
    if len != 0 && (index < 0 || index as usize >= len) {
        return Ok(out_of_bounds(interp, pos));
    }
    let at = (index.max(0) as usize).min(len);

    if in_place {
        items.borrow_mut().insert(at, element);
        Ok(list)
    } else {
        let mut copied = items.borrow().clone();
        copied.insert(at, element);
        Ok(make_list(&list, copied))
    }
}

fn remove(
    interp: &mut Interpreter,
    pos: &Pos,
    function: &FnValue,
    env: &ValueEnv,
    in_place: bool,
) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    if items.borrow().is_empty() {
        return Ok(interp.soft_error(
            pos,
            format!("Error: Cannot remove from empty list: {}", pos.line_text),
        ));
    }
    let Some(index) = int_value(&arg(function, env, 1)) else {
        return Ok(out_of_bounds(interp, pos));
    };
    if index < 0 || index as usize >= items.borrow().len() {
        return Ok(out_of_bounds(interp, pos));
    }

    if in_place {
        items.borrow_mut().remove(index as usize);
        Ok(list)
    } else {
        let mut copied = items.borrow().clone();
        copied.remove(index as usize);
        Ok(make_list(&list, copied))
    }
}

fn replace(
    interp: &mut Interpreter,
    pos: &Pos,
    function: &FnValue,
    env: &ValueEnv,
    in_place: bool,
) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    if items.borrow().is_empty() {
        return Ok(interp.soft_error(
            pos,
            format!(
                "Error: Cannot replace with element in empty list: {}",
                pos.line_text
            ),
        ));
    }
    let Some(index) = int_value(&arg(function, env, 2)) else {
        return Ok(out_of_bounds(interp, pos));
    };
    if index < 0 || index as usize >= items.borrow().len() {
        return Ok(out_of_bounds(interp, pos));
    }
    let element = arg(function, env, 1);
    if !types_agree(&element.ty, &elem_ty(&list)) {
        return Ok(bad_element(interp, pos));
    }

    if in_place {
        items.borrow_mut()[index as usize] = element;
        Ok(list)
    } else {
        let mut copied = items.borrow().clone();
        copied[index as usize] = element;
        Ok(make_list(&list, copied))
    }
}

fn push(
    interp: &mut Interpreter,
    pos: &Pos,
    function: &FnValue,
    env: &ValueEnv,
    front: bool,
) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    let element = arg(function, env, 1);
    if !types_agree(&element.ty, &elem_ty(&list)) {
        return Ok(bad_element(interp, pos));
    }

    let mut copied = items.borrow().clone();
    if front {
        copied.insert(0, element);
    } else {
        copied.push(element);
    }
    Ok(make_list(&list, copied))
}

// ── List access ──────────────────────────────────────────────────

fn pick(
    interp: &mut Interpreter,
    pos: &Pos,
    function: &FnValue,
    env: &ValueEnv,
    front: bool,
) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    let items = items.borrow();
    let picked = if front { items.first() } else { items.last() };
    match picked {
        Some(value) => Ok(value.clone()),
        None => Ok(interp.soft_error(
            pos,
            format!(
                "Error: Cannot get element from empty list: {}",
                pos.line_text
            ),
        )),
    }
}

fn crop(
    interp: &mut Interpreter,
    pos: &Pos,
    function: &FnValue,
    env: &ValueEnv,
    drop_last: bool,
) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    if items.borrow().is_empty() {
        return Ok(interp.soft_error(
            pos,
            format!(
                "Error: Cannot get sublist from empty list: {}",
                pos.line_text
            ),
        ));
    }
    let mut copied = items.borrow().clone();
    if drop_last {
        copied.pop();
    } else {
        copied.remove(0);
    }
    Ok(make_list(&list, copied))
}

// ── Composition and queries ──────────────────────────────────────

fn concat(
    interp: &mut Interpreter,
    pos: &Pos,
    function: &FnValue,
    env: &ValueEnv,
    in_place: bool,
) -> EvalResult {
    let first = arg(function, env, 0);
    let second = arg(function, env, 1);
    let (Some(first_items), Some(second_items)) = (list_items(&first), list_items(&second))
    else {
        return Ok(not_a_list(interp, pos));
    };
    if !types_agree(&first.ty, &second.ty) {
        return Ok(interp.soft_error(
            pos,
            format!("Error: List types must match: {}", pos.line_text),
        ));
    }

    if in_place {
        let appended = second_items.borrow().clone();
        first_items.borrow_mut().extend(appended);
        Ok(first)
    } else {
        let mut combined = first_items.borrow().clone();
        combined.extend(second_items.borrow().iter().cloned());
        Ok(make_list(&first, combined))
    }
}

fn size(interp: &mut Interpreter, pos: &Pos, function: &FnValue, env: &ValueEnv) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    let len = items.borrow().len();
    Ok(Value::int(len as i64))
}

fn is_empty(interp: &mut Interpreter, pos: &Pos, function: &FnValue, env: &ValueEnv) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    let empty = items.borrow().is_empty();
    Ok(Value::boolean(empty))
}

fn range(interp: &mut Interpreter, pos: &Pos, function: &FnValue, env: &ValueEnv) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    if items.borrow().is_empty() {
        return Ok(interp.soft_error(
            pos,
            format!(
                "Error: Cannot get sublist from empty list: {}",
                pos.line_text
            ),
        ));
    }
    let (Some(start), Some(end)) = (
        int_value(&arg(function, env, 1)),
        int_value(&arg(function, env, 2)),
    ) else {
        return Ok(interp.soft_error(
            pos,
            format!("Error: Invalid range: {}", pos.line_text),
        ));
    };

    let len = items.borrow().len();
    if start > end
        || start < 0
        || end < 0
        || start as usize >= len
        || end as usize >= len
    {
        return Ok(interp.soft_error(
            pos,
            format!("Error: Invalid range: {}", pos.line_text),
        ));
    }

    let copied = items.borrow()[start as usize..=end as usize].to_vec();
    Ok(make_list(&list, copied))
}

// ── Conversions ──────────────────────────────────────────────────

fn int_to_char(interp: &mut Interpreter, pos: &Pos, function: &FnValue, env: &ValueEnv) -> EvalResult {
    match int_value(&arg(function, env, 0)) {
        Some(n) => Ok(Value::character((n as u8) as char)),
        None => Ok(interp.soft_error(pos, "Error: Expected an int".into())),
    }
}

fn char_to_int(interp: &mut Interpreter, pos: &Pos, function: &FnValue, env: &ValueEnv) -> EvalResult {
    match arg(function, env, 0).kind {
        ValueKind::Char(c) => Ok(Value::int(c as i64)),
        _ => Ok(interp.soft_error(pos, "Error: Expected a char".into())),
    }
}

fn string_to_char_list(
    interp: &mut Interpreter,
    pos: &Pos,
    function: &FnValue,
    env: &ValueEnv,
) -> EvalResult {
    match &arg(function, env, 0).kind {
        ValueKind::Str(s) => {
            let items: Vec<Value> = s.chars().map(Value::character).collect();
            Ok(Value {
                ty: Ty::List(Box::new(Ty::Char)),
                kind: ValueKind::List(Rc::new(RefCell::new(items))),
            })
        }
        _ => Ok(interp.soft_error(pos, "Error: Expected a string".into())),
    }
}

fn char_list_to_string(
    interp: &mut Interpreter,
    pos: &Pos,
    function: &FnValue,
    env: &ValueEnv,
) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    let mut s = String::new();
    for item in items.borrow().iter() {
        match item.kind {
            ValueKind::Char(c) => s.push(c),
            _ => return Ok(bad_element(interp, pos)),
        }
    }
    Ok(Value::string(s))
}

// ── Printing ─────────────────────────────────────────────────────

fn print_primitive(interp: &mut Interpreter, function: &FnValue, env: &ValueEnv) -> EvalResult {
    let value = arg(function, env, 0);
    let line = value.to_string();
    interp.write_line(&line);
    Ok(Value::null())
}

fn print_list(interp: &mut Interpreter, pos: &Pos, function: &FnValue, env: &ValueEnv) -> EvalResult {
    let list = arg(function, env, 0);
    let Some(items) = list_items(&list) else {
        return Ok(not_a_list(interp, pos));
    };
    let items = items.borrow();
    print_collection(interp, pos, &items, "printList")
}

fn print_tuple(
    interp: &mut Interpreter,
    pos: &Pos,
    function: &FnValue,
    env: &ValueEnv,
    label: &str,
) -> EvalResult {
    match &arg(function, env, 0).kind {
        ValueKind::Tuple(items) => print_collection(interp, pos, items, label),
        _ => Ok(interp.soft_error(pos, format!("Error: Expected a tuple: {}", pos.line_text))),
    }
}

/// Collections print as `(a, b, c)` and may only hold non-generic
/// primitives: ints plain, chars quoted, strings double-quoted, bools as
/// `true`/`false`.
fn print_collection(
    interp: &mut Interpreter,
    pos: &Pos,
    items: &[Value],
    label: &str,
) -> EvalResult {
    for item in items {
        if !printable(item) {
            return Ok(interp.soft_error(
                pos,
                format!("Error: {} only takes non-generic primitives", label),
            ));
        }
    }
    let mut line = String::from("(");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            line.push_str(", ");
        }
        line.push_str(&quoted(item));
    }
    line.push(')');
    interp.write_line(&line);
    Ok(Value::null())
}

fn printable(value: &Value) -> bool {
    let primitive_kind = matches!(
        value.kind,
        ValueKind::Int(_) | ValueKind::Char(_) | ValueKind::Str(_) | ValueKind::Bool(_)
    );
    primitive_kind && !matches!(value.ty, Ty::Gen(_))
}

fn quoted(value: &Value) -> String {
    match &value.kind {
        ValueKind::Int(n) => n.to_string(),
        ValueKind::Bool(b) => b.to_string(),
        ValueKind::Char(c) => format!("'{}'", c),
        ValueKind::Str(s) => format!("\"{}\"", s),
        _ => String::new(),
    }
}

// ── Reading ──────────────────────────────────────────────────────

fn read_char(interp: &mut Interpreter) -> EvalResult {
    let mut byte = [0u8; 1];
    loop {
        match interp.input.read(&mut byte) {
            Ok(0) | Err(_) => return Ok(Value::character('\0')),
            Ok(_) => {
                let c = byte[0] as char;
                if !c.is_whitespace() {
                    return Ok(Value::character(c));
                }
            }
        }
    }
}

fn read_string(interp: &mut Interpreter) -> EvalResult {
    let mut word = String::new();
    let mut byte = [0u8; 1];
    loop {
        match interp.input.read(&mut byte) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let c = byte[0] as char;
                if c.is_whitespace() {
                    if word.is_empty() {
                        continue;
                    }
                    break;
                }
                word.push(c);
            }
        }
    }
    Ok(Value::string(word))
}
