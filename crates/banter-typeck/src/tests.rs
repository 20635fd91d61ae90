use super::*;
use banter_lexer::lex;

fn check_src(source: &str) -> TypeCheckResult {
    let (mut tokens, prelude_errors) = lex(PRELUDE);
    assert!(prelude_errors.is_empty(), "prelude lex errors: {:?}", prelude_errors);
    let (user_tokens, lex_errors) = lex(source);
    assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
    tokens.extend(user_tokens);
    let (module, parse_errors) = banter_parser::parse(tokens);
    assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);
    check(&module)
}

fn check_ok(source: &str) {
    let result = check_src(source);
    assert!(
        result.errors.is_empty(),
        "unexpected type errors: {:?}",
        result.errors
    );
}

fn check_err(source: &str) -> String {
    let result = check_src(source);
    assert!(!result.errors.is_empty(), "expected type errors, got none");
    result
        .errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Passing programs ─────────────────────────────────────────────

#[test]
fn arithmetic() {
    check_ok("func main() -> int = 1 + 2 * 3; printInt(main())");
}

#[test]
fn val_bindings() {
    check_ok("val x : int = 1; val y : int = x + 1; printInt(y)");
}

#[test]
fn sequencing() {
    check_ok("printInt(1); printInt(2); printInt(3)");
}

#[test]
fn branches_agree() {
    check_ok("val x : int = if (true) 1 else 2; printInt(x)");
}

#[test]
fn comparisons_on_primitives() {
    check_ok("printBool(1 < 2); printBool('a' == 'b'); printBool(\"x\" != \"y\")");
}

#[test]
fn unary_operators() {
    check_ok("printInt(-5); printBool(!true)");
}

#[test]
fn recursion_through_the_live_environment() {
    check_ok("func fact(n: int) -> int = if (n == 0) 1 else n * fact(n - 1); printInt(fact(5))");
}

#[test]
fn generic_identity_with_explicit_argument() {
    check_ok("func id[T](x: T) -> T = x; printInt(id[int](42))");
}

#[test]
fn generic_instantiated_twice() {
    check_ok("func id[T](x: T) -> T = x; printInt(id[int](1)); printChar(id[char]('a'))");
}

#[test]
fn list_literals_and_builtins() {
    check_ok("val xs : List[int] = List{1, 2, 3}; printList(pushBack(xs, 4))");
}

#[test]
fn builtin_generics_inferred_from_arguments() {
    check_ok("val x : int = front(List{1, 2}); printInt(x)");
}

#[test]
fn builtin_generics_accept_explicit_arguments() {
    check_ok("printList[int](List{1, 2})");
}

#[test]
fn empty_list_takes_declared_element_type() {
    check_ok("val xs : List[int] = List{}; printBool(isEmpty(xs))");
}

#[test]
fn list_indexing() {
    check_ok("val xs : List[int] = List{1, 2, 3}; printInt(xs(0))");
}

#[test]
fn tuples_and_numeric_fields() {
    check_ok("val t : Tuple[int, char] = Tuple{1, 'a'}; printInt(t.0); printChar(t.1)");
}

#[test]
fn typeclass_declaration_construction_and_fields() {
    check_ok(
        "type Point { x: int, y: int };
         val p : type Point = Point(3, 4);
         printInt(p.x + p.y)",
    );
}

#[test]
fn match_on_int() {
    check_ok(
        "val n : int = 0;
         match (n) {
             case 0 = { printString(\"zero\"); };
             case any = { printString(\"other\"); };
         }",
    );
}

#[test]
fn function_passed_as_argument() {
    check_ok(
        "func twice(f: int -> int, x: int) -> int = f(f(x));
         func inc(n: int) -> int = n + 1;
         printInt(twice(inc, 1))",
    );
}

#[test]
fn conversions() {
    check_ok(
        "printChar(intToChar(97));
         printInt(charToInt('a'));
         printList(stringToCharList(\"hi\"));
         printString(charListToString(List{'h', 'i'}))",
    );
}

// ── Failing programs ─────────────────────────────────────────────

#[test]
fn arithmetic_rejects_bools() {
    let errors = check_err("printInt(1 + true)");
    assert!(errors.contains("Mismatched type: bool, Expected: int"));
}

#[test]
fn boolean_operators_reject_ints() {
    let errors = check_err("printBool(1 && true)");
    assert!(errors.contains("Expected: bool"));
}

#[test]
fn comparison_rejects_composites() {
    let errors = check_err("val xs : List[int] = List{1}; printBool(xs == xs)");
    assert!(errors.contains("Binary operators can only be used on primitive types"));
}

#[test]
fn declared_type_must_match_value() {
    let errors = check_err("val x : bool = 1; printBool(x)");
    assert!(errors.contains("Mismatched type: int, Expected: bool"));
}

#[test]
fn branch_arms_must_agree() {
    let errors = check_err("if (true) 1 else false");
    assert!(errors.contains("Mismatched type"));
}

#[test]
fn branch_condition_must_be_bool() {
    let errors = check_err("if (1) 2 else 3");
    assert!(errors.contains("Expected: bool"));
}

#[test]
fn unknown_name_is_reported() {
    let errors = check_err("printInt(zzz)");
    assert!(errors.contains("zzz does not exist in this scope"));
}

#[test]
fn list_elements_must_match() {
    let errors = check_err("val xs : List[int] = List{1, 'a'}; isEmpty(xs)");
    assert!(errors.contains("Mismatched type: char, Expected: int"));
}

#[test]
fn call_arity_is_checked() {
    let errors = check_err("func f(a: int) -> int = a; printInt(f(1, 2))");
    assert!(errors.contains("Function application does not match signature"));
}

#[test]
fn generics_rejected_on_plain_functions() {
    let errors = check_err("func f(a: int) -> int = a; printInt(f[int](1))");
    assert!(errors.contains("Types provided for non-templated function"));
}

#[test]
fn generics_required_on_templated_functions() {
    let errors = check_err("func id[T](x: T) -> T = x; printInt(id(1))");
    assert!(errors.contains("No types provided for templated function"));
}

#[test]
fn generic_body_rechecked_per_instantiation() {
    let errors = check_err("func inc[T](x: T) -> int = x + 1; printInt(inc[bool](true))");
    assert!(errors.contains("Expected: int"));
}

#[test]
fn tuple_index_out_of_range() {
    let errors = check_err("val t : Tuple[int, int] = Tuple{1, 2}; printInt(t.5)");
    assert!(errors.contains("Index not in range of tuple: 5"));
}

#[test]
fn tuple_index_must_be_numeric() {
    let errors = check_err("val t : Tuple[int, int] = Tuple{1, 2}; printInt(t.x)");
    assert!(errors.contains("Tuple requires valid index: x"));
}

#[test]
fn field_access_on_plain_value() {
    let errors = check_err("val n : int = 1; printInt(n.x)");
    assert!(errors.contains("Field given for non-typeclass or tuple type"));
}

#[test]
fn unknown_typeclass_field() {
    let errors = check_err(
        "type Point { x: int, y: int };
         val p : type Point = Point(1, 2);
         printInt(p.z)",
    );
    assert!(errors.contains("typeclass Point has no field z"));
}

#[test]
fn construction_arity_is_checked() {
    let errors = check_err(
        "type Point { x: int, y: int };
         val p : type Point = Point(1);
         printInt(p.x)",
    );
    assert!(errors.contains("Typeclass construction does not match signature"));
}

#[test]
fn construction_field_types_are_checked() {
    let errors = check_err(
        "type Point { x: int, y: int };
         val p : type Point = Point(1, 'a');
         printInt(p.x)",
    );
    assert!(errors.contains("Mismatched type: char, Expected: int"));
}

#[test]
fn list_index_must_be_int() {
    let errors = check_err("val xs : List[int] = List{1}; printInt(xs(true))");
    assert!(errors.contains("Expected: int"));
}

#[test]
fn calling_a_plain_value_is_an_error() {
    let errors = check_err("val n : int = 1; printInt(n(0))");
    assert!(errors.contains("Bad function or typeclass application"));
}

#[test]
fn match_pattern_must_match_scrutinee_type() {
    let errors = check_err(
        "val n : int = 1;
         match (n) { case 'a' = { printInt(0); }; }",
    );
    assert!(errors.contains("Mismatched type: char, Expected: int"));
}

// ── Warnings and the side tables ─────────────────────────────────

#[test]
fn cases_below_any_are_flagged_dead() {
    let result = check_src(
        "val n : int = 1;
         match (n) {
             case any = { printInt(0); };
             case 0 = { printInt(1); };
         }",
    );
    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0]
        .message
        .contains("case statement below 'any' is always ignored"));
}

#[test]
fn checked_nodes_get_resolved_types() {
    let (mut tokens, _) = lex(PRELUDE);
    let (user_tokens, _) = lex("func id[T](x: T) -> T = x; printInt(id[int](42))");
    tokens.extend(user_tokens);
    let (module, _) = banter_parser::parse(tokens);
    let result = check(&module);
    assert!(result.errors.is_empty());

    let mut saw_resolved_call = false;
    for (_, ty) in result.expr_types.iter() {
        if matches!(ty, Ty::Unknown) {
            continue;
        }
        saw_resolved_call = true;
    }
    assert!(saw_resolved_call);

    // every function definition got a lowered signature
    for (id, _) in module.fun_defs.iter() {
        assert!(result.fn_types.get(id).is_some());
    }
}
