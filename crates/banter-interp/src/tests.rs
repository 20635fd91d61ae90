use super::*;
use banter_lexer::lex;
use banter_typeck::{check, PRELUDE};
use std::io::Cursor;

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Run {
    out: String,
    result: Result<Value, Stop>,
    had_error: bool,
}

fn run_with_input(source: &str, input: &str) -> Run {
    let (mut tokens, prelude_errors) = lex(PRELUDE);
    assert!(prelude_errors.is_empty(), "prelude lex errors: {:?}", prelude_errors);
    let (user_tokens, lex_errors) = lex(source);
    assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
    tokens.extend(user_tokens);
    let (module, parse_errors) = banter_parser::parse(tokens);
    assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);
    let types = check(&module);
    assert!(types.errors.is_empty(), "type errors: {:?}", types.errors);

    let sink = SharedBuf::default();
    let reader = Cursor::new(input.as_bytes().to_vec());
    let mut interp = Interpreter::with_io(&module, &types, Box::new(sink.clone()), Box::new(reader));
    let result = interp.run();
    let had_error = interp.had_error();
    drop(interp);
    let bytes = sink.0.borrow().clone();
    Run {
        out: String::from_utf8(bytes).unwrap(),
        result,
        had_error,
    }
}

fn run_src(source: &str) -> Run {
    run_with_input(source, "")
}

fn stdout_of(source: &str) -> String {
    let run = run_src(source);
    assert!(run.result.is_ok(), "runtime error: {:?}", run.result.err());
    assert!(!run.had_error, "unexpected soft errors");
    run.out
}

fn fatal_of(source: &str) -> RuntimeError {
    let run = run_src(source);
    match run.result {
        Err(Stop::Error(e)) => e,
        other => panic!("expected a fatal error, got {:?}", other),
    }
}

// ── End-to-end programs ──────────────────────────────────────────

#[test]
fn arithmetic_precedence() {
    assert_eq!(stdout_of("func main() -> int = 1 + 2 * 3; printInt(main())"), "7\n");
}

#[test]
fn generic_identity() {
    assert_eq!(
        stdout_of("func id[T](x: T) -> T = x; printInt(id[int](42))"),
        "42\n"
    );
}

#[test]
fn recursive_factorial() {
    assert_eq!(
        stdout_of("func fact(n: int) -> int = if (n == 0) 1 else n * fact(n - 1); printInt(fact(5))"),
        "120\n"
    );
}

#[test]
fn push_back_copies_its_input() {
    assert_eq!(
        stdout_of(
            "val xs : List[int] = List{1, 2, 3};
             printList(pushBack(xs, 4));
             printList(xs)"
        ),
        "(1, 2, 3, 4)\n(1, 2, 3)\n"
    );
}

#[test]
fn in_place_variants_mutate_through_every_binding() {
    assert_eq!(
        stdout_of(
            "val xs : List[int] = List{1, 2, 3};
             insertInPlace(xs, 9, 1);
             printList(xs)"
        ),
        "(1, 9, 2, 3)\n"
    );
}

#[test]
fn in_place_matches_copying_result() {
    assert_eq!(
        stdout_of(
            "val xs : List[int] = List{1, 2, 3};
             val ys : List[int] = List{1, 2, 3};
             printList(replace(xs, 9, 1));
             printList(replaceInPlace(ys, 9, 1))"
        ),
        "(1, 9, 3)\n(1, 9, 3)\n"
    );
}

#[test]
fn list_access_builtins() {
    assert_eq!(
        stdout_of(
            "val xs : List[int] = List{1, 2, 3};
             printInt(front(xs));
             printInt(back(xs));
             printList(head(xs));
             printList(tail(xs));
             printList(range(xs, 0, 1));
             printInt(size(xs));
             printBool(isEmpty(xs))"
        ),
        "1\n3\n(1, 2)\n(2, 3)\n(1, 2)\n3\nfalse\n"
    );
}

#[test]
fn combine_copies_append_mutates() {
    assert_eq!(
        stdout_of(
            "val xs : List[int] = List{1};
             val ys : List[int] = List{2};
             printList(combine(xs, ys));
             printList(xs);
             append(xs, ys);
             printList(xs)"
        ),
        "(1, 2)\n(1)\n(1, 2)\n"
    );
}

#[test]
fn list_indexing() {
    assert_eq!(
        stdout_of("val xs : List[int] = List{10, 20, 30}; printInt(xs(1))"),
        "20\n"
    );
}

#[test]
fn typeclass_fields() {
    assert_eq!(
        stdout_of(
            "type Point { x: int, y: int };
             val p : type Point = Point(3, 4);
             printInt(p.x + p.y)"
        ),
        "7\n"
    );
}

#[test]
fn tuple_projection_and_printing() {
    assert_eq!(
        stdout_of(
            "val t : Tuple[int, char] = Tuple{7, 'a'};
             printInt(t.0);
             print2Tuple(t)"
        ),
        "7\n(7, 'a')\n"
    );
}

#[test]
fn match_selects_first_equal_case() {
    let source = |n: i64| {
        format!(
            "val n : int = {};
             match (n) {{
                 case 0 = {{ printString(\"zero\"); }};
                 case any = {{ printString(\"other\"); }};
             }}",
            n
        )
    };
    assert_eq!(stdout_of(&source(0)), "zero\n");
    assert_eq!(stdout_of(&source(1)), "other\n");
}

#[test]
fn match_without_hit_returns_null() {
    let run = run_src(
        "val n : int = 5;
         match (n) { case 0 = { printInt(1); }; }",
    );
    assert!(run.result.is_ok());
    assert!(run.out.is_empty());
    assert!(matches!(run.result.unwrap().kind, ValueKind::Null));
}

#[test]
fn closures_capture_their_environment() {
    assert_eq!(
        stdout_of(
            "func makeAdder(n: int) -> int -> int = {
                 func add(x: int) -> int = x + n;
                 add
             };
             val add2 : int -> int = makeAdder(2);
             printInt(add2(40))"
        ),
        "42\n"
    );
}

#[test]
fn higher_order_functions() {
    assert_eq!(
        stdout_of(
            "func twice(f: int -> int, x: int) -> int = f(f(x));
             func inc(n: int) -> int = n + 1;
             printInt(twice(inc, 1))"
        ),
        "3\n"
    );
}

#[test]
fn conversions_round_trip() {
    assert_eq!(
        stdout_of(
            "printInt(charToInt('a'));
             printChar(intToChar(98));
             printList(stringToCharList(\"hi\"));
             printString(charListToString(List{'h', 'i'}))"
        ),
        "97\nb\n('h', 'i')\nhi\n"
    );
}

#[test]
fn printing_primitives() {
    assert_eq!(
        stdout_of("printInt(1); printBool(true); printChar('x'); printString(\"hey\")"),
        "1\ntrue\nx\nhey\n"
    );
}

#[test]
fn strings_print_quoted_inside_lists() {
    assert_eq!(
        stdout_of("printList(List{\"a\", \"b\"})"),
        "(\"a\", \"b\")\n"
    );
}

#[test]
fn reads_consume_whitespace_separated_input() {
    let run = run_with_input(
        "printChar(readChar()); printString(readString())",
        "x hello world",
    );
    assert!(run.result.is_ok());
    assert_eq!(run.out, "x\nhello\n");
}

#[test]
fn halt_stops_evaluation_successfully() {
    let run = run_src("printInt(1); halt(); printInt(2)");
    assert!(matches!(run.result, Err(Stop::Halt)));
    assert_eq!(run.out, "1\n");
}

// ── Runtime failures ─────────────────────────────────────────────

#[test]
fn division_by_zero_is_fatal_with_trace() {
    let error = fatal_of("func main() -> int = 1 / 0; printInt(main())");
    assert!(error.message.contains("Division by zero"));
    assert!(error.trace.contains("at 'main'"));
    assert!(error.trace.contains("at 'printInt'"));
}

#[test]
fn out_of_bounds_index_is_fatal() {
    let error = fatal_of("val xs : List[int] = List{1, 2, 3}; printInt(xs(5))");
    assert!(error.message.contains("Out of bounds list access"));
}

#[test]
fn invalid_range_latches_and_continues() {
    let run = run_src(
        "val xs : List[int] = List{1, 2, 3};
         range(xs, 2, 1);
         printInt(9)",
    );
    assert!(run.result.is_ok());
    assert!(run.had_error);
    assert_eq!(run.out, "9\n");
}

#[test]
fn empty_list_access_latches() {
    let run = run_src("val xs : List[int] = List{}; front(xs); printInt(1)");
    assert!(run.result.is_ok());
    assert!(run.had_error);
}

#[test]
fn print_list_rejects_composite_elements() {
    let run = run_src("printList(List{Tuple{1, 2}})");
    assert!(run.result.is_ok());
    assert!(run.had_error);
    assert!(run.out.is_empty());
}

#[test]
fn values_carry_their_types() {
    let run = run_src("val xs : List[int] = List{1, 2}; xs");
    let value = run.result.unwrap();
    assert!(matches!(&value.ty, Ty::List(elem) if matches!(**elem, Ty::Int)));
}
