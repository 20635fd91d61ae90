use banter_interp::{Interpreter, Stop};
use banter_lexer::lex;
use banter_parser::{expand_imports, parse, read_source};
use banter_typeck::{check, PRELUDE};
use clap::Parser;
use std::path::PathBuf;
use std::process::exit;

#[derive(Parser)]
#[command(name = "banter", about = "The Banter programming language")]
struct Cli {
    /// Print build phase headers and the parsed AST
    #[arg(short = 'd')]
    debug: bool,
    /// Path to the .bnt source file
    file: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let Some(file) = cli.file else {
        eprintln!("Error: Source file required");
        exit(1);
    };

    let path = file.to_string_lossy().to_string();
    let source = match read_source(&path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("{}", error);
            exit(2);
        }
    };
    if source.trim().is_empty() {
        eprintln!("Error: Source file is empty: {}", path);
        exit(2);
    }

    if cli.debug {
        eprintln!("── Building ──");
    }

    let (mut tokens, prelude_errors) = lex(PRELUDE);
    let (user_tokens, lex_errors) = lex(&source);
    if !prelude_errors.is_empty() || !lex_errors.is_empty() {
        for error in prelude_errors.iter().chain(&lex_errors) {
            eprintln!("{}\n", error);
        }
        eprintln!("One or more errors occurred during lexing, exiting");
        exit(3);
    }
    if cli.debug {
        eprintln!("Lexed {} tokens", tokens.len() + user_tokens.len());
    }
    tokens.extend(user_tokens);

    let (tokens, import_errors) = expand_imports(tokens);
    let (module, parse_errors) = parse(tokens);
    if !import_errors.is_empty() || !parse_errors.is_empty() {
        for error in import_errors.iter().chain(&parse_errors) {
            eprintln!("{}\n", error);
        }
        eprintln!("One or more errors occurred during parsing, exiting");
        exit(4);
    }
    if cli.debug {
        eprintln!("── Parsed AST ──");
        eprint!("{}", banter_ast::pretty_print(&module));
    }

    let types = check(&module);
    for warning in &types.warnings {
        eprintln!("{}\n", warning);
    }
    if !types.errors.is_empty() {
        for error in &types.errors {
            eprintln!("{}\n", error);
        }
        eprintln!("One or more errors occurred during type checking, exiting");
        exit(5);
    }

    if cli.debug {
        eprintln!("── Successful Build, Running ──");
    }

    let mut interp = Interpreter::new(&module, &types);
    let result = interp.run();
    let had_error = interp.had_error();
    drop(interp);

    match result {
        Ok(_) => {
            if had_error {
                eprintln!("One or more errors occurred at runtime, exiting");
                exit(6);
            }
        }
        Err(Stop::Halt) => {}
        Err(Stop::Error(error)) => {
            eprintln!("{}", error);
            eprintln!("One or more errors occurred at runtime, exiting");
            exit(6);
        }
    }
}
