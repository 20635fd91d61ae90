pub mod imports;

use banter_ast::*;
use banter_lexer::{Pos, Token};
use smol_str::SmolStr;
use std::fmt;

pub use imports::{expand_imports, read_source, SourceError};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub pos: Pos,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pos.render(&self.message))
    }
}

/// Parse an already-lexed (and import-expanded) token stream.
pub fn parse(tokens: Vec<(Token, Pos)>) -> (Module, Vec<ParseError>) {
    let mut parser = Parser::new(tokens);
    let root = parser.parse_program();
    parser.module.root = root;
    (parser.module, parser.errors)
}

/// Lex and parse a single source string. No prelude, no import expansion.
pub fn parse_source(source: &str) -> (Module, Vec<ParseError>) {
    let (tokens, lex_errors) = banter_lexer::lex(source);
    let mut errors: Vec<ParseError> = lex_errors
        .into_iter()
        .map(|e| ParseError {
            message: e.message,
            pos: e.pos,
        })
        .collect();
    let (module, mut parse_errors) = parse(tokens);
    errors.append(&mut parse_errors);
    (module, errors)
}

struct Parser {
    tokens: Vec<(Token, Pos)>,
    pos: usize,
    module: Module,
    errors: Vec<ParseError>,
    seq_count: u32,
}

impl Parser {
    fn new(tokens: Vec<(Token, Pos)>) -> Self {
        Self {
            tokens,
            pos: 0,
            module: Module::new(),
            errors: Vec::new(),
            seq_count: 0,
        }
    }

    // ── Token helpers ─────────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_pos(&self) -> Pos {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, p)| p.clone())
            .unwrap_or_else(Pos::none)
    }

    fn advance(&mut self) -> Option<(Token, Pos)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Require a token. On mismatch, report and step past the offender so
    /// parsing can continue best-effort.
    fn expect(&mut self, expected: &Token) {
        if self.check(expected) {
            self.advance();
            return;
        }
        let pos = self.peek_pos();
        let found = self.describe_current();
        self.error(
            format!("Unexpected token: {}, Expected: {}", found, expected.describe()),
            pos,
        );
        self.advance();
    }

    fn expect_ident(&mut self) -> Option<(SmolStr, Pos)> {
        if let Some(Token::Ident(_)) = self.peek() {
            if let Some((Token::Ident(name), pos)) = self.advance() {
                return Some((name, pos));
            }
        }
        let pos = self.peek_pos();
        let found = self.describe_current();
        self.error(
            format!("Unexpected token: {}, Expected: identifier", found),
            pos,
        );
        None
    }

    fn describe_current(&self) -> String {
        self.peek()
            .map(|t| t.describe())
            .unwrap_or_else(|| "end of input".into())
    }

    fn error(&mut self, message: String, pos: Pos) {
        self.errors.push(ParseError { message, pos });
    }

    fn fresh_seq_name(&mut self) -> SmolStr {
        let name = SmolStr::new(format!("$seq{}", self.seq_count));
        self.seq_count += 1;
        name
    }

    // ── Allocators ────────────────────────────────────────────────

    fn alloc_expr(&mut self, kind: ExprKind, pos: Pos) -> ExprId {
        self.module.exprs.alloc(Expr { kind, pos })
    }

    fn alloc_type(&mut self, kind: TypeExprKind, pos: Pos) -> TypeExprId {
        self.module.type_exprs.alloc(TypeExpr { kind, pos })
    }

    fn alloc_end(&mut self) -> ExprId {
        self.alloc_expr(ExprKind::End, Pos::none())
    }

    // ── Programs and functions ────────────────────────────────────

    /// Zero or more `func` definitions followed by a tail expression.
    fn parse_program(&mut self) -> ExprId {
        let pos = self.peek_pos();
        let mut functions = Vec::new();
        while self.eat(&Token::Func) {
            if let Some(f) = self.parse_fun_def() {
                functions.push(f);
            }
        }
        let body = self.parse_expression();
        self.alloc_expr(ExprKind::Program { functions, body }, pos)
    }

    fn parse_fun_def(&mut self) -> Option<FunDefId> {
        let (name, pos) = self.expect_ident()?;

        let mut generics = Vec::new();
        if self.eat(&Token::LBracket) {
            loop {
                if let Some((g, _)) = self.expect_ident() {
                    generics.push(g);
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RBracket);
        }

        self.expect(&Token::LParen);
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                if let Some(param) = self.parse_param(&generics) {
                    params.push(param);
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen);

        self.expect(&Token::Arrow);
        let return_type = self.parse_type(&generics);
        self.expect(&Token::Assign);
        let body = self.parse_simple_expression();
        self.expect(&Token::Semi);

        Some(self.module.fun_defs.alloc(FunDef {
            name,
            pos,
            generics,
            params,
            return_type,
            body,
        }))
    }

    fn parse_param(&mut self, generics: &[SmolStr]) -> Option<Param> {
        let (name, pos) = self.expect_ident()?;
        self.expect(&Token::Colon);
        let ty = self.parse_type(generics);
        Some(Param { name, ty, pos })
    }

    // ── Expressions ───────────────────────────────────────────────

    /// `val` bindings and `;` sequences, right-nested into `Let` chains.
    fn parse_expression(&mut self) -> ExprId {
        if self.at_end() {
            return self.alloc_end();
        }

        if self.eat(&Token::Val) {
            let pos = self.peek_pos();
            let Some((name, _)) = self.expect_ident() else {
                return self.alloc_end();
            };
            self.expect(&Token::Colon);
            let declared = self.parse_type(&[]);
            self.expect(&Token::Assign);
            let value = self.parse_simple_expression();
            self.expect(&Token::Semi);
            let body = self.parse_sequence_rest();
            self.alloc_expr(
                ExprKind::Let {
                    name,
                    declared: Some(declared),
                    value,
                    body,
                },
                pos,
            )
        } else {
            let pos = self.peek_pos();
            let value = self.parse_simple_expression();
            if self.eat(&Token::Semi) {
                let body = self.parse_sequence_rest();
                let name = self.fresh_seq_name();
                self.alloc_expr(
                    ExprKind::Let {
                        name,
                        declared: None,
                        value,
                        body,
                    },
                    pos,
                )
            } else {
                value
            }
        }
    }

    /// The remainder of a `;` sequence; a closing brace or the end of input
    /// means the trailing expression is missing and becomes `End`.
    fn parse_sequence_rest(&mut self) -> ExprId {
        if self.at_end() || self.check(&Token::RBrace) {
            self.alloc_end()
        } else {
            self.parse_expression()
        }
    }

    fn parse_simple_expression(&mut self) -> ExprId {
        if self.eat(&Token::If) {
            self.parse_branch()
        } else if self.eat(&Token::List) {
            self.parse_list()
        } else if self.eat(&Token::Tuple) {
            self.parse_tuple()
        } else if self.eat(&Token::Match) {
            self.parse_match()
        } else if self.eat(&Token::Type) {
            self.parse_typeclass()
        } else if self.check(&Token::Func) {
            self.parse_program()
        } else {
            self.parse_binary(0)
        }
    }

    fn parse_branch(&mut self) -> ExprId {
        let pos = self.peek_pos();
        self.expect(&Token::LParen);
        let condition = self.parse_simple_expression();
        self.expect(&Token::RParen);
        let then_branch = self.parse_simple_expression();
        let else_branch = if self.eat(&Token::Else) {
            self.parse_simple_expression()
        } else {
            self.alloc_expr(ExprKind::Lit(Literal::Null), pos.clone())
        };
        self.alloc_expr(
            ExprKind::Branch {
                condition,
                then_branch,
                else_branch,
            },
            pos,
        )
    }

    fn parse_list(&mut self) -> ExprId {
        let pos = self.peek_pos();
        let values = self.parse_braced_values();
        self.alloc_expr(ExprKind::ListDef(values), pos)
    }

    fn parse_tuple(&mut self) -> ExprId {
        let pos = self.peek_pos();
        let values = self.parse_braced_values();
        self.alloc_expr(ExprKind::TupleDef(values), pos)
    }

    fn parse_braced_values(&mut self) -> Vec<ExprId> {
        self.expect(&Token::LBrace);
        let mut values = Vec::new();
        if !self.check(&Token::RBrace) {
            values.push(self.parse_simple_expression());
            while self.eat(&Token::Comma) {
                values.push(self.parse_simple_expression());
            }
        }
        self.expect(&Token::RBrace);
        values
    }

    fn parse_match(&mut self) -> ExprId {
        let pos = self.peek_pos();
        self.expect(&Token::LParen);
        let scrutinee = match self.expect_ident() {
            Some((name, _)) => name,
            None => SmolStr::default(),
        };
        self.expect(&Token::RParen);
        self.expect(&Token::LBrace);
        let mut cases = Vec::new();
        while self.eat(&Token::Case) {
            cases.push(self.parse_case());
        }
        self.expect(&Token::RBrace);
        self.alloc_expr(ExprKind::Match { scrutinee, cases }, pos)
    }

    fn parse_case(&mut self) -> Case {
        let pos = self.peek_pos();
        let pattern = if self.eat(&Token::Any) {
            CasePattern::Any
        } else {
            CasePattern::Expr(self.parse_atom())
        };
        self.expect(&Token::Assign);
        self.expect(&Token::LBrace);
        let body = self.parse_expression();
        self.expect(&Token::RBrace);
        self.expect(&Token::Semi);
        Case { pattern, body, pos }
    }

    fn parse_typeclass(&mut self) -> ExprId {
        let pos = self.peek_pos();
        let Some((name, _)) = self.expect_ident() else {
            return self.alloc_end();
        };
        self.expect(&Token::LBrace);
        let mut fields: Vec<Param> = Vec::new();
        if !self.check(&Token::RBrace) {
            loop {
                if let Some(field) = self.parse_param(&[]) {
                    if fields.iter().any(|f| f.name == field.name) {
                        self.error(
                            format!(
                                "{} in typeclass {} has already been declared",
                                field.name, name
                            ),
                            field.pos.clone(),
                        );
                    }
                    fields.push(field);
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RBrace);
        self.alloc_expr(ExprKind::ClassDef { name, fields }, pos)
    }

    // ── Operators ─────────────────────────────────────────────────

    fn parse_binary(&mut self, min: u8) -> ExprId {
        let mut lhs = self.parse_unary();
        loop {
            let Some(op) = self.peek().and_then(binary_op) else {
                break;
            };
            if op.precedence() < min {
                break;
            }
            let Some((_, pos)) = self.advance() else {
                break;
            };
            let rhs = self.parse_binary(op.precedence() + 1);
            lhs = self.alloc_expr(ExprKind::Primitive { op, lhs, rhs }, pos);
        }
        lhs
    }

    /// Unary `+`, `-`, `!` become binary primitives over a zero or `false`
    /// left operand.
    fn parse_unary(&mut self) -> ExprId {
        let pos = self.peek_pos();
        let op = if self.eat(&Token::Plus) {
            Some((Op::Add, Literal::Int(0)))
        } else if self.eat(&Token::Minus) {
            Some((Op::Sub, Literal::Int(0)))
        } else if self.eat(&Token::Bang) {
            Some((Op::Not, Literal::Bool(false)))
        } else {
            None
        };
        match op {
            Some((op, neutral)) => {
                let rhs = self.parse_tight();
                let lhs = self.alloc_expr(ExprKind::Lit(neutral), pos.clone());
                self.alloc_expr(ExprKind::Primitive { op, lhs, rhs }, pos)
            }
            None => self.parse_tight(),
        }
    }

    fn parse_tight(&mut self) -> ExprId {
        if self.eat(&Token::LBrace) {
            let expr = self.parse_expression();
            self.expect(&Token::RBrace);
            expr
        } else {
            self.parse_application()
        }
    }

    // ── Application chains ────────────────────────────────────────

    /// `atom`, optionally followed by `[T, ...]` and a chain of call
    /// argument lists. Each further `(args)` wraps the previous call.
    fn parse_application(&mut self) -> ExprId {
        let pos = self.peek_pos();
        let atom = self.parse_atom();

        let mut generic_args = Vec::new();
        if self.eat(&Token::LBracket) {
            generic_args.push(self.parse_type(&[]));
            while self.eat(&Token::Comma) {
                generic_args.push(self.parse_type(&[]));
            }
            self.expect(&Token::RBracket);
        }

        if !self.eat(&Token::LParen) {
            return atom;
        }
        let args = self.parse_call_args();
        let mut app = self.alloc_expr(
            ExprKind::Application {
                callee: atom,
                generic_args,
                args,
            },
            pos,
        );

        while self.check(&Token::LParen) {
            let pos = self.peek_pos();
            self.advance();
            let args = self.parse_call_args();
            app = self.alloc_expr(
                ExprKind::Application {
                    callee: app,
                    generic_args: Vec::new(),
                    args,
                },
                pos,
            );
        }
        app
    }

    fn parse_call_args(&mut self) -> Vec<ExprId> {
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            args.push(self.parse_simple_expression());
        }
        while self.eat(&Token::Comma) {
            args.push(self.parse_simple_expression());
        }
        self.expect(&Token::RParen);
        args
    }

    // ── Atoms ─────────────────────────────────────────────────────

    fn parse_atom(&mut self) -> ExprId {
        let pos = self.peek_pos();
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.advance();
                let expr = self.parse_simple_expression();
                self.expect(&Token::RParen);
                expr
            }
            Some(Token::Ident(name)) => {
                self.advance();
                let field = if self.eat(&Token::Dot) {
                    self.parse_field_name()
                } else {
                    None
                };
                self.alloc_expr(ExprKind::Ref { name, field }, pos)
            }
            Some(Token::True) => {
                self.advance();
                self.alloc_expr(ExprKind::Lit(Literal::Bool(true)), pos)
            }
            Some(Token::False) => {
                self.advance();
                self.alloc_expr(ExprKind::Lit(Literal::Bool(false)), pos)
            }
            Some(Token::Null) => {
                self.advance();
                self.alloc_expr(ExprKind::Lit(Literal::Null), pos)
            }
            Some(Token::Int(n)) => {
                self.advance();
                self.alloc_expr(ExprKind::Lit(Literal::Int(n)), pos)
            }
            Some(Token::CharLit(c)) => {
                self.advance();
                self.alloc_expr(ExprKind::Lit(Literal::Char(c)), pos)
            }
            Some(Token::StrLit(s)) => {
                self.advance();
                self.alloc_expr(ExprKind::Lit(Literal::Str(s)), pos)
            }
            Some(other) => {
                self.error(
                    format!("Unexpected token: {}, Expected: <literal>", other.describe()),
                    pos,
                );
                self.alloc_end()
            }
            None => self.alloc_end(),
        }
    }

    fn parse_field_name(&mut self) -> Option<SmolStr> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                Some(name)
            }
            Some(Token::Int(n)) => {
                self.advance();
                Some(SmolStr::new(n.to_string()))
            }
            _ => {
                let pos = self.peek_pos();
                let found = self.describe_current();
                self.error(
                    format!("Unexpected token: {}, Expected: field name", found),
                    pos,
                );
                None
            }
        }
    }

    // ── Types ─────────────────────────────────────────────────────

    fn parse_type(&mut self, generics: &[SmolStr]) -> TypeExprId {
        let pos = self.peek_pos();
        match self.peek().cloned() {
            Some(Token::KwInt) => {
                self.advance();
                self.finish_primitive_type(TypeExprKind::Int, pos, generics)
            }
            Some(Token::KwBool) => {
                self.advance();
                self.finish_primitive_type(TypeExprKind::Bool, pos, generics)
            }
            Some(Token::KwChar) => {
                self.advance();
                self.finish_primitive_type(TypeExprKind::Char, pos, generics)
            }
            Some(Token::KwString) => {
                self.advance();
                self.finish_primitive_type(TypeExprKind::Str, pos, generics)
            }
            Some(Token::Null) => {
                self.advance();
                self.finish_primitive_type(TypeExprKind::Null, pos, generics)
            }
            Some(Token::Type) => {
                self.advance();
                match self.expect_ident() {
                    Some((name, _)) => {
                        self.finish_primitive_type(TypeExprKind::Class(name), pos, generics)
                    }
                    None => self.alloc_type(TypeExprKind::Unknown, pos),
                }
            }
            Some(Token::List) => {
                self.advance();
                self.expect(&Token::LBracket);
                let elem = self.parse_type(generics);
                self.expect(&Token::RBracket);
                self.alloc_type(TypeExprKind::List(elem), pos)
            }
            Some(Token::Tuple) => {
                self.advance();
                self.expect(&Token::LBracket);
                let mut elems = vec![self.parse_type(generics)];
                while self.eat(&Token::Comma) {
                    elems.push(self.parse_type(generics));
                }
                self.expect(&Token::RBracket);
                self.alloc_type(TypeExprKind::Tuple(elems), pos)
            }
            Some(Token::LParen) => {
                self.advance();
                let mut params = vec![self.parse_type(generics)];
                while self.eat(&Token::Comma) {
                    params.push(self.parse_type(generics));
                }
                self.expect(&Token::RParen);
                self.expect(&Token::Arrow);
                let ret = self.parse_type(generics);
                self.alloc_type(TypeExprKind::Fn { params, ret }, pos)
            }
            Some(Token::Ident(name)) => {
                if generics.contains(&name) {
                    self.advance();
                    self.alloc_type(TypeExprKind::Gen(name), pos)
                } else {
                    self.error(format!("Undefined generic type: {}", name), pos.clone());
                    self.alloc_type(TypeExprKind::Unknown, pos)
                }
            }
            other => {
                let found = other
                    .map(|t| t.describe())
                    .unwrap_or_else(|| "end of input".into());
                self.error(format!("Unexpected type: {}", found), pos.clone());
                self.alloc_type(TypeExprKind::Unknown, pos)
            }
        }
    }

    /// Primitive and typeclass types admit the right-associated function
    /// sugar `T -> R`.
    fn finish_primitive_type(
        &mut self,
        kind: TypeExprKind,
        pos: Pos,
        generics: &[SmolStr],
    ) -> TypeExprId {
        let ty = self.alloc_type(kind, pos.clone());
        if self.eat(&Token::Arrow) {
            let ret = self.parse_type(generics);
            self.alloc_type(
                TypeExprKind::Fn {
                    params: vec![ty],
                    ret,
                },
                pos,
            )
        } else {
            ty
        }
    }
}

fn binary_op(token: &Token) -> Option<Op> {
    match token {
        Token::Plus => Some(Op::Add),
        Token::Minus => Some(Op::Sub),
        Token::Star => Some(Op::Mul),
        Token::Slash => Some(Op::Div),
        Token::Percent => Some(Op::Mod),
        Token::Lt => Some(Op::Lt),
        Token::Gt => Some(Op::Gt),
        Token::Le => Some(Op::Le),
        Token::Ge => Some(Op::Ge),
        Token::EqEq => Some(Op::Eq),
        Token::NotEq => Some(Op::Ne),
        Token::AndAnd => Some(Op::And),
        Token::OrOr => Some(Op::Or),
        _ => None,
    }
}
