use logos::Logos;
use smol_str::SmolStr;
use std::fmt;

// ── Positions ────────────────────────────────────────────────────

/// Source position, 1-based, carried by every token and AST node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
    /// Full text of the source line, for diagnostics.
    pub line_text: SmolStr,
}

impl Pos {
    pub fn new(line: u32, column: u32, line_text: impl Into<SmolStr>) -> Self {
        Self {
            line,
            column,
            line_text: line_text.into(),
        }
    }

    /// Placeholder position for synthesized nodes.
    pub fn none() -> Self {
        Self::new(0, 0, "")
    }

    /// Render a diagnostic block: position header, message, offending line,
    /// and a caret under the offending column.
    pub fn render(&self, message: &str) -> String {
        let caret = " ".repeat(self.column.saturating_sub(1) as usize);
        format!(
            "Line: {}, Column: {}\n{}\n\n{}\n{}^",
            self.line, self.column, message, self.line_text, caret
        )
    }
}

// ── Tokens ───────────────────────────────────────────────────────

fn unescape(c: char) -> Option<char> {
    match c {
        '?' => Some('?'),
        '\\' => Some('\\'),
        'b' => Some('\u{8}'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        's' => Some(' '),
        _ => None,
    }
}

fn parse_char(lex: &mut logos::Lexer<Token>) -> Option<char> {
    let inner = &lex.slice()[1..lex.slice().len() - 1];
    let mut chars = inner.chars();
    match chars.next()? {
        '\\' => unescape(chars.next()?),
        c => Some(c),
    }
}

fn parse_string(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let inner = &lex.slice()[1..lex.slice().len() - 1];
    let mut result = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            result.push(unescape(chars.next()?)?);
        } else {
            result.push(c);
        }
    }
    Some(result)
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("func")]
    Func,
    #[token("type")]
    Type,
    #[token("val")]
    Val,
    #[token("List")]
    List,
    #[token("Tuple")]
    Tuple,
    #[token("match")]
    Match,
    #[token("case")]
    Case,
    #[token("any")]
    Any,
    #[token("import")]
    Import,
    #[token("int")]
    KwInt,
    #[token("bool")]
    KwBool,
    #[token("char")]
    KwChar,
    #[token("string")]
    KwString,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("=")]
    Assign,
    #[token("->")]
    Arrow,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("!")]
    Bang,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok(), priority = 2)]
    Int(i64),

    #[regex(r"'(\\.|[^'\\])'", parse_char)]
    CharLit(char),

    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    StrLit(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| SmolStr::new(lex.slice()), priority = 1)]
    Ident(SmolStr),
}

impl Token {
    /// Human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::If => "'if'".into(),
            Token::Else => "'else'".into(),
            Token::Func => "'func'".into(),
            Token::Type => "'type'".into(),
            Token::Val => "'val'".into(),
            Token::List => "'List'".into(),
            Token::Tuple => "'Tuple'".into(),
            Token::Match => "'match'".into(),
            Token::Case => "'case'".into(),
            Token::Any => "'any'".into(),
            Token::Import => "'import'".into(),
            Token::KwInt => "'int'".into(),
            Token::KwBool => "'bool'".into(),
            Token::KwChar => "'char'".into(),
            Token::KwString => "'string'".into(),
            Token::Null => "'null'".into(),
            Token::True => "'true'".into(),
            Token::False => "'false'".into(),
            Token::LBracket => "'['".into(),
            Token::RBracket => "']'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::LBrace => "'{'".into(),
            Token::RBrace => "'}'".into(),
            Token::Assign => "'='".into(),
            Token::Arrow => "'->'".into(),
            Token::Colon => "':'".into(),
            Token::Semi => "';'".into(),
            Token::Comma => "','".into(),
            Token::Dot => "'.'".into(),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Percent => "'%'".into(),
            Token::Lt => "'<'".into(),
            Token::Gt => "'>'".into(),
            Token::Le => "'<='".into(),
            Token::Ge => "'>='".into(),
            Token::EqEq => "'=='".into(),
            Token::NotEq => "'!='".into(),
            Token::Bang => "'!'".into(),
            Token::AndAnd => "'&&'".into(),
            Token::OrOr => "'||'".into(),
            Token::Int(n) => format!("integer '{}'", n),
            Token::CharLit(c) => format!("char '{}'", c),
            Token::StrLit(s) => format!("string {:?}", s),
            Token::Ident(name) => format!("identifier '{}'", name),
        }
    }
}

// ── Lexing ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub pos: Pos,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pos.render(&self.message))
    }
}

/// Maps byte offsets to 1-based line/column positions.
struct LineIndex {
    starts: Vec<usize>,
    lines: Vec<SmolStr>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(offset + 1);
            }
        }
        let lines = source
            .lines()
            .map(|line| SmolStr::new(line.trim_end_matches('\r')))
            .collect();
        Self { starts, lines }
    }

    fn pos(&self, offset: usize) -> Pos {
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Pos {
            line: line as u32 + 1,
            column: (offset - self.starts[line]) as u32 + 1,
            line_text: self.lines.get(line).cloned().unwrap_or_default(),
        }
    }
}

/// Lex source code into a list of positioned tokens plus any lexical errors.
/// Lexing continues past errors so that all of them are reported at once.
pub fn lex(source: &str) -> (Vec<(Token, Pos)>, Vec<LexError>) {
    let index = LineIndex::new(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let pos = index.pos(span.start);
        match result {
            Ok(token) => tokens.push((token, pos)),
            Err(()) => errors.push(LexError {
                message: format!("Unexpected character: {}", &source[span]),
                pos,
            }),
        }
    }

    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "lex errors: {:?}", errors);
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("val xs if iffy"),
            vec![
                Token::Val,
                Token::Ident("xs".into()),
                Token::If,
                Token::Ident("iffy".into()),
            ]
        );
    }

    #[test]
    fn compound_delimiters() {
        assert_eq!(
            kinds("-> - > <= == = !="),
            vec![
                Token::Arrow,
                Token::Minus,
                Token::Gt,
                Token::Le,
                Token::EqEq,
                Token::Assign,
                Token::NotEq,
            ]
        );
    }

    #[test]
    fn integer_literals() {
        assert_eq!(kinds("0 42 1234"), vec![
            Token::Int(0),
            Token::Int(42),
            Token::Int(1234),
        ]);
    }

    #[test]
    fn char_literals_with_escapes() {
        assert_eq!(
            kinds(r"'a' '\n' '\s' '\\'"),
            vec![
                Token::CharLit('a'),
                Token::CharLit('\n'),
                Token::CharLit(' '),
                Token::CharLit('\\'),
            ]
        );
    }

    #[test]
    fn string_literals_with_escapes() {
        assert_eq!(
            kinds(r#""hello" "a\tb""#),
            vec![
                Token::StrLit("hello".into()),
                Token::StrLit("a\tb".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 # comment with val and if\n2"),
            vec![Token::Int(1), Token::Int(2)]
        );
    }

    #[test]
    fn positions_are_one_based() {
        let (tokens, _) = lex("val x\n  42");
        assert_eq!(tokens[0].1, Pos::new(1, 1, "val x"));
        assert_eq!(tokens[1].1, Pos::new(1, 5, "val x"));
        assert_eq!(tokens[2].1, Pos::new(2, 3, "  42"));
    }

    #[test]
    fn bad_character_is_an_error() {
        let (tokens, errors) = lex("1 @ 2");
        assert_eq!(tokens.len(), 2);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains('@'));
        assert_eq!(errors[0].pos.line, 1);
        assert_eq!(errors[0].pos.column, 3);
    }

    #[test]
    fn bad_escape_is_an_error() {
        let (_, errors) = lex(r"'\q'");
        assert!(!errors.is_empty());
    }

    #[test]
    fn render_points_at_column() {
        let pos = Pos::new(3, 5, "val x = 1");
        let rendered = pos.render("boom");
        assert!(rendered.contains("Line: 3, Column: 5"));
        assert!(rendered.ends_with("val x = 1\n    ^"));
    }
}
