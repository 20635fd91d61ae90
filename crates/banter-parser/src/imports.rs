//! Pre-parse import expansion: every `import a/b/c` directive is replaced by
//! the token stream of `a/b/c.bnt`, repeatedly, until none remain.

use crate::ParseError;
use banter_lexer::{lex, Pos, Token};
use std::fs;

/// Hard cap on expansions; hitting it means an import cycle.
const MAX_EXPANSIONS: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Error: Files require .bnt extension: {0}")]
    Extension(String),
    #[error("Error: Could not open file: {path}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Read a source file, enforcing the `.bnt` extension.
pub fn read_source(path: &str) -> Result<String, SourceError> {
    if !path.ends_with(".bnt") {
        return Err(SourceError::Extension(path.to_string()));
    }
    fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_string(),
        source,
    })
}

/// Splice imported files into the token stream until a fixed point.
pub fn expand_imports(mut tokens: Vec<(Token, Pos)>) -> (Vec<(Token, Pos)>, Vec<ParseError>) {
    let mut errors = Vec::new();
    let mut expansions = 0;

    while let Some(index) = tokens.iter().position(|(t, _)| matches!(t, Token::Import)) {
        let pos = tokens[index].1.clone();
        if expansions >= MAX_EXPANSIONS {
            errors.push(ParseError {
                message: "Import limit exceeded, likely an import cycle".into(),
                pos,
            });
            break;
        }
        expansions += 1;
        tokens.remove(index);

        let Some(mut path) = take_segment(&mut tokens, index) else {
            errors.push(ParseError {
                message: "Expected import path".into(),
                pos,
            });
            continue;
        };
        while matches!(tokens.get(index), Some((Token::Slash, _))) {
            tokens.remove(index);
            match take_segment(&mut tokens, index) {
                Some(segment) => {
                    path.push('/');
                    path.push_str(&segment);
                }
                None => {
                    errors.push(ParseError {
                        message: "Expected import path segment after '/'".into(),
                        pos: pos.clone(),
                    });
                    break;
                }
            }
        }

        match read_source(&format!("{}.bnt", path)) {
            Ok(source) => {
                let (mut imported, lex_errors) = lex(&source);
                errors.extend(lex_errors.into_iter().map(|e| ParseError {
                    message: e.message,
                    pos: e.pos,
                }));
                if !matches!(imported.last(), Some((Token::Semi, _))) {
                    let semi_pos = imported
                        .last()
                        .map(|(_, p)| p.clone())
                        .unwrap_or_else(|| pos.clone());
                    imported.push((Token::Semi, semi_pos));
                }
                tokens.splice(index..index, imported);
            }
            Err(e) => errors.push(ParseError {
                message: e.to_string(),
                pos,
            }),
        }
    }

    (tokens, errors)
}

fn take_segment(tokens: &mut Vec<(Token, Pos)>, index: usize) -> Option<String> {
    match tokens.get(index) {
        Some((Token::Ident(name), _)) => {
            let segment = name.to_string();
            tokens.remove(index);
            Some(segment)
        }
        _ => None,
    }
}
