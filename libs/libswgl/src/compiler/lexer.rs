//! Shader source tokenizer.
//!
//! Converts source text into a flat vector of [`Token`]s. Whitespace, comments
//! and preprocessor lines are dropped; bytes that start no token are skipped.

use alloc::string::String;
use alloc::vec::Vec;
use crate::value::ShaderType;

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // ── Keywords ────────────────────────────────────────────────────────
    Uniform,
    In,
    Out,
    Layout,
    Precision,
    Void,
    Return,
    Type(ShaderType),

    // ── Literals ────────────────────────────────────────────────────────
    IntLiteral(i32),
    FloatLiteral(f32),

    // ── Identifier ──────────────────────────────────────────────────────
    Ident(String),

    // ── Operators ───────────────────────────────────────────────────────
    Plus,
    Minus,
    Star,
    Slash,
    Less,
    Greater,
    EqEq,
    Eq,

    // ── Punctuation ─────────────────────────────────────────────────────
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Dot,
}

/// Tokenize shader source.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        let b = bytes[i];

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Line comments
        if b == b'/' && i + 1 < len && bytes[i + 1] == b'/' {
            while i < len && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // Block comments
        if b == b'/' && i + 1 < len && bytes[i + 1] == b'*' {
            i += 2;
            while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(len);
            continue;
        }

        // Preprocessor lines (#version etc.)
        if b == b'#' {
            while i < len && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // Numbers
        if b.is_ascii_digit() || (b == b'.' && i + 1 < len && bytes[i + 1].is_ascii_digit()) {
            let start = i;
            let mut is_float = false;
            while i < len && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                if bytes[i] == b'.' {
                    is_float = true;
                }
                i += 1;
            }
            let text = &source[start..i];
            if i < len && (bytes[i] == b'f' || bytes[i] == b'F') {
                is_float = true;
                i += 1;
            }
            if is_float {
                tokens.push(Token::FloatLiteral(text.parse().unwrap_or(0.0)));
            } else {
                tokens.push(Token::IntLiteral(text.parse().unwrap_or(0)));
            }
            continue;
        }

        // Identifiers and keywords
        if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(keyword_or_ident(&source[start..i]));
            continue;
        }

        let tok = match b {
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'<' => Token::Less,
            b'>' => Token::Greater,
            b'=' if i + 1 < len && bytes[i + 1] == b'=' => {
                i += 1;
                Token::EqEq
            }
            b'=' => Token::Eq,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b',' => Token::Comma,
            b';' => Token::Semicolon,
            b'.' => Token::Dot,
            _ => {
                i += 1;
                continue;
            }
        };
        tokens.push(tok);
        i += 1;
    }

    tokens
}

fn keyword_or_ident(word: &str) -> Token {
    match word {
        "uniform" => Token::Uniform,
        "in" => Token::In,
        "out" => Token::Out,
        "layout" => Token::Layout,
        "precision" => Token::Precision,
        "void" => Token::Void,
        "return" => Token::Return,
        _ => match ShaderType::from_keyword(word) {
            Some(ty) => Token::Type(ty),
            None => Token::Ident(String::from(word)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn skips_comments_and_directives() {
        let toks = tokenize("#version 330\n// hi\nvec4 /* x */ a;");
        assert_eq!(
            toks,
            [Token::Type(ShaderType::Vec4), Token::Ident("a".into()), Token::Semicolon]
        );
    }

    #[test]
    fn numbers_and_swizzles() {
        let toks = tokenize("v.xy * 2 + 0.5f == .25");
        assert_eq!(
            toks,
            [
                Token::Ident("v".into()),
                Token::Dot,
                Token::Ident("xy".into()),
                Token::Star,
                Token::IntLiteral(2),
                Token::Plus,
                Token::FloatLiteral(0.5),
                Token::EqEq,
                Token::FloatLiteral(0.25),
            ]
        );
    }

    #[test]
    fn layout_declaration() {
        let toks = tokenize("layout(location = 1) in vec2 uv;");
        assert_eq!(toks[0], Token::Layout);
        assert_eq!(toks[4], Token::IntLiteral(1));
        assert_eq!(toks[6], Token::In);
        assert_eq!(toks[7], Token::Type(ShaderType::Vec2));
    }
}
