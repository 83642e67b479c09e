//! Streaming lexer.
//!
//! [`Scanner`] walks the source once and yields `Result<Token<'a>>` items.
//! Lexemes are slices of the source, so no token allocates except string and
//! number literals, which carry their decoded value.
//!
//! Behaviour worth knowing:
//!
//! - whitespace and `//` comments are skipped; comments are fast‑forwarded to
//!   the next newline with `memchr`;
//! - string literals may span lines, an unterminated one is a lex error;
//! - after an error the scanner keeps going, so one pass reports every bad
//!   character;
//! - exactly one `EOF` token is emitted, after which the iterator is fused.
//!
//! ```rust
//! use rox::scanner::Scanner;
//!
//! let tokens: Vec<_> = Scanner::new("print 1;").collect();
//! assert_eq!(tokens.len(), 4);
//! ```

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and"    => TokenType::AND,
    "class"  => TokenType::CLASS,
    "else"   => TokenType::ELSE,
    "false"  => TokenType::FALSE,
    "fun"    => TokenType::FUN,
    "for"    => TokenType::FOR,
    "if"     => TokenType::IF,
    "nil"    => TokenType::NIL,
    "or"     => TokenType::OR,
    "print"  => TokenType::PRINT,
    "return" => TokenType::RETURN,
    "super"  => TokenType::SUPER,
    "this"   => TokenType::THIS,
    "true"   => TokenType::TRUE,
    "var"    => TokenType::VAR,
    "while"  => TokenType::WHILE,
};

pub struct Scanner<'a> {
    src: &'a str,
    start: usize,               // first byte of the current lexeme
    curr: usize,                // one past the last byte examined
    line: usize,                // 1‑based
    pending: Option<TokenType>, // kind recognised by `scan_token`, if any
}

impl<'a> Scanner<'a> {
    #[inline]
    pub fn new(src: &'a str) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
            pending: None,
        }
    }

    /// Scans the whole input, splitting tokens from errors.
    ///
    /// The token list always ends with `EOF`, even when errors were found, so
    /// callers may still parse it to surface syntax errors in the same run.
    pub fn scan_all(self) -> (Vec<Token<'a>>, Vec<LoxError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for item in self {
            match item {
                Ok(token) => tokens.push(token),
                Err(e) => errors.push(e),
            }
        }

        info!(
            "Scanned {} token(s) with {} error(s)",
            tokens.len(),
            errors.len()
        );

        (tokens, errors)
    }

    #[inline(always)]
    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.src.len()
    }

    /// Callers guard with [`Self::is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.bytes()[self.curr];
        self.curr += 1;
        b
    }

    /// Current byte, or `0` past the end.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.bytes()[self.curr]
        }
    }

    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.src.len() {
            0
        } else {
            self.bytes()[self.curr + 1]
        }
    }

    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if self.peek() == expected && !self.is_at_end() {
            self.curr += 1;
            true
        } else {
            false
        }
    }

    /// Picks `long` if the next byte is `=`, else `short`.
    #[inline(always)]
    fn with_equal(&mut self, long: TokenType, short: TokenType) -> TokenType {
        if self.match_byte(b'=') {
            long
        } else {
            short
        }
    }

    /// Scans one lexeme starting at `self.curr`. Whitespace and comments
    /// leave `pending` empty.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        let kind = match b {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,

            b'!' => self.with_equal(TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.with_equal(TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.with_equal(TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.with_equal(TokenType::GREATER_EQUAL, TokenType::GREATER),

            b' ' | b'\r' | b'\t' => return Ok(()),

            b'\n' => {
                self.line += 1;
                return Ok(());
            }

            b'/' => {
                if self.match_byte(b'/') {
                    match memchr(b'\n', &self.bytes()[self.curr..]) {
                        Some(pos) => self.curr += pos,
                        None => self.curr = self.src.len(),
                    }

                    return Ok(());
                }

                TokenType::SLASH
            }

            b'"' => self.string()?,

            b'0'..=b'9' => self.number(),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => {
                // Skip the whole character so multi-byte input reports once.
                let c = self.src[self.start..].chars().next().unwrap_or('\u{FFFD}');
                self.curr = self.start + c.len_utf8();

                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character: {}", c),
                ));
            }
        };

        self.pending = Some(kind);

        Ok(())
    }

    /// `self.start` points at the opening quote.
    fn string(&mut self) -> Result<TokenType> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1;
            }
        }

        if self.is_at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        self.advance();

        let text = &self.src[self.start + 1..self.curr - 1];

        Ok(TokenType::STRING(text.to_owned()))
    }

    fn number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        // Only ASCII digits and at most one dot were consumed.
        let n: f64 = self.src[self.start..self.curr].parse().unwrap_or(0.0);

        TokenType::NUMBER(n)
    }

    fn identifier(&mut self) -> TokenType {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }

        KEYWORDS
            .get(&self.src[self.start..self.curr])
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.curr <= self.src.len() {
            if self.curr == self.src.len() {
                self.curr += 1; // fused from here on
                return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
            }

            self.start = self.curr;
            self.pending = None;

            if let Err(e) = self.scan_token() {
                return Some(Err(e));
            }

            if let Some(tt) = self.pending.take() {
                let lexeme = &self.src[self.start..self.curr];
                debug!("Scanned token ({:?}) on line {}", tt, self.line);

                return Some(Ok(Token::new(tt, lexeme, self.line)));
            }
        }

        None
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
