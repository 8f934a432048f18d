//! JPQL tokenizer.

use super::ast::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Word,
    String { terminated: bool },
    Number { valid: bool },
    Parameter,
    LParen,
    RParen,
    Comma,
    Dot,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Unknown,
    Eof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

/// Splits `source` into tokens; the last token is always `Eof`.
pub(crate) fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tokens
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Lexer<'_> {
    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.peek_char() else {
            return self.token(TokenKind::Eof, start);
        };

        if is_word_start(c) {
            self.pos += c.len_utf8();
            self.consume_word_chars();
            return self.token(TokenKind::Word, start);
        }
        if c.is_ascii_digit() {
            let valid = self.lex_number();
            return self.token(TokenKind::Number { valid }, start);
        }

        let kind = match c {
            '\'' => {
                let terminated = self.lex_string();
                return self.token(TokenKind::String { terminated }, start);
            }
            ':' | '?' => {
                self.pos += 1;
                self.consume_word_chars();
                if self.pos == start + 1 {
                    TokenKind::Unknown
                } else {
                    TokenKind::Parameter
                }
            }
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            ',' => self.single(TokenKind::Comma),
            '.' => self.single(TokenKind::Dot),
            '=' => self.single(TokenKind::Eq),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '<' => match self.peek_byte_at(1) {
                Some(b'>') => self.double(TokenKind::Ne),
                Some(b'=') => self.double(TokenKind::Le),
                _ => self.single(TokenKind::Lt),
            },
            '>' => match self.peek_byte_at(1) {
                Some(b'=') => self.double(TokenKind::Ge),
                _ => self.single(TokenKind::Gt),
            },
            other => {
                self.pos += other.len_utf8();
                TokenKind::Unknown
            }
        };
        self.token(kind, start)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn double(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 2;
        kind
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: Span::new(start, self.pos),
        }
    }

    fn consume_word_chars(&mut self) {
        while let Some(c) = self.peek_char() {
            if !is_word_part(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn consume_digits(&mut self) -> usize {
        let begin = self.pos;
        while matches!(self.peek_byte_at(0), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - begin
    }

    /// Returns false for malformed literals such as `1e` or `12abc`.
    fn lex_number(&mut self) -> bool {
        let mut valid = true;
        self.consume_digits();
        if self.peek_byte_at(0) == Some(b'.')
            && matches!(self.peek_byte_at(1), Some(b) if b.is_ascii_digit())
        {
            self.pos += 1;
            self.consume_digits();
        }
        if matches!(self.peek_byte_at(0), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek_byte_at(0), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.consume_digits() == 0 {
                valid = false;
            }
        }
        if matches!(
            self.peek_byte_at(0),
            Some(b'l' | b'L' | b'f' | b'F' | b'd' | b'D')
        ) && !matches!(self.peek_char_after(1), Some(c) if is_word_part(c))
        {
            self.pos += 1;
        }
        if matches!(self.peek_char(), Some(c) if is_word_part(c)) {
            self.consume_word_chars();
            valid = false;
        }
        valid
    }

    fn peek_char_after(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset..)?.chars().next()
    }

    /// Consumes a quoted string; `''` is an escaped quote.
    fn lex_string(&mut self) -> bool {
        self.pos += 1;
        while let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
            if c == '\'' {
                if self.peek_byte_at(0) == Some(b'\'') {
                    self.pos += 1;
                    continue;
                }
                return true;
            }
        }
        false
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_word_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
