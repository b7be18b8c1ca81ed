//! Formula lexer
//!
//! Splits formula text into [`Token`]s in a single pass. Lexing never fails: anything
//! unrecognised becomes a [`TokenKind::Unknown`] token and is rejected by the parser,
//! and the stream always ends with [`TokenKind::EndOfString`].
//!
//! At each position the rules are tried in the order of [`TokenKind`]'s declaration and
//! the first match wins; there is no longest-match between rule classes.

use std::fmt;
use tabula_core::ErrorKind;

/// Token categories, in rule order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    WhiteSpace,
    /// `"..."`, doubled quotes escape
    DoubleQuotes,
    /// `'...'`, quoted sheet name
    SingleQuotes,
    /// `#DIV/0!` and friends
    FullError,
    /// Cell reference with at least one `$`
    AbsoluteCell,
    /// Cell reference without `$`
    RelativeCell,
    /// Identifier immediately followed by `(`
    FormulaName,
    /// Any other identifier (named range, TRUE/FALSE, sheet name)
    Variable,
    /// Integer or floating literal
    Number,
    OpenBrace,
    CloseBrace,
    DollarSign,
    Ampersand,
    Period,
    Colon,
    Semicolon,
    Comma,
    Asterisk,
    ForwardSlash,
    Minus,
    Plus,
    Caret,
    OpenParen,
    CloseParen,
    GreaterThan,
    LessThan,
    ExclamationPoint,
    Equals,
    Percent,
    /// A character no rule accepts
    Unknown,
    EndOfString,
}

/// A lexed token: its kind, the exact source text and the byte offset it starts at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::EndOfString => f.write_str("end of formula"),
            _ => f.write_str(&self.text),
        }
    }
}

/// Tokenize formula text (without the leading `=`)
///
/// # Example
/// ```rust
/// use tabula_formula::lexer::{tokenize, TokenKind};
///
/// let kinds: Vec<TokenKind> = tokenize("SUM(A1, 2)").iter().map(|t| t.kind).collect();
/// assert_eq!(
///     kinds,
///     vec![
///         TokenKind::FormulaName,
///         TokenKind::OpenParen,
///         TokenKind::RelativeCell,
///         TokenKind::Comma,
///         TokenKind::WhiteSpace,
///         TokenKind::Number,
///         TokenKind::CloseParen,
///         TokenKind::EndOfString,
///     ]
/// );
/// ```
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer { input: source, pos: 0 };
    let mut tokens = Vec::new();

    while lexer.pos < source.len() {
        let start = lexer.pos;
        let (kind, len) = lexer.scan_token();
        lexer.pos += len;
        tokens.push(Token {
            kind,
            text: source[start..lexer.pos].to_string(),
            position: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::EndOfString,
        text: String::new(),
        position: source.len(),
    });
    tokens
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Kind and byte length of the token at the current position (length is never 0)
    fn scan_token(&self) -> (TokenKind, usize) {
        let rest = self.rest();
        // Callers guarantee we are not at the end
        let c = match rest.chars().next() {
            Some(c) => c,
            None => return (TokenKind::EndOfString, 0),
        };

        if c.is_whitespace() {
            return (TokenKind::WhiteSpace, run_len(rest, char::is_whitespace));
        }
        if c == '"' {
            return (TokenKind::DoubleQuotes, quoted_len(rest, '"'));
        }
        if c == '\'' {
            return (TokenKind::SingleQuotes, quoted_len(rest, '\''));
        }
        if c == '#' {
            if let Some(len) = error_literal_len(rest) {
                return (TokenKind::FullError, len);
            }
        }
        if c.is_ascii_alphabetic() || c == '$' || c == '_' {
            return scan_word(rest);
        }
        if c.is_ascii_digit() || (c == '.' && rest[1..].starts_with(|d: char| d.is_ascii_digit()))
        {
            return (TokenKind::Number, number_len(rest));
        }

        let kind = match c {
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            '&' => TokenKind::Ampersand,
            '.' => TokenKind::Period,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '*' => TokenKind::Asterisk,
            '/' => TokenKind::ForwardSlash,
            '-' => TokenKind::Minus,
            '+' => TokenKind::Plus,
            '^' => TokenKind::Caret,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '>' => TokenKind::GreaterThan,
            '<' => TokenKind::LessThan,
            '!' => TokenKind::ExclamationPoint,
            '=' => TokenKind::Equals,
            '%' => TokenKind::Percent,
            _ => TokenKind::Unknown,
        };
        (kind, c.len_utf8())
    }
}

fn run_len(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(s.len(), |(i, _)| i)
}

/// Length of a quoted run starting at `s[0] == quote`, honouring doubled quotes.
/// An unterminated run extends to the end of input.
fn quoted_len(s: &str, quote: char) -> usize {
    let mut chars = s.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            match chars.peek() {
                Some(&(_, next)) if next == quote => {
                    chars.next();
                }
                _ => return i + c.len_utf8(),
            }
        }
    }
    s.len()
}

fn error_literal_len(s: &str) -> Option<usize> {
    ErrorKind::ALL.iter().find_map(|kind| {
        let text = kind.as_str();
        s.get(..text.len())
            .filter(|head| head.eq_ignore_ascii_case(text))
            .map(|_| text.len())
    })
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Cell references, function names, variables and stray `$`
fn scan_word(s: &str) -> (TokenKind, usize) {
    let cell_run = run_len(s, |c| is_word_char(c) || c == '$');
    let followed_by_paren = s[cell_run..].starts_with('(');
    if !followed_by_paren && is_cell_reference(&s[..cell_run]) {
        let kind = if s[..cell_run].contains('$') {
            TokenKind::AbsoluteCell
        } else {
            TokenKind::RelativeCell
        };
        return (kind, cell_run);
    }

    if s.starts_with('$') {
        return (TokenKind::DollarSign, 1);
    }

    let name_run = run_len(s, is_word_char);
    if s[name_run..].starts_with('(') {
        (TokenKind::FormulaName, name_run)
    } else {
        (TokenKind::Variable, name_run)
    }
}

/// `[$]?[A-Za-z]+[$]?[0-9]+`, matching the whole text
fn is_cell_reference(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;

    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }

    let letter_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == letter_start {
        return false;
    }

    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }

    let digit_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digit_start {
        return false;
    }

    i == bytes.len()
}

/// Integer part, optional fraction, optional exponent (only when digits follow it)
fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = digits_from(0);
    if bytes.get(i) == Some(&b'.') {
        i = digits_from(i + 1);
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let end = digits_from(j);
        if end > j {
            i = end;
        }
    }
    i
}
