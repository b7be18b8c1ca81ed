//! Formula parser
//!
//! A recursive descent parser over the [`lexer`](crate::lexer) token stream with
//! spreadsheet operator precedence. The parser builds the tree only: no evaluation,
//! no coercion and no arity checks happen here.

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::lexer::{tokenize, Token, TokenKind};
use tabula_core::{CellAddress, CellRange, ErrorKind};

/// Nesting limit for parentheses, unary operators, calls, arrays and `^` chains
pub const MAX_NESTING: usize = 64;

/// Longest formula text accepted, in characters
pub const MAX_FORMULA_CHARS: usize = 8_192;

/// Parse a formula string into an AST
///
/// The leading `=` is optional.
///
/// # Example
/// ```rust
/// use tabula_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("PMT(0.05/12, 360, 200000)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim_start();
    let formula = formula.strip_prefix('=').unwrap_or(formula);
    parse(tokenize(formula))
}

/// Parse a token stream produced by [`tokenize`]
pub fn parse(tokens: Vec<Token>) -> FormulaResult<FormulaExpr> {
    let length: usize = tokens.iter().map(|t| t.text.chars().count()).sum();
    if length > MAX_FORMULA_CHARS {
        return Err(FormulaError::TooLong {
            length,
            limit: MAX_FORMULA_CHARS,
        });
    }

    let mut parser = FormulaParser::new(tokens);
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if !parser.is_at_end() {
        let position = parser.current_token().position;
        let rest: String = parser.tokens[parser.pos..]
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        return Err(FormulaError::TrailingInput { rest, position });
    }

    Ok(expr)
}

struct FormulaParser {
    /// Significant tokens (whitespace removed), always ending with `EndOfString`
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl FormulaParser {
    fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::WhiteSpace)
            .collect();

        if tokens.last().map(|t| t.kind) != Some(TokenKind::EndOfString) {
            let position = tokens.last().map_or(0, |t| t.position + t.text.len());
            tokens.push(Token {
                kind: TokenKind::EndOfString,
                text: String::new(),
                position,
            });
        }

        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // === Token helpers ===

    fn current_token(&self) -> &Token {
        // `new` guarantees a trailing EndOfString, and `consume` never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.current_token().kind
    }

    fn is_at_end(&self) -> bool {
        self.kind() == TokenKind::EndOfString
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token().clone();
        if token.kind != TokenKind::EndOfString {
            self.pos += 1;
        }
        token
    }

    /// True when the token after the current one starts exactly where it ends
    fn next_is_adjacent(&self, kind: TokenKind) -> bool {
        let current = self.current_token();
        self.tokens.get(self.pos + 1).is_some_and(|next| {
            next.kind == kind && next.position == current.position + current.text.len()
        })
    }

    fn unexpected(&self, expected: &str) -> FormulaError {
        let token = self.current_token();
        match token.kind {
            TokenKind::EndOfString => FormulaError::UnexpectedEnd {
                expected: expected.to_string(),
            },
            _ => FormulaError::UnexpectedToken {
                found: token.text.clone(),
                position: token.position,
            },
        }
    }

    /// Consume the closing partner of `open`
    fn expect_close(&mut self, kind: TokenKind, open: &Token) -> FormulaResult<()> {
        if self.kind() == kind {
            self.consume();
            return Ok(());
        }
        if self.is_at_end() {
            let open_char = open.text.chars().next().unwrap_or('(');
            return Err(FormulaError::Unbalanced {
                open: open_char,
                position: open.position,
            });
        }
        Err(self.unexpected("closing delimiter"))
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> FormulaResult<T>,
    ) -> FormulaResult<T> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FormulaError::NestingTooDeep {
                limit: MAX_NESTING,
                position: self.current_token().position,
            });
        }
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // === Expression parsing (precedence climbing) ===

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let (op, width) = match self.kind() {
                TokenKind::Equals => (BinaryOperator::Equal, 1),
                TokenKind::LessThan if self.next_is_adjacent(TokenKind::Equals) => {
                    (BinaryOperator::LessEqual, 2)
                }
                TokenKind::LessThan if self.next_is_adjacent(TokenKind::GreaterThan) => {
                    (BinaryOperator::NotEqual, 2)
                }
                TokenKind::LessThan => (BinaryOperator::LessThan, 1),
                TokenKind::GreaterThan if self.next_is_adjacent(TokenKind::Equals) => {
                    (BinaryOperator::GreaterEqual, 2)
                }
                TokenKind::GreaterThan => (BinaryOperator::GreaterThan, 1),
                _ => break,
            };

            for _ in 0..width {
                self.consume();
            }
            let right = self.parse_concatenation()?;
            left = FormulaExpr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while self.kind() == TokenKind::Ampersand {
            self.consume();
            let right = self.parse_additive()?;
            left = FormulaExpr::BinaryOp {
                op: BinaryOperator::Concat,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = FormulaExpr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.kind() {
                TokenKind::Asterisk => BinaryOperator::Multiply,
                TokenKind::ForwardSlash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            let right = self.parse_exponent()?;
            left = FormulaExpr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;

        if self.kind() == TokenKind::Caret {
            self.consume();
            let right = self.nested(Self::parse_exponent)?; // Right associative
            return Ok(FormulaExpr::BinaryOp {
                op: BinaryOperator::Power,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        // Every nested construct recurses through here
        self.nested(Self::parse_unary_inner)
    }

    fn parse_unary_inner(&mut self) -> FormulaResult<FormulaExpr> {
        let op = match self.kind() {
            TokenKind::Minus => Some(UnaryOperator::Negate),
            TokenKind::Plus => Some(UnaryOperator::Plus),
            _ => None,
        };
        if let Some(op) = op {
            self.consume();
            let operand = self.parse_unary()?;
            return Ok(FormulaExpr::UnaryOp {
                op,
                operand: Box::new(operand),
            });
        }

        // Parse primary, then check for postfix percent
        let mut expr = self.parse_range()?;

        while self.kind() == TokenKind::Percent {
            self.consume();
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if self.kind() != TokenKind::Colon {
            return Ok(left);
        }

        let colon = self.consume();
        let right = self.parse_primary()?;

        match (left, right) {
            (FormulaExpr::CellRef(start_ref), FormulaExpr::CellRef(end_ref)) => {
                let sheet = match (start_ref.sheet, end_ref.sheet) {
                    (Some(a), Some(b)) if !a.eq_ignore_ascii_case(&b) => {
                        return Err(FormulaError::InvalidReference {
                            text: format!("{}!...:{}!...", a, b),
                            reason: "range references must be on the same sheet".into(),
                        });
                    }
                    (Some(a), _) => Some(a),
                    (None, b) => b,
                };

                let range = CellRange::new(start_ref.address, end_ref.address);
                Ok(FormulaExpr::RangeRef(RangeReference { sheet, range }))
            }
            _ => Err(FormulaError::UnexpectedToken {
                found: colon.text,
                position: colon.position,
            }),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.kind() {
            TokenKind::Number => {
                let token = self.consume();
                match token.text.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(FormulaExpr::Number(n)),
                    // 1e999 and friends
                    Ok(_) => Ok(FormulaExpr::Error(ErrorKind::Num)),
                    Err(_) => Err(FormulaError::UnexpectedToken {
                        found: token.text,
                        position: token.position,
                    }),
                }
            }

            TokenKind::DoubleQuotes => {
                let token = self.consume();
                Ok(FormulaExpr::Text(unquote(&token.text, '"')))
            }

            TokenKind::FullError => {
                let token = self.consume();
                ErrorKind::from_text(&token.text)
                    .map(FormulaExpr::Error)
                    .ok_or(FormulaError::UnexpectedToken {
                        found: token.text,
                        position: token.position,
                    })
            }

            TokenKind::OpenParen => {
                let open = self.consume();
                let expr = self.parse_expression()?;
                self.expect_close(TokenKind::CloseParen, &open)?;
                Ok(expr)
            }

            TokenKind::OpenBrace => self.parse_array(),

            TokenKind::SingleQuotes => {
                let token = self.consume();
                self.parse_sheet_reference(unquote(&token.text, '\''))
            }

            TokenKind::AbsoluteCell | TokenKind::RelativeCell => {
                let token = self.consume();
                if self.kind() == TokenKind::ExclamationPoint {
                    return self.parse_sheet_reference(token.text);
                }
                self.parse_cell_reference(None, &token.text)
            }

            TokenKind::FormulaName => {
                let name = self.consume();
                self.parse_function_call(name.text)
            }

            TokenKind::Variable => {
                let token = self.consume();
                if self.kind() == TokenKind::ExclamationPoint {
                    return self.parse_sheet_reference(token.text);
                }
                if token.text.eq_ignore_ascii_case("TRUE") {
                    Ok(FormulaExpr::Boolean(true))
                } else if token.text.eq_ignore_ascii_case("FALSE") {
                    Ok(FormulaExpr::Boolean(false))
                } else {
                    Ok(FormulaExpr::NameRef(token.text))
                }
            }

            _ => Err(self.unexpected("operand")),
        }
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        let open = self.consume();

        let mut rows = Vec::new();
        let mut current_row = Vec::new();

        // Parse first element
        if self.kind() != TokenKind::CloseBrace {
            current_row.push(self.parse_expression()?);

            loop {
                match self.kind() {
                    TokenKind::Comma => {
                        self.consume();
                        current_row.push(self.parse_expression()?);
                    }
                    TokenKind::Semicolon => {
                        self.consume();
                        rows.push(current_row);
                        current_row = Vec::new();
                        current_row.push(self.parse_expression()?);
                    }
                    _ => break,
                }
            }
        }

        if !current_row.is_empty() {
            rows.push(current_row);
        }

        self.expect_close(TokenKind::CloseBrace, &open)?;

        if let Some(first) = rows.first() {
            let width = first.len();
            if rows.iter().any(|row| row.len() != width) {
                return Err(FormulaError::RaggedArray);
            }
        }

        Ok(FormulaExpr::Array(rows))
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        // The lexer only emits FormulaName when '(' follows
        let open = self.consume();

        let mut args = Vec::new();

        // Parse arguments
        if self.kind() != TokenKind::CloseParen {
            args.push(self.parse_expression()?);

            while self.kind() == TokenKind::Comma {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        self.expect_close(TokenKind::CloseParen, &open)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }

    fn parse_sheet_reference(&mut self, sheet: String) -> FormulaResult<FormulaExpr> {
        if self.kind() != TokenKind::ExclamationPoint {
            return Err(self.unexpected("'!' after sheet name"));
        }
        self.consume();

        // After Sheet1!, we expect a cell reference
        match self.kind() {
            TokenKind::AbsoluteCell | TokenKind::RelativeCell => {
                let token = self.consume();
                self.parse_cell_reference(Some(sheet), &token.text)
            }
            _ => Err(self.unexpected("cell reference after sheet name")),
        }
    }

    fn parse_cell_reference(
        &mut self,
        sheet: Option<String>,
        ref_str: &str,
    ) -> FormulaResult<FormulaExpr> {
        let address =
            CellAddress::parse(ref_str).map_err(|e| FormulaError::InvalidReference {
                text: ref_str.to_string(),
                reason: e.to_string(),
            })?;

        Ok(FormulaExpr::CellRef(CellReference { sheet, address }))
    }
}

/// Strip the surrounding quotes and collapse doubled quotes. An unterminated literal
/// keeps everything after the opening quote.
fn unquote(raw: &str, quote: char) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().skip(1).peekable();
    while let Some(c) = chars.next() {
        if c == quote {
            if chars.peek() == Some(&quote) {
                chars.next();
                out.push(quote);
            } else {
                break;
            }
        } else {
            out.push(c);
        }
    }
    out
}
