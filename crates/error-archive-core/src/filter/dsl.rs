// crates/error-archive-core/src/filter/dsl.rs
// ============================================================================
// Module: Error Archive Assertion DSL
// Description: Author-facing expression syntax for capture filter rules.
// Purpose: Turn human-readable boolean expressions into `Assertion` trees.
// Dependencies: crate::filter::assertion, regex
// ============================================================================

//! ## Overview
//!
//! Filter rules are written as compact boolean expressions over the fields of
//! a captured error. Security posture: rule text comes from configuration
//! files and is treated as untrusted; input size and nesting are bounded.
//!
//! ### Grammar (informal)
//! - **Comparisons**: `status_code == 404`, `type != "Timeout"`,
//!   `message =~ "^db"`, `path ^= "/api"`, `host $= ".internal"`,
//!   `header.User-Agent *= "bot"`, and `< <= > >=`
//! - **Type test**: `is_type("TaskCanceled")` (any failure in the cause chain)
//! - **Constants**: `true`, `false`
//! - **Boolean operators**: `a && b`, `a || b`, `!a` (also `and`, `or`, `not`)
//! - **Functions**: `all(a, b)`, `any(a, b)`, `not(a)`, `at_least(2, a, b, c)`
//! - **Parentheses**: `( ... )` for explicit grouping
//!
//! ### Example
//!
//! ```
//! use error_archive_core::filter::parse_assertion;
//!
//! let rule = parse_assertion(r#"status_code == 404 && path ^= "/favicon""#).unwrap();
//! ```

use std::fmt;

use regex::Regex;

use crate::filter::assertion::Assertion;
use crate::filter::assertion::Binding;
use crate::filter::assertion::CompareOp;
use crate::filter::assertion::Literal;
use crate::filter::assertion::Predicate;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum allowed DSL input size in bytes.
const MAX_DSL_INPUT_BYTES: usize = 64 * 1024;
/// Maximum supported nesting depth for DSL expressions.
const MAX_DSL_NESTING: usize = 32;

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Errors that can occur while parsing an assertion expression.
///
/// # Invariants
/// - None. Variants capture structured parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DslError {
    /// Input was empty or contained only whitespace.
    EmptyInput,
    /// Input exceeded the configured size limit.
    InputTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual input length in bytes.
        actual_bytes: usize,
    },
    /// Input exceeded the configured nesting depth.
    NestingTooDeep {
        /// Maximum allowed nesting depth.
        max_depth: usize,
        /// Actual nesting depth when the error occurred.
        actual_depth: usize,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Unexpected token encountered during parsing.
    UnexpectedToken {
        /// Human-friendly expectation summary.
        expected: &'static str,
        /// The token that was actually seen.
        found: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Field name was not recognized.
    UnknownBinding {
        /// The unresolved name.
        name: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// DSL function name was not recognized.
    UnknownFunction {
        /// The unknown function identifier.
        name: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Numeric literal failed to parse or overflowed.
    InvalidNumber {
        /// The raw numeric text.
        raw: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// String literal was not terminated.
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },
    /// Regular expression failed to compile.
    InvalidPattern {
        /// Compiler message.
        message: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Unexpected trailing input after a complete expression.
    TrailingInput {
        /// Byte offset where unexpected input begins.
        position: usize,
    },
}

impl fmt::Display for DslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "input is empty"),
            Self::InputTooLarge {
                max_bytes,
                actual_bytes,
            } => {
                write!(f, "input exceeds size limit: {actual_bytes} bytes (max {max_bytes})")
            }
            Self::NestingTooDeep {
                max_depth,
                actual_depth,
                position,
            } => write!(
                f,
                "input nesting exceeds limit: depth {actual_depth} (max {max_depth}) at {position}"
            ),
            Self::UnexpectedToken {
                expected,
                found,
                position,
            } => {
                write!(f, "unexpected token `{found}` at {position}, expected {expected}")
            }
            Self::UnknownBinding {
                name,
                position,
            } => {
                write!(f, "unknown field `{name}` at {position}")
            }
            Self::UnknownFunction {
                name,
                position,
            } => {
                write!(f, "unknown function `{name}` at {position}")
            }
            Self::InvalidNumber {
                raw,
                position,
            } => {
                write!(f, "invalid number `{raw}` at {position}")
            }
            Self::UnterminatedString {
                position,
            } => {
                write!(f, "unterminated string starting at {position}")
            }
            Self::InvalidPattern {
                message,
                position,
            } => {
                write!(f, "invalid pattern at {position}: {message}")
            }
            Self::TrailingInput {
                position,
            } => {
                write!(f, "unexpected trailing input at {position}")
            }
        }
    }
}

impl std::error::Error for DslError {}

/// Parses an assertion expression.
///
/// # Errors
/// Returns [`DslError`] for syntax issues, unknown fields or functions,
/// invalid literals or patterns, and trailing input.
pub fn parse_assertion(input: &str) -> Result<Assertion, DslError> {
    if input.len() > MAX_DSL_INPUT_BYTES {
        return Err(DslError::InputTooLarge {
            max_bytes: MAX_DSL_INPUT_BYTES,
            actual_bytes: input.len(),
        });
    }
    let mut lexer = Lexer::new(input);
    let tokens = lexer.lex()?;

    let mut parser = Parser::new(tokens);
    let assertion = parser.parse_expression()?;
    parser.expect_eof()?;
    Ok(assertion)
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Lexer token produced from the DSL input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    /// Identifier or dotted field name.
    Ident(&'a str),
    /// Numeric literal token (optionally signed).
    Number(&'a str),
    /// String literal with escapes resolved.
    Str(String),
    /// Comparison operator.
    Compare(CompareToken),
    /// Logical AND operator.
    And,
    /// Logical OR operator.
    Or,
    /// Logical NOT operator.
    Not,
    /// Left parenthesis.
    LParen,
    /// Right parenthesis.
    RParen,
    /// Comma separator.
    Comma,
    /// End-of-input marker.
    Eof,
}

/// Comparison operator spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareToken {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `=~`
    Regex,
    /// `^=`
    StartsWith,
    /// `$=`
    EndsWith,
    /// `*=`
    Contains,
}

impl CompareToken {
    /// Returns the operator text.
    const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Regex => "=~",
            Self::StartsWith => "^=",
            Self::EndsWith => "$=",
            Self::Contains => "*=",
        }
    }
}

/// Token paired with its byte offset.
#[derive(Debug, Clone)]
struct SpannedToken<'a> {
    /// Token value.
    token: Token<'a>,
    /// Byte offset into the input.
    position: usize,
}

/// Lexer for the assertion DSL.
struct Lexer<'a> {
    /// Source input being tokenized.
    input: &'a str,
    /// Current byte offset into the input.
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
        }
    }

    /// Lexes the input into a sequence of tokens.
    fn lex(&mut self) -> Result<Vec<SpannedToken<'a>>, DslError> {
        let mut tokens = Vec::new();
        let bytes = self.input.as_bytes();

        while let Some(&ch) = bytes.get(self.offset) {
            let next = self.peek_char(bytes);
            match (ch, next) {
                (b' ' | b'\t' | b'\n' | b'\r', _) => {
                    self.offset += 1;
                }
                (b'(', _) => self.push(&mut tokens, Token::LParen, 1),
                (b')', _) => self.push(&mut tokens, Token::RParen, 1),
                (b',', _) => self.push(&mut tokens, Token::Comma, 1),
                (b'!', Some(b'=')) => self.push(&mut tokens, Token::Compare(CompareToken::Ne), 2),
                (b'!', _) => self.push(&mut tokens, Token::Not, 1),
                (b'=', Some(b'=')) => self.push(&mut tokens, Token::Compare(CompareToken::Eq), 2),
                (b'=', Some(b'~')) => {
                    self.push(&mut tokens, Token::Compare(CompareToken::Regex), 2);
                }
                (b'<', Some(b'=')) => self.push(&mut tokens, Token::Compare(CompareToken::Le), 2),
                (b'<', _) => self.push(&mut tokens, Token::Compare(CompareToken::Lt), 1),
                (b'>', Some(b'=')) => self.push(&mut tokens, Token::Compare(CompareToken::Ge), 2),
                (b'>', _) => self.push(&mut tokens, Token::Compare(CompareToken::Gt), 1),
                (b'^', Some(b'=')) => {
                    self.push(&mut tokens, Token::Compare(CompareToken::StartsWith), 2);
                }
                (b'$', Some(b'=')) => {
                    self.push(&mut tokens, Token::Compare(CompareToken::EndsWith), 2);
                }
                (b'*', Some(b'=')) => {
                    self.push(&mut tokens, Token::Compare(CompareToken::Contains), 2);
                }
                (b'&', Some(b'&')) => self.push(&mut tokens, Token::And, 2),
                (b'|', Some(b'|')) => self.push(&mut tokens, Token::Or, 2),
                (b'"', _) => {
                    let start = self.offset;
                    let text = self.lex_string(bytes)?;
                    tokens.push(SpannedToken {
                        token: Token::Str(text),
                        position: start,
                    });
                }
                (b'0' ..= b'9' | b'-', _) => {
                    let start = self.offset;
                    self.offset += 1;
                    self.consume_while(bytes, |b| b.is_ascii_digit());
                    let slice = &self.input[start .. self.offset];
                    tokens.push(SpannedToken {
                        token: Token::Number(slice),
                        position: start,
                    });
                }
                (b'a' ..= b'z' | b'A' ..= b'Z' | b'_', _) => {
                    let start = self.offset;
                    self.consume_while(bytes, |b| {
                        b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-'
                    });
                    let slice = &self.input[start .. self.offset];
                    tokens.push(SpannedToken {
                        token: Self::keyword_or_ident(slice),
                        position: start,
                    });
                }
                _ => {
                    return Err(DslError::UnexpectedToken {
                        expected: "field, literal, or operator",
                        found: char::from(ch).to_string(),
                        position: self.offset,
                    });
                }
            }
        }

        if tokens.is_empty() {
            return Err(DslError::EmptyInput);
        }

        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    /// Pushes a token at the current offset and advances by `width` bytes.
    fn push(&mut self, tokens: &mut Vec<SpannedToken<'a>>, token: Token<'a>, width: usize) {
        tokens.push(SpannedToken {
            token,
            position: self.offset,
        });
        self.offset += width;
    }

    /// Lexes a double-quoted string literal with `\"` and `\\` escapes.
    fn lex_string(&mut self, bytes: &[u8]) -> Result<String, DslError> {
        let start = self.offset;
        self.offset += 1;
        let mut text = String::new();
        let mut segment_start = self.offset;
        while let Some(&b) = bytes.get(self.offset) {
            match b {
                b'"' => {
                    text.push_str(&self.input[segment_start .. self.offset]);
                    self.offset += 1;
                    return Ok(text);
                }
                b'\\' => {
                    text.push_str(&self.input[segment_start .. self.offset]);
                    match bytes.get(self.offset + 1) {
                        Some(b'"') => text.push('"'),
                        Some(b'\\') => text.push('\\'),
                        Some(b'n') => text.push('\n'),
                        Some(b't') => text.push('\t'),
                        _ => {
                            return Err(DslError::UnexpectedToken {
                                expected: "escape sequence",
                                found: "\\".to_string(),
                                position: self.offset,
                            });
                        }
                    }
                    self.offset += 2;
                    segment_start = self.offset;
                }
                _ => self.offset += 1,
            }
        }
        Err(DslError::UnterminatedString {
            position: start,
        })
    }

    /// Returns the next byte without advancing.
    fn peek_char(&self, bytes: &[u8]) -> Option<u8> {
        bytes.get(self.offset + 1).copied()
    }

    /// Advances while the condition matches the current byte.
    fn consume_while<F>(&mut self, bytes: &[u8], condition: F)
    where
        F: Fn(u8) -> bool,
    {
        while let Some(&b) = bytes.get(self.offset) {
            if condition(b) {
                self.offset += 1;
            } else {
                break;
            }
        }
    }

    /// Maps a slice to a keyword token or identifier token.
    fn keyword_or_ident(slice: &'a str) -> Token<'a> {
        match slice {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Ident(slice),
        }
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser for the assertion DSL.
struct Parser<'input> {
    /// Token stream with source positions.
    tokens: Vec<SpannedToken<'input>>,
    /// Current token index.
    index: usize,
    /// Current nesting depth for bracketed or function expressions.
    nesting: usize,
}

impl<'input> Parser<'input> {
    /// Creates a parser over the token stream.
    const fn new(tokens: Vec<SpannedToken<'input>>) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    /// Parses a full expression.
    fn parse_expression(&mut self) -> Result<Assertion, DslError> {
        self.parse_or()
    }

    /// Parses OR expressions.
    fn parse_or(&mut self) -> Result<Assertion, DslError> {
        let mut parts = Vec::new();
        parts.push(self.parse_and()?);

        while self.matches(&Token::Or) {
            parts.push(self.parse_and()?);
        }

        if parts.len() == 1 { Ok(parts.remove(0)) } else { Ok(Assertion::any(parts)) }
    }

    /// Parses AND expressions.
    fn parse_and(&mut self) -> Result<Assertion, DslError> {
        let mut parts = Vec::new();
        parts.push(self.parse_unary()?);

        while self.matches(&Token::And) {
            parts.push(self.parse_unary()?);
        }

        if parts.len() == 1 { Ok(parts.remove(0)) } else { Ok(Assertion::all(parts)) }
    }

    /// Parses unary expressions, including NOT.
    fn parse_unary(&mut self) -> Result<Assertion, DslError> {
        if self.matches(&Token::Not) {
            let position = self.current().position;
            let assertion = self.with_nesting(position, Self::parse_unary)?;
            return Ok(Assertion::negate(assertion));
        }
        self.parse_primary()
    }

    /// Parses a primary expression.
    fn parse_primary(&mut self) -> Result<Assertion, DslError> {
        let position = self.current().position;
        match self.current().token.clone() {
            Token::Ident(name) => {
                self.advance();
                if self.matches(&Token::LParen) {
                    return self.parse_function(name, position);
                }
                match name {
                    "true" => Ok(Assertion::predicate(Predicate::Constant(true))),
                    "false" => Ok(Assertion::predicate(Predicate::Constant(false))),
                    _ => self.parse_comparison(name, position),
                }
            }
            Token::LParen => {
                self.advance();
                self.with_nesting(position, |parser| {
                    let expr = parser.parse_expression()?;
                    parser.expect(&Token::RParen, "`)`")?;
                    Ok(expr)
                })
            }
            Token::Number(_)
            | Token::Str(_)
            | Token::Compare(_)
            | Token::RParen
            | Token::Comma
            | Token::And
            | Token::Or
            | Token::Not
            | Token::Eof => Err(DslError::UnexpectedToken {
                expected: "comparison or expression",
                found: self.describe_current(),
                position,
            }),
        }
    }

    /// Parses `field OP literal` after the field name was consumed.
    fn parse_comparison(&mut self, name: &str, position: usize) -> Result<Assertion, DslError> {
        let binding = Binding::parse(name).ok_or_else(|| DslError::UnknownBinding {
            name: name.to_string(),
            position,
        })?;
        let op_position = self.current().position;
        let Token::Compare(op) = self.current().token else {
            return Err(DslError::UnexpectedToken {
                expected: "comparison operator",
                found: self.describe_current(),
                position: op_position,
            });
        };
        self.advance();
        let literal_position = self.current().position;
        let literal = self.parse_literal()?;

        let predicate = match op {
            CompareToken::Regex => {
                let Literal::Text(pattern) = literal else {
                    return Err(DslError::UnexpectedToken {
                        expected: "string pattern after `=~`",
                        found: literal.to_string(),
                        position: literal_position,
                    });
                };
                let pattern = Regex::new(&pattern).map_err(|err| DslError::InvalidPattern {
                    message: err.to_string(),
                    position: literal_position,
                })?;
                Predicate::Matches {
                    binding,
                    pattern,
                }
            }
            CompareToken::Eq => compare(binding, CompareOp::Eq, literal),
            CompareToken::Ne => compare(binding, CompareOp::Ne, literal),
            CompareToken::Lt => compare(binding, CompareOp::Lt, literal),
            CompareToken::Le => compare(binding, CompareOp::Le, literal),
            CompareToken::Gt => compare(binding, CompareOp::Gt, literal),
            CompareToken::Ge => compare(binding, CompareOp::Ge, literal),
            CompareToken::StartsWith => compare(binding, CompareOp::StartsWith, literal),
            CompareToken::EndsWith => compare(binding, CompareOp::EndsWith, literal),
            CompareToken::Contains => compare(binding, CompareOp::Contains, literal),
        };
        Ok(Assertion::predicate(predicate))
    }

    /// Parses a string or integer literal.
    fn parse_literal(&mut self) -> Result<Literal, DslError> {
        let position = self.current().position;
        match self.current().token.clone() {
            Token::Str(text) => {
                self.advance();
                Ok(Literal::Text(text))
            }
            Token::Number(raw) => {
                self.advance();
                raw.parse::<i64>().map(Literal::Int).map_err(|_| DslError::InvalidNumber {
                    raw: raw.to_string(),
                    position,
                })
            }
            _ => Err(DslError::UnexpectedToken {
                expected: "string or number literal",
                found: self.describe_current(),
                position,
            }),
        }
    }

    /// Parses a function-style expression.
    fn parse_function(&mut self, name: &'input str, name_pos: usize) -> Result<Assertion, DslError> {
        self.with_nesting(name_pos, |parser| match name {
            "at_least" => parser.parse_group(),
            "all" => {
                let args = parser.parse_argument_list()?;
                Ok(Assertion::all(args))
            }
            "any" => {
                let args = parser.parse_argument_list()?;
                Ok(Assertion::any(args))
            }
            "is_type" => {
                let position = parser.current().position;
                let Literal::Text(type_name) = parser.parse_literal()? else {
                    return Err(DslError::UnexpectedToken {
                        expected: "type name string",
                        found: "number".to_string(),
                        position,
                    });
                };
                parser.expect(&Token::RParen, "`)` after `is_type(...)`")?;
                Ok(Assertion::predicate(Predicate::IsType(type_name)))
            }
            _ => Err(DslError::UnknownFunction {
                name: name.to_string(),
                position: name_pos,
            }),
        })
    }

    /// Parses a threshold group with minimum count.
    fn parse_group(&mut self) -> Result<Assertion, DslError> {
        let min_pos = self.current().position;
        let Token::Number(raw) = self.current().token else {
            return Err(DslError::UnexpectedToken {
                expected: "numeric literal",
                found: self.describe_current(),
                position: min_pos,
            });
        };
        self.advance();
        let min: u8 = raw.parse().map_err(|_| DslError::InvalidNumber {
            raw: raw.to_string(),
            position: min_pos,
        })?;
        self.expect(&Token::Comma, "`,` after group count")?;
        let members = self.parse_argument_list()?;
        if members.is_empty() {
            return Err(DslError::UnexpectedToken {
                expected: "at least one expression after the count",
                found: ")".to_string(),
                position: min_pos,
            });
        }
        Ok(Assertion::at_least(min, members))
    }

    /// Parses a comma-separated argument list.
    fn parse_argument_list(&mut self) -> Result<Vec<Assertion>, DslError> {
        let mut args = Vec::new();
        if self.matches(&Token::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression()?);
            if self.matches(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "`)` after arguments")?;
            break;
        }
        Ok(args)
    }

    /// Runs a parser step while enforcing the nesting limit.
    fn with_nesting<T>(
        &mut self,
        position: usize,
        f: impl FnOnce(&mut Self) -> Result<T, DslError>,
    ) -> Result<T, DslError> {
        let next_depth = self.nesting + 1;
        if next_depth > MAX_DSL_NESTING {
            return Err(DslError::NestingTooDeep {
                max_depth: MAX_DSL_NESTING,
                actual_depth: next_depth,
                position,
            });
        }
        self.nesting = next_depth;
        let result = f(self);
        self.nesting = self.nesting.saturating_sub(1);
        result
    }

    /// Consumes the expected token or returns an error.
    fn expect(&mut self, token: &Token<'_>, expected: &'static str) -> Result<(), DslError> {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(token) {
            self.advance();
            Ok(())
        } else {
            Err(DslError::UnexpectedToken {
                expected,
                found: self.describe_current(),
                position: self.current().position,
            })
        }
    }

    /// Ensures the parser is at end-of-input.
    fn expect_eof(&self) -> Result<(), DslError> {
        if matches!(self.current().token, Token::Eof) {
            Ok(())
        } else {
            Err(DslError::TrailingInput {
                position: self.current().position,
            })
        }
    }

    /// Consumes the token if it matches the expected kind.
    fn matches(&mut self, kind: &Token<'_>) -> bool {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns the current token.
    fn current(&self) -> &SpannedToken<'input> {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.index.min(last)]
    }

    /// Advances to the next token.
    const fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }

    /// Formats the current token for diagnostics.
    fn describe_current(&self) -> String {
        match &self.current().token {
            Token::Ident(name) => (*name).to_string(),
            Token::Number(raw) => (*raw).to_string(),
            Token::Str(text) => format!("\"{text}\""),
            Token::Compare(op) => op.as_str().to_string(),
            Token::And => "&&".to_string(),
            Token::Or => "||".to_string(),
            Token::Not => "!".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Comma => ",".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// Builds a comparison leaf.
fn compare(binding: Binding, op: CompareOp, literal: Literal) -> Predicate {
    Predicate::Compare {
        binding,
        op,
        literal,
    }
}
