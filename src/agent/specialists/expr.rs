//! Arithmetic evaluator for the calculation agent
//!
//! Grammar:
//!   expr   := term (('+' | '-') term)*
//!   term   := unary (('*' | '/') unary)*
//!   unary  := '-' unary | atom
//!   atom   := number | identifier | '(' expr ')'
//!
//! Nothing else is accepted; identifiers resolve against the supplied
//! variable map only.

use std::collections::BTreeMap;
use thiserror::Error;

const MAX_DEPTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Trailing input at position {0}")]
    TrailingInput(usize),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Expression nested too deeply")]
    TooDeep,

    #[error("Result is not a finite number")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '(' | ')' => {
                chars.next();
                let token = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                };
                tokens.push((pos, token));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' || d == '_' {
                        if d != '_' {
                            literal.push(d);
                        }
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| EvalError::InvalidNumber(literal.clone()))?;
                tokens.push((pos, Token::Number(value)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((pos, Token::Ident(name)));
            }
            other => return Err(EvalError::UnexpectedChar(other, pos)),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    depth: usize,
    variables: &'a BTreeMap<String, f64>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).map(|(_, t)| t.clone());
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.next();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.next();
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.next();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        let result = if let Some(Token::Minus) = self.peek() {
            self.next();
            self.unary().map(|v| -v)
        } else {
            self.atom()
        };
        self.depth -= 1;
        result
    }

    fn atom(&mut self) -> Result<f64, EvalError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Ident(name)) => self
                .variables
                .get(&name)
                .copied()
                .ok_or(EvalError::UnknownVariable(name)),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    Some(_) => Err(EvalError::TrailingInput(self.position())),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(_) => Err(EvalError::TrailingInput(self.position())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }

    fn position(&self) -> usize {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|(pos, _)| *pos)
            .unwrap_or(0)
    }
}

/// Evaluate `expression` with the given variables
pub fn evaluate(expression: &str, variables: &BTreeMap<String, f64>) -> Result<f64, EvalError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(EvalError::UnexpectedEnd);
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
        variables,
    };
    let value = parser.expr()?;
    if let Some((pos, _)) = parser.tokens.get(parser.cursor) {
        return Err(EvalError::TrailingInput(*pos));
    }
    if !value.is_finite() {
        return Err(EvalError::NonFinite);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn eval(expression: &str) -> Result<f64, EvalError> {
        evaluate(expression, &BTreeMap::new())
    }

    #[test]
    fn test_precedence_and_parentheses() {
        assert_eq!(eval("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(eval("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(eval("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(eval("100 / 4 / 5").unwrap(), 5.0);
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(eval("-3 + 5").unwrap(), 2.0);
        assert_eq!(eval("--2").unwrap(), 2.0);
        assert_eq!(eval("4 * -(1 + 1)").unwrap(), -8.0);
    }

    #[test]
    fn test_variables() {
        let mut vars = BTreeMap::new();
        vars.insert("initial".to_string(), 1310.0);
        vars.insert("final_value".to_string(), 229.7);
        let loss = evaluate("(initial - final_value) / initial * 100", &vars).unwrap();
        assert!((loss - 82.465).abs() < 0.01);

        assert_eq!(
            evaluate("missing + 1", &vars),
            Err(EvalError::UnknownVariable("missing".to_string()))
        );
    }

    #[test]
    fn test_rejects_unsupported_syntax() {
        assert!(matches!(eval("2 ** 3"), Err(EvalError::TrailingInput(_))));
        assert!(matches!(eval("2 ^ 3"), Err(EvalError::UnexpectedChar('^', 2))));
        assert!(matches!(eval("(1 + 2"), Err(EvalError::UnexpectedEnd)));
        assert!(matches!(eval("1 2"), Err(EvalError::TrailingInput(2))));
        assert!(matches!(eval(""), Err(EvalError::UnexpectedEnd)));
        assert!(matches!(eval("1..2"), Err(EvalError::InvalidNumber(_))));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(eval("1 / (2 - 2)"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let expression = format!("{}1", "-".repeat(MAX_DEPTH + 1));
        assert_eq!(eval(&expression), Err(EvalError::TooDeep));
    }

    #[quickcheck]
    fn prop_integer_sums_match(a: i16, b: i16) -> bool {
        let expression = format!("{} + {}", a, b);
        eval(&expression).map(|v| v == (a as f64) + (b as f64)).unwrap_or(false)
    }
}
