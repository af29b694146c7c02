//! Expression parser: recursive descent over the token stream into an
//! `Expr` tree, later lowered into three-address IR by `frontend::lower`.

use super::lexer::Token;
use crate::error::CompileError;
use crate::ir::{BinaryOp, CompareOp, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(i64),
    Str(String),
    /// Bare identifier; may be a scalar variable or a zero-arg function call.
    Name(String),
    /// `name(args...)` — subscript or function call.
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub op: CompareOp,
    pub left: Expr,
    pub right: Expr,
}

pub struct Parser<'a> {
    toks: &'a [Token],
    pos: usize,
    line: u32,
}

impl<'a> Parser<'a> {
    pub fn new(toks: &'a [Token], line: u32) -> Parser<'a> {
        Parser { toks, pos: 0, line }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.toks.get(self.pos);
        self.pos += 1;
        t
    }

    fn sym_is(&self, s: &str) -> bool {
        matches!(self.peek(), Some(Token::Sym(x)) if x == s)
    }

    fn ident_is(&self, s: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(x)) if x.eq_ignore_ascii_case(s))
    }

    /// Whether the next token is the given symbol, without consuming it.
    pub fn peek_is_sym(&self, s: &str) -> bool {
        self.sym_is(s)
    }

    /// Consume one token (used after `peek_is_sym` confirms a separator).
    pub fn advance(&mut self) {
        self.pos += 1;
    }

    pub fn expect_sym(&mut self, s: &str) -> Result<(), CompileError> {
        if self.sym_is(s) {
            self.pos += 1;
            Ok(())
        } else {
            Err(CompileError::Syntax { line: self.line, detail: format!("expected `{s}`") })
        }
    }

    /// `expr [compare-op expr]` — a condition is just a comparison; a bare
    /// expression is treated as `<> 0` (truthy).
    pub fn parse_condition(&mut self) -> Result<Condition, CompileError> {
        let left = self.parse_expr()?;
        let op = match self.peek() {
            Some(Token::Sym(s)) => match s.as_str() {
                "=" => Some(CompareOp::Eq),
                "<>" => Some(CompareOp::Ne),
                "<" => Some(CompareOp::Lt),
                ">" => Some(CompareOp::Gt),
                "<=" => Some(CompareOp::Le),
                ">=" => Some(CompareOp::Ge),
                _ => None,
            },
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let right = self.parse_expr()?;
                Ok(Condition { op, left, right })
            }
            None => Ok(Condition { op: CompareOp::Ne, left, right: Expr::Num(0) }),
        }
    }

    pub fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        loop {
            if self.ident_is("OR") {
                self.pos += 1;
                let right = self.parse_and()?;
                left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
            } else if self.ident_is("XOR") {
                self.pos += 1;
                let right = self.parse_and()?;
                left = Expr::Binary(BinaryOp::Xor, Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_shift()?;
        while self.ident_is("AND") {
            self.pos += 1;
            let right = self.parse_shift()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Sym(s)) if s == "<<" => Some(BinaryOp::Shl),
                Some(Token::Sym(s)) if s == ">>" => Some(BinaryOp::Shr),
                _ => None,
            };
            match op {
                Some(op) => {
                    self.pos += 1;
                    let right = self.parse_additive()?;
                    left = Expr::Binary(op, Box::new(left), Box::new(right));
                }
                None => break,
            }
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Sym(s)) if s == "+" => Some(BinaryOp::Add),
                Some(Token::Sym(s)) if s == "-" => Some(BinaryOp::Sub),
                _ => None,
            };
            match op {
                Some(op) => {
                    self.pos += 1;
                    let right = self.parse_term()?;
                    left = Expr::Binary(op, Box::new(left), Box::new(right));
                }
                None => break,
            }
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek() {
                Some(Token::Sym(s)) if s == "*" => Some(BinaryOp::Mul),
                Some(Token::Sym(s)) if s == "/" => Some(BinaryOp::Div),
                Some(Token::Sym(s)) if s == "%" => Some(BinaryOp::Mod),
                _ => None,
            };
            match op {
                Some(op) => {
                    self.pos += 1;
                    let right = self.parse_power()?;
                    left = Expr::Binary(op, Box::new(left), Box::new(right));
                }
                None => break,
            }
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_unary()?;
        if self.sym_is("^") {
            self.pos += 1;
            let right = self.parse_power()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.sym_is("-") {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        if self.ident_is("NOT") {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.bump().cloned() {
            Some(Token::Number(n)) => Ok(Expr::Num(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Sym(s)) if s == "(" => {
                let inner = self.parse_expr()?;
                self.expect_sym(")")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.sym_is("(") {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.sym_is(")") {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.sym_is(",") {
                                self.pos += 1;
                                continue;
                            }
                            break;
                        }
                    }
                    self.expect_sym(")")?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            other => Err(CompileError::Syntax { line: self.line, detail: format!("unexpected token {other:?}") }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;

    #[test]
    fn parses_additive_with_precedence() {
        let toks = tokenize("1 + 2 * 3");
        let mut p = Parser::new(&toks, 1);
        let e = p.parse_expr().unwrap();
        assert_eq!(
            e,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Num(1)),
                Box::new(Expr::Binary(BinaryOp::Mul, Box::new(Expr::Num(2)), Box::new(Expr::Num(3))))
            )
        );
    }

    #[test]
    fn parses_condition_with_comparison() {
        let toks = tokenize("A >= 10");
        let mut p = Parser::new(&toks, 1);
        let c = p.parse_condition().unwrap();
        assert_eq!(c.op, CompareOp::Ge);
    }

    #[test]
    fn bare_expression_condition_defaults_to_not_equal_zero() {
        let toks = tokenize("A");
        let mut p = Parser::new(&toks, 1);
        let c = p.parse_condition().unwrap();
        assert_eq!(c.op, CompareOp::Ne);
        assert_eq!(c.right, Expr::Num(0));
    }

    #[test]
    fn parses_function_call_arguments() {
        let toks = tokenize("LEN(MSG$)");
        let mut p = Parser::new(&toks, 1);
        let e = p.parse_expr().unwrap();
        assert_eq!(e, Expr::Call("LEN".to_string(), vec![Expr::Name("MSG$".to_string())]));
    }
}
