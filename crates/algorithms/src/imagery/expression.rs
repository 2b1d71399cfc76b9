//! Arithmetic band expressions
//!
//! Formulas such as `"2.5 * (nir - red) / (nir + 6 * red - 7.5 * blue + 1)"`
//! are parsed once into an AST whose variables are resolved to positional
//! slots, then evaluated per pixel against a slice of input rasters.
//!
//! Supported: `+ - * /`, parentheses, unary minus, numeric literals
//! (including exponents such as `1e-4`) and identifiers.

use crate::kernel::{build_output, check_dimensions};
use crate::maybe_rayon::*;
use verdant_core::raster::Raster;
use verdant_core::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var(usize),
    BinOp {
        op: char,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Neg(Box<Expr>),
}

fn tokenize(formula: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = formula.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(chars[i]));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent: 1e-4, 2.5E3
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| Error::Algorithm(format!("Invalid number: {}", text)))?;
                tokens.push(Token::Number(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            c => {
                return Err(Error::Algorithm(format!(
                    "Unexpected character '{}' in formula",
                    c
                )));
            }
        }
    }

    Ok(tokens)
}

/// Recursive descent parser; collects variable names as it goes
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    variables: Vec<String>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn slot(&mut self, name: String) -> usize {
        match self.variables.iter().position(|v| *v == name) {
            Some(i) => i,
            None => {
                self.variables.push(name);
                self.variables.len() - 1
            }
        }
    }

    /// expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.parse_term()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// term = factor (('*' | '/') factor)*
    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// factor = number | ident | '(' expr ')' | '-' factor | '+' factor
    fn parse_factor(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Num(n)),
            Some(Token::Ident(name)) => Ok(Expr::Var(self.slot(name))),
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(Error::Algorithm("Expected closing parenthesis".into())),
                }
            }
            Some(Token::Op('-')) => Ok(Expr::Neg(Box::new(self.parse_factor()?))),
            Some(Token::Op('+')) => self.parse_factor(),
            other => Err(Error::Algorithm(format!(
                "Unexpected token in formula: {:?}",
                other
            ))),
        }
    }
}

fn eval(expr: &Expr, values: &[f64]) -> f64 {
    match expr {
        Expr::Num(n) => *n,
        Expr::Var(i) => values.get(*i).copied().unwrap_or(f64::NAN),
        Expr::BinOp { op, left, right } => {
            let l = eval(left, values);
            let r = eval(right, values);
            match op {
                '+' => l + r,
                '-' => l - r,
                '*' => l * r,
                '/' => {
                    if r.abs() < 1e-10 {
                        f64::NAN
                    } else {
                        l / r
                    }
                }
                _ => f64::NAN,
            }
        }
        Expr::Neg(inner) => -eval(inner, values),
    }
}

/// A parsed arithmetic formula over named rasters
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
    variables: Vec<String>,
}

impl Expression {
    pub fn parse(formula: &str) -> Result<Self> {
        let mut parser = Parser {
            tokens: tokenize(formula)?,
            pos: 0,
            variables: Vec::new(),
        };
        if parser.tokens.is_empty() {
            return Err(Error::Algorithm("Empty formula".into()));
        }
        let root = parser.parse_expr()?;
        if let Some(extra) = parser.peek() {
            return Err(Error::Algorithm(format!(
                "Unexpected trailing token in formula: {:?}",
                extra
            )));
        }
        Ok(Self {
            source: formula.to_string(),
            root,
            variables: parser.variables,
        })
    }

    /// Variable names in order of first appearance
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate for one pixel; `values` follow [`Expression::variables`]
    pub fn eval_pixel(&self, values: &[f64]) -> f64 {
        eval(&self.root, values)
    }

    /// Evaluate per pixel; `inputs[i]` binds `variables()[i]`.
    ///
    /// A NaN in any input makes the output pixel NaN.
    pub fn evaluate(&self, inputs: &[&Raster<f64>]) -> Result<Raster<f64>> {
        if inputs.len() != self.variables.len() {
            return Err(Error::Algorithm(format!(
                "Formula '{}' needs {} band(s) ({:?}), got {}",
                self.source,
                self.variables.len(),
                self.variables,
                inputs.len()
            )));
        }
        let Some(first) = inputs.first() else {
            return Err(Error::Algorithm(format!(
                "Formula '{}' references no bands",
                self.source
            )));
        };
        for raster in &inputs[1..] {
            check_dimensions(first, raster)?;
        }

        let (rows, cols) = first.shape();
        let data: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![f64::NAN; cols];
                let mut values = vec![0.0; inputs.len()];
                'pixel: for (col, out) in row_data.iter_mut().enumerate() {
                    for (slot, raster) in values.iter_mut().zip(inputs) {
                        let v = unsafe { raster.get_unchecked(row, col) };
                        if v.is_nan() {
                            continue 'pixel;
                        }
                        *slot = v;
                    }
                    *out = eval(&self.root, &values);
                }
                row_data
            })
            .collect();

        build_output(first, rows, cols, data)
    }
}

impl std::str::FromStr for Expression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Expression::parse(s)
    }
}
