// SPDX: CC0-1.0

//! The boundary between the plotting pipeline and the expression engine.
//!
//! Everything downstream only sees "input value in, finite number or
//! [`Failure`] out"; the lexer, parser and stack machine stay behind this
//! module.

use crate::{
    eval::{self, EvalErr, Ident, IdentKey, Idents, Program},
    lex::{Lexer, TokTyp},
    parse::{self, ParseErr},
    stdlib, Number, UnknownVariant,
};
use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleMode {
    Degrees,
    #[default]
    Radians,
}

impl fmt::Display for AngleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Degrees => "degrees",
            Self::Radians => "radians",
        })
    }
}

impl FromStr for AngleMode {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrees" | "deg" => Ok(Self::Degrees),
            "radians" | "rad" => Ok(Self::Radians),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// Why a single evaluation produced no usable value.
#[derive(Clone, Debug)]
pub enum Failure {
    Parse(ParseErr),
    Eval(EvalErr),
    NonFinite(Number),
}

impl Failure {
    /// Failures that happen for every input, as opposed to domain gaps like
    /// `sqrt(-1)` or `1/0`.
    pub const fn is_structural(&self) -> bool {
        !matches!(self, Self::NonFinite(_))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "parse error: {err}"),
            Self::Eval(err) => write!(f, "evaluation error: {err}"),
            Self::NonFinite(val) => write!(f, "result is not finite ({val})"),
        }
    }
}

impl std::error::Error for Failure {}

impl From<ParseErr> for Failure {
    fn from(err: ParseErr) -> Self {
        Self::Parse(err)
    }
}

impl From<EvalErr> for Failure {
    fn from(err: EvalErr) -> Self {
        Self::Eval(err)
    }
}

/// Something that maps one input value to a curve value.
pub trait Evaluator {
    fn evaluate(&mut self, input: Number) -> Result<Number, Failure>;
}

impl<F> Evaluator for F
where
    F: FnMut(Number) -> Result<Number, Failure>,
{
    fn evaluate(&mut self, input: Number) -> Result<Number, Failure> {
        self(input)
    }
}

/// Lowercases every identifier that names a known function, so `SIN(x)`
/// and `Sin(x)` compile like `sin(x)`. Other identifiers keep their case.
pub fn normalize_case(expression: &str) -> String {
    let src = Arc::new(expression.to_string());
    let mut out = String::with_capacity(expression.len());
    let mut copied = 0;
    for tok in Lexer::new(&src) {
        // the parser reports lexing errors; just copy the rest verbatim
        let Ok(tok) = tok else { break };
        if tok.typ != TokTyp::Ident {
            continue;
        }
        let lower = tok.loc.get().to_ascii_lowercase();
        if lower != tok.loc.get() && stdlib::FUNCTION_NAMES.contains(&lower.as_str()) {
            out.push_str(&expression[copied..tok.loc.start()]);
            out.push_str(&lower);
            copied = tok.loc.start() + tok.loc.len();
        }
    }
    out.push_str(&expression[copied..]);
    out
}

/// An expression compiled once and evaluated many times.
#[derive(Clone, Debug)]
pub struct CompiledExpr {
    src: Arc<String>,
    prog: Program,
    idents: Idents,
    vars: &'static [&'static str],
    stack: Vec<Number>,
}

impl CompiledExpr {
    /// Compiles `expression` as a function of `x`.
    pub fn new(expression: &str, angle_mode: AngleMode) -> Result<Self, ParseErr> {
        Self::with_vars(expression, angle_mode, &[stdlib::X])
    }

    /// Compiles `expression` as a polar radius `r(t)`; `theta` is an alias.
    pub fn polar(expression: &str, angle_mode: AngleMode) -> Result<Self, ParseErr> {
        Self::with_vars(expression, angle_mode, &[stdlib::T, stdlib::THETA])
    }

    fn with_vars(
        expression: &str,
        angle_mode: AngleMode,
        vars: &'static [&'static str],
    ) -> Result<Self, ParseErr> {
        let src = Arc::new(normalize_case(expression));

        let mut idents = stdlib::standard_idents();
        if angle_mode == AngleMode::Degrees {
            stdlib::use_degrees(&mut idents);
        }
        for var in vars {
            idents.insert((*var).into(), Ident::Var(None));
        }

        let prog = parse::parse(Lexer::new(&src), &idents)?;
        Ok(Self {
            src,
            prog,
            idents,
            vars,
            stack: Vec::new(),
        })
    }

    pub fn source(&self) -> &Arc<String> {
        &self.src
    }

    pub fn program(&self) -> &Program {
        &self.prog
    }

    pub fn idents(&self) -> &Idents {
        &self.idents
    }
}

impl Evaluator for CompiledExpr {
    fn evaluate(&mut self, input: Number) -> Result<Number, Failure> {
        for var in self.vars {
            if let Some(slot) = self.idents.get_mut(&IdentKey::from(*var)) {
                *slot = Ident::Var(Some(input));
            }
        }
        let val = eval::eval(&self.prog, &self.idents, &mut self.stack)?;
        if val.is_finite() {
            Ok(val)
        } else {
            Err(Failure::NonFinite(val))
        }
    }
}

/// One-shot evaluation of `expression` at `x`.
pub fn evaluate(expression: &str, x: Number, angle_mode: AngleMode) -> Result<Number, Failure> {
    CompiledExpr::new(expression, angle_mode)?.evaluate(x)
}
