// SPDX: CC0-1.0

// implementation of shunting yard algorithm by dijkstra (see https://en.wikipedia.org/wiki/Shunting_yard_algorithm)

use crate::{
    eval::{Associativity, Ident, Idents, Operation, OperationTyp, OperatorTyp, Program},
    lex::{LexErr, LexErrTyp, Lexer, SubStr, TokTyp},
    Number,
};
use core::{fmt, num::ParseFloatError};

#[derive(Clone, Debug)]
pub enum ParseErrTyp {
    LexErr(LexErrTyp),
    ParseNum(ParseFloatError),
    ParenMismatch,
}

impl fmt::Display for ParseErrTyp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LexErr(err) => write!(f, "{err}"),
            Self::ParseNum(err) => write!(f, "invalid number: {err}"),
            Self::ParenMismatch => write!(f, "mismatched parentheses"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParseErr {
    pub typ: ParseErrTyp,
    pub loc: SubStr,
}

impl fmt::Display for ParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at column {}", self.typ, self.loc.start() + 1)
    }
}

impl std::error::Error for ParseErr {}

impl From<LexErr> for ParseErr {
    fn from(err: LexErr) -> Self {
        Self {
            typ: ParseErrTyp::LexErr(err.typ),
            loc: err.loc,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ShuntOpTyp {
    Operator(OperatorTyp),
    Fun,
    OpenParen,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ShuntOp {
    typ: ShuntOpTyp,
    loc: SubStr,
}

impl ShuntOp {
    /// Functions bind tighter than any operator, so `sin x + 1` reads as
    /// `sin(x) + 1`.
    fn outranks(&self, incoming: OperatorTyp) -> bool {
        match self.typ {
            ShuntOpTyp::Operator(op) => {
                (op.precedence() > incoming.precedence())
                    || ((op.precedence() == incoming.precedence())
                        && (incoming.associativity() == Associativity::Left))
            }
            ShuntOpTyp::Fun => true,
            ShuntOpTyp::OpenParen => false,
        }
    }

    fn into_output(self) -> Option<Operation> {
        let typ = match self.typ {
            ShuntOpTyp::Operator(typ) => OperationTyp::Operator(typ),
            ShuntOpTyp::Fun => OperationTyp::Ident,
            ShuntOpTyp::OpenParen => return None,
        };
        Some(Operation { typ, loc: self.loc })
    }
}

/// Moves operators from `ops` to `out` until an open parenthesis (left in
/// place) or the bottom of the stack.
fn drain_to_paren(ops: &mut Vec<ShuntOp>, out: &mut Vec<Operation>) {
    while let Some(op) = ops.pop() {
        if op.typ == ShuntOpTyp::OpenParen {
            ops.push(op);
            break;
        }
        out.extend(op.into_output());
    }
}

pub fn parse(lex: Lexer<'_>, idents: &Idents) -> Result<Program, ParseErr> {
    let mut out: Vec<Operation> = Vec::new(); // output
    let mut ops: Vec<ShuntOp> = Vec::new(); // operator stack

    for tok in lex {
        let tok = tok?;
        match tok.typ {
            TokTyp::Number => {
                let num: Number = tok.loc.get().parse().map_err(|err| ParseErr {
                    typ: ParseErrTyp::ParseNum(err),
                    loc: tok.loc.clone(),
                })?;
                out.push(Operation {
                    typ: OperationTyp::Val(num),
                    loc: tok.loc,
                });
            }

            TokTyp::Ident => {
                if let Some(Ident::Fun(_)) = idents.get(&tok.loc.clone().into()) {
                    ops.push(ShuntOp {
                        typ: ShuntOpTyp::Fun,
                        loc: tok.loc,
                    });
                } else {
                    // constants, variables, and unknown names are all
                    // looked up at evaluation time
                    out.push(Operation {
                        typ: OperationTyp::Ident,
                        loc: tok.loc,
                    });
                }
            }

            TokTyp::Op(o1) => {
                while let Some(o2) = ops.pop() {
                    if o2.outranks(o1) {
                        out.extend(o2.into_output());
                    } else {
                        ops.push(o2);
                        break;
                    }
                }
                ops.push(ShuntOp {
                    typ: ShuntOpTyp::Operator(o1),
                    loc: tok.loc,
                });
            }

            TokTyp::Comma => drain_to_paren(&mut ops, &mut out),

            TokTyp::OpenParen => {
                ops.push(ShuntOp {
                    typ: ShuntOpTyp::OpenParen,
                    loc: tok.loc,
                });
            }

            TokTyp::CloseParen => {
                drain_to_paren(&mut ops, &mut out);

                match ops.pop() {
                    Some(op) if op.typ == ShuntOpTyp::OpenParen => {}
                    _ => {
                        return Err(ParseErr {
                            typ: ParseErrTyp::ParenMismatch,
                            loc: tok.loc,
                        });
                    }
                }

                // the parenthesis closed a function call
                if let Some(ShuntOp {
                    typ: ShuntOpTyp::Fun,
                    ..
                }) = ops.last()
                {
                    if let Some(op) = ops.pop() {
                        out.extend(op.into_output());
                    }
                }
            }

            TokTyp::XGreater
            | TokTyp::XLess
            | TokTyp::XEqual
            | TokTyp::XPipe
            | TokTyp::XOpenSquareBracket
            | TokTyp::XCloseSquareBracket
            | TokTyp::XOpenCurly
            | TokTyp::XCloseCurly => unreachable!("unsupported token survived until parsing"),
        }
    }

    while let Some(op) = ops.pop() {
        if op.typ == ShuntOpTyp::OpenParen {
            return Err(ParseErr {
                typ: ParseErrTyp::ParenMismatch,
                loc: op.loc,
            });
        }
        out.extend(op.into_output());
    }

    Ok(Program::new(out))
}
