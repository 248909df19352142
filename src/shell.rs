// SPDX: CC0-1.0

use crate::{
    eval::{EvalErr, EvalErrTyp, Ident, IdentKey, Idents, Program},
    graph::ValidationError,
    lex::{LexErrTyp, SubStr, TokTyp},
    parse::{ParseErr, ParseErrTyp},
};
use anyhow::Context;
use core::fmt;
use std::{
    io::{self, stdin, BufRead, Write},
    sync::Arc,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Add,
    Remove,
    Toggle,
    List,
    SetWin,
    Pan,
    Zoom,
    Mode,
    Angle,
    Plot,
    Svg,
    Intersect,
    PrintProg,
}

impl Command {
    pub const fn exhaustive() -> &'static [Command] {
        &[
            Self::Help,
            Self::Quit,
            Self::Add,
            Self::Remove,
            Self::Toggle,
            Self::List,
            Self::SetWin,
            Self::Pan,
            Self::Zoom,
            Self::Mode,
            Self::Angle,
            Self::Plot,
            Self::Svg,
            Self::Intersect,
            Self::PrintProg,
        ]
    }

    pub const fn help(&self) -> &'static str {
        match self {
            Self::Help => "display help for each command",
            Self::Quit => "quit the shell",
            Self::Add => "add a function: add <expression>",
            Self::Remove => "remove a function: remove <id>",
            Self::Toggle => "show or hide a function: toggle <id>",
            Self::List => "list functions and their intersections",
            Self::SetWin => "set window parameters",
            Self::Pan => "move the view by a drag in pixels: pan <dx> <dy>",
            Self::Zoom => "zoom around the centre: zoom <factor> (below 1 zooms in)",
            Self::Mode => "switch plot mode: mode rectangular|polar",
            Self::Angle => "switch angle unit: angle degrees|radians",
            Self::Plot => "plot enabled functions with gnuplot",
            Self::Svg => "write enabled functions to an svg file",
            Self::Intersect => "search intersections in the background at full resolution",
            Self::PrintProg => "print program compiled from a function (for debugging): prog <id>",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Quit => "quit",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Toggle => "toggle",
            Self::List => "list",
            Self::SetWin => "window",
            Self::Pan => "pan",
            Self::Zoom => "zoom",
            Self::Mode => "mode",
            Self::Angle => "angle",
            Self::Plot => "plot",
            Self::Svg => "svg",
            Self::Intersect => "intersect",
            Self::PrintProg => "prog",
        }
    }
}

impl core::str::FromStr for Command {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        for c in Self::exhaustive() {
            if s == c.name() {
                return Ok(*c);
            }
        }
        Err(())
    }
}

/// Splits an input line into the command word and its (trimmed) arguments.
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((cmd, args)) => (cmd, args.trim()),
        None => (line, ""),
    }
}

pub fn input<W: Write>(out: W, prompt: impl fmt::Display) -> anyhow::Result<String> {
    fn inner<W: Write>(mut out: W, prompt: impl fmt::Display) -> io::Result<String> {
        write!(out, "{prompt}")?;
        out.flush()?;
        let mut stdin = stdin().lock();
        let mut s = String::new();
        stdin.read_line(&mut s)?;
        Ok(s.trim().to_string())
    }

    let s = inner(out, prompt).context("read from standard input failed")?;
    Ok(s)
}

/// Parses `text` as a `T`, underlining it with the error on failure.
pub fn parse_arg<W: Write, T: core::str::FromStr>(
    mut out: W,
    text: &str,
) -> io::Result<Option<T>>
where
    <T as core::str::FromStr>::Err: fmt::Display,
{
    match text.parse::<T>() {
        Ok(val) => Ok(Some(val)),
        Err(err) => {
            underline(&mut out, &SubStr::all(Arc::new(text.to_string())))?;
            writeln!(out, "parse error: {err}")?;
            Ok(None)
        }
    }
}

pub fn read_fromstr<W: Write, T: core::str::FromStr>(
    mut out: W,
    prompt: impl fmt::Display,
    ignore_empty: bool,
) -> anyhow::Result<Result<Option<T>, ()>>
where
    <T as core::str::FromStr>::Err: fmt::Display,
{
    let input = input(&mut out, prompt)?;
    if ignore_empty && input.is_empty() {
        return Ok(Ok(None));
    }
    match parse_arg(&mut out, &input)? {
        Some(val) => Ok(Ok(Some(val))),
        None => Ok(Err(())),
    }
}

pub fn underline<W: Write>(mut out: W, span: &SubStr) -> io::Result<()> {
    writeln!(out, "{}", span.src())?;
    writeln!(
        out,
        "{}{}",
        " ".repeat(span.start()),
        "^".repeat(span.len().max(1))
    )?;
    Ok(())
}

pub fn dump_program<W: Write>(
    mut out: W,
    prog: &Program,
    title: core::fmt::Arguments,
) -> io::Result<()> {
    writeln!(out, "{title}: ")?;
    if prog.is_empty() {
        writeln!(out, "  (empty)")?;
    }
    for op in prog.ops() {
        writeln!(out, "  {op}")?;
    }
    Ok(())
}

/// The known identifier most similar to `text`, if any is close enough.
pub fn similar_ident<'a>(text: &str, idents: &'a Idents) -> Option<(&'a IdentKey, &'a Ident)> {
    let text = text.to_ascii_lowercase();
    idents
        .iter()
        .map(|(k, v)| {
            (
                strsim::normalized_damerau_levenshtein(&text, &k.get().to_ascii_lowercase()),
                (k, v),
            )
        })
        .filter(|(sim, _)| *sim > 0.3)
        .reduce(|acc, elem| if elem.0 > acc.0 { elem } else { acc })
        .map(|(_, kv)| kv)
}

/// Explains why an expression was rejected, pointing at the culprit.
pub fn explain_validation<W: Write>(
    mut out: W,
    err: &ValidationError,
    expression: &str,
    idents: &Idents,
) -> io::Result<()> {
    match err {
        ValidationError::Parse(err) => explain_parse(out, err),
        ValidationError::Eval(err) => {
            let src = Arc::new(expression.to_string());
            let loc = err.op.as_ref().map(|op| op.loc.clone());
            // NOTE(unicode)
            let end = SubStr::new(Arc::clone(&src), src.len(), 1);
            underline(&mut out, loc.as_ref().unwrap_or(&end))?;
            explain_eval(out, err, loc.is_none(), idents)
        }
    }
}

fn explain_parse<W: Write>(mut out: W, err: &ParseErr) -> io::Result<()> {
    underline(&mut out, &err.loc)?;
    writeln!(out, "parse error: {}", err.typ)?;
    match &err.typ {
        ParseErrTyp::LexErr(LexErrTyp::InvalidChar) => writeln!(
            out,
            "note: available tokens are numbers, alphabetic identifiers, and symbols +-*/^,()"
        )?,
        ParseErrTyp::LexErr(LexErrTyp::Unsupported(typ)) => match typ {
            TokTyp::XGreater | TokTyp::XLess => {
                writeln!(out, "note: expected an expression but found an inequality")?
            }
            TokTyp::XEqual => writeln!(out, "note: expected an expression but found an equation")?,
            TokTyp::XPipe => writeln!(out, "note: use the 'abs' function to compute absolute value")?,
            _ => {}
        },
        ParseErrTyp::ParseNum(_) => writeln!(out, "note: parsing as floating point number")?,
        ParseErrTyp::ParenMismatch => {}
    }
    Ok(())
}

fn explain_eval<W: Write>(mut out: W, err: &EvalErr, at_end: bool, idents: &Idents) -> io::Result<()> {
    writeln!(out, "evaluation error: {err}")?;
    if at_end {
        writeln!(
            out,
            "note: exactly 1 final value is expected on the stack after evaluation"
        )?;
    }
    match &err.typ {
        EvalErrTyp::StackMismatch { .. } => writeln!(
            out,
            "note: implicit multiplication is not supported, so for example '5x' would be '5*x'"
        )?,
        EvalErrTyp::UndefinedIdent { text } => {
            if let Some((key, ident)) = similar_ident(text.get(), idents) {
                writeln!(out, "note: {} '{key}' has a similar name", ident.kind())?;
            }
        }
        EvalErrTyp::Empty | EvalErrTyp::MissingArgs { .. } | EvalErrTyp::NullVar { .. } => {}
    }
    Ok(())
}
