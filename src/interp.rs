//! Token-threaded annotation evaluator.
//!
//! [`interpret`] resolves tokens from a shared, mutable stream into string
//! values.  Command handlers consume further arguments directly from the same
//! stream (there is no pre-parsed argument list), and may recursively call
//! [`interpret`] themselves, so an expression like `\echo \+ 'q' name` nests
//! naturally.
//!
//! Control flow is the delicate part.  `\if` evaluates *both* textual
//! branches in order to consume tokens symmetrically, but commits side
//! effects from only the taken one: the not-taken branch runs against a
//! disposable [`DocState::snapshot`].  `\end` terminates a branch by yielding
//! [`Eval::Boundary`], a typed signal that unwinds through nested `interpret`
//! calls until a branch opener absorbs it.

use std::collections::VecDeque;

use regex::Regex;

use crate::error::{ErrorKind, EvalError};
use crate::state::DocState;
use crate::token::Token;

// ── Command set ───────────────────────────────────────────────────────────────

/// The closed set of annotation commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    /// `\k` — copy the current source line into the output.
    Keep,
    /// `\skip` — delete the line below the current one.
    Skip,
    /// `\echo <text>` — append `<text>` plus a newline to the output.
    Echo,
    /// `\echo@ <index> <text>` — insert `<text>` plus a newline at `<index>`.
    EchoAt,
    /// `\+ <a> <b>` — string concatenation.
    Concat,
    /// `\+f <a> <b>` — floating-point addition.
    AddF,
    /// `\ftoi <a>` — truncate a float to an integer.
    Ftoi,
    /// `\&& <a> <b>` — boolean and over the `"1"`-is-true convention.
    And,
    /// `\|| <a> <b>` — boolean or.
    Or,
    /// `\!! <a>` — boolean not.
    Not,
    /// `\== <a> <b>` — string equality, `"1"`/`"0"`.
    Eq,
    /// `\regex <pattern>` — `"1"` iff the pattern matches the line below.
    MatchBelow,
    /// `\set <name> <value>` — rebind an existing variable.
    Set,
    /// `\#ol` — current output length, as a string.
    OutLineCount,
    /// `\r <count> <unit>` — re-evaluate the following unit `<count>` times.
    Repeat,
    /// `\if <cond> <then> \end <else>` — see module docs.
    If,
    /// `\end` — branch terminator.
    End,
}

impl Cmd {
    /// Look up a command by its annotation-language name.
    pub fn from_name(name: &str) -> Option<Cmd> {
        Some(match name {
            "k" => Cmd::Keep,
            "skip" => Cmd::Skip,
            "echo" => Cmd::Echo,
            "echo@" => Cmd::EchoAt,
            "+" => Cmd::Concat,
            "+f" => Cmd::AddF,
            "ftoi" => Cmd::Ftoi,
            "&&" => Cmd::And,
            "||" => Cmd::Or,
            "!!" => Cmd::Not,
            "==" => Cmd::Eq,
            "regex" => Cmd::MatchBelow,
            "set" => Cmd::Set,
            "#ol" => Cmd::OutLineCount,
            "r" => Cmd::Repeat,
            "if" => Cmd::If,
            "end" => Cmd::End,
            _ => return None,
        })
    }
}

// ── Evaluation results ────────────────────────────────────────────────────────

/// Outcome of one [`interpret`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eval {
    /// Up to `n` resolved values.  Fewer than `n` means the stream ran out at
    /// a unit boundary.
    Values(Vec<String>),
    /// An `\end` unwound to this level without being absorbed by a branch
    /// opener between it and here.
    Boundary,
}

/// Outcome of dispatching a single command.
enum Resolved {
    Value(String),
    NoValue,
    Boundary,
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Resolve up to `n` string values from `toks`, consuming destructively.
///
/// Per token: a literal is its own value; a bare word resolves through
/// `st.variables` and falls back to its verbatim text; a command dispatches
/// through [`Cmd`] and may consume further tokens as arguments.  A command
/// that yields no value (pure side effect) contributes nothing toward `n`.
pub fn interpret(
    toks: &mut VecDeque<Token>,
    n: usize,
    st: &mut DocState,
) -> Result<Eval, EvalError> {
    let mut values = Vec::new();
    while values.len() < n {
        let Some(tok) = toks.pop_front() else { break };
        match tok {
            Token::Literal(text) => values.push(text),
            Token::Other(text) => {
                let value = st.variables.get(&text).cloned().unwrap_or(text);
                values.push(value);
            }
            Token::Command(name) => {
                let cmd = Cmd::from_name(&name)
                    .ok_or_else(|| EvalError::from(ErrorKind::UnknownCommand(name)))?;
                match dispatch(cmd, toks, st)? {
                    Resolved::Value(v) => values.push(v),
                    Resolved::NoValue => {}
                    Resolved::Boundary => return Ok(Eval::Boundary),
                }
            }
        }
    }
    Ok(Eval::Values(values))
}

/// Gather exactly `n` argument values for a command.
///
/// `Ok(None)` means a branch boundary surfaced while gathering; the caller
/// must propagate it.  Exhausting the stream short of `n` is a
/// [`ErrorKind::StarvedExpression`] defect.
fn args(
    toks: &mut VecDeque<Token>,
    n: usize,
    st: &mut DocState,
) -> Result<Option<Vec<String>>, EvalError> {
    match interpret(toks, n, st)? {
        Eval::Boundary => Ok(None),
        Eval::Values(v) if v.len() < n => Err(ErrorKind::StarvedExpression.into()),
        Eval::Values(v) => Ok(Some(v)),
    }
}

fn two(v: Vec<String>) -> (String, String) {
    let mut it = v.into_iter();
    (it.next().unwrap_or_default(), it.next().unwrap_or_default())
}

fn one(v: Vec<String>) -> String {
    v.into_iter().next().unwrap_or_default()
}

fn parse_f64(s: &str) -> Result<f64, EvalError> {
    s.trim()
        .parse()
        .map_err(|_| ErrorKind::NumericConversion(s.to_owned()).into())
}

fn parse_i64(s: &str) -> Result<i64, EvalError> {
    s.trim()
        .parse()
        .map_err(|_| ErrorKind::NumericConversion(s.to_owned()).into())
}

/// Format a float the way marks are written back into documents: integral
/// values keep one decimal place (`5` → `"5.0"`), everything else uses the
/// shortest round-trip form.
fn format_float(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        x.to_string()
    }
}

fn bool_str(b: bool) -> String {
    if b { "1" } else { "0" }.to_owned()
}

fn dispatch(
    cmd: Cmd,
    toks: &mut VecDeque<Token>,
    st: &mut DocState,
) -> Result<Resolved, EvalError> {
    match cmd {
        Cmd::Keep => {
            let line = st.current_line().to_owned();
            st.out_lines.push(line);
            Ok(Resolved::NoValue)
        }

        Cmd::Skip => {
            st.delete_next_line();
            Ok(Resolved::NoValue)
        }

        Cmd::Echo => {
            let Some(v) = args(toks, 1, st)? else {
                return Ok(Resolved::Boundary);
            };
            st.out_lines.push(one(v) + "\n");
            Ok(Resolved::NoValue)
        }

        Cmd::EchoAt => {
            let Some(v) = args(toks, 2, st)? else {
                return Ok(Resolved::Boundary);
            };
            let (at, text) = two(v);
            let at = parse_i64(&at)?;
            st.insert_out(at, text + "\n");
            Ok(Resolved::NoValue)
        }

        Cmd::Concat => {
            let Some(v) = args(toks, 2, st)? else {
                return Ok(Resolved::Boundary);
            };
            let (a, b) = two(v);
            Ok(Resolved::Value(a + &b))
        }

        Cmd::AddF => {
            let Some(v) = args(toks, 2, st)? else {
                return Ok(Resolved::Boundary);
            };
            let (a, b) = two(v);
            let sum = parse_f64(&a)? + parse_f64(&b)?;
            Ok(Resolved::Value(format_float(sum)))
        }

        Cmd::Ftoi => {
            let Some(v) = args(toks, 1, st)? else {
                return Ok(Resolved::Boundary);
            };
            let x = parse_f64(&one(v))?;
            Ok(Resolved::Value(((x.trunc()) as i64).to_string()))
        }

        Cmd::And => {
            let Some(v) = args(toks, 2, st)? else {
                return Ok(Resolved::Boundary);
            };
            let (a, b) = two(v);
            Ok(Resolved::Value(bool_str(a == "1" && b == "1")))
        }

        Cmd::Or => {
            let Some(v) = args(toks, 2, st)? else {
                return Ok(Resolved::Boundary);
            };
            let (a, b) = two(v);
            Ok(Resolved::Value(bool_str(a == "1" || b == "1")))
        }

        Cmd::Not => {
            let Some(v) = args(toks, 1, st)? else {
                return Ok(Resolved::Boundary);
            };
            Ok(Resolved::Value(bool_str(one(v) != "1")))
        }

        Cmd::Eq => {
            let Some(v) = args(toks, 2, st)? else {
                return Ok(Resolved::Boundary);
            };
            let (a, b) = two(v);
            Ok(Resolved::Value(bool_str(a == b)))
        }

        Cmd::MatchBelow => {
            let Some(v) = args(toks, 1, st)? else {
                return Ok(Resolved::Boundary);
            };
            let pattern = one(v);
            let re = Regex::new(&pattern).map_err(|_| ErrorKind::MissingContextLine)?;
            let below = st.next_line().ok_or(ErrorKind::MissingContextLine)?;
            Ok(Resolved::Value(bool_str(re.is_match(below))))
        }

        Cmd::Set => {
            let Some(v) = args(toks, 2, st)? else {
                return Ok(Resolved::Boundary);
            };
            let (name, value) = two(v);
            // Only existing keys may be rebound: a pass never grows or
            // shrinks the variable map.
            if !crate::driver::valid_variable_name(&name)
                || !st.variables.contains_key(&name)
            {
                return Err(ErrorKind::InvalidVariableName(name).into());
            }
            st.variables.insert(name, value);
            Ok(Resolved::NoValue)
        }

        Cmd::OutLineCount => Ok(Resolved::Value(st.out_lines.len().to_string())),

        Cmd::Repeat => {
            let Some(v) = args(toks, 1, st)? else {
                return Ok(Resolved::Boundary);
            };
            let count = parse_i64(&one(v))?;
            // Each iteration replays the same unit against the real state by
            // evaluating a clone of the stream; only the last clone's
            // consumption sticks.  A count of zero leaves the unit's tokens
            // in place for the caller.
            let mut last = toks.clone();
            for _ in 0..count {
                last = toks.clone();
                interpret(&mut last, 1, st)?; // boundary, if any, ends the unit
            }
            *toks = last;
            Ok(Resolved::NoValue)
        }

        Cmd::If => {
            let Some(v) = args(toks, 1, st)? else {
                return Ok(Resolved::Boundary);
            };
            let taken = one(v) == "1";
            // Both branches run, in textual order, off the one shared stream;
            // the not-taken one runs against a throwaway copy of the state.
            let mut ghost = st.snapshot();
            let mut value = None;
            if taken {
                if let Eval::Values(vals) = interpret(toks, 1, st)? {
                    value = vals.into_iter().next();
                }
                interpret(toks, 1, &mut ghost)?;
            } else {
                interpret(toks, 1, &mut ghost)?;
                if let Eval::Values(vals) = interpret(toks, 1, st)? {
                    value = vals.into_iter().next();
                }
            }
            Ok(match value {
                Some(v) => Resolved::Value(v),
                None => Resolved::NoValue,
            })
        }

        Cmd::End => Ok(Resolved::Boundary),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::token::tokenize;

    fn st(lines: &[&str], vars: &[(&str, &str)]) -> DocState {
        DocState::new(
            lines.iter().map(|s| s.to_string()).collect(),
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn run(expr: &str, st: &mut DocState) -> Result<Eval, EvalError> {
        let mut toks: VecDeque<Token> = tokenize(expr).into();
        interpret(&mut toks, 1, st)
    }

    fn value(expr: &str, st: &mut DocState) -> String {
        match run(expr, st).unwrap() {
            Eval::Values(v) => v.into_iter().next().unwrap_or_default(),
            Eval::Boundary => panic!("unexpected boundary"),
        }
    }

    #[test]
    fn literal_and_substitution() {
        let mut s = st(&[], &[("a", "7")]);
        assert_eq!(value("'lit'", &mut s), "lit");
        assert_eq!(value("a", &mut s), "7");
        // Unknown bare word falls through verbatim.
        assert_eq!(value("zzz", &mut s), "zzz");
    }

    #[test]
    fn concat_and_arithmetic() {
        let mut s = st(&[], &[("a", "2"), ("b", "3")]);
        assert_eq!(value("\\+ a b", &mut s), "23");
        assert_eq!(value("\\+f a b", &mut s), "5.0");
        assert_eq!(value("\\+f '1.25' '0.5'", &mut s), "1.75");
        assert_eq!(value("\\ftoi '3.9'", &mut s), "3");
        assert_eq!(value("\\ftoi '-3.9'", &mut s), "-3");
    }

    #[test]
    fn numeric_conversion_failure() {
        let mut s = st(&[], &[]);
        let err = run("\\+f 'x' '1'", &mut s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NumericConversion("x".into()));
    }

    #[test]
    fn boolean_ops() {
        let mut s = st(&[], &[]);
        assert_eq!(value("\\&& '1' '1'", &mut s), "1");
        assert_eq!(value("\\&& '1' '2'", &mut s), "0");
        assert_eq!(value("\\|| '0' '1'", &mut s), "1");
        assert_eq!(value("\\|| 'x' 'y'", &mut s), "0");
        assert_eq!(value("\\!! '1'", &mut s), "0");
        assert_eq!(value("\\!! '0'", &mut s), "1");
        assert_eq!(value("\\== 'ab' 'ab'", &mut s), "1");
        assert_eq!(value("\\== 'ab' 'ba'", &mut s), "0");
    }

    #[test]
    fn unknown_command() {
        let mut s = st(&[], &[]);
        let err = run("\\nosuch", &mut s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownCommand("nosuch".into()));
    }

    #[test]
    fn starved_arguments() {
        let mut s = st(&[], &[]);
        let err = run("\\+ 'only-one'", &mut s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StarvedExpression);
    }

    #[test]
    fn exhaustion_at_unit_boundary_is_clean() {
        // A pure side-effect expression resolves to zero values, not an error.
        let mut s = st(&["cur"], &[]);
        assert_eq!(run("\\k", &mut s).unwrap(), Eval::Values(vec![]));
        assert_eq!(s.out_lines, vec!["cur"]);
    }

    #[test]
    fn keep_and_skip() {
        let mut s = st(&["first", "second", "third"], &[]);
        assert_eq!(run("\\skip", &mut s).unwrap(), Eval::Values(vec![]));
        assert_eq!(s.lines, vec!["first", "third"]);
        // skip at the last line is a no-op
        s.cur = 1;
        run("\\skip", &mut s).unwrap();
        assert_eq!(s.lines, vec!["first", "third"]);
    }

    #[test]
    fn echo_and_echo_at() {
        let mut s = st(&[], &[("who", "marker")]);
        run("\\echo \\+ 'hi ' who", &mut s).unwrap();
        assert_eq!(s.out_lines, vec!["hi marker\n"]);
        run("\\echo@ '0' 'front'", &mut s).unwrap();
        assert_eq!(s.out_lines, vec!["front\n", "hi marker\n"]);
    }

    #[test]
    fn echo_at_bad_index() {
        let mut s = st(&[], &[]);
        let err = run("\\echo@ 'x' 'text'", &mut s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NumericConversion("x".into()));
    }

    #[test]
    fn out_line_count_is_self_referential() {
        let mut s = st(&[], &[]);
        s.out_lines.push("one\n".into());
        s.out_lines.push("two\n".into());
        assert_eq!(value("\\#ol", &mut s), "2");
    }

    #[test]
    fn regex_matches_line_below() {
        let mut s = st(&["cur", r"\usepackage[grid]{markpage}"], &[]);
        // Doubled backslashes: literal decoding halves them before the
        // pattern reaches the regex engine.
        assert_eq!(value(r"\regex '\\[.*grid.*\\]'", &mut s), "1");
        assert_eq!(value(r"\regex 'nomatch'", &mut s), "0");
    }

    #[test]
    fn regex_without_line_below() {
        let mut s = st(&["only"], &[]);
        let err = run(r"\regex 'x'", &mut s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingContextLine);
    }

    #[test]
    fn regex_invalid_pattern() {
        let mut s = st(&["cur", "below"], &[]);
        let err = run(r"\regex '(['", &mut s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingContextLine);
    }

    #[test]
    fn set_rebinds_existing_only() {
        let mut s = st(&[], &[("flag", "0")]);
        run("\\set 'flag' '1'", &mut s).unwrap();
        assert_eq!(s.variables["flag"], "1");

        let err = run("\\set 'fresh' '1'", &mut s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidVariableName("fresh".into()));
        assert!(!s.variables.contains_key("fresh"));
    }

    #[test]
    fn set_rejects_malformed_name() {
        let mut s = st(&[], &[("a", "")]);
        let err = run("\\set 'a=b' 'v'", &mut s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidVariableName("a=b".into()));
    }

    #[test]
    fn repeat_replays_side_effects() {
        let mut s = st(&["me"], &[]);
        run("\\r '3' \\k", &mut s).unwrap();
        assert_eq!(s.out_lines, vec!["me", "me", "me"]);
    }

    #[test]
    fn repeat_zero_consumes_nothing_of_the_unit() {
        let mut s = st(&[], &[]);
        let mut toks: VecDeque<Token> = tokenize("\\r '0' \\echo 'x' 'tail'").into();
        let res = interpret(&mut toks, 1, &mut s).unwrap();
        // The unit's tokens stay in the stream, so \echo runs once at the
        // top level and 'tail' becomes the value.
        assert_eq!(res, Eval::Values(vec!["tail".into()]));
        assert_eq!(s.out_lines, vec!["x\n"]);
    }

    #[test]
    fn repeat_bad_count() {
        let mut s = st(&[], &[]);
        let err = run("\\r 'many' \\k", &mut s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NumericConversion("many".into()));
    }

    #[test]
    fn if_returns_taken_value() {
        let mut s = st(&[], &[]);
        assert_eq!(value("\\if '1' 'yes' \\end 'no'", &mut s), "yes");
        // False: the then-unit ends at its value, the real evaluation then
        // absorbs the \end and the else value falls through at top level.
        assert_eq!(value("\\if '0' 'yes' \\end 'no'", &mut s), "no");
    }

    #[test]
    fn if_commits_only_taken_side_effects() {
        let run_case = |cond: &str| {
            let mut s = st(&["active"], &[]);
            let expr = format!("\\if {cond} \\k \\end \\echo 'no'");
            let mut toks: VecDeque<Token> = tokenize(&expr).into();
            let res = interpret(&mut toks, 1, &mut s).unwrap();
            assert_eq!(res, Eval::Values(vec![]));
            assert!(toks.is_empty(), "both directions consume all tokens");
            s.out_lines
        };
        assert_eq!(run_case("'1'"), vec!["active"]);
        assert_eq!(run_case("'0'"), vec!["no\n"]);
    }

    #[test]
    fn if_speculative_set_never_commits() {
        let mut s = st(&[], &[("v", "orig")]);
        run("\\if '0' \\set 'v' 'ghost' \\end 'x'", &mut s).unwrap();
        assert_eq!(s.variables["v"], "orig");

        let mut s = st(&[], &[("v", "orig")]);
        run("\\if '1' \\set 'v' 'real' \\end 'x'", &mut s).unwrap();
        assert_eq!(s.variables["v"], "real");
    }

    #[test]
    fn nested_if() {
        let mut s = st(&[], &[]);
        assert_eq!(
            value("\\if '1' \\if '0' 'a' \\end 'b' \\end 'c'", &mut s),
            "b"
        );
    }

    #[test]
    fn bare_end_surfaces_as_boundary() {
        let mut s = st(&[], &[]);
        assert_eq!(run("\\end", &mut s).unwrap(), Eval::Boundary);
    }

    #[test]
    fn variables_resolve_inside_commands() {
        let mut s = st(&[], &[("mark", ""), ("a", "2"), ("b", "3")]);
        assert_eq!(value("\\+f a b", &mut s), "5.0");
    }

    #[test]
    fn cmd_lookup_covers_every_name() {
        for name in [
            "k", "skip", "echo", "echo@", "+", "+f", "ftoi", "&&", "||", "!!", "==", "regex",
            "set", "#ol", "r", "if", "end",
        ] {
            assert!(Cmd::from_name(name).is_some(), "missing command {name}");
        }
        assert_eq!(Cmd::from_name("K"), None);
        assert_eq!(Cmd::from_name(""), None);
    }
}
