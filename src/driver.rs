//! Document driver: the line-scanning pass that rewrites a document.
//!
//! [`process_lines`] walks a document top to bottom looking for *active*
//! lines: lines whose trimmed text starts with the escape marker and
//! contains `=`.  The left-hand side names a variable supplied by the
//! caller; the right-hand side is an annotation expression evaluated for at
//! most one value, which becomes the variable's new value.  Everything else
//! passes through verbatim.
//!
//! A failure on one active line is recovered locally: the line is emitted
//! unchanged, a warning is logged, and the rest of the document is still
//! processed.  The caller can detect incomplete processing by checking
//! whether the variables it expected to change actually did.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::mem;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ErrorKind, EvalError, ProcessError};
use crate::interp::{interpret, Eval};
use crate::state::DocState;
use crate::token::{tokenize, Token};

/// Marker that makes a line active when it leads the trimmed text.  `%` keeps
/// the line a comment to TeX, `#` sets it apart from ordinary comments.
pub const DEFAULT_ESCAPE: &str = "%#";

/// A usable variable name is a single whitespace-free token with no `=`.
pub fn valid_variable_name(name: &str) -> bool {
    !name.contains('=') && name.split_whitespace().count() == 1
}

/// Run one interpretation pass over `lines`.
///
/// `variables` is the request/response channel: the caller seeds it with the
/// names it wants applied or read back, and after the pass it holds whatever
/// the document's active lines computed.  Keys are never added or removed.
///
/// Fails only on a malformed variable name; per-line evaluation defects are
/// recovered (see module docs).
pub fn process_lines(
    lines: &[String],
    variables: &mut HashMap<String, String>,
    escape: &str,
) -> Result<Vec<String>, EvalError> {
    for name in variables.keys() {
        if !valid_variable_name(name) {
            return Err(ErrorKind::InvalidVariableName(name.clone()).into());
        }
    }

    let mut st = DocState::new(lines.to_vec(), mem::take(variables));
    // Handlers may shrink or grow `lines` at or after the cursor, so the
    // length is re-read every iteration.
    while st.cur < st.lines.len() {
        let raw = st.lines[st.cur].clone();
        let mut parsed = false;

        if let Some((name, expr)) = split_active(&raw, escape) {
            if st.variables.contains_key(name) {
                let name = name.to_owned();
                let expr = expr.to_owned();
                let mut toks: VecDeque<Token> = tokenize(&expr).into();
                match interpret(&mut toks, 1, &mut st) {
                    Ok(Eval::Values(vals)) => {
                        if let Some(value) = vals.into_iter().next() {
                            debug!(line = st.cur, name = %name, value = %value, "assigned");
                            st.variables.insert(name, value);
                        }
                        parsed = true;
                    }
                    Ok(Eval::Boundary) => {
                        let err = EvalError::from(ErrorKind::UnmatchedBranchBoundary)
                            .at(st.cur, &expr);
                        warn!(%err, "annotation failed, line left untouched");
                    }
                    Err(err) => {
                        let err = err.at(st.cur, &expr);
                        warn!(%err, "annotation failed, line left untouched");
                    }
                }
            }
        }

        if !parsed {
            st.out_lines.push(st.lines[st.cur].clone());
        }
        st.cur += 1;
    }

    *variables = st.variables;
    Ok(st.out_lines)
}

/// Split an active line into variable name and expression, or `None` if the
/// line is inert.
fn split_active<'a>(line: &'a str, escape: &str) -> Option<(&'a str, &'a str)> {
    line.trim().strip_prefix(escape)?.split_once('=')
}

/// Read the whole file at `input`, process it, and write the result to
/// `output`.  The two paths may be identical (in-place rewrite).
///
/// The output is staged in a temporary file next to the destination and
/// renamed into place only on success, so a failed pass never leaves a
/// partial write behind.
pub fn process_file(
    input: &Path,
    output: &Path,
    variables: &mut HashMap<String, String>,
    escape: &str,
) -> Result<(), ProcessError> {
    let text = std::fs::read_to_string(input)?;
    // Lines keep their terminators, so the rewrite preserves the original
    // line endings and a final line without one.
    let lines: Vec<String> = text.split_inclusive('\n').map(str::to_owned).collect();

    let out_lines = process_lines(&lines, variables, escape)?;

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    for line in &out_lines {
        staged.write_all(line.as_bytes())?;
    }
    staged.persist(output).map_err(|e| e.error)?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
