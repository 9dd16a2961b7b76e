//! Marking-protocol exchanges over annotated documents.
//!
//! The workflow around the interpreter talks to a document exclusively
//! through well-known variable names.  Each function here is one such
//! request/response exchange: it seeds the variable map, runs
//! [`process_file`] in place (or template → output), and reads the answers
//! back out of the map.  The document's own annotation lines decide how to
//! react to each flag.
//!
//! Variable conventions:
//!
//! | Name                 | Direction | Meaning                                   |
//! |----------------------|-----------|-------------------------------------------|
//! | `_init`              | in        | `1` during initial template instantiation |
//! | `_in_path`           | in        | path prefix of the script(s) under mark   |
//! | `_#pages`            | in        | page count of the script                  |
//! | `_question_reset`    | in        | `1` to set a question up for marking      |
//! | `_question_name`     | in        | question under consideration, e.g. `3a`   |
//! | `_question_prevmark` | in        | mark recorded on a previous pass, if any  |
//! | `_question_mark`     | out       | the recorded mark for the question        |
//! | `_question_assert`   | out       | `1` iff marking of the question validated |
//! | `_final_assert_reset`| in        | `1` to arm the whole-document check       |
//! | `_final_assert`      | out       | `1` iff the whole document validates      |

use std::collections::HashMap;
use std::path::Path;

use crate::driver::{process_file, DEFAULT_ESCAPE};
use crate::error::ProcessError;

/// Answer to a [`read_question`] exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionStatus {
    /// True iff the document asserted the question marked *and* recorded a
    /// non-empty mark.
    pub marked: bool,
    /// The recorded mark, possibly empty.
    pub mark: String,
}

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Instantiate a marking document from a template.
///
/// `script_base` is the path prefix of the script PDF(s) relative to the new
/// document (e.g. `../script_042`); `page_count` their total page count.
pub fn instantiate_template(
    template: &Path,
    output: &Path,
    script_base: &str,
    page_count: u32,
) -> Result<(), ProcessError> {
    let mut v = vars(&[
        ("_in_path", script_base),
        ("_#pages", &page_count.to_string()),
        ("_init", "1"),
    ]);
    process_file(template, output, &mut v, DEFAULT_ESCAPE)
}

/// Set a question up for (re-)marking, rewriting the document in place.
pub fn reset_question(
    path: &Path,
    question_name: &str,
    previous_mark: &str,
) -> Result<(), ProcessError> {
    let mut v = vars(&[
        ("_question_reset", "1"),
        ("_question_name", question_name),
        ("_question_prevmark", previous_mark),
    ]);
    process_file(path, path, &mut v, DEFAULT_ESCAPE)
}

/// Read the mark and validation verdict for one question.
///
/// Counterpart to [`reset_question`]; the document reports through
/// `_question_mark` and `_question_assert`.
pub fn read_question(path: &Path, question_name: &str) -> Result<QuestionStatus, ProcessError> {
    let mut v = vars(&[
        ("_question_mark", ""),
        ("_question_assert", "0"),
        ("_question_name", question_name),
    ]);
    process_file(path, path, &mut v, DEFAULT_ESCAPE)?;
    let mark = v.remove("_question_mark").unwrap_or_default();
    let asserted = v.get("_question_assert").map(String::as_str) == Some("1");
    Ok(QuestionStatus {
        marked: asserted && !mark.is_empty(),
        mark,
    })
}

/// Arm the whole-document "everything marked" check.
pub fn reset_final_check(path: &Path) -> Result<(), ProcessError> {
    let mut v = vars(&[("_final_assert_reset", "1")]);
    process_file(path, path, &mut v, DEFAULT_ESCAPE)
}

/// Run the whole-document check; true iff the document asserts completion.
pub fn final_check(path: &Path) -> Result<bool, ProcessError> {
    let mut v = vars(&[("_final_assert", "0")]);
    process_file(path, path, &mut v, DEFAULT_ESCAPE)?;
    Ok(v.get("_final_assert").map(String::as_str) == Some("1"))
}
