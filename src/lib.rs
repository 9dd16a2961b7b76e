//! `marklang` — the annotation interpreter at the core of a marking workflow.
//!
//! A tiny line-oriented macro language lives inside specially prefixed lines
//! of an otherwise arbitrary text document (typically TeX).  A line like
//!
//! ```text
//! %#mark=\+f a b
//! ```
//!
//! is *active*: `mark` names a variable supplied by the caller, and the
//! expression after `=` is evaluated to produce its new value.  Commands can
//! also rewrite the document itself (keep the current line, delete the line
//! below, emit new ones), so one pass both injects state into a document and
//! extracts state a human editor wrote back.  The document file is the
//! durable store; each pass is a transaction against it, keyed entirely by
//! variable names.
//!
//! # Quick start
//!
//! ```rust
//! use std::collections::HashMap;
//! use marklang::{process_lines, DEFAULT_ESCAPE};
//!
//! let doc = vec!["%#mark=\\+f a b".to_owned()];
//! let mut vars = HashMap::from([
//!     ("mark".to_owned(), String::new()),
//!     ("a".to_owned(), "2".to_owned()),
//!     ("b".to_owned(), "3".to_owned()),
//! ]);
//! let rewritten = process_lines(&doc, &mut vars, DEFAULT_ESCAPE).unwrap();
//! assert_eq!(vars["mark"], "5.0");
//! assert!(rewritten.is_empty()); // the active line is consumed
//! ```
//!
//! The interpreter is single-threaded and holds no state across passes;
//! see [`process_file`] for the file-oriented transaction wrapper and
//! [`protocol`] for the marking workflow's variable conventions.

pub mod driver;
pub mod error;
pub mod interp;
pub mod protocol;
pub mod state;
pub mod token;

// Re-exports for convenience.
pub use driver::{process_file, process_lines, valid_variable_name, DEFAULT_ESCAPE};
pub use error::{ErrorKind, EvalError, ProcessError};
pub use interp::{interpret, Cmd, Eval};
pub use state::DocState;
pub use token::{next_token, tokenize, Token};
