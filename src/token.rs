//! Annotation expression tokenizer.
//!
//! An annotation expression (the text after `=` on an active line) is split
//! into a flat sequence of tokens, consumed left-to-right by the evaluator.
//! There are three kinds:
//!
//! | Form            | Token                | Example                        |
//! |-----------------|----------------------|--------------------------------|
//! | `\name`         | [`Token::Command`]   | `\echo`, `\+f`, `\if`          |
//! | `'text'`        | [`Token::Literal`]   | `'total:\n'` (escapes decoded) |
//! | anything else   | [`Token::Other`]     | `_question_name`, `3.5`        |
//!
//! Inside a literal, `\n` decodes to a newline and `\x` to `x` for any other
//! `x`; the surrounding quotes are stripped.  A literal may contain embedded
//! whitespace, and scanning resumes immediately after the closing quote, so
//! `'ab'cd` yields the literal `ab` followed by the bare word `cd`.
//!
//! Tokenization is total: any input yields a (possibly empty) token list.

/// One classified unit of an annotation expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `\name`, evaluated through the command dispatcher.
    Command(String),
    /// `'text'`, a quoted string with escapes already decoded.
    Literal(String),
    /// A bare word, resolved by variable lookup at evaluation time, else
    /// passed through verbatim.
    Other(String),
}

/// Extract and classify the next token from `input`.
///
/// Returns the token and the unconsumed remainder, or `None` if `input` is
/// blank.  An unterminated literal consumes everything to the end of input.
pub fn next_token(input: &str) -> Option<(Token, &str)> {
    let rest = input.trim_start();
    if rest.is_empty() {
        return None;
    }

    if let Some(body) = rest.strip_prefix('\'') {
        return Some(scan_literal(body));
    }

    let end = rest
        .find(char::is_whitespace)
        .unwrap_or(rest.len());
    let (word, tail) = rest.split_at(end);
    let token = match word.strip_prefix('\\') {
        Some(name) => Token::Command(name.to_owned()),
        None => Token::Other(word.to_owned()),
    };
    Some((token, tail))
}

/// Scan a literal body (the text after the opening quote) up to the next
/// unescaped `'`, decoding escapes as it goes.
fn scan_literal(body: &str) -> (Token, &str) {
    let mut text = String::new();
    let mut chars = body.char_indices();
    let mut resume = body.len();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                // `\n` → newline, `\x` → x; a trailing lone `\` is dropped.
                if let Some((_, esc)) = chars.next() {
                    text.push(if esc == 'n' { '\n' } else { esc });
                }
            }
            '\'' => {
                resume = i + 1;
                break;
            }
            _ => text.push(c),
        }
    }
    (Token::Literal(text), &body[resume..])
}

/// Split an entire expression into tokens by repeated [`next_token`].
pub fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = expr;
    while let Some((tok, tail)) = next_token(rest) {
        tokens.push(tok);
        rest = tail;
    }
    tokens
}

// ── Tests ─────────────────────────────────────────────────────────────────────
