//! Argument quoting for transports that take a flat command line
//!
//! This is a best-effort transform: arguments containing spaces are wrapped
//! in double quotes so the remote shell keeps them together. Other shell
//! metacharacters (`$`, backticks, `;`) are passed through untouched, so
//! this must not be treated as a security boundary.

use std::borrow::Cow;

/// Quote a single argument if it contains a space and is not already quoted
///
/// An empty argument becomes `''` so the remote shell still sees it.
pub fn quote_argument(arg: &str) -> Cow<'_, str> {
    if arg.is_empty() {
        return Cow::Borrowed("''");
    }
    if is_wrapped(arg, '"') || is_wrapped(arg, '\'') || !arg.contains(' ') {
        return Cow::Borrowed(arg);
    }
    Cow::Owned(format!("\"{}\"", arg.replace('"', "\\\"")))
}

/// Quote every argument and join them into one command line
pub fn command_line<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| quote_argument(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_wrapped(arg: &str, quote: char) -> bool {
    arg.len() >= 2 && arg.starts_with(quote) && arg.ends_with(quote)
}
