//! Launcher scripts that forward every argument to the real executable.

use std::path::Path;

/// Script contents that exec `target` with the caller's arguments.
#[cfg(not(windows))]
pub fn render(target: &Path) -> String {
    format!("#!/bin/sh\nexec {} \"$@\"\n", shell_quote(&target.to_string_lossy()))
}

#[cfg(windows)]
pub fn render(target: &Path) -> String {
    format!("@echo off\r\n\"{}\" %*\r\n", target.display())
}

/// Interpreter and leading arguments used to run a launcher script explicitly.
#[cfg(not(windows))]
pub fn interpreter() -> (&'static str, &'static [&'static str]) {
    ("sh", &[])
}

#[cfg(windows)]
pub fn interpreter() -> (&'static str, &'static [&'static str]) {
    ("cmd", &["/C"])
}

#[cfg(not(windows))]
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
