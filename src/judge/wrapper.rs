//! Source wrapping.
//!
//! Wrapping is textual embedding only. The snippet is never parsed, so a
//! syntax error in it surfaces as captured output of the sandboxed run.

use crate::config::types::ResourceLimits;
use crate::judge::registry::LanguageProfile;
use serde::Serialize;

const PY_INDENT: &str = "    ";

/// Closed set of wrapper templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapperKind {
    /// Language can cap its own address space before user code runs
    PythonAddressSpaceLimit,
    /// Only a top-level exception guard is available
    JavaScriptExceptionOnly,
}

/// Final source text for `profile` with `source_code` embedded.
pub fn wrap(source_code: &str, profile: &LanguageProfile, limits: &ResourceLimits) -> String {
    match profile.wrapper {
        WrapperKind::PythonAddressSpaceLimit => wrap_python(source_code, limits.memory_bytes()),
        WrapperKind::JavaScriptExceptionOnly => wrap_javascript(source_code),
    }
}

/// RLIMIT_AS preamble, then the snippet as the body of a `try` block.
///
/// The trailing `pass` keeps the block well-formed for empty or
/// comment-only snippets.
pub fn wrap_python(source_code: &str, address_space_bytes: u64) -> String {
    let mut out = String::with_capacity(source_code.len() + 512);
    out.push_str("import resource, sys\n");
    out.push_str(&format!(
        "resource.setrlimit(resource.RLIMIT_AS, ({0}, {0}))\n",
        address_space_bytes
    ));
    out.push('\n');
    out.push_str("try:\n");
    out.push_str(&indent(source_code, PY_INDENT));
    out.push_str(PY_INDENT);
    out.push_str("pass\n");
    out.push_str("except MemoryError:\n");
    out.push_str("    print(\"MemoryError: Out of memory\")\n");
    out.push_str("except Exception as e:\n");
    out.push_str("    print(\"RuntimeError:\", e)\n");
    out
}

/// Snippet verbatim inside a `try`/`catch` that reports to stderr.
pub fn wrap_javascript(source_code: &str) -> String {
    format!(
        "try {{\n{}\n}} catch (e) {{\n    console.error(\"RuntimeError:\", e);\n}}\n",
        source_code
    )
}

fn indent(source_code: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(source_code.len() + prefix.len() * 16);
    for line in source_lines(source_code) {
        out.push_str(prefix);
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Split on `\n`, `\r\n` and a lone `\r`, the line endings Python's
/// tokenizer accepts. A trailing terminator does not start an empty line.
fn source_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find(['\r', '\n']) {
            Some(at) => {
                let line = &rest[..at];
                let skip = if rest[at..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[at + skip..];
                Some(line)
            }
            None => {
                let line = rest;
                rest = "";
                Some(line)
            }
        }
    })
}
