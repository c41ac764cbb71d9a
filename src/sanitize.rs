//! Code Sanitizer
//!
//! Strips module-system artifacts that generated code often carries but the
//! sandbox cannot use: imports, exports and whole-line comments. Sanitizing is
//! pure and idempotent: `sanitize(sanitize(x)) == sanitize(x)`.

use regex::Regex;

lazy_static::lazy_static! {
    static ref IMPORT_FROM: Regex =
        Regex::new(r#"(?m)^[ \t]*import\s+[^;'"]*?\s*from\s*['"][^'"\n]*['"][ \t]*;?[ \t]*\n?"#).unwrap();
    static ref BARE_IMPORT: Regex =
        Regex::new(r#"(?m)^[ \t]*import\s*['"][^'"\n]*['"][ \t]*;?[ \t]*\n?"#).unwrap();
    static ref EXPORT_DEFAULT_NAME: Regex =
        Regex::new(r"(?m)^[ \t]*export\s+default\s+[A-Za-z_$][A-Za-z0-9_$]*[ \t]*;?[ \t]*$\n?").unwrap();
    static ref EXPORT_LIST: Regex =
        Regex::new(r#"(?m)^[ \t]*export\s*\{[^}]*\}[ \t]*(?:from\s*['"][^'"\n]*['"])?[ \t]*;?[ \t]*\n?"#).unwrap();
    static ref EXPORT_DEFAULT_PREFIX: Regex = Regex::new(r"(?m)^([ \t]*)export\s+default\s+").unwrap();
    static ref EXPORT_PREFIX: Regex =
        Regex::new(r"(?m)^([ \t]*)export\s+(const|let|var|function|class|async)\b").unwrap();
    static ref LINE_COMMENT: Regex = Regex::new(r"(?m)^[ \t]*//[^\n]*\n?").unwrap();
}

/// Remove module syntax and whole-line comments, then trim.
pub fn sanitize(code: &str) -> String {
    let mut current = code.trim().to_string();
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn sanitize_pass(code: &str) -> String {
    let code = LINE_COMMENT.replace_all(code, "");
    let code = IMPORT_FROM.replace_all(&code, "");
    let code = BARE_IMPORT.replace_all(&code, "");
    let code = EXPORT_LIST.replace_all(&code, "");
    let code = EXPORT_DEFAULT_NAME.replace_all(&code, "");
    let code = EXPORT_DEFAULT_PREFIX.replace_all(&code, "${1}");
    let code = EXPORT_PREFIX.replace_all(&code, "${1}${2}");
    code.trim().to_string()
}
