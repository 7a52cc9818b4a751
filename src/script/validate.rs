//! Script admission.
//!
//! A line-by-line scan over the token stream rejects forbidden words, calls
//! outside the allow-list and member access outside the enum qualifiers.
//! Scripts that pass are parsed into a [`Program`].

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::{AdmissionKind, ScriptError};
use crate::script::Allowlist;
use crate::script::ast::Program;
use crate::script::lexer::{Keyword, Token, TokenKind, tokenize};
use crate::script::parser;

/// Words a script may not use outside comments and strings.
pub const FORBIDDEN_WORDS: [&str; 13] = [
    "import", "from", "class", "raise", "try", "except", "finally", "with", "yield", "global",
    "nonlocal", "async", "await",
];

/// Names that may precede a `.`.
pub const QUALIFIERS: [&str; 3] = ["Item", "Entity", "Ground"];

/// Validate `source` and parse it.
///
/// # Errors
///
/// Returns the first admission fault found, scanning physical lines in
/// order and, within a line, forbidden words before calls before member
/// access.
pub fn validate(source: &str, allowlist: &Allowlist) -> Result<Program, ScriptError> {
    let lexed = tokenize(source);
    let defined = defined_names(&lexed.tokens);

    let scan_limit = lexed.error.as_ref().map_or(usize::MAX, |e| e.line);
    for line in physical_lines(&lexed.tokens) {
        if line[0].line > scan_limit {
            break;
        }
        scan_line(source, line, allowlist, &defined)?;
    }
    if let Some(err) = lexed.error {
        warn!(line = err.line, reason = %err.reason, "script rejected while tokenizing");
        return Err(ScriptError::new(err.kind, source, err.line, err.column, err.reason));
    }

    check_definitions(source, &lexed.tokens, allowlist)?;

    let program = parser::parse(source, &lexed.tokens).inspect_err(|err| {
        warn!(line = err.line, reason = %err.reason, "script does not parse");
    })?;
    debug!(statements = program.body.len(), "script admitted");
    Ok(program)
}

/// Names bound by `def` anywhere in the token stream.
fn defined_names(tokens: &[Token]) -> BTreeSet<String> {
    tokens
        .windows(2)
        .filter(|pair| pair[0].is_keyword(Keyword::Def))
        .filter_map(|pair| pair[1].name().map(str::to_string))
        .collect()
}

/// Split the stream into runs of tokens sharing a physical line, ignoring
/// layout tokens.
fn physical_lines(tokens: &[Token]) -> Vec<&[Token]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for i in 1..=tokens.len() {
        if i == tokens.len() || tokens[i].line != tokens[start].line {
            let run = &tokens[start..i];
            if run.iter().any(|t| !is_layout(t)) {
                lines.push(run);
            }
            start = i;
        }
    }
    lines
}

fn is_layout(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::EndOfFile
    )
}

fn scan_line(
    source: &str,
    line: &[Token],
    allowlist: &Allowlist,
    defined: &BTreeSet<String>,
) -> Result<(), ScriptError> {
    let reject = |kind, token: &Token, offset: usize, reason: String| {
        warn!(line = token.line, %reason, "script rejected");
        Err(ScriptError::new(kind, source, token.line, token.column + offset, reason))
    };

    for token in line {
        let Some(name) = token.name() else { continue };
        if let Some(offset) = name.find("__") {
            return reject(AdmissionKind::Forbidden, token, offset, "__ is not allowed".to_string());
        }
        if FORBIDDEN_WORDS.contains(&name) {
            return reject(AdmissionKind::Forbidden, token, 0, format!("{name} is not allowed"));
        }
    }

    for (i, token) in line.iter().enumerate() {
        let Some(name) = token.name() else { continue };
        let called = line.get(i + 1).is_some_and(|next| next.is_punct("("));
        let defining = i > 0 && line[i - 1].is_keyword(Keyword::Def);
        if called && !defining && !allowlist.contains(name) && !defined.contains(name) {
            return reject(
                AdmissionKind::DisallowedCall,
                token,
                0,
                format!("Function {name} is not allowed"),
            );
        }
    }

    for (i, token) in line.iter().enumerate() {
        if !token.is_punct(".") {
            continue;
        }
        let qualified = i > 0
            && line[i - 1]
                .name()
                .is_some_and(|prev| QUALIFIERS.contains(&prev));
        if !qualified {
            return reject(
                AdmissionKind::MemberAccess,
                token,
                0,
                "Use of \".\" is not allowed".to_string(),
            );
        }
    }
    Ok(())
}

/// A `def` may not take a name scripts rely on.
fn check_definitions(source: &str, tokens: &[Token], allowlist: &Allowlist) -> Result<(), ScriptError> {
    for pair in tokens.windows(2) {
        if !pair[0].is_keyword(Keyword::Def) {
            continue;
        }
        let Some(name) = pair[1].name() else { continue };
        if allowlist.contains(name) || QUALIFIERS.contains(&name) {
            warn!(line = pair[1].line, name, "script redefines a reserved name");
            return Err(ScriptError::new(
                AdmissionKind::Forbidden,
                source,
                pair[1].line,
                pair[1].column,
                format!("{name} cannot be redefined"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject(source: &str) -> ScriptError {
        validate(source, &Allowlist::default()).unwrap_err()
    }

    #[test]
    fn test_import_is_rejected_at_column_zero() {
        let err = reject("import os\n");
        assert_eq!(err.kind, AdmissionKind::Forbidden);
        assert_eq!((err.line, err.column), (1, 0));
        assert_eq!(err.reason, "import is not allowed");
        assert_eq!(
            err.to_string(),
            "Syntax Error:\nLine 1\nimport os\n^\n    -> import is not allowed"
        );
    }

    #[test]
    fn test_dunder_points_at_underscores() {
        let err = reject("x = 1\ny = x__len\n");
        assert_eq!(err.kind, AdmissionKind::Forbidden);
        assert_eq!((err.line, err.column), (2, 5));
    }

    #[test]
    fn test_forbidden_words_in_comments_and_strings_are_fine() {
        let source = "# import os\nprint(\"from here, try with class\")\n";
        assert!(validate(source, &Allowlist::default()).is_ok());
    }

    #[test]
    fn test_disallowed_call() {
        let err = reject("move(North)\nopen(\"x\")\n");
        assert_eq!(err.kind, AdmissionKind::DisallowedCall);
        assert_eq!((err.line, err.column), (2, 0));
        assert_eq!(err.reason, "Function open is not allowed");
    }

    #[test]
    fn test_defined_functions_may_be_called_before_definition() {
        let source = "go()\ndef go():\n    move(East)\n";
        assert!(validate(source, &Allowlist::default()).is_ok());
    }

    #[test]
    fn test_member_access_only_after_qualifiers() {
        assert!(validate("plant(Entity.BUSH)\ntrade(Item.CARROT_SEED)\n", &Allowlist::default()).is_ok());
        let err = reject("x = [1]\ny = x.real\n");
        assert_eq!(err.kind, AdmissionKind::MemberAccess);
        assert_eq!((err.line, err.column), (2, 5));
        assert_eq!(err.reason, "Use of \".\" is not allowed");
    }

    #[test]
    fn test_forbidden_before_call_before_member() {
        let err = reject("x.y(); open(); import z\n");
        assert_eq!(err.kind, AdmissionKind::Forbidden);
        let err = reject("x.y(); open()\n");
        assert_eq!(err.kind, AdmissionKind::DisallowedCall);
    }

    #[test]
    fn test_first_line_wins() {
        let err = reject("open()\nimport os\n");
        assert_eq!(err.line, 1);
        assert_eq!(err.kind, AdmissionKind::DisallowedCall);
    }

    #[test]
    fn test_scan_runs_before_tokenizer_error_is_reported() {
        let err = reject("import os\nx = '''\n");
        assert_eq!(err.reason, "import is not allowed");
        let err = reject("x = 1\ny = '''doc'''\n");
        assert_eq!(err.kind, AdmissionKind::Forbidden);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_redefining_a_primitive_is_rejected() {
        let err = reject("def move(d):\n    pass\n");
        assert_eq!(err.reason, "move cannot be redefined");
        assert_eq!((err.line, err.column), (1, 4));
    }

    #[test]
    fn test_syntax_error_after_scan() {
        let err = reject("while True\n    harvest()\n");
        assert_eq!(err.kind, AdmissionKind::Syntax);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_custom_allowlist() {
        let mut allowlist = Allowlist::default();
        allowlist.library.remove("till");
        let err = validate("till()\n", &allowlist).unwrap_err();
        assert_eq!(err.kind, AdmissionKind::DisallowedCall);
    }
}
