//! Code Assembler - merges user code into a problem's program template
//!
//! The user's text is inserted verbatim. Nothing is escaped or checked here;
//! execution safety is entirely the remote judge's concern.

use crate::error::EvaluationError;
use litecode_common::types::CodeTemplate;

/// Placeholder that every complete-code template carries exactly once
pub const USER_CODE_MARKER: &str = "##USER_CODE_HERE##";

/// Build the full program for `language` from the problem's templates
pub fn assemble(
    templates: &[CodeTemplate],
    language: &str,
    user_code: &str,
) -> Result<String, EvaluationError> {
    let template = templates
        .iter()
        .find(|t| t.language == language)
        .ok_or_else(|| EvaluationError::UnsupportedLanguage(language.to_string()))?;

    if !template.code.contains(USER_CODE_MARKER) {
        return Err(EvaluationError::MissingTemplate(language.to_string()));
    }

    Ok(template.code.replacen(USER_CODE_MARKER, user_code, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(language: &str, code: &str) -> CodeTemplate {
        CodeTemplate {
            language: language.to_string(),
            code: code.to_string(),
        }
    }

    #[test]
    fn test_assemble_replaces_marker() {
        let templates = vec![template("cpp", "int f(){##USER_CODE_HERE##}")];
        let source = assemble(&templates, "cpp", "return 1;").unwrap();
        assert_eq!(source, "int f(){return 1;}");
    }

    #[test]
    fn test_assemble_picks_requested_language() {
        let templates = vec![
            template("cpp", "// cpp\n##USER_CODE_HERE##"),
            template("python", "# python\n##USER_CODE_HERE##\nprint(solve())"),
        ];
        let source = assemble(&templates, "python", "def solve():\n    return 2").unwrap();
        assert_eq!(source, "# python\ndef solve():\n    return 2\nprint(solve())");
    }

    #[test]
    fn test_unsupported_language() {
        let templates = vec![template("cpp", "##USER_CODE_HERE##")];
        let err = assemble(&templates, "java", "class A {}").unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedLanguage(ref l) if l == "java"));
    }

    #[test]
    fn test_language_match_is_exact() {
        let templates = vec![template("cpp", "##USER_CODE_HERE##")];
        let err = assemble(&templates, "CPP", "x").unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_missing_marker() {
        let templates = vec![template("cpp", "int main() { return 0; }")];
        let err = assemble(&templates, "cpp", "return 1;").unwrap_err();
        assert!(matches!(err, EvaluationError::MissingTemplate(ref l) if l == "cpp"));
    }

    #[test]
    fn test_user_code_inserted_verbatim() {
        let templates = vec![template("python", "A\n##USER_CODE_HERE##\nB")];
        let code = "print(\"$1 \\n ${x}\")\n##USER_CODE_HERE##";
        let source = assemble(&templates, "python", code).unwrap();
        assert_eq!(source, format!("A\n{}\nB", code));
    }

    #[test]
    fn test_empty_templates() {
        let err = assemble(&[], "cpp", "x").unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedLanguage(_)));
    }
}
