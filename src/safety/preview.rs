//! Change preview (spec §4.10).
//!
//! Produces a unified diff per affected file, a naive cross-language
//! import scan to flag dependent files, and a handful of syntax-smell
//! heuristics callers can surface as warnings before approval.

use similar::TextDiff;

const CONTEXT_LINES: usize = 3;
const MAX_PREVIEW_LINES: usize = 50;

#[derive(Debug, Clone)]
pub struct FilePreview {
    pub path: String,
    pub diff: String,
    pub truncated: bool,
    pub potential_issues: Vec<String>,
    pub breaking_change: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChangePreview {
    pub files: Vec<FilePreview>,
    pub affected_dependents: Vec<String>,
}

/// Builds a [`FilePreview`] for one file's old/new content.
pub fn preview_file(path: &str, old: &str, new: &str) -> FilePreview {
    let diff_text = TextDiff::from_lines(old, new);
    let mut lines = Vec::new();
    lines.push(format!("--- a/{path}"));
    lines.push(format!("+++ b/{path}"));

    'hunks: for hunk in diff_text.unified_diff().context_radius(CONTEXT_LINES).iter_hunks() {
        lines.push(hunk.header().to_string());
        for change in hunk.iter_changes() {
            let prefix = match change.tag() {
                similar::ChangeTag::Delete => '-',
                similar::ChangeTag::Insert => '+',
                similar::ChangeTag::Equal => ' ',
            };
            lines.push(format!("{prefix}{}", change.to_string().trim_end_matches('\n')));
            if lines.len() >= MAX_PREVIEW_LINES {
                break 'hunks;
            }
        }
    }

    let truncated = lines.len() > MAX_PREVIEW_LINES;
    lines.truncate(MAX_PREVIEW_LINES);

    let potential_issues = syntax_smells(new);
    let breaking_change = is_breaking_change(old, new);

    FilePreview { path: path.to_string(), diff: lines.join("\n"), truncated, potential_issues, breaking_change }
}

/// Naive import-scan across a handful of common languages, returning any
/// project file whose import/use statements reference `changed_path`.
pub fn affected_dependents(changed_path: &str, project_files: &[(String, String)]) -> Vec<String> {
    let stem = std::path::Path::new(changed_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(changed_path);

    project_files
        .iter()
        .filter(|(path, _)| path != changed_path)
        .filter(|(_, content)| {
            content.lines().any(|line| {
                let trimmed = line.trim_start();
                (trimmed.starts_with("use ")
                    || trimmed.starts_with("import ")
                    || trimmed.starts_with("from ")
                    || trimmed.starts_with("require("))
                    && trimmed.contains(stem)
            })
        })
        .map(|(path, _)| path.clone())
        .collect()
}

fn syntax_smells(content: &str) -> Vec<String> {
    let mut issues = Vec::new();

    let opens = content.matches('{').count();
    let closes = content.matches('}').count();
    if opens != closes {
        issues.push(format!("unbalanced braces: {opens} open vs {closes} close"));
    }

    let parens_open = content.matches('(').count();
    let parens_close = content.matches(')').count();
    if parens_open != parens_close {
        issues.push(format!("unbalanced parentheses: {parens_open} open vs {parens_close} close"));
    }

    if content.contains("TODO") || content.contains("FIXME") {
        issues.push("contains an unresolved TODO/FIXME marker".to_string());
    }

    issues
}

/// Heuristic breaking-change flag: a public function/export signature
/// present in `old` but absent (by name) from `new`.
fn is_breaking_change(old: &str, new: &str) -> bool {
    let old_signatures: Vec<&str> = old
        .lines()
        .filter(|l| l.trim_start().starts_with("pub fn ") || l.trim_start().starts_with("export function "))
        .collect();

    old_signatures.iter().any(|sig| {
        let name = extract_signature_name(sig);
        !name.is_empty() && !new.contains(&name)
    })
}

fn extract_signature_name(signature: &str) -> String {
    let after_fn = signature.split("fn ").nth(1).unwrap_or("");
    after_fn.split(|c: char| c == '(' || c.is_whitespace()).next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_produces_no_diff_hunks() {
        let preview = preview_file("a.rs", "fn main() {}\n", "fn main() {}\n");
        assert_eq!(preview.diff.lines().count(), 2);
    }

    #[test]
    fn unbalanced_braces_are_flagged() {
        let preview = preview_file("a.rs", "", "fn main() {\n");
        assert!(preview.potential_issues.iter().any(|i| i.contains("braces")));
    }

    #[test]
    fn removed_public_function_is_a_breaking_change() {
        let old = "pub fn do_thing() {}\n";
        let new = "fn do_thing() {}\n";
        let preview = preview_file("a.rs", old, new);
        assert!(preview.breaking_change);
    }

    #[test]
    fn affected_dependents_finds_importing_files() {
        let files = vec![("b.rs".to_string(), "use crate::a::thing;\n".to_string()), ("c.rs".to_string(), "fn unrelated() {}\n".to_string())];
        let dependents = affected_dependents("a.rs", &files);
        assert_eq!(dependents, vec!["b.rs".to_string()]);
    }

    #[test]
    fn preview_truncates_at_max_lines() {
        let old = String::new();
        let new: String = (0..200).map(|i| format!("line {i}\n")).collect();
        let preview = preview_file("big.rs", &old, &new);
        assert!(preview.truncated);
        assert!(preview.diff.lines().count() <= MAX_PREVIEW_LINES);
    }
}
