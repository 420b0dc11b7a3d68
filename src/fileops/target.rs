//! File-target resolution (spec §4.9).
//!
//! Resolves a [`crate::intent::UserIntent`]'s entities to concrete project
//! paths: explicit file mentions win outright, otherwise glob patterns
//! derived from technology/function/class/concept entities are matched
//! against the project's file set, falling back to recently touched files
//! when nothing else matches.

use crate::intent::Entities;

#[derive(Debug, Clone)]
pub struct TargetResolution {
    pub targets: Vec<String>,
    pub confidence: f64,
    pub ambiguous_targets: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Maps a recognized technology token to the glob patterns that plausibly
/// identify its files, per spec §4.9's React example.
fn patterns_for_technology(tech: &str) -> Vec<&'static str> {
    match tech {
        "react" => vec!["*.tsx", "*.jsx", "*component*"],
        "vue" => vec!["*.vue"],
        "typescript" => vec!["*.ts", "*.tsx"],
        "javascript" => vec!["*.js", "*.jsx"],
        "rust" => vec!["*.rs"],
        "python" => vec!["*.py"],
        "go" => vec!["*.go"],
        "docker" => vec!["Dockerfile*", "docker-compose*"],
        _ => vec![],
    }
}

fn glob_match(pattern: &str, path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    glob::Pattern::new(pattern)
        .map(|p| p.matches(file_name) || p.matches(path))
        .unwrap_or(false)
}

/// Resolves `entities` against `project_files`, falling back to
/// `recent_files` (top 3, confidence 0.6) when no pattern matches.
pub fn resolve(entities: &Entities, project_files: &[String], recent_files: &[String]) -> TargetResolution {
    if !entities.files.is_empty() {
        let targets: Vec<String> = entities.files.clone();
        return TargetResolution { targets, confidence: 1.0, ambiguous_targets: Vec::new(), suggestions: Vec::new() };
    }

    let mut patterns: Vec<&str> = Vec::new();
    for tech in &entities.technologies {
        patterns.extend(patterns_for_technology(tech));
    }

    let mut matches: Vec<String> = Vec::new();
    for pattern in &patterns {
        for file in project_files {
            if glob_match(pattern, file) && !matches.contains(file) {
                matches.push(file.clone());
            }
        }
    }

    let tokens: Vec<&str> = entities
        .functions
        .iter()
        .chain(entities.classes.iter())
        .chain(entities.concepts.iter())
        .map(|s| s.as_str())
        .collect();
    for token in &tokens {
        let lower = token.to_lowercase();
        for file in project_files {
            if file.to_lowercase().contains(&lower) && !matches.contains(file) {
                matches.push(file.clone());
            }
        }
    }

    if matches.len() == 1 {
        return TargetResolution { targets: matches, confidence: 1.0, ambiguous_targets: Vec::new(), suggestions: Vec::new() };
    }
    if matches.len() > 1 {
        let suggestions = matches.clone();
        return TargetResolution { targets: Vec::new(), confidence: 0.5, ambiguous_targets: matches, suggestions };
    }

    let fallback: Vec<String> = recent_files.iter().take(3).cloned().collect();
    if !fallback.is_empty() {
        return TargetResolution { targets: fallback, confidence: 0.6, ambiguous_targets: Vec::new(), suggestions: Vec::new() };
    }

    TargetResolution { targets: Vec::new(), confidence: 0.0, ambiguous_targets: Vec::new(), suggestions: Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities_with_files(files: &[&str]) -> Entities {
        Entities { files: files.iter().map(|s| s.to_string()).collect(), ..Default::default() }
    }

    #[test]
    fn explicit_file_entities_win_with_full_confidence() {
        let entities = entities_with_files(&["src/main.rs"]);
        let resolution = resolve(&entities, &[], &[]);
        assert_eq!(resolution.targets, vec!["src/main.rs".to_string()]);
        assert_eq!(resolution.confidence, 1.0);
    }

    #[test]
    fn technology_pattern_resolves_a_single_match() {
        let entities = Entities { technologies: vec!["react".to_string()], ..Default::default() };
        let project_files = vec!["src/Button.tsx".to_string(), "README.md".to_string()];
        let resolution = resolve(&entities, &project_files, &[]);
        assert_eq!(resolution.targets, vec!["src/Button.tsx".to_string()]);
    }

    #[test]
    fn multiple_matches_become_ambiguous_with_suggestions() {
        let entities = Entities { technologies: vec!["react".to_string()], ..Default::default() };
        let project_files = vec!["src/Button.tsx".to_string(), "src/Modal.jsx".to_string()];
        let resolution = resolve(&entities, &project_files, &[]);
        assert!(resolution.targets.is_empty());
        assert_eq!(resolution.ambiguous_targets.len(), 2);
        assert_eq!(resolution.suggestions.len(), 2);
    }

    #[test]
    fn falls_back_to_recent_files_at_reduced_confidence() {
        let entities = Entities::default();
        let recent = vec!["a.rs".to_string(), "b.rs".to_string(), "c.rs".to_string(), "d.rs".to_string()];
        let resolution = resolve(&entities, &[], &recent);
        assert_eq!(resolution.targets.len(), 3);
        assert_eq!(resolution.confidence, 0.6);
    }

    #[test]
    fn nothing_matches_and_no_recent_files_yields_zero_confidence() {
        let resolution = resolve(&Entities::default(), &[], &[]);
        assert!(resolution.targets.is_empty());
        assert_eq!(resolution.confidence, 0.0);
    }
}
