//! Skill normalizer
//!
//! Turns raw skill strings into comparable tokens: lower-case, trimmed,
//! punctuation stripped, synonyms folded. Pure and total; `normalize` of a
//! token returns the same token.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

use crate::types::SkillToken;

/// Separators that become spaces ("machine-learning" -> "machine learning")
static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_/\\|,;]+").unwrap());

/// Anything that is not a letter, digit, whitespace, `+` or `#`
static RE_PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s+#]+").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Alias -> canonical token. Fixed for the life of the process.
static SYNONYMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let table: &[(&str, &[&str])] = &[
        ("machine learning", &["ml", "machinelearning"]),
        ("artificial intelligence", &["ai", "a i"]),
        ("deep learning", &["dl", "deeplearning"]),
        ("natural language processing", &["nlp"]),
        ("data science", &["datascience", "ds"]),
        ("javascript", &["js", "java script", "ecmascript", "es6"]),
        ("typescript", &["ts", "type script"]),
        ("nodejs", &["node js", "node.js", "node"]),
        ("react", &["reactjs", "react js", "react.js"]),
        ("python", &["py", "python3", "python 3"]),
        ("golang", &["go", "go lang"]),
        ("cpp", &["c++", "cplusplus"]),
        ("csharp", &["c#", "c sharp"]),
        ("postgresql", &["postgres", "psql", "postgre sql"]),
        ("mongodb", &["mongo", "mongo db"]),
        ("kubernetes", &["k8s", "kube"]),
        ("aws", &["amazon web services"]),
        ("gcp", &["google cloud", "google cloud platform"]),
        ("fastapi", &["fast api"]),
        ("communication", &["communication skills", "communications"]),
        ("teamwork", &["team work", "team player"]),
        ("leadership", &["team leadership", "leading teams"]),
    ];

    let mut map = HashMap::new();
    for (canonical, aliases) in table {
        for alias in *aliases {
            map.insert(*alias, *canonical);
        }
    }
    map
});

fn fold(key: &str) -> Option<&'static str> {
    SYNONYMS.get(key).copied()
}

/// Normalize a single raw skill string
pub fn normalize(raw: &str) -> SkillToken {
    let lowered = RE_WHITESPACE
        .replace_all(raw.trim(), " ")
        .to_lowercase();

    // Aliases with punctuation ("node.js", "c++") are matched before stripping
    if let Some(canonical) = fold(&lowered) {
        return SkillToken::from_normalized(canonical.to_string());
    }

    let separated = RE_SEPARATORS.replace_all(&lowered, " ");
    let stripped = RE_PUNCTUATION.replace_all(&separated, "");
    let cleaned = RE_WHITESPACE.replace_all(stripped.trim(), " ").into_owned();

    match fold(&cleaned) {
        Some(canonical) => SkillToken::from_normalized(canonical.to_string()),
        None => SkillToken::from_normalized(cleaned),
    }
}

/// Normalize and deduplicate. Inputs that normalize to nothing are dropped.
pub fn normalize_set<I, S>(raw_skills: I) -> BTreeSet<SkillToken>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw_skills
        .into_iter()
        .map(|s| normalize(s.as_ref()))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_normalization() {
        assert_eq!(normalize("  Python  ").as_str(), "python");
        assert_eq!(normalize("Machine-Learning").as_str(), "machine learning");
        assert_eq!(normalize("Data   Science!").as_str(), "data science");
        assert_eq!(normalize("Rust").as_str(), "rust");
    }

    #[test]
    fn test_synonym_folding() {
        assert_eq!(normalize("ML").as_str(), "machine learning");
        assert_eq!(normalize("AI").as_str(), "artificial intelligence");
        assert_eq!(normalize("Node.js").as_str(), "nodejs");
        assert_eq!(normalize("C++").as_str(), "cpp");
        assert_eq!(normalize("c#").as_str(), "csharp");
        assert_eq!(normalize("K8s").as_str(), "kubernetes");
    }

    #[test]
    fn test_unknown_passes_through() {
        assert_eq!(normalize("Quantum Basket Weaving").as_str(), "quantum basket weaving");
        assert_eq!(normalize("F#").as_str(), "f#");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "ML", "  Node.JS ", "C++", "machine_learning", "Go", "Über-Skill!!",
            "React.js", "python 3", "", "!!!", "a/b\\c", "Team Player",
        ];
        for raw in inputs {
            let once = normalize(raw);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
        for (alias, canonical) in SYNONYMS.iter() {
            let token = normalize(alias);
            assert_eq!(token.as_str(), *canonical);
            assert_eq!(normalize(canonical).as_str(), *canonical, "canonical {} must be stable", canonical);
        }
    }

    #[test]
    fn test_normalize_set_dedups_and_drops_empty() {
        let set = normalize_set(["Python", "python ", "PY", "!!!", "", "SQL"]);
        let tokens: Vec<&str> = set.iter().map(|t| t.as_str()).collect();
        assert_eq!(tokens, vec!["python", "sql"]);
    }

    #[test]
    fn test_malformed_input_is_total() {
        let token = normalize("\u{0}\u{7}<script>");
        assert_eq!(token.as_str(), "script");
        assert!(normalize("   ").is_empty());
    }
}
