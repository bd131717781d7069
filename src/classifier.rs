//! Weighted keyword classifier that assigns every article one category.
//!
//! The rules are data, loaded from YAML (see `config/categories.yaml`, which
//! is embedded as the default). Each category contributes
//!
//! ```text
//! score = title_hits * weight * 2 + content_hits * weight
//! ```
//!
//! where a "hit" is a keyword occurring anywhere in the lowercased text. A
//! positive score is then reduced by `priority * 0.1`, which only breaks
//! near-ties: a lower-priority category with enough extra hits still wins.
//! Matching is plain substring search with no tokenization or stemming.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Rule table shipped with the binary.
pub const DEFAULT_RULES: &str = include_str!("../config/categories.yaml");

const PRIORITY_STEP: f64 = 0.1;
const TITLE_MULTIPLIER: f64 = 2.0;

/// Keywords and weights for one category.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryRule {
    pub name: String,
    /// Lower is preferred on near-ties.
    pub priority: f64,
    /// Score per keyword hit.
    pub weight: f64,
    #[serde(default)]
    pub title_keywords: Vec<String>,
    #[serde(default)]
    pub content_keywords: Vec<String>,
}

/// The full rule table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierRules {
    /// Returned when no category scores above zero.
    pub default_category: String,
    pub categories: Vec<CategoryRule>,
}

impl ClassifierRules {
    /// The embedded default table.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(DEFAULT_RULES)
    }

    /// Read and validate a rule table from disk.
    #[instrument(level = "info")]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let rules = Self::from_yaml(&yaml)?;
        info!(categories = rules.categories.len(), "Loaded classifier rules");
        Ok(rules)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let rules: Self = serde_yaml::from_str(yaml)?;
        rules.validate()?;
        Ok(rules)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid("no categories defined".to_string()));
        }

        let mut names = HashSet::new();
        for rule in &self.categories {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::Invalid("category with empty name".to_string()));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate category {:?}",
                    rule.name
                )));
            }
        }

        if !names.contains(self.default_category.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "default category {:?} is not one of the categories",
                self.default_category
            )));
        }
        Ok(())
    }
}

/// Scores articles against a validated [`ClassifierRules`] table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: ClassifierRules,
}

impl Classifier {
    /// Keywords are lowercased once here so scoring only lowercases the article.
    pub fn new(mut rules: ClassifierRules) -> Self {
        for rule in &mut rules.categories {
            for keyword in rule
                .title_keywords
                .iter_mut()
                .chain(rule.content_keywords.iter_mut())
            {
                *keyword = keyword.to_lowercase();
            }
        }
        Self { rules }
    }

    /// Every label [`Classifier::classify`] can return.
    pub fn taxonomy(&self) -> impl Iterator<Item = &str> {
        self.rules.categories.iter().map(|rule| rule.name.as_str())
    }

    pub fn default_category(&self) -> &str {
        &self.rules.default_category
    }

    /// Pick the best category for an article's title and plain-text body.
    pub fn classify(&self, title: &str, text: &str) -> &str {
        let title = title.to_lowercase();
        let text = text.to_lowercase();

        let mut best: Option<(&str, f64)> = None;
        for rule in &self.rules.categories {
            let Some(score) = adjusted_score(rule, &title, &text) else {
                continue;
            };
            // Strictly greater, so the earlier category keeps an exact tie.
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((rule.name.as_str(), score));
            }
        }

        match best {
            Some((name, score)) => {
                debug!(category = name, score, "Classified article");
                name
            }
            None => {
                debug!(category = %self.rules.default_category, "No category matched; using default");
                &self.rules.default_category
            }
        }
    }
}

fn count_hits(keywords: &[String], haystack: &str) -> usize {
    keywords
        .iter()
        .filter(|keyword| haystack.contains(keyword.as_str()))
        .count()
}

/// `None` when the category has no hits at all.
fn adjusted_score(rule: &CategoryRule, title: &str, text: &str) -> Option<f64> {
    let title_hits = count_hits(&rule.title_keywords, title) as f64;
    let content_hits = count_hits(&rule.content_keywords, text) as f64;
    let score = title_hits * rule.weight * TITLE_MULTIPLIER + content_hits * rule.weight;

    if score > 0.0 {
        Some(score - rule.priority * PRIORITY_STEP)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin_classifier() -> Classifier {
        Classifier::new(ClassifierRules::builtin().unwrap())
    }

    const TWO_RULES: &str = r#"
default_category: other
categories:
  - name: alpha
    priority: 1
    weight: 1
    title_keywords: [alpha]
  - name: beta
    priority: 2
    weight: 1
    title_keywords: [ALPHA, beta]
  - name: other
    priority: 3
    weight: 1
"#;

    #[test]
    fn test_builtin_rules_are_valid() {
        let classifier = builtin_classifier();
        assert_eq!(classifier.default_category(), "events");
        assert_eq!(classifier.taxonomy().count(), 11);
    }

    #[test]
    fn test_greeting_title_wins() {
        let classifier = builtin_classifier();
        assert_eq!(
            classifier.classify("Вітаємо з днем народження!", "Бажаємо здоров'я"),
            "greetings"
        );
    }

    #[test]
    fn test_content_keywords_count() {
        let classifier = builtin_classifier();
        assert_eq!(
            classifier.classify(
                "Новини тижня",
                "Спортсмени вибороли золото та бронзу, зайнявши перше місце у командному заліку."
            ),
            "achievements"
        );
    }

    #[test]
    fn test_no_match_returns_default() {
        let classifier = builtin_classifier();
        assert_eq!(classifier.classify("", ""), "events");
        assert_eq!(classifier.classify("Lorem ipsum", "dolor sit amet"), "events");
    }

    #[test]
    fn test_result_is_always_in_taxonomy() {
        let classifier = builtin_classifier();
        let taxonomy: HashSet<&str> = classifier.taxonomy().collect();
        for (title, text) in [
            ("Кубок України", "змагання серед юніорів"),
            ("Інтерв'ю з тренером", "розмова про підготовку"),
            ("Рішення виконкому", "затверджено регламент"),
            ("???", ""),
            ("Партнерство", "спонсор турніру"),
        ] {
            let category = classifier.classify(title, text);
            assert!(!category.is_empty());
            assert!(taxonomy.contains(category), "{category} not in taxonomy");
        }
    }

    #[test]
    fn test_priority_breaks_ties_only() {
        let classifier = Classifier::new(ClassifierRules::from_yaml(TWO_RULES).unwrap());
        // Same raw score: alpha's better priority wins.
        assert_eq!(classifier.classify("Alpha", ""), "alpha");
        // More hits beat priority.
        assert_eq!(classifier.classify("alpha beta", ""), "beta");
        assert_eq!(classifier.classify("gamma", ""), "other");
    }

    #[test]
    fn test_exact_tie_keeps_earlier_category() {
        let yaml = r#"
default_category: first
categories:
  - name: first
    priority: 1
    weight: 1
    content_keywords: [kumite]
  - name: second
    priority: 1
    weight: 1
    content_keywords: [kumite]
"#;
        let classifier = Classifier::new(ClassifierRules::from_yaml(yaml).unwrap());
        assert_eq!(classifier.classify("", "kumite"), "first");
    }

    #[test]
    fn test_validation_rejects_unknown_default() {
        let yaml = "default_category: nope\ncategories:\n  - {name: a, priority: 1, weight: 1}\n";
        assert!(matches!(
            ClassifierRules::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validation_rejects_duplicates_and_empty() {
        let dup = "default_category: a\ncategories:\n  - {name: a, priority: 1, weight: 1}\n  - {name: a, priority: 2, weight: 1}\n";
        assert!(matches!(ClassifierRules::from_yaml(dup), Err(ConfigError::Invalid(_))));

        let empty = "default_category: a\ncategories: []\n";
        assert!(matches!(ClassifierRules::from_yaml(empty), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        assert!(matches!(
            ClassifierRules::from_yaml("categories: [unterminated"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yaml");
        std::fs::write(&path, TWO_RULES).unwrap();
        let rules = ClassifierRules::load(&path).unwrap();
        assert_eq!(rules.categories.len(), 3);

        let missing = ClassifierRules::load(&dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
