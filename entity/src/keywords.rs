use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Search keywords attached to a policy rule, stored as a JSON array.
///
/// Keywords are kept trimmed, de-duplicated and sorted so that two rules with
/// the same keywords in a different order compare equal and produce the same
/// embedding text.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, FromJsonQueryResult,
)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Keywords(Vec<String>);

impl Keywords {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.into().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();
        Self(keywords)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.0.binary_search_by(|k| k.as_str().cmp(keyword)).is_ok()
    }

    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }
}

impl From<Vec<String>> for Keywords {
    fn from(keywords: Vec<String>) -> Self {
        Self::new(keywords)
    }
}

impl From<Keywords> for Vec<String> {
    fn from(keywords: Keywords) -> Self {
        keywords.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sorts_dedups_and_drops_blank_keywords() {
        let keywords = Keywords::new(["payment", " late fee ", "", "payment", "  "]);
        assert_eq!(keywords.as_slice(), &["late fee".to_string(), "payment".to_string()]);
    }

    #[test]
    fn deserializing_normalizes_keywords() {
        let keywords: Keywords = serde_json::from_str(r#"["b","a","b"]"#).unwrap();
        assert_eq!(keywords, Keywords::new(["a", "b"]));
        assert!(keywords.contains("a"));
        assert!(!keywords.contains("c"));
        assert_eq!(serde_json::to_string(&keywords).unwrap(), r#"["a","b"]"#);
    }
}
