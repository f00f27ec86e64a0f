//! URL patterns for endpoint matching.

use url::Url;

/// URL pattern for matching.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    /// Pattern type.
    pub pattern_type: PatternType,
    /// Pattern string.
    pub pattern: String,
}

/// Type of URL pattern.
#[derive(Debug, Clone, Copy)]
pub enum PatternType {
    /// Exact URL match.
    Exact,
    /// Prefix match.
    Prefix,
    /// Suffix match (e.g., file extension).
    Suffix,
    /// Contains substring (e.g., an API host or endpoint fragment).
    Contains,
}

impl UrlPattern {
    /// Create an exact match pattern.
    pub fn exact(url: &str) -> Self {
        Self {
            pattern_type: PatternType::Exact,
            pattern: url.to_string(),
        }
    }

    /// Create a prefix match pattern.
    pub fn prefix(prefix: &str) -> Self {
        Self {
            pattern_type: PatternType::Prefix,
            pattern: prefix.to_string(),
        }
    }

    /// Create a suffix match pattern.
    pub fn suffix(suffix: &str) -> Self {
        Self {
            pattern_type: PatternType::Suffix,
            pattern: suffix.to_string(),
        }
    }

    /// Create a contains pattern.
    pub fn contains(substring: &str) -> Self {
        Self {
            pattern_type: PatternType::Contains,
            pattern: substring.to_string(),
        }
    }

    /// Check if a URL matches this pattern.
    pub fn matches(&self, url: &Url) -> bool {
        self.matches_str(url.as_str())
    }

    /// Check if a URL string matches this pattern.
    pub fn matches_str(&self, url: &str) -> bool {
        match self.pattern_type {
            PatternType::Exact => url == self.pattern,
            PatternType::Prefix => url.starts_with(&self.pattern),
            PatternType::Suffix => url.ends_with(&self.pattern),
            PatternType::Contains => url.contains(&self.pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_pattern_exact() {
        let pattern = UrlPattern::exact("https://example.com/");
        let url = Url::parse("https://example.com/").unwrap();
        assert!(pattern.matches(&url));

        let url2 = Url::parse("https://example.com/page").unwrap();
        assert!(!pattern.matches(&url2));
    }

    #[test]
    fn test_url_pattern_prefix() {
        let pattern = UrlPattern::prefix("https://example.com/");
        let url = Url::parse("https://example.com/page").unwrap();
        assert!(pattern.matches(&url));
    }

    #[test]
    fn test_url_pattern_suffix() {
        let pattern = UrlPattern::suffix(".css");
        let url = Url::parse("https://example.com/css/main.css").unwrap();
        assert!(pattern.matches(&url));
    }

    #[test]
    fn test_url_pattern_contains() {
        let pattern = UrlPattern::contains("webhook");
        let url = Url::parse("https://n8n.wykr.es/webhook/dashboard-wydatki").unwrap();
        assert!(pattern.matches(&url));

        let other = Url::parse("https://example.com/app.js").unwrap();
        assert!(!pattern.matches(&other));
    }
}
