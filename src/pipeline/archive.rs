//! Per-archive rewrites from replay URIs to raw (banner-free) URIs.

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub domain: String,
    pub search: String,
    pub replacement: String,
}

impl RewriteRule {
    fn matches_host(&self, host: &str) -> bool {
        host == self.domain
            || host
                .strip_suffix(self.domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Archive rewrite table consulted after redirects have been followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRewriteRules {
    rules: Vec<RewriteRule>,
}

impl Default for ArchiveRewriteRules {
    fn default() -> Self {
        let mut rules = Self::empty();
        rules.push("wayback.archive-it.org", "/http", "id_/http");
        rules.push("web.archive.org", "/http", "id_/http");
        rules
    }
}

impl ArchiveRewriteRules {
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds a rule, replacing any existing rule for the same domain.
    pub fn push<S: Into<String>>(&mut self, domain: S, search: S, replacement: S) {
        let rule = RewriteRule {
            domain: domain.into().to_ascii_lowercase(),
            search: search.into(),
            replacement: replacement.into(),
        };
        if let Some(existing) = self.rules.iter_mut().find(|r| r.domain == rule.domain) {
            *existing = rule;
        } else {
            self.rules.push(rule);
        }
    }

    #[must_use]
    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Raw URI for `uri`; unchanged for unknown archives and URIs that are already raw.
    #[must_use]
    pub fn raw_uri(&self, uri: &str) -> String {
        let Some(host) = Url::parse(uri)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
        else {
            return uri.to_string();
        };
        match self.rules.iter().find(|rule| rule.matches_host(&host)) {
            Some(rule) if !uri.contains(&rule.replacement) => {
                uri.replacen(&rule.search, &rule.replacement, 1)
            }
            _ => uri.to_string(),
        }
    }
}
