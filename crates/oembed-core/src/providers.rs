//! Static provider registry.
//!
//! Known sites are matched against address templates and get their oembed
//! links synthesised without any network call. The registry is loaded once
//! from JSON and never mutated:
//!
//! ```json
//! [
//!   {
//!     "templates": ["youtube\\.com/watch\\?v=([\\w-]+)"],
//!     "links": [
//!       {
//!         "href": "https://www.youtube.com/oembed?url=https%3A//www.youtube.com/watch%3Fv%3D{part1}&format=json",
//!         "type": "application/json+oembed"
//!       }
//!     ]
//!   }
//! ]
//! ```
//!
//! Templates are matched against the address with its `http://`/`https://`
//! prefix removed. The first `{part1}` in an `href` is replaced with the first capture
//! group of the template that matched.

use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;
use url::Url;

use crate::links::{ALTERNATE_REL, OembedLink, OembedType};
use crate::{Error, Result};

/// Placeholder substituted in provider `href` templates.
pub const PLACEHOLDER: &str = "{part1}";

const BUILTIN_PROVIDERS: &str = include_str!("../data/providers.json");

#[derive(Debug, Deserialize)]
struct RawRule {
    templates: Vec<String>,
    links: Vec<ProviderLink>,
}

/// One link template of a provider rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderLink {
    /// Address template containing [`PLACEHOLDER`].
    pub href: String,
    /// Oembed type of the synthesised link.
    #[serde(rename = "type")]
    pub link_type: OembedType,
}

/// A provider: address patterns plus the links to synthesise on a match.
#[derive(Debug, Clone)]
pub struct ProviderRule {
    templates: Vec<Regex>,
    links: Vec<ProviderLink>,
}

impl ProviderRule {
    /// Compile a rule from pattern strings.
    pub fn new<S: AsRef<str>>(templates: &[S], links: Vec<ProviderLink>) -> Result<Self> {
        let templates = templates
            .iter()
            .map(|t| {
                Regex::new(t.as_ref()).map_err(|e| {
                    Error::Config(format!("Invalid provider template '{}': {e}", t.as_ref()))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { templates, links })
    }

    /// The value substituted for [`PLACEHOLDER`] if any template matches.
    ///
    /// Templates are tried in order; the first match wins. A template without
    /// a capture group substitutes the whole match.
    fn capture(&self, address: &str) -> Option<String> {
        self.templates.iter().find_map(|template| {
            let caps = template.captures(address)?;
            let part = caps.get(1).or_else(|| caps.get(0))?;
            Some(part.as_str().to_string())
        })
    }
}

/// Ordered, read-only list of provider rules.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    rules: Vec<ProviderRule>,
}

impl ProviderRegistry {
    /// Registry with no providers; every lookup falls through to the network.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry built from rules already compiled.
    #[must_use]
    pub const fn from_rules(rules: Vec<ProviderRule>) -> Self {
        Self { rules }
    }

    /// The provider table shipped with this crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_PROVIDERS)
    }

    /// Parse a JSON provider list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed JSON, unknown link types, or
    /// templates that are not valid regular expressions.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<RawRule> = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse provider list: {e}")))?;
        let rules = raw
            .into_iter()
            .map(|r| ProviderRule::new(&r.templates, r.links))
            .collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} oembed providers", rules.len());
        Ok(Self { rules })
    }

    /// Read a JSON provider list from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read provider list {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Number of provider rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the registry has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Synthesise oembed links for `page` from the first matching provider.
    ///
    /// Returns `None` when no provider matches (including when the address is
    /// not HTTP(S)), signalling that network discovery is needed. A matching
    /// provider whose substituted `href` is not a valid URL yields no link for
    /// that entry.
    #[must_use]
    pub fn lookup(&self, page: &str) -> Option<Vec<OembedLink>> {
        let address = strip_scheme(page)?;

        self.rules.iter().find_map(|rule| {
            let part = rule.capture(address)?;
            let links = rule
                .links
                .iter()
                .filter_map(|link| {
                    let href = link.href.replacen(PLACEHOLDER, &part, 1);
                    Url::parse(&href).ok().map(|href| OembedLink {
                        href,
                        rel: ALTERNATE_REL.to_string(),
                        link_type: link.link_type,
                    })
                })
                .collect();
            Some(links)
        })
    }
}

fn strip_scheme(page: &str) -> Option<&str> {
    ["https://", "http://"].iter().find_map(|scheme| {
        let prefix = page.as_bytes().get(..scheme.len())?;
        if !prefix.eq_ignore_ascii_case(scheme.as_bytes()) {
            return None;
        }
        // An ASCII prefix match guarantees a char boundary at `scheme.len()`.
        page.get(scheme.len()..)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    const PROVIDERS: &str = r#"[
        {
            "templates": ["^video\\.test/watch/(\\d+)", "^v\\.test/(\\d+)"],
            "links": [
                {"href": "https://video.test/oembed?id={part1}&format=json", "type": "application/json+oembed"},
                {"href": "https://video.test/oembed?id={part1}&format=xml", "type": "text/xml+oembed"}
            ]
        },
        {
            "templates": ["^video\\.test/"],
            "links": [{"href": "https://video.test/generic?u={part1}", "type": "application/json+oembed"}]
        }
    ]"#;

    #[test]
    fn test_lookup_substitutes_first_capture() {
        let registry = ProviderRegistry::from_json(PROVIDERS).unwrap();
        let links = registry.lookup("https://video.test/watch/123").unwrap();

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].href.as_str(), "https://video.test/oembed?id=123&format=json");
        assert_eq!(links[0].rel, "alternate");
        assert_eq!(links[0].link_type, OembedType::Json);
        assert_eq!(links[1].link_type, OembedType::TextXml);
    }

    #[test]
    fn test_matching_is_scheme_agnostic() {
        let registry = ProviderRegistry::from_json(PROVIDERS).unwrap();
        let https = registry.lookup("https://v.test/9").unwrap();
        let http = registry.lookup("HTTP://v.test/9").unwrap();
        assert_eq!(https, http);
        assert_eq!(https[0].href.as_str(), "https://video.test/oembed?id=9&format=json");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let registry = ProviderRegistry::from_json(PROVIDERS).unwrap();
        // Matches only the second rule, which has no capture group.
        let links = registry.lookup("http://video.test/about").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href.as_str(), "https://video.test/generic?u=video.test/");
    }

    #[test]
    fn test_no_match_is_none_not_empty() {
        let registry = ProviderRegistry::from_json(PROVIDERS).unwrap();
        assert_eq!(registry.lookup("https://elsewhere.test/watch/1"), None);
        assert_eq!(registry.lookup("ftp://video.test/watch/1"), None);
        assert_eq!(ProviderRegistry::empty().lookup("https://video.test/watch/1"), None);
    }

    #[test]
    fn test_lookup_tolerates_non_ascii_and_short_addresses() {
        let registry = ProviderRegistry::from_json(PROVIDERS).unwrap();
        for page in ["", "http", "http://", "https:/", "http://é.test/x", "https://é", "httpé://x", "ééééé"] {
            assert_eq!(registry.lookup(page), None, "{page}");
        }

        let idn = ProviderRegistry::from_json(
            r#"[{"templates": ["^é\\.test/(\\w+)"],
                 "links": [{"href": "https://xn--9ca.test/oembed?id={part1}", "type": "application/json+oembed"}]}]"#,
        )
        .unwrap();
        let links = idn.lookup("http://é.test/x").unwrap();
        assert_eq!(links[0].href.as_str(), "https://xn--9ca.test/oembed?id=x");
        assert!(idn.lookup("HTTPS://é.test/y").is_some());
    }

    #[test]
    fn test_invalid_definitions_are_rejected() {
        let bad_regex = r#"[{"templates": ["("], "links": []}]"#;
        assert!(matches!(ProviderRegistry::from_json(bad_regex), Err(Error::Config(_))));

        let bad_type = r#"[{"templates": ["x"], "links": [{"href": "http://x/{part1}", "type": "application/json"}]}]"#;
        assert!(matches!(ProviderRegistry::from_json(bad_type), Err(Error::Config(_))));
    }

    #[test]
    fn test_builtin_registry_loads() {
        let registry = ProviderRegistry::builtin().unwrap();
        assert!(!registry.is_empty());
        let links = registry
            .lookup("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .unwrap();
        assert!(links[0].href.as_str().contains("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PROVIDERS.as_bytes()).unwrap();
        let registry = ProviderRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 2);

        let missing = ProviderRegistry::load(Path::new("/nonexistent/providers.json"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }
}
