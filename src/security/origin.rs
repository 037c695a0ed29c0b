//! Origin and Referer validation.

use url::Url;

/// Canonical `scheme://host[:port]` origin of an http(s) URL.
pub fn canonical_origin(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url.origin().ascii_serialization()),
        _ => None,
    }
}

/// Which origins may issue mutating requests.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    app_origin: String,
    production: bool,
    development_origins: Vec<String>,
    trusted_suffixes: Vec<String>,
}

impl OriginPolicy {
    pub fn new(
        app_url: &str,
        production: bool,
        development_origins: &[String],
        trusted_suffixes: &[String],
    ) -> crate::Result<Self> {
        let app_origin = canonical_origin(app_url)
            .ok_or_else(|| crate::Error::Config(format!("app url {app_url:?} is not http(s)")))?;
        Ok(Self {
            app_origin,
            production,
            development_origins: development_origins
                .iter()
                .filter_map(|o| canonical_origin(o))
                .collect(),
            trusted_suffixes: trusted_suffixes
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    /// Validate the Origin header, falling back to the Referer's origin.
    ///
    /// A request carrying neither is allowed: same-site navigations may omit
    /// both, and the session cookie's `SameSite=Strict` covers cross-site.
    pub fn is_valid_origin(&self, origin: Option<&str>, referer: Option<&str>) -> bool {
        let origin = origin.map(str::trim).filter(|o| !o.is_empty());
        let referer = referer.map(str::trim).filter(|r| !r.is_empty());

        match (origin, referer) {
            (Some(origin), _) => self.is_trusted(origin),
            (None, Some(referer)) => self.is_trusted(referer),
            (None, None) => true,
        }
    }

    fn is_trusted(&self, raw: &str) -> bool {
        let Some(origin) = canonical_origin(raw) else {
            return false;
        };

        if origin == self.app_origin {
            return true;
        }
        if !self.production && self.development_origins.iter().any(|o| *o == origin) {
            return true;
        }
        self.matches_preview_suffix(&origin)
    }

    fn matches_preview_suffix(&self, origin: &str) -> bool {
        if self.trusted_suffixes.is_empty() {
            return false;
        }
        let Ok(url) = Url::parse(origin) else {
            return false;
        };
        if url.scheme() != "https" {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.trusted_suffixes.iter().any(|suffix| {
            let suffix = suffix.trim_start_matches('.');
            host.len() > suffix.len()
                && host.ends_with(suffix)
                && host.as_bytes()[host.len() - suffix.len() - 1] == b'.'
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(production: bool) -> OriginPolicy {
        OriginPolicy::new(
            "https://app.example.com/dashboard",
            production,
            &["http://localhost:3000".to_string()],
            &["preview.example.dev".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_canonical_origin() {
        assert_eq!(
            canonical_origin("https://app.example.com/a/b?c=1").as_deref(),
            Some("https://app.example.com")
        );
        assert_eq!(
            canonical_origin("http://localhost:3000/").as_deref(),
            Some("http://localhost:3000")
        );
        assert_eq!(canonical_origin("ftp://x.example.com"), None);
        assert_eq!(canonical_origin("not a url"), None);
    }

    #[test]
    fn test_exact_origin_match() {
        let p = policy(true);
        assert!(p.is_valid_origin(Some("https://app.example.com"), None));
        assert!(!p.is_valid_origin(Some("https://evil.example.com"), None));
        assert!(!p.is_valid_origin(Some("http://app.example.com"), None));
    }

    #[test]
    fn test_origin_takes_precedence_over_referer() {
        let p = policy(true);
        assert!(!p.is_valid_origin(
            Some("https://evil.example.com"),
            Some("https://app.example.com/page")
        ));
    }

    #[test]
    fn test_referer_fallback() {
        let p = policy(true);
        assert!(p.is_valid_origin(None, Some("https://app.example.com/settings")));
        assert!(!p.is_valid_origin(None, Some("https://evil.example.com/x")));
    }

    #[test]
    fn test_neither_header_is_allowed() {
        assert!(policy(true).is_valid_origin(None, None));
        assert!(policy(true).is_valid_origin(Some(""), Some("  ")));
    }

    #[test]
    fn test_development_origins_only_outside_production() {
        assert!(policy(false).is_valid_origin(Some("http://localhost:3000"), None));
        assert!(!policy(true).is_valid_origin(Some("http://localhost:3000"), None));
    }

    #[test]
    fn test_preview_suffix() {
        let p = policy(true);
        assert!(p.is_valid_origin(Some("https://pr-12.preview.example.dev"), None));
        assert!(!p.is_valid_origin(Some("https://evilpreview.example.dev"), None));
        assert!(!p.is_valid_origin(Some("https://preview.example.dev.evil.com"), None));
        assert!(!p.is_valid_origin(Some("http://pr-12.preview.example.dev"), None));
    }

    #[test]
    fn test_unparseable_origin_rejected() {
        assert!(!policy(false).is_valid_origin(Some("null"), None));
    }
}
