/// Minimal `window.location` model: enough to split hashes and resolve relative links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Location {
    href: String,
}

impl Location {
    pub(crate) fn new(href: &str) -> Self {
        Self {
            href: href.to_string(),
        }
    }

    pub(crate) fn href(&self) -> &str {
        &self.href
    }

    pub(crate) fn hash(&self) -> &str {
        self.href.find('#').map_or("", |pos| &self.href[pos..])
    }

    pub(crate) fn without_hash(&self) -> &str {
        self.href.find('#').map_or(self.href.as_str(), |pos| &self.href[..pos])
    }

    pub(crate) fn with_hash(&self, hash: &str) -> String {
        let hash = hash.trim_start_matches('#');
        if hash.is_empty() {
            self.without_hash().to_string()
        } else {
            format!("{}#{hash}", self.without_hash())
        }
    }

    pub(crate) fn origin(&self) -> &str {
        let Some(scheme_end) = self.href.find("://") else {
            return "";
        };
        let host_start = scheme_end + 3;
        let host_end = self.href[host_start..]
            .find(['/', '?', '#'])
            .map_or(self.href.len(), |pos| host_start + pos);
        &self.href[..host_end]
    }

    fn directory(&self) -> &str {
        let base = self.without_hash();
        let base = base.find('?').map_or(base, |pos| &base[..pos]);
        let origin_len = self.origin().len();
        match base.rfind('/') {
            Some(pos) if pos >= origin_len => &base[..=pos],
            _ => base,
        }
    }

    /// Resolves an `href` against this location.
    pub(crate) fn resolve(&self, href: &str) -> String {
        let href = href.trim();
        if href.contains("://") {
            return href.to_string();
        }
        if let Some(rest) = href.strip_prefix("//") {
            let scheme = self.href.find("://").map_or("https", |pos| &self.href[..pos]);
            return format!("{scheme}://{rest}");
        }
        if href.starts_with('#') {
            return self.with_hash(href);
        }
        if href.starts_with('/') {
            return format!("{}{href}", self.origin());
        }
        let directory = self.directory();
        if directory.ends_with('/') {
            format!("{directory}{href}")
        } else {
            format!("{directory}/{href}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_absolute_and_hash_links() {
        let location = Location::new("https://app.test/docs/index.html?q=1#top");
        assert_eq!(location.origin(), "https://app.test");
        assert_eq!(location.hash(), "#top");
        assert_eq!(location.resolve("page.html"), "https://app.test/docs/page.html");
        assert_eq!(location.resolve("/root.js"), "https://app.test/root.js");
        assert_eq!(location.resolve("#next"), "https://app.test/docs/index.html?q=1#next");
        assert_eq!(location.resolve("//cdn.test/x.js"), "https://cdn.test/x.js");
        assert_eq!(location.resolve("https://other.test/"), "https://other.test/");
    }
}
