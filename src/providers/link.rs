//! RFC 8288 `Link` header parsing, as used for REST pagination.

/// One `<url>; rel="..."` entry of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkHeader {
    pub url: String,
    pub rel: String,
}

impl LinkHeader {
    /// Parse every entry of a `Link` header value. Malformed entries are dropped.
    pub fn parse(header: &str) -> Vec<LinkHeader> {
        header.split(',').filter_map(Self::parse_entry).collect()
    }

    fn parse_entry(entry: &str) -> Option<LinkHeader> {
        let mut parts = entry.split(';');
        let url = parts
            .next()?
            .trim()
            .strip_prefix('<')?
            .strip_suffix('>')?
            .to_string();

        let rel = parts.find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim() != "rel" {
                return None;
            }
            Some(value.trim().trim_matches('"').to_string())
        })?;

        Some(LinkHeader { url, rel })
    }
}

/// URL of the `rel="next"` entry, if there is another page.
pub fn next_url(header: &str) -> Option<String> {
    LinkHeader::parse(header)
        .into_iter()
        .find(|link| link.rel.split_whitespace().any(|rel| rel == "next"))
        .map(|link| link.url)
}
