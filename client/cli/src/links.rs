//! Deep links into the web frontend
//!
//! Folder views are addressed by query parameters (`key`, `root`, `path`),
//! so a link can be shared or pasted back into the client.

use reqwest::Url;

use crate::library::Namespace;

/// Decoded value of a query parameter. Relative URLs such as
/// `/manga?key=ROOT_A` are accepted.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => Url::parse("http://localhost/").ok()?.join(url).ok()?,
    };
    parsed
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Link to a folder of a library on the web frontend
pub fn deep_link(base: &str, ns: &Namespace, path: &str) -> anyhow::Result<String> {
    let mut url = Url::parse(base)?.join(ns.kind.as_str())?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("key", &ns.source);
        if !ns.root.is_empty() {
            query.append_pair("root", &ns.root);
        }
        if !path.is_empty() {
            query.append_pair("path", path);
        }
    }
    Ok(url.to_string())
}

/// Streaming URL of a file: `{base}/media/{key}/{root}/{path}`
pub fn media_url(base: &str, ns: &Namespace, path: &str) -> anyhow::Result<String> {
    let mut url = Url::parse(base)?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("server URL cannot be a base: {}", base))?;
        segments.pop_if_empty().push("media").push(&ns.source);
        let parts = ns.root.split('/').chain(path.split('/'));
        segments.extend(parts.filter(|s| !s.is_empty()));
    }
    Ok(url.to_string())
}

/// Namespace and path encoded in a deep link
pub fn parse_deep_link(url: &str) -> anyhow::Result<(Namespace, String)> {
    let key = query_param(url, "key").ok_or_else(|| anyhow::anyhow!("link has no key"))?;
    let root = query_param(url, "root");
    let ns = Namespace::new(&key, root.as_deref())?;
    let path = query_param(url, "path").unwrap_or_default();
    Ok((ns, path))
}
