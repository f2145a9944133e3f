//! Alternative delivery URL derivation

use url::Url;

/// Port the media engine serves HLS on by default
pub const MEDIA_ENGINE_PORT: u16 = 8000;

/// Port of a local development delivery server
pub const LOCAL_FALLBACK_PORT: u16 = 8080;

/// Path of a key's playlist on any delivery host
pub fn manifest_path(key: &str) -> String {
    format!("/live/{key}/index.m3u8")
}

/// Ordered list of URLs that may serve `key`'s playlist
///
/// The primary URL always comes first and is kept as given. It is followed
/// by the primary host on the other scheme (http and https swap, default
/// port), then the media engine port and the local fallback port on the
/// primary scheme and host. Duplicates are dropped keeping the first.
///
/// A primary URL without a host yields only itself.
pub fn derive_alternatives(primary: &Url, key: &str) -> Vec<Url> {
    let mut urls = vec![primary.clone()];

    if primary.host_str().is_none() {
        return urls;
    }

    let mut candidates = Vec::with_capacity(3);

    let other_scheme = match primary.scheme() {
        "http" => Some("https"),
        "https" => Some("http"),
        _ => None,
    };
    if let Some(scheme) = other_scheme {
        let mut alt = on_key_path(primary, key);
        if alt.set_scheme(scheme).is_ok() && alt.set_port(None).is_ok() {
            candidates.push(alt);
        }
    }

    for port in [MEDIA_ENGINE_PORT, LOCAL_FALLBACK_PORT] {
        let mut alt = on_key_path(primary, key);
        if alt.set_port(Some(port)).is_ok() {
            candidates.push(alt);
        }
    }

    for candidate in candidates {
        if !urls.contains(&candidate) {
            urls.push(candidate);
        }
    }

    urls
}

fn on_key_path(primary: &Url, key: &str) -> Url {
    let mut url = primary.clone();
    url.set_query(None);
    url.set_fragment(None);
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().extend(["live", key, "index.m3u8"]);
    }
    url
}
