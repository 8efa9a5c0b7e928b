use crate::UrlError;
use url::Url;

/// Returns the key identifying the origin server of a URL
///
/// The key is the lowercase host followed by the explicit or default port, so
/// `http://Example.com/` and `http://example.com:80/x` share a key while
/// `https://example.com/` does not.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use trawl::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.com/path").unwrap();
/// assert_eq!(host_key(&url).unwrap(), "example.com:443");
/// ```
pub fn host_key(url: &Url) -> Result<String, UrlError> {
    let host = url
        .host_str()
        .ok_or_else(|| UrlError::MissingHost(url.to_string()))?;

    match url.port_or_known_default() {
        Some(port) => Ok(format!("{}:{}", host.to_lowercase(), port)),
        None => Ok(host.to_lowercase()),
    }
}
