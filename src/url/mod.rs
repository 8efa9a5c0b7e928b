//! URL helpers
//!
//! Resolution of followed values against the page they were found on, and the
//! per-host keys shared by the pacing table and the robots cache.

mod domain;

pub use domain::host_key;

use crate::UrlError;
use url::Url;

/// Path of the robots policy document
pub const ROBOTS_TXT_PATH: &str = "/robots.txt";

/// Resolves `raw` against `base`
///
/// Absolute values replace the base entirely; relative ones are joined the way
/// a browser resolves a link found on the page at `base`. Surrounding
/// whitespace is ignored.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use trawl::url::resolve;
///
/// let base = Url::parse("https://ex.test/dir/page").unwrap();
/// assert_eq!(resolve(&base, "/a").unwrap().as_str(), "https://ex.test/a");
/// assert_eq!(resolve(&base, "b").unwrap().as_str(), "https://ex.test/dir/b");
/// ```
pub fn resolve(base: &Url, raw: &str) -> Result<Url, UrlError> {
    Ok(base.join(raw.trim())?)
}

/// Returns the robots policy URL for the origin of `url`
pub fn robots_url(url: &Url) -> Url {
    let mut robots = url.clone();
    robots.set_path(ROBOTS_TXT_PATH);
    robots.set_query(None);
    robots.set_fragment(None);
    robots
}

/// Returns true if `url` points at the robots policy document itself
pub fn is_robots_url(url: &Url) -> bool {
    url.path() == ROBOTS_TXT_PATH
}
