/// Upstream gateway used when neither `--upstream-url` nor
/// `CAICHAT_UPSTREAM_URL` is given
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8787";

/// Normalize a user-supplied upstream URL.
///
/// Adds `https://` when no scheme is given and strips trailing slashes.
pub fn normalize_upstream_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');

    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_upstream_url() {
        assert_eq!(
            normalize_upstream_url("http://localhost:8787/"),
            "http://localhost:8787"
        );
        assert_eq!(
            normalize_upstream_url(" gateway.example.com/api// "),
            "https://gateway.example.com/api"
        );
        assert_eq!(normalize_upstream_url(DEFAULT_UPSTREAM_URL), DEFAULT_UPSTREAM_URL);
    }
}
