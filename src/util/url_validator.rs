use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

/// A feed URL rejected before it is subscribed.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Not a valid URL: {0}")]
    Malformed(#[from] url::ParseError),
    #[error("Feeds must use http or https, got {0}")]
    Scheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("Refusing to subscribe a loopback host")]
    Loopback,
    #[error("Refusing to subscribe a non-public address: {0}")]
    NonPublic(IpAddr),
}

/// Validate a URL before it becomes a feed.
///
/// The scheduler fetches every subscribed URL unattended, so only public
/// http(s) hosts are accepted.
///
/// ```
/// use gleaner::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://example.com/rss").is_ok());
/// assert!(validate_feed_url("http://127.0.0.1/rss").is_err());
/// assert!(validate_feed_url("ftp://example.com/rss").is_err());
/// ```
pub fn validate_feed_url(input: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(input.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::Scheme(url.scheme().to_string()));
    }

    let ip = match url.host().ok_or(UrlValidationError::MissingHost)? {
        Host::Domain(domain) => {
            // The url crate lowercases domains for special schemes
            if domain == "localhost" || domain.ends_with(".localhost") {
                return Err(UrlValidationError::Loopback);
            }
            return Ok(url);
        }
        Host::Ipv4(v4) => IpAddr::V4(v4),
        Host::Ipv6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
    };

    if ip.is_loopback() {
        return Err(UrlValidationError::Loopback);
    }
    let public = match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => is_public_v6(v6),
    };
    if !public {
        return Err(UrlValidationError::NonPublic(ip));
    }

    Ok(url)
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    !(ip.is_private() || ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast())
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    // fc00::/7 unique local, fe80::/10 link-local
    !(ip.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_hosts_pass() {
        for input in [
            "https://example.com/feed.xml",
            "http://news.example.org:8080/rss",
            "  https://example.com/rss  ",
            "http://93.184.216.34/rss",
            "http://[2606:4700::1111]/rss",
        ] {
            assert!(validate_feed_url(input).is_ok(), "{} should pass", input);
        }
    }

    #[test]
    fn test_non_http_schemes() {
        assert!(matches!(
            validate_feed_url("file:///etc/passwd"),
            Err(UrlValidationError::Scheme(s)) if s == "file"
        ));
        assert!(matches!(
            validate_feed_url("ftp://example.com/rss"),
            Err(UrlValidationError::Scheme(_))
        ));
    }

    #[test]
    fn test_loopback_hosts() {
        for input in [
            "http://LOCALHOST/feed",
            "http://feeds.localhost/feed",
            "http://127.0.0.1/feed",
            "http://127.10.0.5:8080/feed",
            "http://[::1]/feed",
            "http://[::ffff:127.0.0.1]/feed",
        ] {
            assert!(
                matches!(validate_feed_url(input), Err(UrlValidationError::Loopback)),
                "{} should be rejected as loopback",
                input
            );
        }
    }

    #[test]
    fn test_non_public_addresses() {
        for input in [
            "http://192.168.1.1/feed",
            "http://10.0.0.1:3000/feed",
            "http://172.16.0.1/feed",
            "http://169.254.1.1/feed",
            "http://0.0.0.0/feed",
            "http://[fe80::1]/feed",
            "http://[fd00::1]/feed",
            "http://[::ffff:10.0.0.1]/feed",
        ] {
            assert!(
                matches!(validate_feed_url(input), Err(UrlValidationError::NonPublic(_))),
                "{} should be rejected as non-public",
                input
            );
        }
    }

    #[test]
    fn test_unparseable_input() {
        assert!(matches!(
            validate_feed_url("not a url"),
            Err(UrlValidationError::Malformed(_))
        ));
        assert!(matches!(
            validate_feed_url("https://"),
            Err(UrlValidationError::Malformed(_))
        ));
    }
}
