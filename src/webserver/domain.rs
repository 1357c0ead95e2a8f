//! Domain-name validation and listen-string parsing
//!
//! Shared, dialect-agnostic helpers used by both config bindings and by
//! the vhost-view merge/filter step.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches the invariant of spec.md §3 invariant 2: one or more
/// alphanumeric-or-hyphen labels (not starting/ending with `-`), followed
/// by a final label of at least two letters. Rejects single-label TLDs and
/// IDN by design — preserved from the original source's `isValidDomain`.
static SERVER_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}$").unwrap()
});

/// True if `name` looks like a valid fully-qualified domain name per the
/// specification's server-name filter.
pub fn is_valid_domain(name: &str) -> bool {
    SERVER_NAME_RE.is_match(name)
}

/// A single bound address on a virtual host, as surfaced in the
/// normalized `VirtualHost` view.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Address {
    pub is_ipv6: bool,
    pub host: String,
    pub port: u16,
}

/// Parse an Nginx `listen` directive's arguments (e.g. `80`, `443 ssl`,
/// `127.0.0.1:8080`, `[::]:80`) into an address plus whether `ssl` was
/// present among the trailing flags.
pub fn parse_nginx_listen(args: &[String]) -> Option<(Address, bool)> {
    let endpoint = args.first()?;
    let ssl = args.iter().skip(1).any(|a| a == "ssl");
    let address = parse_endpoint(endpoint)?;
    Some((address, ssl))
}

/// Parse one `host:port` / bare-port / `[ipv6]:port` endpoint string.
fn parse_endpoint(endpoint: &str) -> Option<Address> {
    if let Some(rest) = endpoint.strip_prefix('[') {
        // IPv6 literal: "[::1]:8443" or "[::1]"
        let (host, tail) = rest.split_once(']')?;
        let port = tail
            .strip_prefix(':')
            .map(|p| p.parse().ok())
            .unwrap_or(Some(80))?;
        return Some(Address {
            is_ipv6: true,
            host: host.to_string(),
            port,
        });
    }

    if let Ok(port) = endpoint.parse::<u16>() {
        return Some(Address {
            is_ipv6: false,
            host: String::new(),
            port,
        });
    }

    let (host, port_str) = endpoint.rsplit_once(':')?;
    let port: u16 = port_str.parse().ok()?;
    Some(Address {
        is_ipv6: false,
        host: host.to_string(),
        port,
    })
}

/// Parse an Apache `Listen` directive's first argument, which may be
/// `port`, `ip:port`, or `ip:port proto`. Mirrors the original
/// implementation's string-reversal trick so IPv6 literals (`[::]:port`)
/// come through as a single unit: the string is reversed, split once on
/// `:`, and the tail reversed back to recover the host.
pub fn parse_apache_listen(arg: &str) -> Option<Address> {
    if let Some(rest) = arg.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?.parse().ok()?;
        return Some(Address {
            is_ipv6: true,
            host: host.to_string(),
            port,
        });
    }

    if let Ok(port) = arg.parse::<u16>() {
        return Some(Address {
            is_ipv6: false,
            host: String::new(),
            port,
        });
    }

    let reversed: String = arg.chars().rev().collect();
    let (port_rev, host_rev) = reversed.split_once(':')?;
    let port: u16 = port_rev.chars().rev().collect::<String>().parse().ok()?;
    let host: String = host_rev.chars().rev().collect();
    Some(Address {
        is_ipv6: false,
        host,
        port,
    })
}

/// Render an address back into the shape `ensureSslPortIsListened` writes
/// for a desired `Listen` directive: `ip:port` if a host is present,
/// otherwise the bare port.
pub fn format_apache_listen(address: &Address) -> String {
    if address.host.is_empty() {
        address.port.to_string()
    } else if address.is_ipv6 {
        format!("[{}]:{}", address.host, address.port)
    } else {
        format!("{}:{}", address.host, address.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plausible_domains() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("www.example.co.uk"));
        assert!(is_valid_domain("EXAMPLE.COM"));
    }

    #[test]
    fn rejects_single_label_and_malformed_names() {
        assert!(!is_valid_domain("localhost"));
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("-example.com"));
        assert!(!is_valid_domain("example.c"));
    }

    #[test]
    fn parses_nginx_listen_variants() {
        let (addr, ssl) = parse_nginx_listen(&["80".to_string()]).unwrap();
        assert_eq!(addr.port, 80);
        assert!(!ssl);

        let (addr, ssl) = parse_nginx_listen(&["443".to_string(), "ssl".to_string()]).unwrap();
        assert_eq!(addr.port, 443);
        assert!(ssl);

        let (addr, _) = parse_nginx_listen(&["[::]:80".to_string()]).unwrap();
        assert!(addr.is_ipv6);
        assert_eq!(addr.host, "::");
        assert_eq!(addr.port, 80);

        let (addr, _) = parse_nginx_listen(&["127.0.0.1:8080".to_string()]).unwrap();
        assert_eq!(addr.host, "127.0.0.1");
        assert_eq!(addr.port, 8080);
    }

    #[test]
    fn parses_apache_listen_variants() {
        let addr = parse_apache_listen("80").unwrap();
        assert_eq!(addr.port, 80);
        assert!(addr.host.is_empty());

        let addr = parse_apache_listen("192.168.1.1:443").unwrap();
        assert_eq!(addr.host, "192.168.1.1");
        assert_eq!(addr.port, 443);

        let addr = parse_apache_listen("[::1]:443").unwrap();
        assert!(addr.is_ipv6);
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.port, 443);
    }

    #[test]
    fn formats_apache_listen_back_to_a_directive_argument() {
        let addr = Address {
            is_ipv6: false,
            host: "10.0.0.1".to_string(),
            port: 443,
        };
        assert_eq!(format_apache_listen(&addr), "10.0.0.1:443");

        let bare = Address {
            is_ipv6: false,
            host: String::new(),
            port: 443,
        };
        assert_eq!(format_apache_listen(&bare), "443");
    }
}
