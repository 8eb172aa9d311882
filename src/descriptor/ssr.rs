// ssr:// token codec.
//
// Token body (URL-safe base64):
//   host:port:protocol:method:obfs:b64(password)[/?obfsparam=..&protoparam=..&remarks=..&group=..]
// Every query value is itself URL-safe base64.
use std::sync::OnceLock;

use regex::Regex;
use url::form_urlencoded;

use crate::error::SyncError;
use crate::util::b64;

use super::{Descriptor, Routing};

pub const SCHEME: &str = "ssr://";

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)ssr://([A-Za-z0-9_=-]+)").expect("valid ssr token regex"))
}

/// Base64 bodies of every `ssr://` token in `text`, in order of appearance.
pub fn find_tokens(text: &str) -> impl Iterator<Item = &str> {
    token_re().captures_iter(text).filter_map(|c| c.get(1).map(|m| m.as_str()))
}

pub fn decode(body: &str) -> Result<Descriptor, SyncError> {
    let raw = b64::decode_text(body)?;
    let (main, query) = match raw.split_once("/?") {
        Some((m, q)) => (m, Some(q)),
        None => (raw.trim_end_matches('/'), None),
    };

    // host may be an IPv6 literal, so split from the right
    let mut parts = main.rsplitn(6, ':');
    let (Some(pass_b64), Some(obfs), Some(method), Some(protocol), Some(port), Some(host)) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("expected host:port:protocol:method:obfs:password"));
    };

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(malformed("empty host"));
    }
    let remote_port: u16 = port.parse().map_err(|_| malformed("bad port"))?;
    if method.is_empty() {
        return Err(malformed("empty method"));
    }
    let password = b64::decode_text(pass_b64)?;

    let mut d = Descriptor {
        name: String::new(),
        host: host.to_string(),
        remote_port: i32::from(remote_port),
        password,
        protocol: protocol.to_string(),
        protocol_param: String::new(),
        method: method.to_string(),
        obfs: obfs.to_string(),
        obfs_param: String::new(),
        url_group: String::new(),
        route: Routing::default().route,
        remote_dns: Routing::default().remote_dns,
        ipv6: false,
    };

    if let Some(q) = query {
        for (key, value) in form_urlencoded::parse(q.as_bytes()) {
            // a broken optional parameter does not invalidate the server
            let Ok(value) = b64::decode_text(&value) else { continue };
            match &*key {
                "obfsparam" => d.obfs_param = value,
                "protoparam" => d.protocol_param = value,
                "remarks" => d.name = value,
                "group" => d.url_group = value,
                _ => {}
            }
        }
    }

    if d.name.is_empty() {
        d.name = format!("{}:{}", d.host, d.remote_port);
    }
    Ok(d)
}

pub fn encode(d: &Descriptor) -> String {
    let host = if d.host.contains(':') { format!("[{}]", d.host) } else { d.host.clone() };
    let body = format!(
        "{}:{}:{}:{}:{}:{}/?obfsparam={}&protoparam={}&remarks={}&group={}",
        host,
        d.remote_port,
        d.protocol,
        d.method,
        d.obfs,
        b64::encode_text(&d.password),
        b64::encode_text(&d.obfs_param),
        b64::encode_text(&d.protocol_param),
        b64::encode_text(&d.name),
        b64::encode_text(&d.url_group),
    );
    format!("{}{}", SCHEME, b64::encode_text(&body))
}

fn malformed(reason: &str) -> SyncError {
    SyncError::Decode(format!("malformed ssr descriptor: {}", reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(raw: &str) -> String {
        b64::encode_text(raw)
    }

    #[test]
    fn decodes_full_descriptor() {
        let raw = format!(
            "1.2.3.4:8388:auth_aes128_md5:aes-256-cfb:tls1.2_ticket_auth:{}/?obfsparam={}&protoparam={}&remarks={}&group={}",
            b64::encode_text("pa55"),
            b64::encode_text("cdn.example.com"),
            b64::encode_text("32:abc"),
            b64::encode_text("Tokyo 01"),
            b64::encode_text("Acme"),
        );
        let d = decode(&body(&raw)).unwrap();
        assert_eq!(d.host, "1.2.3.4");
        assert_eq!(d.remote_port, 8388);
        assert_eq!(d.protocol, "auth_aes128_md5");
        assert_eq!(d.method, "aes-256-cfb");
        assert_eq!(d.obfs, "tls1.2_ticket_auth");
        assert_eq!(d.password, "pa55");
        assert_eq!(d.obfs_param, "cdn.example.com");
        assert_eq!(d.protocol_param, "32:abc");
        assert_eq!(d.name, "Tokyo 01");
        assert_eq!(d.url_group, "Acme");
    }

    #[test]
    fn missing_params_fall_back() {
        let raw = format!("example.org:443:origin:chacha20:plain:{}", b64::encode_text("pw"));
        let d = decode(&body(&raw)).unwrap();
        assert_eq!(d.name, "example.org:443");
        assert_eq!(d.url_group, "");
        assert_eq!(d.route, "all");
    }

    #[test]
    fn ipv6_host_is_split_from_the_right() {
        let raw = format!("2001:db8::1:443:origin:aes-128-ctr:plain:{}/?group={}", b64::encode_text("pw"), b64::encode_text("v6"));
        let d = decode(&body(&raw)).unwrap();
        assert_eq!(d.host, "2001:db8::1");
        assert_eq!(d.remote_port, 443);
        assert_eq!(d.url_group, "v6");
    }

    #[test]
    fn rejects_bad_port() {
        let raw = format!("h:99999:origin:aes-128-ctr:plain:{}", b64::encode_text("pw"));
        assert!(matches!(decode(&body(&raw)), Err(SyncError::Decode(_))));
    }

    #[test]
    fn encode_then_find_and_decode() {
        let raw = format!("2001:db8::2:8443:origin:rc4-md5:http_simple:{}/?remarks={}&group={}", b64::encode_text("x"), b64::encode_text("n"), b64::encode_text("g"));
        let d = decode(&body(&raw)).unwrap();
        let token = encode(&d);
        let text = format!("junk {token} trailing");
        let bodies: Vec<_> = find_tokens(&text).collect();
        assert_eq!(bodies.len(), 1);
        assert_eq!(decode(bodies[0]).unwrap(), d);
    }

    #[test]
    fn scheme_match_is_case_insensitive() {
        let text = "SSR://YWJj\nssr://ZGVm";
        assert_eq!(find_tokens(text).count(), 2);
    }
}
