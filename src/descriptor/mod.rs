use serde::{Deserialize, Serialize};

use crate::error::SyncError;

pub mod ssr;

pub const CAP_PREFIX: &str = "MAX=";

pub const DEFAULT_ROUTE: &str = "all";
pub const DEFAULT_REMOTE_DNS: &str = "8.8.8.8";

/// One proxy server as announced by a subscription payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Descriptor {
    pub name: String,
    pub host: String,
    pub remote_port: i32,
    pub password: String,
    pub protocol: String,
    pub protocol_param: String,
    pub method: String,
    pub obfs: String,
    pub obfs_param: String,
    pub url_group: String,
    pub route: String,
    pub remote_dns: String,
    pub ipv6: bool,
}

/// Fields that identify "the same server" across two generations of a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerKey {
    host: String,
    remote_port: i32,
    password: String,
    protocol: String,
    method: String,
    obfs: String,
}

impl Descriptor {
    pub fn server_key(&self) -> ServerKey {
        ServerKey {
            host: self.host.clone(),
            remote_port: self.remote_port,
            password: self.password.clone(),
            protocol: self.protocol.clone(),
            method: self.method.clone(),
            obfs: self.obfs.clone(),
        }
    }

    fn apply_routing(&mut self, routing: &Routing) {
        self.route = routing.route.clone();
        self.remote_dns = routing.remote_dns.clone();
        self.ipv6 = routing.ipv6;
    }
}

/// Local routing settings copied onto every parsed descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    pub route: String,
    pub remote_dns: String,
    pub ipv6: bool,
}

impl Default for Routing {
    fn default() -> Self {
        Routing { route: DEFAULT_ROUTE.to_string(), remote_dns: DEFAULT_REMOTE_DNS.to_string(), ipv6: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Routing taken from a template profile; parser defaults when absent.
    pub template: Option<Routing>,
}

impl ParseContext {
    pub fn with_template(routing: Routing) -> Self {
        ParseContext { template: Some(routing) }
    }
}

#[derive(Debug, Clone)]
pub struct Parsed {
    pub descriptors: Vec<Descriptor>,
    pub cap: Option<usize>,
    /// Tokens that looked like descriptors but failed to decode.
    pub skipped: usize,
}

/// Extract every descriptor in `text`, in payload order.
///
/// Malformed tokens are skipped. If the payload contained tokens and none of
/// them decoded, the whole stream is rejected as undecodable; a payload with
/// no tokens at all is simply empty.
pub fn parse(text: &str, ctx: &ParseContext) -> Result<Parsed, SyncError> {
    let routing = ctx.template.clone().unwrap_or_default();
    let mut descriptors = Vec::new();
    let mut skipped = 0usize;
    let mut last_err = None;

    for token in ssr::find_tokens(text) {
        match ssr::decode(token) {
            Ok(mut d) => {
                d.apply_routing(&routing);
                descriptors.push(d);
            }
            Err(e) => {
                skipped += 1;
                last_err = Some(e);
            }
        }
    }

    if descriptors.is_empty() {
        if let Some(e) = last_err {
            return Err(SyncError::Decode(format!("no valid descriptor among {} token(s): {}", skipped, e)));
        }
    }

    Ok(Parsed { descriptors, cap: parse_cap(text), skipped })
}

/// Read the `MAX=` directive from the first line, if present.
///
/// Non-digit characters after the prefix are discarded before parsing. A
/// directive with no digits (or one that overflows) is treated as no cap.
pub fn parse_cap(text: &str) -> Option<usize> {
    let rest = text.strip_prefix(CAP_PREFIX)?;
    let line = rest.lines().next().unwrap_or("");
    let value = line.split(CAP_PREFIX).next().unwrap_or("");
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
