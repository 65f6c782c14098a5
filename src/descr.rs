// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Router-port description conventions.
//!
//! Network operators document what a routed port connects to in its
//! interface alias. Two conventions are recognised:
//!
//! - **NTNU**: a leading network type followed by comma-separated fields
//!   - `lan|core|static,<org>,<usage>[,<comment>][,<vlan#>]`
//!   - `link,<to-router>[,<comment>][,<vlan#>]`
//!   - `elink,<to-router>,<to-org>[,<comment>][,<vlan#>]`
//! - **UNINETT**: `<comment>,<netident>`
//!
//! Parsers return `None` when the description does not follow their
//! convention; callers try the configured conventions in order.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::DescriptionConvention;

static NTNU_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(lan|core|static|link|elink)\s*,(.*)$").expect("valid NTNU pattern")
});

static UNINETT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+?)\s*,\s*([^,]+?)\s*$").expect("valid UNINETT pattern")
});

/// Fields parsed out of a router-port description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortDescription {
    pub net_type: Option<String>,
    pub net_ident: Option<String>,
    pub organization: Option<String>,
    pub usage: Option<String>,
    pub comment: Option<String>,
    pub vlan: Option<i64>,
}

/// Parse with the first matching convention from `conventions`.
#[must_use]
pub fn parse(
    conventions: &[DescriptionConvention],
    sysname: &str,
    description: &str,
) -> Option<PortDescription> {
    conventions.iter().find_map(|convention| match convention {
        DescriptionConvention::Ntnu => parse_ntnu_convention(sysname, description),
        DescriptionConvention::Uninett => parse_uninett_convention(sysname, description),
    })
}

/// NTNU router-port convention.
///
/// ```
/// use inventory_sync::descr::parse_ntnu_convention;
///
/// let parsed = parse_ntnu_convention("gw1", "link,gw2,backbone").unwrap();
/// assert_eq!(parsed.net_type.as_deref(), Some("link"));
/// assert_eq!(parsed.net_ident.as_deref(), Some("gw1,gw2"));
/// assert_eq!(parsed.comment.as_deref(), Some("backbone"));
/// ```
#[must_use]
pub fn parse_ntnu_convention(sysname: &str, description: &str) -> Option<PortDescription> {
    let caps = NTNU_PATTERN.captures(description)?;
    let net_type = caps[1].to_ascii_lowercase();
    let mut fields: Vec<&str> = caps[2].split(',').map(str::trim).collect();

    let required = match net_type.as_str() {
        "link" => 1,
        _ => 2,
    };
    if fields.len() < required || fields[..required].iter().any(|f| f.is_empty()) {
        return None;
    }

    let mut vlan = None;
    if fields.len() > required {
        if let Some(n) = fields.last().and_then(|last| parse_vlan(last)) {
            vlan = Some(n);
            fields.pop();
        }
    }
    let rest: Vec<&str> = fields[required..].iter().copied().filter(|f| !f.is_empty()).collect();
    let comment = (!rest.is_empty()).then(|| rest.join(","));

    let mut parsed = PortDescription {
        net_type: Some(net_type.clone()),
        comment,
        vlan,
        ..Default::default()
    };
    match net_type.as_str() {
        "link" => {
            parsed.net_ident = Some(format!("{},{}", sysname, fields[0]));
        }
        "elink" => {
            parsed.net_ident = Some(fields[0].to_string());
            parsed.organization = Some(fields[1].to_string());
        }
        _ => {
            let mut ident = format!("{},{}", fields[0], fields[1]);
            if let Some(comment) = &parsed.comment {
                ident.push(',');
                ident.push_str(comment);
            }
            parsed.net_ident = Some(ident);
            parsed.organization = Some(fields[0].to_string());
            parsed.usage = Some(fields[1].to_string());
        }
    }
    Some(parsed)
}

/// UNINETT router-port convention: the last comma-separated token is the
/// network identifier, everything before it is a free-text comment.
#[must_use]
pub fn parse_uninett_convention(_sysname: &str, description: &str) -> Option<PortDescription> {
    let caps = UNINETT_PATTERN.captures(description)?;
    let comment = caps[1].trim();
    let net_ident = caps[2].trim();
    if comment.is_empty() || net_ident.is_empty() {
        return None;
    }
    Some(PortDescription {
        net_ident: Some(net_ident.to_string()),
        comment: Some(comment.to_string()),
        ..Default::default()
    })
}

fn parse_vlan(token: &str) -> Option<i64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
