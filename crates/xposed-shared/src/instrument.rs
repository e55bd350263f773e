//! Syntactic validation of reported instruments.
//!
//! Each [`InstrumentType`] has its own acceptance rule. Validation has no side
//! effects and runs before anything is persisted; a string that does not
//! parse as a known type never reaches this module.

use std::sync::OnceLock;

use regex::Regex;
use url::{Host, Url};

use crate::constants::MAX_INSTRUMENT_LEN;
use crate::types::InstrumentType;

const EMAIL_LOCAL_MAX: usize = 64;
const EMAIL_MAX: usize = 254;
const PHONE_MIN_DIGITS: usize = 7;
const PHONE_MAX_DIGITS: usize = 15;

/// Returns `true` if `instrument` is syntactically valid for `kind`.
pub fn validate(instrument: &str, kind: InstrumentType) -> bool {
    if instrument.len() > MAX_INSTRUMENT_LEN {
        return false;
    }
    match kind {
        InstrumentType::FraudulentEmail => is_email(instrument),
        InstrumentType::FraudulentPhone => is_phone_number(instrument),
        InstrumentType::FraudulentWebsite => is_http_url(instrument),
        InstrumentType::FraudulentBusiness => !instrument.trim().is_empty(),
    }
}

fn email_local_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*$").ok())
        .as_ref()
}

fn domain_label_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").ok())
        .as_ref()
}

fn is_email(candidate: &str) -> bool {
    if candidate.len() > EMAIL_MAX || candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > EMAIL_LOCAL_MAX {
        return false;
    }
    let Some(local_re) = email_local_regex() else {
        return false;
    };
    local_re.is_match(local) && is_fqdn(domain)
}

/// A dotted domain name whose last label is an alphabetic TLD.
fn is_fqdn(domain: &str) -> bool {
    let Some(label_re) = domain_label_regex() else {
        return false;
    };
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|l| label_re.is_match(l)) {
        return false;
    }
    labels
        .last()
        .map(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false)
}

/// Lenient international phone check: optional leading `+`, common
/// separators allowed, 7 to 15 digits.
fn is_phone_number(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let mut digits = 0usize;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return false,
        }
    }
    (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits)
}

/// URL with an explicit http/https scheme and a routable-looking host.
fn is_http_url(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Ok(url) = Url::parse(candidate) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        Some(Host::Domain(domain)) => is_fqdn(domain.trim_end_matches('.')),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        None => false,
    }
}
