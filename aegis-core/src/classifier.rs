//! Static Threat Classifier
//!
//! Maps a request URL to a threat tier using fixed heuristics: blocked-domain
//! membership, suspicious TLDs, injection markers, hostname shape, tracker
//! keywords, and a reputable-service allow-list. Pure and synchronous; no
//! network access.

use crate::model::ThreatLevel;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// TLDs disproportionately used for throwaway malware hosting
const SUSPICIOUS_TLDS: &[&str] = &[".tk", ".ml", ".ga", ".cf", ".gq", ".xyz", ".top", ".win"];

/// Reputable CDNs and services; a hostname containing one of these is
/// considered safe once the earlier checks have passed
const SAFE_HOST_FRAGMENTS: &[&str] = &[
    "googleapis.com",
    "gstatic.com",
    "cloudflare.com",
    "jsdelivr.net",
    "unpkg.com",
    "cdnjs.cloudflare.com",
    "github.com",
    "githubusercontent.com",
    "wikipedia.org",
    "youtube.com",
    "ytimg.com",
    "amazon",
    "microsoft",
    "apple",
];

/// Ad-impression and beacon markers checked against the full URL
const AD_BEACON_MARKERS: &[&str] = &["impression", "beacon", "/ct?"];

lazy_static! {
    /// Injection markers and threat keywords in the raw URL
    static ref SUSPICIOUS_URL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)eval\(").unwrap(),
        Regex::new(r"(?i)exec\(").unwrap(),
        Regex::new(r"(?i)malware").unwrap(),
        Regex::new(r"(?i)phishing").unwrap(),
        Regex::new(r"(?i)backdoor").unwrap(),
        Regex::new(r"(?i)cmd=").unwrap(),
        Regex::new(r"(?i)shell=").unwrap(),
        Regex::new(r"(?i)exec=").unwrap(),
    ];

    /// Lexical shapes of throwaway/tracker hostnames
    static ref SUSPICIOUS_HOST_PATTERNS: Vec<Regex> = vec![
        // Very long random-looking label before a common TLD
        Regex::new(r"(?i)^[a-z]{12,}\.com$").unwrap(),
        Regex::new(r"(?i)^[a-z]{10,}abauns\.com$").unwrap(),
        // Known shady tracker name fragments
        Regex::new(r"(?i)fleraprt|tzegilo|oucouksirt").unwrap(),
        Regex::new(r"(?i)tracker|adserv|clickserv").unwrap(),
        // Numbered throwaway CDN hosts
        Regex::new(r"(?i)-cdn\d+\.").unwrap(),
    ];
}

/// Classify a request URL against the blocked-domain set and the static
/// heuristics, first match wins.
///
/// A URL that fails to parse classifies as `Safe` (fail open): a parse
/// failure must not silently block legitimate traffic.
pub fn classify(raw_url: &str, blocked_domains: &HashSet<String>) -> ThreatLevel {
    let hostname = match url::Url::parse(raw_url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_lowercase(),
            None => return ThreatLevel::Safe,
        },
        Err(_) => return ThreatLevel::Safe,
    };

    // Blocked domains take precedence over every other heuristic
    if blocked_domains.contains(&hostname) {
        tracing::debug!(host = %hostname, "blocked domain detected");
        return ThreatLevel::Malicious;
    }

    if SUSPICIOUS_TLDS.iter().any(|tld| hostname.ends_with(tld)) {
        return ThreatLevel::Suspicious;
    }

    if SUSPICIOUS_URL_PATTERNS.iter().any(|p| p.is_match(raw_url)) {
        return ThreatLevel::Suspicious;
    }

    if SUSPICIOUS_HOST_PATTERNS.iter().any(|p| p.is_match(&hostname)) {
        tracing::debug!(host = %hostname, "suspicious hostname shape");
        return ThreatLevel::Suspicious;
    }

    // Tracking keywords, unless the host carries a known-safe brand
    if hostname.contains("track") || hostname.contains("analytic") || hostname.contains("pixel") {
        if !hostname.contains("google") && !hostname.contains("cloudflare") {
            return ThreatLevel::Suspicious;
        }
    }

    if SAFE_HOST_FRAGMENTS.iter().any(|d| hostname.contains(d)) {
        return ThreatLevel::Safe;
    }

    if AD_BEACON_MARKERS.iter().any(|m| raw_url.contains(m)) {
        return ThreatLevel::Suspicious;
    }

    ThreatLevel::Safe
}
