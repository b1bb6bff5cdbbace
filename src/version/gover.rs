//! Go toolchain version ordering.
//!
//! Versions look like `1.21.0`, `1.21rc2`, `1.20beta1`, `1.4`. Ordering is
//! numeric per component. Before 1.21 a missing patch means `.0`; from 1.21
//! on `1.21` names the language version and sorts before its pre-releases.

use std::cmp::Ordering;

#[derive(Debug, Default, PartialEq, Eq)]
struct Parsed<'a> {
    major: &'a str,
    minor: &'a str,
    patch: &'a str,
    kind: &'a str,
    pre: &'a str,
}

/// Compares two version strings with or without the `go` prefix.
pub fn compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let a = parse(strip_go(a));
    let b = parse(strip_go(b));

    cmp_int(a.major, b.major)
        .then_with(|| cmp_int(a.minor, b.minor))
        .then_with(|| cmp_int(a.patch, b.patch))
        .then_with(|| a.kind.cmp(b.kind))
        .then_with(|| cmp_int(a.pre, b.pre))
}

pub fn strip_go(v: &str) -> &str {
    v.strip_prefix("go").unwrap_or(v)
}

/// Parses `x`; anything malformed becomes the all-empty (lowest) version.
fn parse(x: &str) -> Parsed<'_> {
    try_parse(x).unwrap_or_default()
}

fn try_parse(x: &str) -> Option<Parsed<'_>> {
    let mut v = Parsed::default();

    let (major, rest) = cut_int(x)?;
    v.major = major;
    if rest.is_empty() {
        v.minor = "0";
        v.patch = "0";
        return Some(v);
    }

    let rest = rest.strip_prefix('.')?;
    let (minor, rest) = cut_int(rest)?;
    v.minor = minor;
    if rest.is_empty() {
        if cmp_int(minor, "21") == Ordering::Less {
            v.patch = "0";
        }
        return Some(v);
    }

    if let Some(rest) = rest.strip_prefix('.') {
        let (patch, rest) = cut_int(rest)?;
        // Pre-releases of patch releases do not exist.
        if !rest.is_empty() {
            return None;
        }
        v.patch = patch;
        return Some(v);
    }

    let kind_len = rest.bytes().take_while(|b| !b.is_ascii_digit()).count();
    if kind_len == 0 || !rest[..kind_len].bytes().all(|b| b.is_ascii_lowercase()) {
        return None;
    }
    v.kind = &rest[..kind_len];
    let rest = &rest[kind_len..];
    if rest.is_empty() {
        return Some(v);
    }
    let (pre, rest) = cut_int(rest)?;
    if !rest.is_empty() {
        return None;
    }
    v.pre = pre;
    Some(v)
}

/// Splits a leading decimal number without leading zeros off `x`.
fn cut_int(x: &str) -> Option<(&str, &str)> {
    let n = x.bytes().take_while(u8::is_ascii_digit).count();
    if n == 0 || (x.starts_with('0') && n != 1) {
        return None;
    }
    Some(x.split_at(n))
}

/// Compares decimal strings by value; the empty string is below `0`.
fn cmp_int(x: &str, y: &str) -> Ordering {
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}
