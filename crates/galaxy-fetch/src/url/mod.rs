//! URL composition
//!
//! String-level helpers used to build the final request URL: protocol
//! detection, trailing slash handling, path joining, base URL resolution and
//! query merging. Inputs are not required to be absolute URLs, so these work on
//! plain strings rather than [`url::Url`].

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

mod query;

pub use query::{
    decode, decode_query_component, encode_query_item, encode_query_key, encode_query_value,
    parse_query, stringify_query, Query, QueryValue,
};

static PROTOCOL_STRICT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\sA-Za-z0-9_\x00+.-]{2,}:[/\\]{1,2}").expect("valid protocol regex")
});
static PROTOCOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\sA-Za-z0-9_\x00+.-]{2,}:([/\\]{2})?").expect("valid protocol regex")
});
static PROTOCOL_RELATIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([/\\]\s*){2,}[^/\\]").expect("valid protocol regex"));
static SPECIAL_PROTOCOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[\s\x00]*(blob:|data:|javascript:|vbscript:)(.*)")
        .expect("valid special protocol regex")
});
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\s\x00]*([A-Za-z0-9_+.-]{2,}:)?//([^/@]+@)?(.*)").expect("valid url regex")
});

/// Protocol detection switches
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolOptions {
    /// Also accept protocol-relative URLs (`//host/path`)
    pub accept_relative: bool,
    /// Require one or two slashes after the scheme
    pub strict: bool,
}

/// Whether `input` starts with a protocol (`scheme:`, `scheme://`)
pub fn has_protocol(input: &str, opts: ProtocolOptions) -> bool {
    if opts.strict {
        return PROTOCOL_STRICT_RE.is_match(input);
    }
    PROTOCOL_RE.is_match(input) || (opts.accept_relative && PROTOCOL_RELATIVE_RE.is_match(input))
}

/// Whether the path ends with a slash
///
/// With `respect_query_fragment`, a slash right before `?` or `#` also counts.
pub fn has_trailing_slash(input: &str, respect_query_fragment: bool) -> bool {
    if !respect_query_fragment {
        return input.ends_with('/');
    }
    input.ends_with('/') || input.contains("/?") || input.contains("/#")
}

/// Splits `input` into `(path, "?query", "#fragment")`
fn split_path(input: &str) -> (&str, &str, &str) {
    let (before_hash, hash) = match input.find('#') {
        Some(i) => input.split_at(i),
        None => (input, ""),
    };
    let (path, search) = match before_hash.find('?') {
        Some(i) => before_hash.split_at(i),
        None => (before_hash, ""),
    };
    (path, search, hash)
}

/// Remove one trailing slash; never returns an empty string
pub fn without_trailing_slash(input: &str, respect_query_fragment: bool) -> String {
    if !respect_query_fragment {
        let trimmed = input.strip_suffix('/').unwrap_or(input);
        return if trimmed.is_empty() { "/" } else { trimmed }.to_string();
    }
    if !has_trailing_slash(input, true) {
        return if input.is_empty() { "/" } else { input }.to_string();
    }

    let (path, search, hash) = split_path(input);
    let clean = path.strip_suffix('/').unwrap_or(path);
    let clean = if clean.is_empty() { "/" } else { clean };
    format!("{clean}{search}{hash}")
}

/// Add a trailing slash unless one is already there
pub fn with_trailing_slash(input: &str, respect_query_fragment: bool) -> String {
    if !respect_query_fragment {
        return if input.ends_with('/') {
            input.to_string()
        } else {
            format!("{input}/")
        };
    }
    if has_trailing_slash(input, true) {
        return input.to_string();
    }

    let (path, search, hash) = split_path(input);
    if path.is_empty() && search.is_empty() && !hash.is_empty() {
        return hash.to_string();
    }
    format!("{path}/{search}{hash}")
}

/// Whether `url` is empty or only `/`
pub fn is_empty_url(url: &str) -> bool {
    url.is_empty() || url == "/"
}

/// Join path segments onto `base` with exactly one slash between each
///
/// Empty and `/` segments are skipped; a leading `./` or `/` is stripped from
/// every segment after the first.
pub fn join_url<'a, I>(base: &str, segments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = base.to_string();
    for segment in segments.into_iter().filter(|s| !is_empty_url(s)) {
        if url.is_empty() {
            url = segment.to_string();
        } else {
            let segment = segment
                .strip_prefix("./")
                .or_else(|| segment.strip_prefix('/'))
                .unwrap_or(segment);
            url = with_trailing_slash(&url, false) + segment;
        }
    }
    url
}

/// Resolve `input` against `base` unless it is already absolute or prefixed
pub fn with_base(input: &str, base: &str) -> String {
    if is_empty_url(base) || has_protocol(input, ProtocolOptions::default()) {
        return input.to_string();
    }
    let base = without_trailing_slash(base, false);
    if input.starts_with(&base) {
        return input.to_string();
    }
    join_url(&base, [input])
}

/// Merge `query` into the query string of `input`
///
/// Keys already in `input` are kept unless `query` sets them again.
pub fn with_query(input: &str, query: &Query) -> String {
    let mut parsed = parse_url(input, None);
    let mut merged = parse_query(&parsed.search);
    merged.merge(query);
    parsed.search = stringify_query(&merged);
    parsed.to_string()
}

/// Decomposed URL
///
/// Reassembling through [`fmt::Display`] gives a URL with the same path, query
/// and fragment as the parsed input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    /// Lowercased scheme including the trailing `:`, e.g. `https:`
    pub protocol: String,
    /// `user:password` without the `@`
    pub auth: String,
    /// Host and port
    pub host: String,
    /// Path
    pub pathname: String,
    /// Query string, with or without the leading `?`
    pub search: String,
    /// Fragment including `#`
    pub hash: String,
    /// The input started with `//` and no scheme
    pub protocol_relative: bool,
    /// `blob:`, `data:`, `javascript:` or `vbscript:`; everything after the
    /// scheme is kept in `pathname`
    pub opaque: bool,
}

/// Parse `input` into its components
///
/// Inputs without a protocol are treated as a path, or resolved against
/// `default_protocol` when one is given.
pub fn parse_url(input: &str, default_protocol: Option<&str>) -> ParsedUrl {
    if let Some(caps) = SPECIAL_PROTOCOL_RE.captures(input) {
        let protocol = caps.get(1).map_or("", |m| m.as_str());
        let pathname = caps.get(2).map_or("", |m| m.as_str());
        return ParsedUrl {
            protocol: protocol.to_lowercase(),
            pathname: pathname.to_string(),
            opaque: true,
            ..Default::default()
        };
    }

    let opts = ProtocolOptions {
        accept_relative: true,
        strict: false,
    };
    if !has_protocol(input, opts) {
        return match default_protocol {
            Some(protocol) => parse_url(&format!("{protocol}{input}"), None),
            None => parse_path(input),
        };
    }

    let normalized = input.replace('\\', "/");
    let Some(caps) = URL_RE.captures(&normalized) else {
        return ParsedUrl {
            protocol_relative: true,
            ..Default::default()
        };
    };
    let protocol = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
    let auth = caps
        .get(2)
        .map_or("", |m| m.as_str())
        .trim_end_matches('@')
        .to_string();
    let host_and_path = caps.get(3).map_or("", |m| m.as_str());

    let host_end = host_and_path
        .find(['#', '/', '?'])
        .unwrap_or(host_and_path.len());
    let (host, path) = host_and_path.split_at(host_end);
    let path = if protocol == "file:" {
        strip_drive_slash(path)
    } else {
        path.to_string()
    };

    let (pathname, search, hash) = split_path(&path);
    ParsedUrl {
        protocol_relative: protocol.is_empty(),
        protocol,
        auth,
        host: host.to_string(),
        pathname: pathname.to_string(),
        search: search.to_string(),
        hash: hash.to_string(),
        opaque: false,
    }
}

/// `file:///C:/dir` keeps `C:/dir` as the path
fn strip_drive_slash(path: &str) -> String {
    let bytes = path.as_bytes();
    let position = (0..bytes.len()).find(|&i| {
        bytes[i] == b'/'
            && bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic)
            && bytes.get(i + 2) == Some(&b':')
    });
    match position {
        Some(i) => format!("{}{}", &path[..i], &path[i + 1..]),
        None => path.to_string(),
    }
}

/// Split a path-only input into pathname, search and hash
pub fn parse_path(input: &str) -> ParsedUrl {
    let (pathname, search, hash) = split_path(input);
    ParsedUrl {
        pathname: pathname.to_string(),
        search: search.to_string(),
        hash: hash.to_string(),
        ..Default::default()
    }
}

impl fmt::Display for ParsedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let search = match self.search.as_str() {
            "" => String::new(),
            s if s.starts_with('?') => s.to_string(),
            s => format!("?{s}"),
        };

        if self.opaque {
            return write!(f, "{}{}{}{}", self.protocol, self.pathname, search, self.hash);
        }

        if !self.protocol.is_empty() || self.protocol_relative {
            write!(f, "{}//", self.protocol)?;
        }
        if !self.auth.is_empty() {
            write!(f, "{}@", self.auth)?;
        }
        write!(f, "{}{}{}{}", self.host, self.pathname, search, self.hash)
    }
}
