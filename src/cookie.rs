//! Set-Cookie translation between upstream and gateway origins.
//!
//! DESIGN
//! ======
//! Each `Set-Cookie` line is parsed into a `SetCookie` record that keeps the
//! original spelling and order of every attribute. Translation mutates only
//! `Path`, `Domain`, `Secure` and `SameSite`; everything else is re-emitted
//! exactly as received, so an untouched cookie serializes back to its input.
//!
//! Parsing is as lenient as a browser's: a line with no `name=` is a nameless
//! cookie and is still translated. Only a blank line passes through unchanged.

use std::fmt;

/// Deployment flavor controlling whether transport-level cookie attributes
/// are relaxed for plaintext local development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

/// Rewrite rule applied to every cookie the upstream sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRewrite {
    /// Mount point the upstream scopes its cookies to (e.g. `/api/v1`).
    pub upstream_path: String,
    /// Mount point the gateway is served under (e.g. `/api`).
    pub gateway_path: String,
    pub environment: Environment,
}

impl Default for CookieRewrite {
    fn default() -> Self {
        Self {
            upstream_path: "/api/v1".to_string(),
            gateway_path: "/api".to_string(),
            environment: Environment::Production,
        }
    }
}

impl CookieRewrite {
    /// Apply the rule to a parsed cookie in place.
    pub fn apply(&self, cookie: &mut SetCookie) {
        if let Some(path) = cookie.path() {
            if let Some(rewritten) = rewrite_path(path, &self.upstream_path, &self.gateway_path) {
                cookie.set_path(&rewritten);
            }
        }

        cookie.remove(AttributeKind::Domain);

        if self.environment == Environment::Development {
            cookie.remove(AttributeKind::Secure);
            if cookie.same_site().is_some_and(|v| v.eq_ignore_ascii_case("none")) {
                cookie.set_same_site("Lax");
            }
        }
    }
}

/// Translate one raw `Set-Cookie` header value for the gateway origin.
///
/// Never fails: a blank line is returned as-is.
#[must_use]
pub fn translate(line: &str, rewrite: &CookieRewrite) -> String {
    let Some(mut cookie) = SetCookie::parse(line) else {
        return line.to_string();
    };
    rewrite.apply(&mut cookie);
    cookie.to_string()
}

/// Translate a header value given as raw bytes, including obs-text (0x80-0xFF).
///
/// Bytes map one-to-one onto `U+0000..=U+00FF` for parsing and back again, so
/// bytes outside visible ASCII survive untouched. Returns `None` only if the
/// rewrite introduced a character that has no single-byte form.
#[must_use]
pub fn translate_bytes(raw: &[u8], rewrite: &CookieRewrite) -> Option<Vec<u8>> {
    let line: String = raw.iter().copied().map(char::from).collect();
    translate(&line, rewrite)
        .chars()
        .map(|c| u8::try_from(c).ok())
        .collect()
}

/// Replace an `upstream` path prefix with `gateway`, respecting segment
/// boundaries. Returns `None` when the path is outside the upstream mount.
fn rewrite_path(path: &str, upstream: &str, gateway: &str) -> Option<String> {
    if upstream.is_empty() || path.len() < upstream.len() {
        return None;
    }
    let (head, rest) = path.split_at_checked(upstream.len())?;
    if !head.eq_ignore_ascii_case(upstream) {
        return None;
    }
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }
    Some(format!("{gateway}{rest}"))
}

// =============================================================================
// PARSED COOKIE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Path,
    Domain,
    Secure,
    SameSite,
    HttpOnly,
    MaxAge,
    Other,
}

impl AttributeKind {
    fn classify(key: &str) -> Self {
        match key.to_ascii_lowercase().as_str() {
            "path" => Self::Path,
            "domain" => Self::Domain,
            "secure" => Self::Secure,
            "samesite" => Self::SameSite,
            "httponly" => Self::HttpOnly,
            "max-age" => Self::MaxAge,
            _ => Self::Other,
        }
    }
}

/// One `key[=value]` attribute, keeping the key as spelled by the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttribute {
    pub kind: AttributeKind,
    pub key: String,
    pub value: Option<String>,
    /// Whitespace between the `;` and the key.
    leading: String,
    /// Segment text as received after `leading`; `None` once modified.
    raw: Option<String>,
}

impl CookieAttribute {
    fn parse(segment: &str) -> Self {
        let body = segment.trim_start_matches(is_wsp);
        let leading = segment[..segment.len() - body.len()].to_string();
        let trimmed = trim_wsp(body);
        let (key, value) = match trimmed.split_once('=') {
            Some((k, v)) => (trim_wsp(k), Some(trim_wsp(v).to_string())),
            None => (trimmed, None),
        };
        Self {
            kind: AttributeKind::classify(key),
            key: key.to_string(),
            value,
            leading,
            raw: Some(body.to_string()),
        }
    }
}

/// A structured `Set-Cookie` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    /// Leading `name=value` segment as received.
    pair: String,
    attributes: Vec<CookieAttribute>,
}

/// Cookie whitespace (SP / HTAB). Wider Unicode trimming would eat obs-text bytes.
fn is_wsp(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn trim_wsp(s: &str) -> &str {
    s.trim_matches(is_wsp)
}

impl SetCookie {
    /// Parse a `Set-Cookie` header value. Returns `None` only for a blank line.
    ///
    /// A leading segment without `=` is a nameless cookie whose value is the
    /// whole segment; an empty name before `=` is nameless too.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        if trim_wsp(line).is_empty() {
            return None;
        }
        let mut segments = line.split(';');
        let pair = segments.next().unwrap_or_default();
        let (name, value) = match pair.split_once('=') {
            Some((name, value)) => (trim_wsp(name), trim_wsp(value)),
            None => ("", trim_wsp(pair)),
        };
        let attributes = segments.map(CookieAttribute::parse).collect();

        Some(Self { name: name.to_string(), value: value.to_string(), pair: pair.to_string(), attributes })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Attributes in received order. Empty segments (`a=1;; b`) are kept as
    /// keyless entries so the line re-serializes unchanged.
    #[must_use]
    pub fn attributes(&self) -> &[CookieAttribute] {
        &self.attributes
    }

    fn find(&self, kind: AttributeKind) -> Option<&CookieAttribute> {
        self.attributes.iter().find(|a| a.kind == kind)
    }

    fn value_of(&self, kind: AttributeKind) -> Option<&str> {
        self.find(kind).and_then(|a| a.value.as_deref())
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.value_of(AttributeKind::Path)
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.value_of(AttributeKind::Domain)
    }

    #[must_use]
    pub fn same_site(&self) -> Option<&str> {
        self.value_of(AttributeKind::SameSite)
    }

    #[must_use]
    pub fn max_age(&self) -> Option<&str> {
        self.value_of(AttributeKind::MaxAge)
    }

    #[must_use]
    pub fn secure(&self) -> bool {
        self.find(AttributeKind::Secure).is_some()
    }

    #[must_use]
    pub fn http_only(&self) -> bool {
        self.find(AttributeKind::HttpOnly).is_some()
    }

    /// Overwrite every `Path` attribute's value, keeping position and key spelling.
    pub fn set_path(&mut self, path: &str) {
        self.set_value(AttributeKind::Path, path);
    }

    /// Overwrite every `SameSite` attribute's value, keeping position and key spelling.
    pub fn set_same_site(&mut self, same_site: &str) {
        self.set_value(AttributeKind::SameSite, same_site);
    }

    fn set_value(&mut self, kind: AttributeKind, value: &str) {
        for attr in self.attributes.iter_mut().filter(|a| a.kind == kind) {
            attr.value = Some(value.to_string());
            attr.raw = None;
        }
    }

    /// Drop every attribute of the given kind.
    pub fn remove(&mut self, kind: AttributeKind) {
        self.attributes.retain(|a| a.kind != kind);
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pair)?;
        for attr in &self.attributes {
            write!(f, ";{}", attr.leading)?;
            match (&attr.raw, &attr.value) {
                (Some(raw), _) => f.write_str(raw)?,
                (None, Some(value)) => write!(f, "{}={value}", attr.key)?,
                (None, None) => f.write_str(&attr.key)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "cookie_test.rs"]
mod tests;
