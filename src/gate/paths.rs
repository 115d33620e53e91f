/// Prefixes that skip the gate entirely. Static assets and the API namespace
/// never trigger session resolution; proxy callers carry their own bearer.
pub const BYPASS_PREFIXES: &[&str] = &["/assets", "/api", "/favicon.ico"];

/// Ordered prefix table; first match wins. Anything unmatched is public.
pub const PROTECTED_PREFIXES: &[&str] = &[
    "/home",
    "/sites",
    "/pov",
    "/active-pov",
    "/dashboards",
    "/users",
    "/settings",
];

/// Sections whose `/{section}/{recordId}/...` routes require a membership row.
pub const RECORD_SECTIONS: &[&str] = &["pov", "active-pov"];

pub const LOGIN_PATH: &str = "/login";
pub const AUTH_CALLBACK_PATH: &str = "/auth/callback";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Public,
    Protected,
}

/// Prefix match on whole path segments, so `/api` covers `/api/...` but
/// never `/apinot`.
fn has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn bypassed(path: &str) -> bool {
    BYPASS_PREFIXES.iter().any(|prefix| has_prefix(path, prefix))
}

pub fn classify(path: &str) -> PathClass {
    for prefix in PROTECTED_PREFIXES {
        if has_prefix(path, prefix) {
            return PathClass::Protected;
        }
    }
    PathClass::Public
}

/// Match `/{section}/{recordId}/...` for the record-owning sections.
///
/// Returns the section and record id. The bare section path (`/pov`) is
/// protected but not record-scoped.
pub fn record_scope(path: &str) -> Option<(&str, &str)> {
    let mut segments = path.split('/');
    segments.next()?; // leading empty segment

    let section = segments.next()?;
    if !RECORD_SECTIONS.contains(&section) {
        return None;
    }

    let record_id = segments.next()?;
    if record_id.is_empty() {
        return None;
    }

    Some((section, record_id))
}
