//! Server URL handling.

use url::Url;

/// Base URLs always end in `/` so endpoint paths can be appended.
pub fn normalize_base(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

/// Absolute container URL from a spawn response. Older provisioning
/// servers answer with a path relative to their own base.
pub fn resolve_spawn_url(base: &str, spawned: &str) -> Result<String, url::ParseError> {
    if spawned.starts_with("http://") || spawned.starts_with("https://") {
        return Ok(normalize_base(spawned));
    }
    let joined = Url::parse(&normalize_base(base))?.join(spawned)?;
    Ok(normalize_base(joined.as_str()))
}

/// Websocket URL for a server base (`http` → `ws`, `https` → `wss`).
pub fn ws_url(base: &str) -> String {
    match base.strip_prefix("http") {
        Some(rest) => format!("ws{rest}"),
        None => base.to_string(),
    }
}
