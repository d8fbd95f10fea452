//! Loading an `AcquisitionContext` from a captured `auth_context.json`.
//!
//! Capture tools nest the interesting values at varying depths and spell
//! their keys differently, so every lookup is a recursive, case-insensitive
//! search for the first non-blank value under any of a list of keys.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use epg_acquire::{AcquisitionContext, DEFAULT_FIS_PROPERTIES};

const BEARER_KEYS: &[&str] = &[
    "bearer",
    "bearer_token",
    "bearerToken",
    "access_token",
    "accessToken",
    "token",
];
const AUTH_HEADER_KEYS: &[&str] = &["authorization", "auth", "authHeader", "auth_header"];
const HEADER_MAP_KEYS: &[&str] = &["headers", "requestHeaders", "request_headers"];
const CLIENT_CONTEXT_KEYS: &[&str] = &[
    "clientContext",
    "client_context",
    "clientContextStr",
    "client_context_str",
];
const FIS_KEYS: &[&str] = &["fisProperties", "fis_properties"];
const COOKIE_JAR_KEYS: &[&str] = &["cookie_jar", "cookieJar", "cookiejar"];

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Clone, Default)]
pub struct AuthOverrides {
    pub bearer: Option<String>,
    pub client_context: Option<String>,
    pub fis_properties: Option<String>,
}

/// Read `path` and build the session context for `base_url`.
pub fn load_auth_context(
    path: &Path,
    base_url: &str,
    overrides: &AuthOverrides,
) -> Result<AcquisitionContext> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read auth context {}", path.display()))?;
    let raw: Value = serde_json::from_str(&text)
        .with_context(|| format!("auth context {} is not valid JSON", path.display()))?;
    context_from_value(&raw, base_url, overrides)
        .with_context(|| format!("auth context {}", path.display()))
}

/// Build the session context from an already parsed capture.
pub fn context_from_value(
    raw: &Value,
    base_url: &str,
    overrides: &AuthOverrides,
) -> Result<AcquisitionContext> {
    let bearer = non_blank(overrides.bearer.as_deref())
        .or_else(|| find_str(raw, BEARER_KEYS))
        .or_else(|| find_auth_header(raw))
        .unwrap_or_default();

    let client_context = non_blank(overrides.client_context.as_deref())
        .or_else(|| find_str(raw, CLIENT_CONTEXT_KEYS))
        .unwrap_or_default();

    let fis_properties = non_blank(overrides.fis_properties.as_deref())
        .or_else(|| find_str(raw, FIS_KEYS))
        .unwrap_or_else(|| DEFAULT_FIS_PROPERTIES.to_string());

    if bearer.is_empty() || client_context.is_empty() {
        let top_keys: Vec<&str> = raw
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();
        bail!(
            "missing required fields: need a bearer token and clientContext \
             (top-level keys seen: {top_keys:?}); re-capture the session or pass \
             --bearer and --client-context"
        );
    }

    Ok(AcquisitionContext::new(base_url, bearer, client_context)
        .with_cookies(cookies(raw))
        .with_fis_properties(Some(fis_properties)))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// First present value under any of `keys`, searching depth-first.
///
/// Keys of the current object are checked (in `keys` order) before
/// descending into its children.
fn find_first<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            for key in keys {
                let hit = map
                    .iter()
                    .find(|(k, v)| k.eq_ignore_ascii_case(key) && is_present(v));
                if let Some((_, v)) = hit {
                    return Some(v);
                }
            }
            map.values().find_map(|v| find_first(v, keys))
        }
        Value::Array(items) => items.iter().find_map(|v| find_first(v, keys)),
        _ => None,
    }
}

fn find_str(value: &Value, keys: &[&str]) -> Option<String> {
    find_first(value, keys).and_then(|v| non_blank(v.as_str()))
}

/// Token from a captured `Authorization: Bearer …` header.
fn find_auth_header(raw: &Value) -> Option<String> {
    let direct = find_first(raw, AUTH_HEADER_KEYS).and_then(Value::as_str);
    let header = match direct {
        Some(h) if is_bearer(h) => Some(h),
        _ => find_first(raw, HEADER_MAP_KEYS)
            .and_then(Value::as_object)
            .and_then(|headers| {
                ["authorization", "Authorization"]
                    .iter()
                    .filter_map(|k| headers.get(*k).and_then(Value::as_str))
                    .find(|h| is_bearer(h))
            }),
    }?;
    header
        .split_once(' ')
        .and_then(|(_, token)| non_blank(Some(token)))
}

fn is_bearer(header: &str) -> bool {
    header
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "))
}

/// Session cookies from the top level: `cookies`, else a cookie jar key.
/// Accepts a `{name: value}` map or a list of `{name, value, ...}` objects.
fn cookies(raw: &Value) -> Vec<(String, String)> {
    let Some(top) = raw.as_object() else {
        return Vec::new();
    };
    let jar = match top.get("cookies") {
        Some(v) if !v.is_null() => Some(v),
        _ => COOKIE_JAR_KEYS
            .iter()
            .filter_map(|k| top.get(*k))
            .find(|v| is_truthy_json(v)),
    };

    match jar {
        Some(Value::Object(map)) => cookies_from_map(map),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|c| {
                let name = c.get("name").and_then(Value::as_str).filter(|n| !n.is_empty())?;
                let value = c.get("value").filter(|v| !v.is_null())?;
                Some((name.to_string(), scalar_string(value)))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn cookies_from_map(map: &Map<String, Value>) -> Vec<(String, String)> {
    map.iter()
        .filter(|(k, v)| !k.is_empty() && !v.is_null())
        .map(|(k, v)| (k.clone(), scalar_string(v)))
        .collect()
}

fn is_truthy_json(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://api.example.com";

    #[test]
    fn test_nested_case_insensitive_lookup() {
        let raw = json!({
            "capture": {
                "session": { "AccessToken": "tok-1", "ClientContext": "cc-1" }
            }
        });
        let ctx = context_from_value(&raw, BASE, &AuthOverrides::default()).unwrap();
        assert_eq!(ctx.bearer, "tok-1");
        assert_eq!(ctx.client_context, "cc-1");
        assert_eq!(ctx.fis_properties.as_deref(), Some(DEFAULT_FIS_PROPERTIES));
        assert_eq!(ctx.base_url, BASE);
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let raw = json!({
            "bearer": "  ",
            "nested": { "token": "tok-2" },
            "clientContext": "cc"
        });
        let ctx = context_from_value(&raw, BASE, &AuthOverrides::default()).unwrap();
        assert_eq!(ctx.bearer, "tok-2");
    }

    #[test]
    fn test_bearer_from_header_map() {
        let raw = json!({
            "request": { "headers": { "Authorization": "Bearer abc.def" } },
            "client_context_str": "cc"
        });
        let ctx = context_from_value(&raw, BASE, &AuthOverrides::default()).unwrap();
        assert_eq!(ctx.bearer, "abc.def");
    }

    #[test]
    fn test_bearer_from_direct_header_value() {
        let raw = json!({ "authHeader": "bearer xyz", "clientContext": "cc" });
        let ctx = context_from_value(&raw, BASE, &AuthOverrides::default()).unwrap();
        assert_eq!(ctx.bearer, "xyz");
    }

    #[test]
    fn test_overrides_win() {
        let raw = json!({ "bearer": "file", "clientContext": "file-cc", "fisProperties": "a=1" });
        let overrides = AuthOverrides {
            bearer: Some("flag".into()),
            client_context: Some("flag-cc".into()),
            fis_properties: Some("b=2".into()),
        };
        let ctx = context_from_value(&raw, BASE, &overrides).unwrap();
        assert_eq!(ctx.bearer, "flag");
        assert_eq!(ctx.client_context, "flag-cc");
        assert_eq!(ctx.fis_properties.as_deref(), Some("b=2"));
    }

    #[test]
    fn test_missing_fields_name_top_level_keys() {
        let raw = json!({ "bearer": "tok", "other": 1 });
        let err = context_from_value(&raw, BASE, &AuthOverrides::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("clientContext"));
        assert!(message.contains("\"other\""));
        assert!(message.contains("\"bearer\""));
    }

    #[test]
    fn test_cookie_map_and_list() {
        let raw = json!({
            "bearer": "t", "clientContext": "c",
            "cookies": { "a": "1", "b": 2, "skip": null }
        });
        let mut jar = context_from_value(&raw, BASE, &AuthOverrides::default())
            .unwrap()
            .cookies;
        jar.sort();
        assert_eq!(
            jar,
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
        );

        let raw = json!({
            "bearer": "t", "clientContext": "c",
            "cookieJar": [
                { "name": "sid", "value": "s1", "domain": ".example.com" },
                { "name": "", "value": "x" },
                "garbage"
            ]
        });
        let ctx = context_from_value(&raw, BASE, &AuthOverrides::default()).unwrap();
        assert_eq!(ctx.cookies, vec![("sid".to_string(), "s1".to_string())]);
    }
}
