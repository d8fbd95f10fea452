//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

/// Production API host of the schedule service.
pub const DEFAULT_BASE_URL: &str = "https://api.cld.dtvce.com";

/// Environment variable naming the captured auth context file.
pub const AUTH_CONTEXT_ENV: &str = "EPG_AUTH_CONTEXT";

/// Environment variable naming the output directory.
pub const OUT_DIR_ENV: &str = "EPG_OUT_DIR";

const AUTH_CONTEXT_FILE: &str = "auth_context.json";

/// Resolve the auth context path: flag, then `EPG_AUTH_CONTEXT`, then
/// `./out/auth_context.json` if present, then the per-user default.
pub fn resolve_auth_context_path(explicit: Option<&Path>) -> PathBuf {
    resolve_path(explicit, std::env::var(AUTH_CONTEXT_ENV).ok(), || {
        let cwd_context = PathBuf::from("out").join(AUTH_CONTEXT_FILE);
        if cwd_context.exists() {
            return cwd_context;
        }
        default_home().join(AUTH_CONTEXT_FILE)
    })
}

/// Resolve the output directory: flag, then `EPG_OUT_DIR`, then the per-user default.
pub fn resolve_out_dir(explicit: Option<&Path>) -> PathBuf {
    resolve_path(explicit, std::env::var(OUT_DIR_ENV).ok(), || {
        default_home().join("out")
    })
}

fn resolve_path(
    explicit: Option<&Path>,
    env_value: Option<String>,
    fallback: impl FnOnce() -> PathBuf,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match env_value {
        Some(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
        _ => fallback(),
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".epg-acquire")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_path(
            Some(Path::new("/tmp/ctx.json")),
            Some("/env/ctx.json".into()),
            || PathBuf::from("/default"),
        );
        assert_eq!(path, PathBuf::from("/tmp/ctx.json"));
    }

    #[test]
    fn test_env_beats_default() {
        let path = resolve_path(None, Some(" /env/out ".into()), || PathBuf::from("/default"));
        assert_eq!(path, PathBuf::from("/env/out"));
    }

    #[test]
    fn test_blank_env_falls_through() {
        let path = resolve_path(None, Some("   ".into()), || PathBuf::from("/default"));
        assert_eq!(path, PathBuf::from("/default"));
        assert!(default_home().ends_with(".epg-acquire"));
    }
}
