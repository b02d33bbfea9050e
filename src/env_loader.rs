use std::env;
use std::path::PathBuf;

include!(concat!(env!("OUT_DIR"), "/mirror_env_allowlist.rs"));

fn fallback_dotenv_path(mirror_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(base) = mirror_home {
        return Some(base.join(".env"));
    }
    Some(home_dir?.join(".devto-mirror/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("DEVTO_MIRROR_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

fn unknown_keys<I>(keys: I, allowlist: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = keys
        .into_iter()
        .filter(|key| key.starts_with("DEVTO_MIRROR_"))
        .filter(|key| !allowlist.contains(&key.as_str()))
        .collect::<Vec<_>>();
    out.sort();
    out
}

/// `DEVTO_MIRROR_*` variables in the environment that no code reads,
/// usually typos.
pub fn unknown_mirror_env_keys() -> Vec<String> {
    unknown_keys(env::vars().map(|(k, _)| k), GENERATED_MIRROR_ENV_ALLOWLIST)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn fallback_prefers_mirror_home() {
        let got = fallback_dotenv_path(
            Some(PathBuf::from("/workspace/mirror")),
            Some(PathBuf::from("/home/alice")),
        );
        assert_eq!(got, Some(PathBuf::from("/workspace/mirror/.env")));
    }

    #[test]
    fn fallback_uses_home_when_mirror_home_unset() {
        let got = fallback_dotenv_path(None, Some(PathBuf::from("/home/alice")));
        assert_eq!(got, Some(PathBuf::from("/home/alice/.devto-mirror/.env")));
    }

    // Split so the build script does not pick the typo up as a known key.
    const PREFIX: &str = "DEVTO_MIRROR_";

    #[test]
    fn unknown_keys_flags_only_unlisted_mirror_vars() {
        let keys = vec![
            "DEVTO_MIRROR_PAGE_SIZE".to_string(),
            format!("{PREFIX}PAGESIZE"),
            "PATH".to_string(),
        ];
        let got = unknown_keys(keys, &["DEVTO_MIRROR_PAGE_SIZE"]);
        assert_eq!(got, vec![format!("{PREFIX}PAGESIZE")]);
    }

    #[test]
    fn generated_allowlist_contains_keys_read_by_config() {
        assert!(GENERATED_MIRROR_ENV_ALLOWLIST.contains(&"DEVTO_MIRROR_PAGE_SIZE"));
        assert!(GENERATED_MIRROR_ENV_ALLOWLIST.contains(&"DEVTO_MIRROR_ROOT"));
    }
}
