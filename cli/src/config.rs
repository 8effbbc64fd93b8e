use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub struct Config {
    pub data_dir: PathBuf,
}

impl Config {
    /// Use `data_dir` when given, else the platform data directory.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("", "", "fitplat")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config { data_dir })
    }

    pub fn nutrition_db_path(&self) -> PathBuf {
        self.data_dir.join("nutrition.db")
    }

    pub fn users_db_path(&self) -> PathBuf {
        self.data_dir.join("users.db")
    }

    /// Load the nutrition API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)`.
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        let (key, created) = load_or_create_secret(&self.data_dir.join("api_key"))?;
        if created {
            eprintln!("Generated new API key: {key}");
            eprintln!("Include in requests: Authorization: Bearer {key}");
        }
        Ok((key, created))
    }

    /// Signing secret for account tokens. Never printed.
    pub fn load_or_create_jwt_secret(&self) -> Result<String> {
        let (secret, created) = load_or_create_secret(&self.data_dir.join("jwt_secret"))?;
        if created {
            tracing::info!("generated new token signing secret");
        }
        Ok(secret)
    }
}

fn load_or_create_secret(path: &Path) -> Result<(String, bool)> {
    use rand::Rng;
    use std::fmt::Write;

    if path.exists() {
        let secret = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let secret = secret.trim().to_string();
        if !secret.is_empty() {
            return Ok((secret, false));
        }
    }

    let bytes: [u8; 32] = rand::rng().random();
    let secret = bytes
        .iter()
        .fold(String::with_capacity(64), |mut acc: String, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        });
    std::fs::write(path, &secret)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    Ok((secret, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_data_dir_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("data");
        let config = Config::load(Some(dir.clone())).unwrap();
        assert!(dir.is_dir());
        assert_eq!(config.nutrition_db_path(), dir.join("nutrition.db"));
        assert_eq!(config.users_db_path(), dir.join("users.db"));
    }

    #[test]
    fn test_secret_is_generated_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("api_key");

        let (first, created) = load_or_create_secret(&path).unwrap();
        assert!(created);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));

        let (second, created) = load_or_create_secret(&path).unwrap();
        assert!(!created);
        assert_eq!(first, second);
    }

    #[test]
    fn test_blank_secret_file_is_regenerated() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("jwt_secret");
        std::fs::write(&path, "  \n").unwrap();
        let (secret, created) = load_or_create_secret(&path).unwrap();
        assert!(created);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), secret);
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("api_key");
        load_or_create_secret(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
