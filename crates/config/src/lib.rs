//! Configuration for depot.
//!
//! Configuration is layered with [`figment`], later layers overriding earlier
//! ones:
//!
//! 1. compiled-in defaults ([`Config::default`]),
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension): either
//!    the one given explicitly, or `config.toml` in the platform's config
//!    directory if it exists,
//! 3. environment variables prefixed with `DEPOT_`, nested keys separated by
//!    a double underscore (`DEPOT_UPLOAD__MAX_FILE_SIZE=1048576`).
//!
//! The result is validated once; after that it's read-only.

pub mod error;
mod upload;

pub use crate::upload::{ConcurrencyBounds, UploadConfig};
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "DEPOT_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Body limit for a whole upload request, in bytes.
    pub max_request_size: usize,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 5000)),
            max_request_size: 256 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory that per-project upload directories are created in.
    pub files_dir: PathBuf,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self { files_dir: PathBuf::from("assets/files") }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file holding project and asset records.
    pub path: PathBuf,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("assets/depot.sqlite3") }
    }
}

impl Config {
    /// Load configuration from every source.
    ///
    /// When `file` is `None`, the default config file location is used only
    /// if something exists there. An explicitly given file must exist.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let figment = Self::figment(file)?.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    /// Load configuration from the defaults and a single file, ignoring the
    /// environment.
    pub fn from_file(file: &Path) -> Result<Self> {
        Self::extract(Self::figment(Some(file))?)
    }

    /// Default location of the configuration file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "depot").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let file = match file {
            Some(file) if !file.is_file() => exn::bail!(ErrorKind::File(file.to_path_buf())),
            Some(file) => file.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(figment),
            },
        };
        tracing::debug!(path = %file.display(), "reading configuration file");
        let extension = file.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file(&file)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(&file)),
            Some("json") => figment.merge(Json::file(&file)),
            _ => exn::bail!(ErrorKind::File(file)),
        })
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()
    }

    /// Normalizes values that have more than one spelling and rejects
    /// configurations the service can't run with.
    pub fn validate(mut self) -> Result<Self> {
        self.upload = self.upload.normalize();
        let mut problems = self.upload.problems();
        if self.server.max_request_size == 0 {
            problems.push("server.max_request_size must be greater than zero".to_string());
        }
        if !problems.is_empty() {
            exn::bail!(ErrorKind::Invalid(problems.join("; ")));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn config_file(extension: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(&format!(".{extension}")).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default().validate().unwrap();
        assert_eq!(config.upload, UploadConfig::default());
        assert_eq!(config.server.listen.port(), 5000);
    }

    #[rstest]
    #[case("toml", "[upload]\nmax_file_size = 2048\nallowed_extensions = [\"CSV\", \".md\"]\n")]
    #[case("yaml", "upload:\n  max_file_size: 2048\n  allowed_extensions: [CSV, .md]\n")]
    #[case("json", r#"{"upload": {"max_file_size": 2048, "allowed_extensions": ["CSV", ".md"]}}"#)]
    fn test_from_file(#[case] extension: &str, #[case] contents: &str) {
        let file = config_file(extension, contents);
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.upload.max_file_size, 2048);
        assert!(config.upload.is_allowed("csv"));
        assert!(config.upload.is_allowed("md"));
        assert!(!config.upload.is_allowed("txt"));
        // Untouched values keep their defaults
        assert_eq!(config.upload.chunk_size, 1024 * 1024);
        assert_eq!(config.upload.concurrency, ConcurrencyBounds { lower: 10, upper: 20 });
    }

    #[test]
    fn test_nested_sections() {
        let file = config_file(
            "toml",
            "[server]\nlisten = \"0.0.0.0:8080\"\n\n[storage]\nfiles_dir = \"/srv/files\"\n\n[upload.concurrency]\nlower = 2\nupper = 4\n",
        );
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.storage.files_dir, PathBuf::from("/srv/files"));
        assert_eq!(config.upload.concurrency.limit_for(100), 4);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let file = config_file("toml", "[upload.concurrency]\nlower = 30\nupper = 20\n");
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::File(_)));
    }

    #[test]
    fn test_unknown_format() {
        let file = config_file("ini", "[upload]\n");
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::File(_)));
    }

    #[test]
    fn test_malformed_file() {
        let file = config_file("toml", "[upload]\nmax_file_size = \"lots\"\n");
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }

    #[test]
    fn test_environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("depot.toml", "[upload]\nmax_file_size = 2048\nchunk_size = 512\n")?;
            jail.set_env("DEPOT_UPLOAD__MAX_FILE_SIZE", "4096");
            jail.set_env("DEPOT_UPLOAD__CONCURRENCY__UPPER", "12");
            jail.set_env("DEPOT_SERVER__LISTEN", "0.0.0.0:8080");
            let config = Config::load(Some(Path::new("depot.toml"))).unwrap();
            assert_eq!(config.upload.max_file_size, 4096);
            assert_eq!(config.upload.chunk_size, 512);
            assert_eq!(config.upload.concurrency, ConcurrencyBounds { lower: 10, upper: 12 });
            assert_eq!(config.server.listen.port(), 8080);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_environment_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("depot.toml", "")?;
            jail.set_env("DEPOT_UPLOAD__CHUNK_SIZE", "0");
            let err = Config::load(Some(Path::new("depot.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }
}
