use serde::Deserialize;

static CONFIG: OnceCell<Config> = OnceCell::const_new();

mod config_dir;
pub use config_dir::{CONFIG_ENV, find_config_file, read_config};

mod error;
pub use error::{ConfigError, ConfigResult};
use tokio::sync::OnceCell;

#[derive(Debug, Deserialize)]
pub struct Config {
    host: Host,
    app: App,
    #[serde(default)]
    h5p: H5p,
    tts: Option<Tts>,
}

#[derive(Debug, Deserialize)]
pub struct Host {
    bindto: String,
}

#[derive(Debug, Deserialize)]
pub struct App {
    jwt: String,
    database_uri: String,
    #[serde(default)]
    docs: bool,
    #[serde(default = "default_frontend_url")]
    frontend_url: String,
    #[serde(default = "default_uploads_dir")]
    uploads_dir: String,
    #[serde(default = "default_token_ttl")]
    token_ttl_hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct H5p {
    #[serde(default = "default_max_file_size")]
    max_file_size: usize,
    /// Bound on the inflated size of all entries of one package.
    #[serde(default = "default_max_extracted_size")]
    max_extracted_size: usize,
    #[serde(default = "default_temp_expiration")]
    temp_expiration_hours: i64,
}

/// Google Text-to-Speech and Supabase storage credentials.
#[derive(Debug, Deserialize)]
pub struct Tts {
    google_api_key: String,
    supabase_url: String,
    supabase_key: String,
    #[serde(default = "default_tts_bucket")]
    bucket: String,
}

fn default_frontend_url() -> String {
    String::from("http://localhost:3000")
}

fn default_uploads_dir() -> String {
    String::from("uploads")
}

fn default_token_ttl() -> i64 {
    24
}

fn default_max_file_size() -> usize {
    50 * 1024 * 1024
}

fn default_max_extracted_size() -> usize {
    10 * default_max_file_size()
}

fn default_temp_expiration() -> i64 {
    24
}

fn default_tts_bucket() -> String {
    String::from("tts-audio")
}

impl Default for H5p {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_extracted_size: default_max_extracted_size(),
            temp_expiration_hours: default_temp_expiration(),
        }
    }
}

impl Config {
    #[tracing::instrument]
    pub async fn get_or_init(use_local: bool) -> &'static Config {
        CONFIG
            .get_or_init(|| async {
                let read_cfg = |use_local| -> ConfigResult<Self> {
                    let bytes = read_config(use_local)?;
                    let config: Self = toml::from_slice(&bytes)?;
                    config.validate()?;
                    Ok(config)
                };

                match read_cfg(use_local) {
                    Ok(c) => c,
                    Err(e) => {
                        if !matches!(e, error::ConfigError::ConfigNotFound) {
                            crate::error::log_error(&e);
                        }
                        tracing::error!("Unable to load configuration.");
                        std::process::exit(1);
                    }
                }
            })
            .await
    }

    /// Rejects values the server cannot run with.
    fn validate(&self) -> ConfigResult<()> {
        let invalid = |key, reason| Err(ConfigError::InvalidValue { key, reason });

        if self.app.jwt.trim().is_empty() {
            return invalid("app.jwt", "secret must not be empty");
        }
        if self.app.token_ttl_hours <= 0 {
            return invalid("app.token_ttl_hours", "must be positive");
        }
        if self.h5p.max_file_size == 0 {
            return invalid("h5p.max_file_size", "must be positive");
        }
        if self.h5p.max_extracted_size < self.h5p.max_file_size {
            return invalid("h5p.max_extracted_size", "must not be below h5p.max_file_size");
        }
        if self.h5p.temp_expiration_hours <= 0 {
            return invalid("h5p.temp_expiration_hours", "must be positive");
        }
        Ok(())
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn app(&self) -> &App {
        &self.app
    }

    #[inline]
    pub fn h5p(&self) -> &H5p {
        &self.h5p
    }

    #[inline]
    pub fn tts(&self) -> Option<&Tts> {
        self.tts.as_ref()
    }
}

impl Host {
    #[inline]
    pub fn bindto(&self) -> &str {
        &self.bindto
    }
}

impl App {
    #[inline]
    pub fn jwt(&self) -> &str {
        &self.jwt
    }

    #[inline]
    pub fn database_uri(&self) -> &str {
        &self.database_uri
    }

    #[inline]
    pub fn docs(&self) -> bool {
        self.docs
    }

    #[inline]
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    #[inline]
    pub fn uploads_dir(&self) -> &str {
        &self.uploads_dir
    }

    #[inline]
    pub fn token_ttl_hours(&self) -> i64 {
        self.token_ttl_hours
    }
}

impl H5p {
    #[inline]
    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    #[inline]
    pub fn max_extracted_size(&self) -> usize {
        self.max_extracted_size
    }

    #[inline]
    pub fn temp_expiration_hours(&self) -> i64 {
        self.temp_expiration_hours
    }
}

impl Tts {
    #[inline]
    pub fn google_api_key(&self) -> &str {
        &self.google_api_key
    }

    #[inline]
    pub fn supabase_url(&self) -> &str {
        self.supabase_url.trim_end_matches('/')
    }

    #[inline]
    pub fn supabase_key(&self) -> &str {
        &self.supabase_key
    }

    #[inline]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn config_test() {
        let config = Config::get_or_init(true).await;
        assert_eq!(config.host().bindto(), "127.0.0.1:5000"); // defaults
        assert_eq!(config.app().uploads_dir(), "uploads");
    }

    #[test]
    fn config_defaults_test() {
        let config: Config = toml::from_str(
            r#"
            [host]
            bindto = "0.0.0.0:3001"

            [app]
            jwt = "secret"
            database_uri = "postgres://localhost/db"
            "#,
        )
        .unwrap();

        assert!(!config.app().docs());
        assert_eq!(config.app().frontend_url(), "http://localhost:3000");
        assert_eq!(config.app().token_ttl_hours(), 24);
        assert_eq!(config.h5p().max_file_size(), 50 * 1024 * 1024);
        assert_eq!(config.h5p().max_extracted_size(), 500 * 1024 * 1024);
        assert_eq!(config.h5p().temp_expiration_hours(), 24);
        assert!(config.tts().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_empty_secret_test() {
        let config: Config = toml::from_str(
            r#"
            [host]
            bindto = "0.0.0.0:3001"

            [app]
            jwt = " "
            database_uri = "postgres://localhost/db"

            [h5p]
            temp_expiration_hours = 12
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key: "app.jwt", .. })
        ));
    }

    #[test]
    fn config_rejects_small_extraction_bound_test() {
        let config: Config = toml::from_str(
            r#"
            [host]
            bindto = "0.0.0.0:3001"

            [app]
            jwt = "secret"
            database_uri = "postgres://localhost/db"

            [h5p]
            max_file_size = 1048576
            max_extracted_size = 1024
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                key: "h5p.max_extracted_size",
                ..
            })
        ));
    }

    #[test]
    fn config_tts_section_test() {
        let config: Config = toml::from_str(
            r#"
            [host]
            bindto = "0.0.0.0:3001"

            [app]
            jwt = "secret"
            database_uri = "postgres://localhost/db"

            [tts]
            google_api_key = "key"
            supabase_url = "https://example.supabase.co/"
            supabase_key = "service"
            "#,
        )
        .unwrap();

        let tts = config.tts().unwrap();
        assert_eq!(tts.bucket(), "tts-audio");
        assert_eq!(tts.supabase_url(), "https://example.supabase.co");
    }
}
