use std::time::Duration;

use cached::proc_macro::cached;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, Map};
use futures_locks::RwLock;
use once_cell::sync::Lazy;
use serde::Deserialize;

pub use config::ConfigError as Error;

static CONFIG_BUILDER: Lazy<RwLock<ConfigBuilder<DefaultState>>> =
    Lazy::new(|| RwLock::new(builder(None)));

/// Layer the embedded defaults, a local `Scheduling.toml` and `SCHEDULING__*` variables
///
/// `environment` replaces the process environment when given.
pub fn builder(environment: Option<Map<String, String>>) -> ConfigBuilder<DefaultState> {
    let mut builder = Config::builder().add_source(File::from_str(
        include_str!("../Scheduling.toml"),
        FileFormat::Toml,
    ));

    if std::path::Path::new("Scheduling.toml").exists() {
        builder = builder.add_source(File::new("Scheduling.toml", FileFormat::Toml));
    }

    builder.add_source(
        Environment::with_prefix("SCHEDULING")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("bootstrap.roles")
            .source(environment),
    )
}

#[derive(Deserialize, Debug, Clone)]
pub struct Database {
    pub mongodb: String,
    pub admin: String,
    pub connect_timeout_secs: u64,
}

impl Database {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Which variant of the bootstrap routine to run
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Authenticate, create the application user, target `MONGO_INITDB_DATABASE`
    #[default]
    Provisioning,
    /// Assume an authenticated context and target `bootstrap.database`
    Preauthenticated,
}

/// What to do when a user or collection already exists
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnExisting {
    #[default]
    Fail,
    Skip,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Bootstrap {
    pub profile: Profile,
    pub database: String,
    pub on_existing: OnExisting,
    pub verify: bool,
    pub roles: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub database: Database,
    pub bootstrap: Bootstrap,
}

impl Settings {
    /// Deserialize settings and apply the `MONGO_URI` override
    pub fn from_config(config: Config, mongo: &MongoEnvironment) -> Result<Settings, ConfigError> {
        let mut settings: Settings = config.try_deserialize()?;

        if let Some(uri) = mongo.uri.as_deref().filter(|uri| !uri.is_empty()) {
            settings.database.mongodb = uri.to_string();
        }

        Ok(settings)
    }
}

/// Variables read from `MONGO_*`, the names used by the official container image
#[derive(Deserialize, Default, Clone)]
pub struct MongoEnvironment {
    pub uri: Option<String>,
    pub initdb_root_username: Option<String>,
    pub initdb_root_password: Option<String>,
    pub initdb_database: Option<String>,
}

impl MongoEnvironment {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(None)
    }

    pub fn from_source(source: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("MONGO").source(source))
            .build()?
            .try_deserialize()
    }
}

impl std::fmt::Debug for MongoEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoEnvironment")
            .field("uri", &self.uri.as_ref().map(|_| "<set>"))
            .field("initdb_root_username", &self.initdb_root_username)
            .field(
                "initdb_root_password",
                &self.initdb_root_password.as_ref().map(|_| "<redacted>"),
            )
            .field("initdb_database", &self.initdb_database)
            .finish()
    }
}

/// Configure logging and load `.env`
pub fn setup_logging(package: &str, version: &str, application: &str) {
    dotenv::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    pretty_env_logger::try_init().ok();
    log::info!("Starting {application} [{package} {version}].");
}

#[macro_export]
macro_rules! configure {
    ( $application: ident ) => {
        $crate::setup_logging(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            stringify!($application),
        )
    };
}

pub async fn read() -> Result<Config, ConfigError> {
    CONFIG_BUILDER.read().await.clone().build()
}

#[cached(time = 30, result = true)]
pub async fn config() -> Result<Settings, ConfigError> {
    let mongo = MongoEnvironment::from_env()?;
    Settings::from_config(read().await?, &mongo)
}
