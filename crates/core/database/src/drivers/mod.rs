#[cfg(feature = "mongodb")]
mod mongodb;
mod reference;

use rand::Rng;
use scheduling_config::{config, MongoEnvironment};
use scheduling_result::Result;

#[cfg(feature = "mongodb")]
pub use self::mongodb::*;
pub use self::reference::*;

use crate::RootCredentials;

/// Database information to use to create a client
pub enum DatabaseInfo {
    /// Auto-detect the database in use
    Auto,
    /// Auto-detect the database in use and create an empty testing database
    Test(String),
    /// Use the in-memory reference engine
    Reference,
    /// Connect to MongoDB
    #[cfg(feature = "mongodb")]
    MongoDb { uri: String, database_name: String },
}

/// Database
#[derive(Clone)]
pub enum Database {
    /// In-memory reference engine
    Reference(ReferenceDb),
    /// MongoDB database
    #[cfg(feature = "mongodb")]
    MongoDb(MongoDb),
}

impl DatabaseInfo {
    /// Create a database client from the given database information
    #[async_recursion]
    pub async fn connect(self) -> Result<Database> {
        let config = config().await.map_err(|error| {
            create_error!(InvalidConfiguration {
                error: error.to_string()
            })
        })?;

        match self {
            DatabaseInfo::Auto => {
                if std::env::var("TEST_DB").is_ok() {
                    let suffix: u32 = rand::thread_rng().gen_range(1_000_000..10_000_000);
                    DatabaseInfo::Test(format!("scheduling_test_{suffix}"))
                        .connect()
                        .await
                } else if !config.database.mongodb.is_empty() {
                    #[cfg(feature = "mongodb")]
                    return DatabaseInfo::MongoDb {
                        uri: config.database.mongodb,
                        database_name: config.database.admin,
                    }
                    .connect()
                    .await;

                    #[cfg(not(feature = "mongodb"))]
                    return Err(create_error!(InvalidConfiguration {
                        error: "MongoDB not enabled.".to_string()
                    }));
                } else {
                    DatabaseInfo::Reference.connect().await
                }
            }
            DatabaseInfo::Test(database_name) => {
                match std::env::var("TEST_DB")
                    .unwrap_or_else(|_| "REFERENCE".to_string())
                    .as_str()
                {
                    "MONGODB" => {
                        // Authenticated so test databases can be dropped afterwards
                        #[cfg(feature = "mongodb")]
                        {
                            let db = MongoDb::connect(
                                &config.database.mongodb,
                                database_name,
                                config.database.connect_timeout(),
                            )
                            .await?;

                            let authenticated = db
                                .with_credentials(&config.database.admin, &test_credentials())
                                .await;

                            return Ok(Database::MongoDb(authenticated.unwrap_or(db)));
                        }

                        #[cfg(not(feature = "mongodb"))]
                        return Err(create_error!(InvalidConfiguration {
                            error: "MongoDB not enabled.".to_string()
                        }));
                    }
                    _ => Ok(Database::Reference(
                        ReferenceDb::with_root(&config.database.admin, &test_credentials())
                            .in_database(database_name),
                    )),
                }
            }
            DatabaseInfo::Reference => Ok(Database::Reference(Default::default())),
            #[cfg(feature = "mongodb")]
            DatabaseInfo::MongoDb { uri, database_name } => Ok(Database::MongoDb(
                MongoDb::connect(&uri, database_name, config.database.connect_timeout()).await?,
            )),
        }
    }
}

/// Root account used by test databases, taken from the container variables when present
///
/// Falls back to a fixed development account, never use it to provision.
#[doc(hidden)]
pub fn test_credentials() -> RootCredentials {
    MongoEnvironment::from_env()
        .ok()
        .and_then(|environment| RootCredentials::from_environment(&environment).ok())
        .unwrap_or_else(|| RootCredentials::new("root", "password"))
}
