use std::ops::Deref;
use std::time::Duration;

use mongodb::bson::doc;
use mongodb::error::{CommandError, Error, ErrorKind, WriteError, WriteFailure};
use mongodb::options::{ClientOptions, Credential};
use scheduling_result::{ErrorType, Result};

use crate::RootCredentials;

database_derived!(
    /// MongoDB implementation
    #[derive(Debug)]
    pub struct MongoDb {
        pub client: ::mongodb::Client,
        pub options: ClientOptions,
        pub database: String,
    }
);

impl Deref for MongoDb {
    type Target = mongodb::Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl MongoDb {
    /// Parse the connection string and create a client with the given context
    pub async fn connect(uri: &str, database: String, timeout: Duration) -> Result<MongoDb> {
        let mut options = ClientOptions::parse(uri).await.map_err(engine_error)?;
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options
            .app_name
            .get_or_insert_with(|| "scheduling-bootstrap".to_string());

        let client = ::mongodb::Client::with_options(options.clone()).map_err(engine_error)?;

        Ok(MongoDb {
            client,
            options,
            database,
        })
    }

    /// Create a new client authenticated as the given root account
    ///
    /// The driver authenticates lazily, so the administrative database is
    /// pinged to surface rejected credentials here. Clients only open
    /// connections on first use, so the unauthenticated handle this is
    /// derived from never connects.
    pub async fn with_credentials(
        &self,
        admin: &str,
        credentials: &RootCredentials,
    ) -> Result<MongoDb> {
        let mut options = self.options.clone();
        options.credential = Some(
            Credential::builder()
                .username(credentials.username.clone())
                .password(credentials.password.clone())
                .source(admin.to_string())
                .build(),
        );

        let client = ::mongodb::Client::with_options(options.clone()).map_err(engine_error)?;
        client
            .database(admin)
            .run_command(doc! { "ping": 1_i32 })
            .await
            .map_err(engine_error)?;

        Ok(MongoDb {
            client,
            options,
            database: self.database.clone(),
        })
    }

    /// Same client, different database context
    pub fn with_database(&self, database: &str) -> MongoDb {
        MongoDb {
            client: self.client.clone(),
            options: self.options.clone(),
            database: database.to_string(),
        }
    }

    /// Get the current database
    pub fn db(&self) -> mongodb::Database {
        self.client.database(&self.database)
    }

    /// Get a collection by its name
    pub fn col<T: Send + Sync>(&self, collection: &str) -> mongodb::Collection<T> {
        self.db().collection(collection)
    }
}

/// Server error code carried by a command or write failure
pub fn server_code(error: &Error) -> Option<i32> {
    match error.kind.as_ref() {
        ErrorKind::Command(CommandError { code, .. }) => Some(*code),
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code, .. })) => Some(*code),
        _ => None,
    }
}

/// Translate errors that do not depend on the resource being touched
pub fn engine_error(error: Error) -> scheduling_result::Error {
    let error_type = match error.kind.as_ref() {
        ErrorKind::Authentication { .. } => ErrorType::InvalidCredentials,
        ErrorKind::ServerSelection { message, .. } => ErrorType::ConnectionFailed {
            error: message.clone(),
        },
        ErrorKind::Io(io) => ErrorType::ConnectionFailed {
            error: io.to_string(),
        },
        ErrorKind::InvalidArgument { message, .. } => ErrorType::InvalidConfiguration {
            error: message.clone(),
        },
        ErrorKind::Command(CommandError { code, message, .. }) => match code {
            18 => ErrorType::InvalidCredentials,
            13 => ErrorType::Unauthorized,
            code => ErrorType::Engine {
                code: *code,
                message: message.clone(),
            },
        },
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code, message, .. })) => {
            ErrorType::Engine {
                code: *code,
                message: message.clone(),
            }
        }
        _ => ErrorType::Engine {
            code: 0,
            message: error.to_string(),
        },
    };

    scheduling_result::Error {
        error_type,
        location: format!("{}:{}:{}", file!(), line!(), column!()),
    }
}

/// Index name out of an `E11000` duplicate key message
pub fn duplicate_key_index(message: &str) -> Option<&str> {
    let (_, rest) = message.split_once("index: ")?;
    rest.split_whitespace().next()
}
