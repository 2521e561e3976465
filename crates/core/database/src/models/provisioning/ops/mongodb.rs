use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::IndexModel;
use scheduling_result::Result;

use super::AbstractProvisioning;
use crate::{
    engine_error, server_code, ApplicationUser, Database, IndexDefinition, MongoDb,
    RootCredentials,
};

#[async_trait]
impl AbstractProvisioning for MongoDb {
    #[cfg(test)]
    /// Drop the current database and its users
    async fn drop_database(&self) {
        self.db()
            .run_command(doc! { "dropAllUsersFromDatabase": 1_i32 })
            .await
            .ok();

        self.db().drop().await.ok();
    }

    /// Name of the current database
    fn database_name(&self) -> &str {
        &self.database
    }

    /// Authenticate against the administrative database
    async fn authenticate(&self, admin: &str, credentials: &RootCredentials) -> Result<Database> {
        Ok(Database::MongoDb(
            self.with_credentials(admin, credentials).await?,
        ))
    }

    /// Switch context to another database on the same connection
    fn select_database(&self, name: &str) -> Database {
        Database::MongoDb(self.with_database(name))
    }

    /// Whether an account with this name exists in the current database
    async fn user_exists(&self, username: &str) -> Result<bool> {
        let info = self
            .db()
            .run_command(doc! { "usersInfo": username })
            .await
            .map_err(engine_error)?;

        Ok(info
            .get_array("users")
            .map(|users| !users.is_empty())
            .unwrap_or(false))
    }

    /// Create an account scoped to the current database
    async fn create_user(&self, user: &ApplicationUser) -> Result<()> {
        self.db()
            .run_command(doc! {
                "createUser": user.username.as_str(),
                "pwd": user.password.as_str(),
                "roles": user.roles.clone()
            })
            .await
            .map(|_| ())
            .map_err(|error| match server_code(&error) {
                Some(51003) => create_error!(DuplicateUser {
                    user: user.username.clone()
                }),
                _ => engine_error(error),
            })
    }

    /// List collection names in the current database
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.db()
            .list_collection_names()
            .await
            .map_err(engine_error)
    }

    /// Create a collection, failing if it exists
    async fn create_collection(&self, name: &str) -> Result<()> {
        self.db()
            .create_collection(name)
            .await
            .map_err(|error| match server_code(&error) {
                Some(48) => create_error!(DuplicateCollection {
                    collection: name.to_string()
                }),
                _ => engine_error(error),
            })
    }

    /// List indexes on a collection, empty if the collection does not exist
    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDefinition>> {
        let cursor = match self.col::<Document>(collection).list_indexes().await {
            Ok(cursor) => cursor,
            Err(error) if server_code(&error) == Some(26) => return Ok(vec![]),
            Err(error) => return Err(engine_error(error)),
        };

        let models: Vec<IndexModel> = cursor.try_collect().await.map_err(engine_error)?;

        Ok(models
            .into_iter()
            .map(|model| {
                let options = model.options.unwrap_or_default();
                IndexDefinition {
                    collection: collection.to_string(),
                    name: options.name.unwrap_or_default(),
                    fields: model.keys.keys().cloned().collect(),
                    unique: options.unique.unwrap_or(false),
                }
            })
            .collect())
    }

    /// Create an index, a no-op when an identical index exists
    async fn create_index(&self, index: &IndexDefinition) -> Result<()> {
        self.db()
            .run_command(doc! {
                "createIndexes": index.collection.as_str(),
                "indexes": [index.to_document()]
            })
            .await
            .map(|_| ())
            .map_err(|error| match server_code(&error) {
                Some(85) | Some(86) => create_error!(IndexConflict {
                    collection: index.collection.clone(),
                    index: index.name.clone()
                }),
                Some(11000) => create_error!(DuplicateKey {
                    collection: index.collection.clone(),
                    index: index.name.clone()
                }),
                _ => engine_error(error),
            })
    }
}
