use scheduling_result::Result;

use crate::{ApplicationUser, Database, IndexDefinition, RootCredentials};

#[cfg(feature = "mongodb")]
mod mongodb;
mod reference;

#[async_trait]
pub trait AbstractProvisioning: Sync + Send {
    #[cfg(test)]
    /// Drop the current database and its users
    async fn drop_database(&self);

    /// Name of the current database
    fn database_name(&self) -> &str;

    /// Authenticate against the administrative database
    async fn authenticate(&self, admin: &str, credentials: &RootCredentials) -> Result<Database>;

    /// Switch context to another database on the same connection
    fn select_database(&self, name: &str) -> Database;

    /// Whether an account with this name exists in the current database
    async fn user_exists(&self, username: &str) -> Result<bool>;

    /// Create an account scoped to the current database
    async fn create_user(&self, user: &ApplicationUser) -> Result<()>;

    /// List collection names in the current database
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Create a collection, failing if it exists
    async fn create_collection(&self, name: &str) -> Result<()>;

    /// List indexes on a collection, empty if the collection does not exist
    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDefinition>>;

    /// Create an index, a no-op when an identical index exists
    async fn create_index(&self, index: &IndexDefinition) -> Result<()>;
}
