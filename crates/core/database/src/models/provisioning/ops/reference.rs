use scheduling_result::Result;

use super::AbstractProvisioning;
use crate::{
    ApplicationUser, Database, IndexDefinition, ReferenceAccount, ReferenceCollection,
    ReferenceDb, RootCredentials,
};

#[async_trait]
impl AbstractProvisioning for ReferenceDb {
    #[cfg(test)]
    /// Drop the current database and its users
    async fn drop_database(&self) {
        let mut state = self.state.lock().await;
        state.databases.remove(&self.database);
        state
            .accounts
            .retain(|(database, _), _| database != &self.database);
    }

    /// Name of the current database
    fn database_name(&self) -> &str {
        &self.database
    }

    /// Authenticate against the administrative database
    async fn authenticate(&self, admin: &str, credentials: &RootCredentials) -> Result<Database> {
        let state = self.state.lock().await;
        match state
            .accounts
            .get(&(admin.to_string(), credentials.username.clone()))
        {
            Some(account) if account.password == credentials.password => {
                Ok(Database::Reference(ReferenceDb {
                    state: self.state.clone(),
                    database: self.database.clone(),
                    principal: Some(credentials.username.clone()),
                }))
            }
            _ => Err(create_error!(InvalidCredentials)),
        }
    }

    /// Switch context to another database on the same connection
    fn select_database(&self, name: &str) -> Database {
        Database::Reference(self.clone().in_database(name))
    }

    /// Whether an account with this name exists in the current database
    async fn user_exists(&self, username: &str) -> Result<bool> {
        let state = self.state.lock().await;
        self.authorize(&state)?;

        Ok(state
            .accounts
            .contains_key(&(self.database.clone(), username.to_string())))
    }

    /// Create an account scoped to the current database
    async fn create_user(&self, user: &ApplicationUser) -> Result<()> {
        let mut state = self.state.lock().await;
        self.authorize(&state)?;

        let key = (self.database.clone(), user.username.clone());
        if state.accounts.contains_key(&key) {
            return Err(create_error!(DuplicateUser {
                user: user.username.clone()
            }));
        }

        state.accounts.insert(
            key,
            ReferenceAccount {
                password: user.password.clone(),
                roles: user.roles.clone(),
            },
        );

        Ok(())
    }

    /// List collection names in the current database
    async fn list_collections(&self) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        self.authorize(&state)?;

        Ok(state
            .databases
            .get(&self.database)
            .map(|database| database.collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Create a collection, failing if it exists
    async fn create_collection(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        self.authorize(&state)?;

        let database = state.databases.entry(self.database.clone()).or_default();
        if database.collections.contains_key(name) {
            return Err(create_error!(DuplicateCollection {
                collection: name.to_string()
            }));
        }

        database
            .collections
            .insert(name.to_string(), ReferenceCollection::new(name));

        Ok(())
    }

    /// List indexes on a collection, empty if the collection does not exist
    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDefinition>> {
        let state = self.state.lock().await;
        self.authorize(&state)?;

        Ok(state
            .databases
            .get(&self.database)
            .and_then(|database| database.collections.get(collection))
            .map(|collection| collection.indexes.clone())
            .unwrap_or_default())
    }

    /// Create an index, a no-op when an identical index exists
    async fn create_index(&self, index: &IndexDefinition) -> Result<()> {
        let mut state = self.state.lock().await;
        self.authorize(&state)?;

        let collection = state
            .databases
            .entry(self.database.clone())
            .or_default()
            .collection_mut(&index.collection);

        if let Some(existing) = collection
            .indexes
            .iter()
            .find(|existing| existing.name == index.name || existing.fields == index.fields)
        {
            return if existing.name == index.name && existing.same_shape(index) {
                Ok(())
            } else {
                Err(create_error!(IndexConflict {
                    collection: index.collection.clone(),
                    index: index.name.clone()
                }))
            };
        }

        if index.unique && collection.has_duplicates(index) {
            return Err(create_error!(DuplicateKey {
                collection: index.collection.clone(),
                index: index.name.clone()
            }));
        }

        collection.indexes.push(index.clone());
        Ok(())
    }
}
