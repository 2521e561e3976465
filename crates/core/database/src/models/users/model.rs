use scheduling_result::Result;

use crate::{Database, IndexDefinition};

auto_derived!(
    /// Application user, distinct from database accounts
    pub struct User {
        /// Unique user id
        #[serde(rename = "userId")]
        pub user_id: String,
    }
);

impl User {
    pub const COLLECTION: &'static str = "users";

    /// Unique index on `userId`
    pub fn index() -> IndexDefinition {
        IndexDefinition::ascending(Self::COLLECTION, &["userId"], true)
    }

    /// Insert this user
    pub async fn create(&self, db: &Database) -> Result<()> {
        let document = bson::to_document(self)
            .map_err(|_| create_database_error!("to_document", Self::COLLECTION))?;

        db.insert_document(Self::COLLECTION, document).await
    }
}
