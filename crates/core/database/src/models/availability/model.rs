use scheduling_result::Result;

use crate::{Database, IndexDefinition};

auto_derived!(
    /// Links a user to an event they can attend
    ///
    /// The same pair may be recorded more than once.
    pub struct Availability {
        #[serde(rename = "userId")]
        pub user_id: String,
        #[serde(rename = "eventId")]
        pub event_id: String,
    }
);

impl Availability {
    pub const COLLECTION: &'static str = "availability";

    /// Lookup index on (`userId`, `eventId`), not a constraint
    pub fn index() -> IndexDefinition {
        IndexDefinition::ascending(Self::COLLECTION, &["userId", "eventId"], false)
    }

    /// Insert this availability record
    pub async fn create(&self, db: &Database) -> Result<()> {
        let document = bson::to_document(self)
            .map_err(|_| create_database_error!("to_document", Self::COLLECTION))?;

        db.insert_document(Self::COLLECTION, document).await
    }
}
