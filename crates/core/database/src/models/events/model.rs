use scheduling_result::Result;

use crate::{Database, IndexDefinition};

auto_derived!(
    /// Scheduled event
    pub struct Event {
        /// Unique event id
        #[serde(rename = "eventId")]
        pub event_id: String,
    }
);

impl Event {
    pub const COLLECTION: &'static str = "events";

    /// Unique index on `eventId`
    pub fn index() -> IndexDefinition {
        IndexDefinition::ascending(Self::COLLECTION, &["eventId"], true)
    }

    /// Insert this event
    pub async fn create(&self, db: &Database) -> Result<()> {
        let document = bson::to_document(self)
            .map_err(|_| create_database_error!("to_document", Self::COLLECTION))?;

        db.insert_document(Self::COLLECTION, document).await
    }
}
