use bson::Document;
use scheduling_result::Result;

use super::AbstractDocuments;
use crate::ReferenceDb;

#[async_trait]
impl AbstractDocuments for ReferenceDb {
    /// Insert one document, enforcing unique indexes
    async fn insert_document(&self, collection: &str, document: Document) -> Result<()> {
        let mut state = self.state.lock().await;
        self.authorize(&state)?;

        state
            .databases
            .entry(self.database.clone())
            .or_default()
            .collection_mut(collection)
            .insert(document)
            .map_err(|index| {
                create_error!(DuplicateKey {
                    collection: collection.to_string(),
                    index: index.name
                })
            })
    }

    /// Count documents matching every field of the filter
    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64> {
        let state = self.state.lock().await;
        self.authorize(&state)?;

        let Some(collection) = state
            .databases
            .get(&self.database)
            .and_then(|database| database.collections.get(collection))
        else {
            return Ok(0);
        };

        Ok(collection
            .documents
            .iter()
            .filter(|document| {
                filter
                    .iter()
                    .all(|(key, value)| document.get(key) == Some(value))
            })
            .count() as u64)
    }
}
