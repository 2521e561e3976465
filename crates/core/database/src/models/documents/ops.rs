use bson::Document;
use scheduling_result::Result;

#[cfg(feature = "mongodb")]
mod mongodb;
mod reference;

#[async_trait]
pub trait AbstractDocuments: Sync + Send {
    /// Insert one document, enforcing unique indexes
    async fn insert_document(&self, collection: &str, document: Document) -> Result<()>;

    /// Count documents matching every field of the filter
    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64>;
}
