use bson::Document;
use mongodb::error::{ErrorKind, WriteError, WriteFailure};
use scheduling_result::Result;

use super::AbstractDocuments;
use crate::{duplicate_key_index, engine_error, server_code, MongoDb};

#[async_trait]
impl AbstractDocuments for MongoDb {
    /// Insert one document, enforcing unique indexes
    async fn insert_document(&self, collection: &str, document: Document) -> Result<()> {
        self.col::<Document>(collection)
            .insert_one(document)
            .await
            .map(|_| ())
            .map_err(|error| {
                if server_code(&error) != Some(11000) {
                    return engine_error(error);
                }

                let index = match error.kind.as_ref() {
                    ErrorKind::Write(WriteFailure::WriteError(WriteError { message, .. })) => {
                        duplicate_key_index(message).unwrap_or("unknown").to_string()
                    }
                    _ => "unknown".to_string(),
                };

                create_error!(DuplicateKey {
                    collection: collection.to_string(),
                    index
                })
            })
    }

    /// Count documents matching every field of the filter
    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64> {
        self.col::<Document>(collection)
            .count_documents(filter)
            .await
            .map_err(engine_error)
    }
}
