use mongodb::bson::{self, Document};
use mongodb::error::ErrorKind;
use mongodb::Collection;
use tracing::{debug, info, warn};

use driftnet_common::{DriftnetError, RawPost};

use crate::StoreClient;

/// Writes raw post batches into the configured collection.
pub struct RawPostWriter {
    collection: Collection<Document>,
}

impl RawPostWriter {
    pub fn new(client: &StoreClient, collection: &str) -> Self {
        Self {
            collection: client.collection(collection),
        }
    }

    /// Bulk-insert a batch of raw posts. The insert is unordered, so one bad
    /// document (e.g. a duplicate key) does not block the rest of the batch;
    /// partial write failures are logged with their error count and do not
    /// surface as errors.
    pub async fn insert_posts(&self, posts: &[RawPost]) -> Result<(), DriftnetError> {
        if posts.is_empty() {
            info!("No posts provided to insert");
            return Ok(());
        }

        let documents: Vec<Document> = posts
            .iter()
            .filter_map(|post| match bson::to_document(post) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    warn!(
                        keyword = post.retrieved_by_keyword.as_str(),
                        error = %e,
                        "Skipping post that failed BSON conversion"
                    );
                    None
                }
            })
            .collect();

        info!(
            count = documents.len(),
            collection = self.collection.name(),
            "Inserting raw posts"
        );
        match self.collection.insert_many(documents).ordered(false).await {
            Ok(result) => {
                info!(inserted = result.inserted_ids.len(), "Insert complete");
                Ok(())
            }
            Err(e) => match *e.kind {
                ErrorKind::InsertMany(ref failure) => {
                    let error_count = failure.write_errors.as_ref().map(Vec::len).unwrap_or(0);
                    warn!(error_count, "Bulk write completed with errors");
                    debug!(details = ?failure, "Bulk write error details");
                    Ok(())
                }
                _ => Err(DriftnetError::Store(format!("insert failed: {e}"))),
            },
        }
    }
}
