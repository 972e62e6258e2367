use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection, Database};
use tracing::info;

use driftnet_common::DriftnetError;

/// Thin wrapper around the MongoDB client providing connection setup.
#[derive(Clone)]
pub struct StoreClient {
    db: Database,
}

impl StoreClient {
    /// Connect to MongoDB and ping the server. Failing here fails startup;
    /// everything past startup degrades instead of crashing.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, DriftnetError> {
        info!("Connecting to MongoDB...");
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| DriftnetError::Store(format!("connect failed: {e}")))?;
        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DriftnetError::Store(format!("ping failed: {e}")))?;
        info!(db = db_name, "Connected to MongoDB");
        Ok(Self { db })
    }

    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }

    /// Get a reference to the underlying database handle.
    pub fn inner(&self) -> &Database {
        &self.db
    }
}
