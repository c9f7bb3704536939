use crate::{models::User, services::digest_service::UserStore};
use async_trait::async_trait;
use futures::stream::StreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        // Extract database name from URI or use default
        let db_name = uri
            .rsplit('/')
            .next()
            .and_then(|s| s.split('?').next())
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or("ScholarWeekly");

        let db = client.database(db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Client sem ping nem índices: para testes que nunca chegam ao banco
    #[cfg(test)]
    pub async fn unconnected(uri: &str) -> Result<Self, mongodb::error::Error> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self {
            db: client.database("scholar_weekly_test"),
        })
    }

    /// Creates necessary indexes on the users collection
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("🔧 Creating database indexes...");

        let users = self.collection::<mongodb::bson::Document>("users");
        let unique = || IndexOptions::builder().unique(true).build();

        let indexes = [
            ("users(email)", IndexModel::builder().keys(doc! { "email": 1 }).options(unique()).build()),
            ("users(user_id)", IndexModel::builder().keys(doc! { "user_id": 1 }).options(unique()).build()),
            ("users(subscribed)", IndexModel::builder().keys(doc! { "subscribed": 1 }).build()),
        ];

        for (label, index) in indexes {
            match users.create_index(index).await {
                Ok(_) => log::info!("   ✅ Index created: {}", label),
                Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
            }
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub async fn health_check(&self) -> bool {
        self.db.list_collection_names().await.is_ok()
    }
}

#[async_trait]
impl UserStore for MongoDB {
    async fn list_users(&self) -> Result<Vec<User>, String> {
        let mut cursor = self
            .collection::<User>("users")
            .find(doc! {})
            .await
            .map_err(|e| format!("Database error: {}", e))?;

        let mut users = Vec::new();
        while let Some(result) = cursor.next().await {
            match result {
                Ok(user) => users.push(user),
                // Um documento inválido não derruba o lote inteiro
                Err(e) => log::error!("  ❌ Error reading user document: {}", e),
            }
        }

        Ok(users)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, String> {
        self.collection::<User>("users")
            .find_one(doc! { "user_id": user_id })
            .await
            .map_err(|e| format!("Database error: {}", e))
    }

    async fn record_received_paper(&self, user_id: &str, paper_id: &str) -> Result<(), String> {
        let update = doc! {
            "$addToSet": { "received_papers": paper_id },
            "$set": { "updated_at": BsonDateTime::now() }
        };

        self.collection::<User>("users")
            .update_one(doc! { "user_id": user_id }, update)
            .await
            .map_err(|e| format!("Failed to record received paper: {}", e))?;

        Ok(())
    }
}
