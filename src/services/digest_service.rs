// ==================== WEEKLY DIGEST DISPATCHER ====================
// Para cada usuário inscrito: sorteia interesses → busca o feed → parse →
// dedup contra received_papers → envia 1 email → registra o paper.
//
// Falhas de um usuário nunca interrompem o lote. Envio e registro não são
// transacionais: se o registro falhar após o envio, o paper pode ser
// reenviado na próxima semana (at-least-once).

use crate::{
    models::{Paper, User},
    services::{
        arxiv_service::PaperFeed,
        feed_parser,
        interest_sampler::{self, SampleError},
        mail_service::{DigestEmail, Mailer},
    },
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The slice of the document store the digest needs.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Every user, in store order.
    async fn list_users(&self) -> Result<Vec<User>, String>;

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, String>;

    /// Append `paper_id` to the user's received list (no-op if already present).
    async fn record_received_paper(&self, user_id: &str, paper_id: &str) -> Result<(), String>;
}

/// What happened for one user in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DigestOutcome {
    Sent { paper_id: String },
    NotSubscribed,
    NotEnoughInterests { available: usize, required: usize },
    FeedUnavailable,
    NothingNew,
    MailFailed { error: String },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DigestRunSummary {
    pub total: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DigestRunSummary {
    fn record(&mut self, outcome: &DigestOutcome) {
        self.total += 1;
        match outcome {
            DigestOutcome::Sent { .. } => self.sent += 1,
            DigestOutcome::FeedUnavailable | DigestOutcome::MailFailed { .. } => self.failed += 1,
            _ => self.skipped += 1,
        }
    }
}

pub struct DigestDispatcher {
    store: Arc<dyn UserStore>,
    feed: Arc<dyn PaperFeed>,
    mailer: Arc<dyn Mailer>,
    keywords_per_query: usize,
    // Serializa a execução semanal e os disparos manuais
    run_lock: Mutex<()>,
}

impl DigestDispatcher {
    pub fn new(
        store: Arc<dyn UserStore>,
        feed: Arc<dyn PaperFeed>,
        mailer: Arc<dyn Mailer>,
        keywords_per_query: usize,
    ) -> Self {
        Self {
            store,
            feed,
            mailer,
            keywords_per_query,
            run_lock: Mutex::new(()),
        }
    }

    /// Process every user once. Only a failure to list users fails the run.
    pub async fn run(&self) -> Result<DigestRunSummary, String> {
        let _guard = self.run_lock.lock().await;

        log::info!("📬 Starting weekly digest run...");

        let users = self
            .store
            .list_users()
            .await
            .map_err(|e| format!("Failed to load users: {}", e))?;

        let mut summary = DigestRunSummary::default();

        for (index, user) in users.iter().enumerate() {
            log::debug!("  👤 Processing user {}/{}: {}", index + 1, users.len(), user.user_id);
            let outcome = self.deliver_to_user(user).await;
            summary.record(&outcome);
        }

        log::info!(
            "📊 Digest run summary: {} users, {} sent, {} skipped, {} failed",
            summary.total,
            summary.sent,
            summary.skipped,
            summary.failed
        );

        Ok(summary)
    }

    /// On-demand digest for a single user. `Ok(None)` when the user does not exist.
    pub async fn deliver_to_user_id(&self, user_id: &str) -> Result<Option<DigestOutcome>, String> {
        let _guard = self.run_lock.lock().await;

        log::info!("📬 Manual digest request for user: {}", user_id);

        match self.store.find_user(user_id).await? {
            Some(user) => Ok(Some(self.deliver_to_user(&user).await)),
            None => Ok(None),
        }
    }

    async fn deliver_to_user(&self, user: &User) -> DigestOutcome {
        if !user.subscribed {
            return DigestOutcome::NotSubscribed;
        }

        let keywords = match interest_sampler::sample_interests(&user.interests, self.keywords_per_query) {
            Ok(keywords) => keywords,
            Err(SampleError::NotEnoughInterests { available, required }) => {
                log::warn!(
                    "    ⚠️  Skipping user {}: {} distinct interests, {} required",
                    user.user_id, available, required
                );
                return DigestOutcome::NotEnoughInterests { available, required };
            }
        };

        let xml = match self.feed.fetch(&keywords).await {
            Some(xml) => xml,
            None => {
                log::warn!("    ⚠️  No feed result for user {} this cycle", user.user_id);
                return DigestOutcome::FeedUnavailable;
            }
        };

        let papers = feed_parser::papers_from_feed(&xml);

        let paper = match first_unreceived(&papers, user) {
            Some(paper) => paper,
            None => {
                log::info!(
                    "    ℹ️  Nothing new for user {} ({} papers already received)",
                    user.user_id,
                    papers.len()
                );
                return DigestOutcome::NothingNew;
            }
        };

        let email = match DigestEmail::for_paper(&user.email, paper) {
            Ok(email) => email,
            Err(e) => {
                log::error!("    ❌ Failed to render digest for {}: {}", user.user_id, e);
                return DigestOutcome::MailFailed { error: e };
            }
        };

        if let Err(e) = self.mailer.send(&email).await {
            log::error!("    ❌ Failed to send digest to {}: {}", user.email, e);
            return DigestOutcome::MailFailed { error: e };
        }

        log::info!("    ✅ Digest sent to {}: {}", user.email, paper.id);

        if let Err(e) = self.store.record_received_paper(&user.user_id, &paper.id).await {
            log::error!(
                "    ❌ Mail sent but failed to record paper {} for {}: {}",
                paper.id, user.user_id, e
            );
        }

        DigestOutcome::Sent {
            paper_id: paper.id.clone(),
        }
    }
}

/// First paper in feed order the user has not received yet
pub fn first_unreceived<'a>(papers: &'a [Paper], user: &User) -> Option<&'a Paper> {
    papers.iter().find(|paper| !user.has_received(&paper.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // ---------- in-memory collaborators ----------

    #[derive(Default)]
    struct MemoryStore {
        users: StdMutex<Vec<User>>,
        fail_record: bool,
        fail_list: bool,
    }

    impl MemoryStore {
        fn with_users(users: Vec<User>) -> Self {
            Self {
                users: StdMutex::new(users),
                ..Self::default()
            }
        }

        fn received(&self, user_id: &str) -> Vec<String> {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.user_id == user_id)
                .map(|u| u.received_papers.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl UserStore for MemoryStore {
        async fn list_users(&self) -> Result<Vec<User>, String> {
            if self.fail_list {
                return Err("connection refused".to_string());
            }
            Ok(self.users.lock().unwrap().clone())
        }

        async fn find_user(&self, user_id: &str) -> Result<Option<User>, String> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.user_id == user_id)
                .cloned())
        }

        async fn record_received_paper(&self, user_id: &str, paper_id: &str) -> Result<(), String> {
            if self.fail_record {
                return Err("write concern error".to_string());
            }
            let mut users = self.users.lock().unwrap();
            if let Some(user) = users.iter_mut().find(|u| u.user_id == user_id) {
                if !user.has_received(paper_id) {
                    user.received_papers.push(paper_id.to_string());
                }
            }
            Ok(())
        }
    }

    struct StaticFeed {
        body: Option<String>,
        requests: StdMutex<Vec<Vec<String>>>,
    }

    impl StaticFeed {
        fn new(body: Option<&str>) -> Self {
            Self {
                body: body.map(str::to_string),
                requests: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PaperFeed for StaticFeed {
        async fn fetch(&self, keywords: &[String]) -> Option<String> {
            self.requests.lock().unwrap().push(keywords.to_vec());
            self.body.clone()
        }
    }

    /// Hands out one scripted response per fetch, in order.
    struct ScriptedFeed {
        responses: StdMutex<Vec<Option<String>>>,
    }

    impl ScriptedFeed {
        fn new(mut responses: Vec<Option<String>>) -> Self {
            responses.reverse();
            Self {
                responses: StdMutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl PaperFeed for ScriptedFeed {
        async fn fetch(&self, _keywords: &[String]) -> Option<String> {
            self.responses.lock().unwrap().pop().flatten()
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: StdMutex<Vec<DigestEmail>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &DigestEmail) -> Result<(), String> {
            if self.fail_for.as_deref() == Some(email.to.as_str()) {
                return Err("421 service not available".to_string());
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    // ---------- fixtures ----------

    fn user(user_id: &str, interests: &[&str], subscribed: bool, received: &[&str]) -> User {
        User {
            _id: None,
            user_id: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            password: "$2b$12$hash".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role: "trainee".to_string(),
            level: "beginner".to_string(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            subscribed,
            received_papers: received.iter().map(|s| s.to_string()).collect(),
            created_at: None,
            updated_at: None,
        }
    }

    fn entry(id: &str) -> String {
        format!(
            "<entry><id>{id}</id><updated>2024-01-02T00:00:00Z</updated>\
             <published>2024-01-01T00:00:00Z</published><title>Title {id}</title>\
             <summary>Summary {id}</summary><author><name>Author {id}</name></author></entry>"
        )
    }

    fn feed(ids: &[&str]) -> String {
        let entries: String = ids.iter().map(|id| entry(id)).collect();
        format!(r#"<feed xmlns="http://www.w3.org/2005/Atom">{}</feed>"#, entries)
    }

    const INTERESTS: [&str; 4] = ["ai", "nlp", "robotics", "vision"];

    fn dispatcher(
        store: &Arc<MemoryStore>,
        feed: &Arc<StaticFeed>,
        mailer: &Arc<RecordingMailer>,
    ) -> DigestDispatcher {
        DigestDispatcher::new(store.clone(), feed.clone(), mailer.clone(), 3)
    }

    // ---------- scenarios ----------

    #[tokio::test]
    async fn test_new_subscriber_gets_first_paper() {
        let store = Arc::new(MemoryStore::with_users(vec![user("u1", &INTERESTS, true, &[])]));
        let feed = Arc::new(StaticFeed::new(Some(&feed(&["p1", "p2", "p3"]))));
        let mailer = Arc::new(RecordingMailer::default());

        let summary = dispatcher(&store, &feed, &mailer).run().await.unwrap();

        assert_eq!(summary.sent, 1);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "u1@example.com");
        assert!(sent[0].html_body.contains("Title p1"));
        assert!(sent[0].html_body.contains("Summary p1"));
        assert_eq!(store.received("u1"), vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn test_already_received_paper_is_skipped() {
        let store = Arc::new(MemoryStore::with_users(vec![user("u1", &INTERESTS, true, &["p1"])]));
        let feed = Arc::new(StaticFeed::new(Some(&feed(&["p1", "p2", "p3"]))));
        let mailer = Arc::new(RecordingMailer::default());

        dispatcher(&store, &feed, &mailer).run().await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html_body.contains("Title p2"));
        assert_eq!(store.received("u1"), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[tokio::test]
    async fn test_everything_received_sends_nothing() {
        let store = Arc::new(MemoryStore::with_users(vec![user(
            "u1",
            &INTERESTS,
            true,
            &["p1", "p2", "p3"],
        )]));
        let feed = Arc::new(StaticFeed::new(Some(&feed(&["p1", "p2", "p3"]))));
        let mailer = Arc::new(RecordingMailer::default());

        let summary = dispatcher(&store, &feed, &mailer).run().await.unwrap();

        assert_eq!(summary.sent, 0);
        assert_eq!(summary.skipped, 1);
        assert!(mailer.sent.lock().unwrap().is_empty());
        assert_eq!(store.received("u1").len(), 3);
    }

    #[tokio::test]
    async fn test_unsubscribed_user_is_untouched() {
        let store = Arc::new(MemoryStore::with_users(vec![user("u1", &INTERESTS, false, &[])]));
        let feed = Arc::new(StaticFeed::new(Some(&feed(&["p1"]))));
        let mailer = Arc::new(RecordingMailer::default());

        dispatcher(&store, &feed, &mailer).run().await.unwrap();

        assert!(mailer.sent.lock().unwrap().is_empty());
        assert!(feed.requests.lock().unwrap().is_empty());
        assert!(store.received("u1").is_empty());
    }

    #[tokio::test]
    async fn test_user_with_too_few_interests_is_skipped() {
        let store = Arc::new(MemoryStore::with_users(vec![
            user("few", &["ai", "nlp"], true, &[]),
            user("ok", &INTERESTS, true, &[]),
        ]));
        let feed = Arc::new(StaticFeed::new(Some(&feed(&["p1"]))));
        let mailer = Arc::new(RecordingMailer::default());

        let summary = dispatcher(&store, &feed, &mailer).run().await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.sent, 1);
        assert!(store.received("few").is_empty());
        assert_eq!(store.received("ok"), vec!["p1".to_string()]);
        assert_eq!(feed.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_query_uses_three_distinct_interests() {
        let store = Arc::new(MemoryStore::with_users(vec![user(
            "u1",
            &["AI", "Natural Language", "robotics", "vision"],
            true,
            &[],
        )]));
        let feed = Arc::new(StaticFeed::new(Some(&feed(&["p1"]))));
        let mailer = Arc::new(RecordingMailer::default());

        dispatcher(&store, &feed, &mailer).run().await.unwrap();

        let requests = feed.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let mut keywords = requests[0].clone();
        keywords.sort();
        keywords.dedup();
        assert_eq!(keywords.len(), 3);
        for keyword in &keywords {
            assert!(["ai", "naturallanguage", "robotics", "vision"].contains(&keyword.as_str()));
        }
    }

    #[tokio::test]
    async fn test_feed_failure_skips_user_without_mutation() {
        let store = Arc::new(MemoryStore::with_users(vec![user("u1", &INTERESTS, true, &[])]));
        let feed = Arc::new(StaticFeed::new(None));
        let mailer = Arc::new(RecordingMailer::default());

        let summary = dispatcher(&store, &feed, &mailer).run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(mailer.sent.lock().unwrap().is_empty());
        assert!(store.received("u1").is_empty());
    }

    #[tokio::test]
    async fn test_malformed_feed_is_treated_as_empty() {
        let store = Arc::new(MemoryStore::with_users(vec![user("u1", &INTERESTS, true, &[])]));
        let feed = Arc::new(StaticFeed::new(Some("<feed><entry><id>p1</id>")));
        let mailer = Arc::new(RecordingMailer::default());

        let summary = dispatcher(&store, &feed, &mailer).run().await.unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.sent, 0);
        assert!(mailer.sent.lock().unwrap().is_empty());
        assert!(store.received("u1").is_empty());
    }

    #[tokio::test]
    async fn test_mail_failure_does_not_record_or_stop_the_batch() {
        let store = Arc::new(MemoryStore::with_users(vec![
            user("broken", &INTERESTS, true, &[]),
            user("fine", &INTERESTS, true, &[]),
        ]));
        let feed = Arc::new(StaticFeed::new(Some(&feed(&["p1", "p2"]))));
        let mailer = Arc::new(RecordingMailer {
            fail_for: Some("broken@example.com".to_string()),
            ..RecordingMailer::default()
        });

        let summary = dispatcher(&store, &feed, &mailer).run().await.unwrap();

        assert_eq!(summary, DigestRunSummary { total: 2, sent: 1, skipped: 0, failed: 1 });
        assert!(store.received("broken").is_empty());
        assert_eq!(store.received("fine"), vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn test_record_failure_still_counts_as_sent() {
        let store = Arc::new(MemoryStore {
            users: StdMutex::new(vec![user("u1", &INTERESTS, true, &[])]),
            fail_record: true,
            ..MemoryStore::default()
        });
        let feed = Arc::new(StaticFeed::new(Some(&feed(&["p1"]))));
        let mailer = Arc::new(RecordingMailer::default());

        let summary = dispatcher(&store, &feed, &mailer).run().await.unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
        assert!(store.received("u1").is_empty());
    }

    #[tokio::test]
    async fn test_list_failure_fails_the_run() {
        let store = Arc::new(MemoryStore {
            fail_list: true,
            ..MemoryStore::default()
        });
        let feed = Arc::new(StaticFeed::new(Some(&feed(&["p1"]))));
        let mailer = Arc::new(RecordingMailer::default());

        assert!(dispatcher(&store, &feed, &mailer).run().await.is_err());
    }

    #[tokio::test]
    async fn test_manual_delivery_for_single_user() {
        let store = Arc::new(MemoryStore::with_users(vec![
            user("u1", &INTERESTS, true, &["p1"]),
            user("u2", &INTERESTS, true, &[]),
        ]));
        let feed = Arc::new(StaticFeed::new(Some(&feed(&["p1", "p2"]))));
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = dispatcher(&store, &feed, &mailer);

        let outcome = dispatcher.deliver_to_user_id("u1").await.unwrap();
        assert_eq!(outcome, Some(DigestOutcome::Sent { paper_id: "p2".to_string() }));
        assert!(store.received("u2").is_empty());

        assert_eq!(dispatcher.deliver_to_user_id("missing").await.unwrap(), None);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let value = serde_json::to_value(DigestOutcome::Sent { paper_id: "p1".to_string() }).unwrap();
        assert_eq!(value, serde_json::json!({ "status": "sent", "paper_id": "p1" }));

        let value = serde_json::to_value(DigestOutcome::NothingNew).unwrap();
        assert_eq!(value, serde_json::json!({ "status": "nothing_new" }));
    }

    #[tokio::test]
    async fn test_feed_failure_for_one_user_does_not_stop_the_next() {
        let store = Arc::new(MemoryStore::with_users(vec![
            user("u1", &INTERESTS, true, &[]),
            user("u2", &INTERESTS, true, &[]),
        ]));
        let feed = Arc::new(ScriptedFeed::new(vec![None, Some(feed(&["p1", "p2"]))]));
        let mailer = Arc::new(RecordingMailer::default());

        let dispatcher = DigestDispatcher::new(store.clone(), feed, mailer.clone(), 3);
        let summary = dispatcher.run().await.unwrap();

        assert_eq!(summary, DigestRunSummary { total: 2, sent: 1, skipped: 0, failed: 1 });
        assert!(store.received("u1").is_empty());
        assert_eq!(store.received("u2"), vec!["p1".to_string()]);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "u2@example.com");
    }
}
