use uuid::Uuid;

use crate::stored_object;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

stored_object!(Document, "document", {
    course_id: String,
    title: String,
    kind: DocumentKind,
    url: Option<String>,
    meta: serde_json::Value,
    owner_id: String
});

impl Document {
    pub fn new(
        course_id: String,
        title: String,
        kind: DocumentKind,
        url: Option<String>,
        meta: serde_json::Value,
        owner_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            course_id,
            title,
            kind,
            url,
            meta,
            owner_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::SurrealDbClient;
    use serde_json::json;

    #[tokio::test]
    async fn document_kind_persists_lowercase() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        let doc = Document::new(
            "course-1".into(),
            "Lecture 3".into(),
            DocumentKind::Image,
            Some("http://files/x.png".into()),
            json!({"mime": "image/png"}),
            "user-1".into(),
        );
        db.store_item(doc.clone()).await.expect("store");

        let mut response = db
            .query("SELECT VALUE kind FROM document")
            .await
            .expect("query");
        let kinds: Vec<String> = response.take(0).expect("take");
        assert_eq!(kinds, vec!["image".to_string()]);

        let fetched: Option<Document> = db.get_item(&doc.id).await.expect("fetch");
        assert_eq!(fetched.map(|d| d.kind), Some(DocumentKind::Image));
    }
}
