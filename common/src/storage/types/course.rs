use uuid::Uuid;

use crate::{storage::db::SurrealDbClient, stored_object};

stored_object!(Course, "course", {
    owner_id: String,
    name: String,
    term: Option<String>
});

impl Course {
    pub fn new(owner_id: String, name: String, term: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            owner_id,
            name,
            term,
        }
    }

    pub async fn find_by_name(
        owner_id: &str,
        name: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, surrealdb::Error> {
        let mut response = db
            .query("SELECT * FROM type::table($table) WHERE owner_id = $owner_id AND name = $name LIMIT 1")
            .bind(("table", Self::table_name()))
            .bind(("owner_id", owner_id.to_owned()))
            .bind(("name", name.to_owned()))
            .await?;

        let courses: Vec<Self> = response.take(0)?;
        Ok(courses.into_iter().next())
    }

    /// Returns the owner's course with this name, creating it on first use.
    ///
    /// A concurrent creator losing the race on the unique (owner, name) index
    /// re-reads the winner's record.
    pub async fn get_or_create(
        owner_id: &str,
        name: &str,
        term: Option<String>,
        db: &SurrealDbClient,
    ) -> Result<Self, surrealdb::Error> {
        if let Some(existing) = Self::find_by_name(owner_id, name, db).await? {
            return Ok(existing);
        }

        let course = Self::new(owner_id.to_owned(), name.to_owned(), term);
        match db.store_item(course.clone()).await {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Ok(course),
            Err(err) => Self::find_by_name(owner_id, name, db).await?.ok_or(err),
        }
    }

    /// Courses owned by `owner_id`, newest first.
    pub async fn list_for_owner(
        owner_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, surrealdb::Error> {
        let mut response = db
            .query("SELECT * FROM type::table($table) WHERE owner_id = $owner_id ORDER BY created_at DESC")
            .bind(("table", Self::table_name()))
            .bind(("owner_id", owner_id.to_owned()))
            .await?;

        response.take(0)
    }
}
