//! # Drawer Repository
//!
//! Registry of physical tills. A drawer is created once and outlives every
//! session opened against it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use medtill_core::validation::validate_drawer_name;
use medtill_core::{drawer_code, CoreError, Drawer, DrawerSummary, Session, ValidationError};

/// Repository for drawer database operations.
#[derive(Debug, Clone)]
pub struct DrawerRepository {
    pool: SqlitePool,
}

impl DrawerRepository {
    /// Creates a new DrawerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DrawerRepository { pool }
    }

    /// Creates a drawer for `owner_id`.
    ///
    /// ## Errors
    /// - `ValidationError` when the name is empty or yields no code
    /// - `ValidationError::Duplicate` when the owner already has a drawer
    ///   with the same code
    pub async fn create(&self, owner_id: &str, name: &str) -> DbResult<Drawer> {
        if owner_id.trim().is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "owner_id".to_string(),
            })
            .into());
        }
        validate_drawer_name(name).map_err(CoreError::from)?;
        let code = drawer_code(name).map_err(CoreError::from)?;

        let drawer = Drawer {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.trim().to_string(),
            code,
            created_at: Utc::now(),
        };

        debug!(owner_id = %drawer.owner_id, code = %drawer.code, "Creating drawer");

        let result = sqlx::query(
            r#"
            INSERT INTO drawers (id, owner_id, name, code, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&drawer.id)
        .bind(&drawer.owner_id)
        .bind(&drawer.name)
        .bind(&drawer.code)
        .bind(drawer.created_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            let err = DbError::from(e);
            if err.is_unique_on("drawers.code") {
                return Err(CoreError::from(ValidationError::Duplicate {
                    field: "code".to_string(),
                    value: drawer.code,
                })
                .into());
            }
            return Err(err);
        }

        info!(drawer_id = %drawer.id, code = %drawer.code, "Drawer created");
        Ok(drawer)
    }

    /// Gets a drawer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Drawer>> {
        let drawer = sqlx::query_as::<_, Drawer>(
            r#"
            SELECT id, owner_id, name, code, created_at
            FROM drawers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(drawer)
    }

    /// Gets a drawer by ID, failing with `DrawerNotFound` when missing.
    pub async fn get(&self, id: &str) -> DbResult<Drawer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::DrawerNotFound(id.to_string()).into())
    }

    /// Lists an owner's drawers, each annotated with its open session.
    ///
    /// The open session comes from the same query, so it reflects the
    /// database at read time rather than any cached state.
    pub async fn list(&self, owner_id: &str) -> DbResult<Vec<DrawerSummary>> {
        debug!(owner_id = %owner_id, "Listing drawers");

        let drawers = sqlx::query_as::<_, Drawer>(
            r#"
            SELECT id, owner_id, name, code, created_at
            FROM drawers
            WHERE owner_id = ?1
            ORDER BY code
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let open_sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT s.*
            FROM sessions s
            JOIN drawers d ON d.id = s.drawer_id
            WHERE d.owner_id = ?1 AND s.status = 'open'
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let summaries = drawers
            .into_iter()
            .map(|drawer| {
                let current_session = open_sessions
                    .iter()
                    .find(|s| s.drawer_id == drawer.id)
                    .cloned();
                DrawerSummary {
                    drawer,
                    current_session,
                }
            })
            .collect();

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = db().await;
        let drawer = db.drawers().create("owner-1", "Front desk 2").await.unwrap();

        assert_eq!(drawer.code, "FRONT-DESK-2");
        let fetched = db.drawers().get(&drawer.id).await.unwrap();
        assert_eq!(fetched, drawer);
    }

    #[tokio::test]
    async fn test_code_unique_per_owner() {
        let db = db().await;
        db.drawers().create("owner-1", "Main").await.unwrap();

        let err = db.drawers().create("owner-1", "main").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));

        // Another owner may reuse the code
        assert!(db.drawers().create("owner-2", "Main").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let db = db().await;
        assert!(matches!(
            db.drawers().create("owner-1", "  ").await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));
        assert!(matches!(
            db.drawers().create("owner-1", "***").await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = db().await;
        assert!(matches!(
            db.drawers().get("nope").await,
            Err(DbError::Domain(CoreError::DrawerNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_list_annotates_current_session() {
        let db = db().await;
        let main = db.drawers().create("owner-1", "Main").await.unwrap();
        let back = db.drawers().create("owner-1", "Back office").await.unwrap();
        let session = db.sessions().start(&main.id, Some(0), None).await.unwrap();

        let list = db.drawers().list("owner-1").await.unwrap();
        assert_eq!(list.len(), 2);

        let main_summary = list.iter().find(|d| d.drawer.id == main.id).unwrap();
        assert_eq!(main_summary.current_session.as_ref().unwrap().id, session.id);
        let back_summary = list.iter().find(|d| d.drawer.id == back.id).unwrap();
        assert!(back_summary.current_session.is_none());

        assert!(db.drawers().list("owner-2").await.unwrap().is_empty());
    }
}
