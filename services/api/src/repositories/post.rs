//! Post repository for database operations

use common::error::DatabaseError;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow, types::Json};
use tracing::info;
use uuid::Uuid;

use crate::models::post::{Comment, Post, PostError, PostListResponse, PostQuery};

const POST_COLUMNS: &str = "id, user_id, user_name, user_photo, title, description, content, \
     image_url, date, deleted, deleted_at, likes_count, liked_users, comments";

fn post_from_row(row: &PgRow) -> Result<Post, DatabaseError> {
    let Json(comments): Json<Vec<Comment>> = row.try_get("comments").map_err(|e| {
        DatabaseError::Corrupt(format!("Invalid comments on post: {}", e))
    })?;

    Ok(Post {
        id: row.get("id"),
        user_id: row.get("user_id"),
        user_name: row.get("user_name"),
        user_photo: row.get("user_photo"),
        title: row.get("title"),
        description: row.get("description"),
        content: row.get("content"),
        image_url: row.get("image_url"),
        date: row.get("date"),
        deleted: row.get("deleted"),
        deleted_at: row.get("deleted_at"),
        likes_count: row.get("likes_count"),
        liked_users: row.get("liked_users"),
        comments,
    })
}

fn posts_from_rows(rows: &[PgRow]) -> Result<Vec<Post>, DatabaseError> {
    rows.iter().map(post_from_row).collect()
}

/// Post repository
#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    /// Create a new post repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, post: &Post) -> Result<Post, PostError> {
        let query = format!(
            r#"
            INSERT INTO publicaciones (id, user_id, user_name, user_photo, title, description,
                                       content, image_url, date, deleted, deleted_at,
                                       likes_count, liked_users, comments)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {POST_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(post.id)
            .bind(post.user_id)
            .bind(&post.user_name)
            .bind(&post.user_photo)
            .bind(&post.title)
            .bind(&post.description)
            .bind(&post.content)
            .bind(&post.image_url)
            .bind(post.date)
            .bind(post.deleted)
            .bind(post.deleted_at)
            .bind(post.likes_count)
            .bind(&post.liked_users)
            .bind(Json(&post.comments))
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        info!("Created post {} for user {}", post.id, post.user_name);
        Ok(post_from_row(&row)?)
    }

    /// Soft-deleted posts are reported as missing
    pub async fn find_visible(&self, id: Uuid) -> Result<Post, PostError> {
        let query = format!(
            "SELECT {POST_COLUMNS} FROM publicaciones WHERE id = $1 AND NOT deleted"
        );

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?
            .ok_or(PostError::NotFound)?;

        Ok(post_from_row(&row)?)
    }

    /// Visible posts in the requested order. With a limit, the page and the
    /// total are fetched concurrently.
    pub async fn list(&self, query: &PostQuery) -> Result<PostListResponse, PostError> {
        let select = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM publicaciones
            WHERE NOT deleted AND ($1::uuid IS NULL OR user_id = $1)
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            query.order.order_by()
        );
        let offset = query.offset();
        let limit = query.limit();

        let fetch = sqlx::query(&select)
            .bind(query.user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool);

        let Some(limit) = limit else {
            let rows = fetch.await.map_err(DatabaseError::Query)?;
            return Ok(PostListResponse::All(posts_from_rows(&rows)?));
        };

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM publicaciones WHERE NOT deleted AND ($1::uuid IS NULL OR user_id = $1)",
        )
        .bind(query.user_id)
        .fetch_one(&self.pool);

        let (rows, total) = tokio::try_join!(fetch, count).map_err(DatabaseError::Query)?;

        Ok(PostListResponse::Page {
            items: posts_from_rows(&rows)?,
            total,
            offset,
            limit,
        })
    }

    /// The user's newest visible posts
    pub async fn latest_by_user(&self, user_id: Uuid, count: i64) -> Result<Vec<Post>, PostError> {
        let query = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM publicaciones
            WHERE user_id = $1 AND NOT deleted
            ORDER BY date DESC
            LIMIT $2
            "#
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(count)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(posts_from_rows(&rows)?)
    }

    /// Every visible post, for dashboard aggregation
    pub async fn list_visible(&self) -> Result<Vec<Post>, PostError> {
        let query = format!("SELECT {POST_COLUMNS} FROM publicaciones WHERE NOT deleted");

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(posts_from_rows(&rows)?)
    }

    /// Load a visible post under a row lock, let `apply` change it and write
    /// it back in the same transaction. Nothing is written when `apply` fails.
    pub async fn mutate<T, F>(&self, id: Uuid, apply: F) -> Result<(Post, T), PostError>
    where
        F: FnOnce(&mut Post) -> Result<T, PostError>,
    {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;

        let query = format!(
            "SELECT {POST_COLUMNS} FROM publicaciones WHERE id = $1 AND NOT deleted FOR UPDATE"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?
            .ok_or(PostError::NotFound)?;

        let mut post = post_from_row(&row)?;
        let outcome = apply(&mut post)?;

        Self::save(&mut tx, &post).await?;
        tx.commit().await.map_err(DatabaseError::Query)?;

        Ok((post, outcome))
    }

    async fn save(conn: &mut PgConnection, post: &Post) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE publicaciones
            SET title = $2, description = $3, content = $4, image_url = $5,
                deleted = $6, deleted_at = $7, likes_count = $8, liked_users = $9,
                comments = $10, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(post.deleted)
        .bind(post.deleted_at)
        .bind(post.likes_count)
        .bind(&post.liked_users)
        .bind(Json(&post.comments))
        .execute(conn)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Assign ids to embedded comments stored without one.
    /// Returns the number of posts touched and comments updated.
    pub async fn backfill_comment_ids(&self) -> Result<(usize, usize), PostError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM publicaciones
            WHERE NOT deleted
              AND EXISTS (
                  SELECT 1 FROM jsonb_array_elements(comments) AS c
                  WHERE c->>'id' IS NULL
              )
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        let mut comments = 0;
        for id in &ids {
            let (_, assigned) = self
                .mutate(*id, |post| Ok(post.backfill_comment_ids()))
                .await?;
            comments += assigned;
        }

        Ok((ids.len(), comments))
    }
}

/// These tests need a running PostgreSQL database (`DATABASE_URL`), so they
/// are ignored by default: `cargo test -p api -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthUser, post::NewPost};
    use chrono::Utc;
    use common::{
        database::{DatabaseConfig, init_pool, run_migrations},
        models::Role,
    };

    async fn repository() -> Result<PostRepository, Box<dyn std::error::Error>> {
        let pool = init_pool(&DatabaseConfig::from_env()?).await?;
        run_migrations(&pool).await?;
        Ok(PostRepository::new(pool))
    }

    fn author() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            nombre_usuario: format!("autor_{}", Uuid::new_v4().simple()),
            imagen_perfil: None,
            perfil: Role::Usuario,
        }
    }

    async fn insert_post(
        repo: &PostRepository,
        author: &AuthUser,
        content: &str,
    ) -> Result<Post, Box<dyn std::error::Error>> {
        let draft = NewPost {
            title: None,
            description: None,
            content: content.into(),
            image_url: None,
        };
        Ok(repo.insert(&Post::new(author, draft, Utc::now())?).await?)
    }

    fn by_user(user_id: Uuid, limit: Option<i64>) -> PostQuery {
        PostQuery {
            user_id: Some(user_id),
            limit,
            ..Default::default()
        }
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL"]
    async fn soft_deleted_posts_disappear_from_reads_and_writes()
    -> Result<(), Box<dyn std::error::Error>> {
        let repo = repository().await?;
        let ana = author();
        let kept = insert_post(&repo, &ana, "se queda").await?;
        let gone = insert_post(&repo, &ana, "se va").await?;

        let now = Utc::now();
        let (deleted, ()) = repo.mutate(gone.id, |post| post.soft_delete(&ana, now)).await?;
        assert!(deleted.deleted);

        assert!(matches!(
            repo.find_visible(gone.id).await,
            Err(PostError::NotFound)
        ));
        assert_eq!(repo.find_visible(kept.id).await?.id, kept.id);

        match repo.list(&by_user(ana.id, None)).await? {
            PostListResponse::All(items) => {
                assert_eq!(items.iter().map(|p| p.id).collect::<Vec<_>>(), vec![kept.id]);
            }
            other => panic!("expected a plain list, got {:?}", other),
        }

        match repo.list(&by_user(ana.id, Some(10))).await? {
            PostListResponse::Page { items, total, .. } => {
                assert_eq!(total, 1);
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].id, kept.id);
            }
            other => panic!("expected a page, got {:?}", other),
        }

        assert!(repo.latest_by_user(ana.id, 3).await?.iter().all(|p| p.id != gone.id));
        assert!(matches!(
            repo.mutate(gone.id, |post| Ok(post.like(ana.id))).await,
            Err(PostError::NotFound)
        ));

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL"]
    async fn likes_survive_write_back_as_a_set() -> Result<(), Box<dyn std::error::Error>> {
        let repo = repository().await?;
        let ana = author();
        let post = insert_post(&repo, &ana, "me gusta").await?;
        let luis = Uuid::new_v4();
        let eva = Uuid::new_v4();

        repo.mutate(post.id, |p| Ok(p.like(luis))).await?;
        repo.mutate(post.id, |p| Ok(p.like(luis))).await?;
        repo.mutate(post.id, |p| Ok(p.like(eva))).await?;

        let stored = repo.find_visible(post.id).await?;
        assert_eq!(stored.likes_count, 2);
        assert_eq!(stored.likes_count as usize, stored.liked_users.len());

        let (_, changed) = repo.mutate(post.id, |p| Ok(p.unlike(luis))).await?;
        assert!(changed);

        let stored = repo.find_visible(post.id).await?;
        assert_eq!(stored.liked_users, vec![eva]);
        assert_eq!(stored.likes_count, 1);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL"]
    async fn failed_mutation_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let repo = repository().await?;
        let ana = author();
        let intruso = author();
        let post = insert_post(&repo, &ana, "intacto").await?;

        let now = Utc::now();
        assert!(matches!(
            repo.mutate(post.id, |p| p.soft_delete(&intruso, now)).await,
            Err(PostError::Forbidden(_))
        ));
        assert!(!repo.find_visible(post.id).await?.deleted);

        Ok(())
    }
}
