//! Posts with embedded comments and likes

use chrono::{DateTime, Utc};
use common::error::DatabaseError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::AuthUser;

pub const DEFAULT_COMMENT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Error, Debug)]
pub enum PostError {
    #[error("Publicación no encontrada")]
    NotFound,

    #[error("Comentario no encontrado")]
    CommentNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Comment embedded in a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub user_name: String,
    #[serde(default)]
    pub user_photo: Option<String>,
    pub content: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub modified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Comments written before author ids were recorded fall back to the
    /// stored author name.
    pub fn is_authored_by(&self, user: &AuthUser) -> bool {
        match self.user_id {
            Some(author) => author == user.id,
            None => self.user_name == user.nombre_usuario,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_photo: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: String,
    pub image_url: Option<String>,
    pub date: DateTime<Utc>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub likes_count: i32,
    pub liked_users: Vec<Uuid>,
    pub comments: Vec<Comment>,
}

/// Body of `POST /publicaciones`. Owner fields always come from the token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePost {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum PostOrder {
    #[default]
    #[serde(rename = "fecha")]
    Fecha,
    #[serde(rename = "meGusta")]
    MeGusta,
}

impl PostOrder {
    pub fn order_by(&self) -> &'static str {
        match self {
            PostOrder::Fecha => "date DESC",
            PostOrder::MeGusta => "likes_count DESC, date DESC",
        }
    }
}

/// Query string of `GET /publicaciones`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostQuery {
    #[serde(default)]
    pub order: PostOrder,
    pub user_id: Option<Uuid>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl PostQuery {
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> Option<i64> {
        self.limit.map(|l| l.clamp(1, MAX_PAGE_SIZE as i64))
    }
}

/// A plain array when no limit was requested, a page otherwise
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PostListResponse {
    All(Vec<Post>),
    Page {
        items: Vec<Post>,
        total: i64,
        offset: i64,
        limit: i64,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentPageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadQuery {
    pub image_index: Option<String>,
}

impl ImageUploadQuery {
    pub fn index(&self) -> Result<u32, PostError> {
        match self.image_index.as_deref().map(str::trim) {
            None | Some("") => Ok(1),
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| PostError::Invalid("imageIndex debe ser un número".into())),
        }
    }
}

fn required_content(content: &str) -> Result<String, PostError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(PostError::Invalid(
            "El contenido no puede estar vacío".into(),
        ));
    }
    Ok(trimmed.to_string())
}

impl Post {
    pub fn new(author: &AuthUser, draft: NewPost, now: DateTime<Utc>) -> Result<Self, PostError> {
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: author.id,
            user_name: author.nombre_usuario.clone(),
            user_photo: author.imagen_perfil.clone(),
            title: draft.title,
            description: draft.description,
            content: required_content(&draft.content)?,
            image_url: draft.image_url,
            date: now,
            deleted: false,
            deleted_at: None,
            likes_count: 0,
            liked_users: Vec::new(),
            comments: Vec::new(),
        })
    }

    /// Adds the user to the likers. Returns whether anything changed.
    pub fn like(&mut self, user_id: Uuid) -> bool {
        let changed = !self.liked_users.contains(&user_id);
        if changed {
            self.liked_users.push(user_id);
        }
        self.sync_likes();
        changed
    }

    /// Removes the user from the likers. Returns whether anything changed.
    pub fn unlike(&mut self, user_id: Uuid) -> bool {
        let before = self.liked_users.len();
        self.liked_users.retain(|id| *id != user_id);
        self.sync_likes();
        self.liked_users.len() != before
    }

    fn sync_likes(&mut self) {
        let mut seen = std::collections::HashSet::with_capacity(self.liked_users.len());
        self.liked_users.retain(|id| seen.insert(*id));
        self.likes_count = self.liked_users.len() as i32;
    }

    pub fn is_owned_by(&self, user: &AuthUser) -> bool {
        self.user_id == user.id
    }

    /// The owner or an admin. Every post records its owner id, so a name
    /// match alone never grants access.
    pub fn can_be_managed_by(&self, user: &AuthUser) -> bool {
        self.is_owned_by(user) || user.is_admin()
    }

    pub fn soft_delete(&mut self, user: &AuthUser, now: DateTime<Utc>) -> Result<(), PostError> {
        if !self.can_be_managed_by(user) {
            return Err(PostError::Forbidden(
                "No tienes permiso para eliminar esta publicación".into(),
            ));
        }
        self.deleted = true;
        self.deleted_at = Some(now);
        Ok(())
    }

    pub fn apply_update(&mut self, user: &AuthUser, update: UpdatePost) -> Result<(), PostError> {
        if !self.can_be_managed_by(user) {
            return Err(PostError::Forbidden(
                "No tienes permiso para editar esta publicación".into(),
            ));
        }
        if let Some(content) = update.content {
            self.content = required_content(&content)?;
        }
        if let Some(title) = update.title {
            self.title = Some(title);
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(image_url) = update.image_url {
            self.image_url = Some(image_url);
        }
        Ok(())
    }

    pub fn set_image(&mut self, user: &AuthUser, image_url: String) -> Result<(), PostError> {
        if !self.is_owned_by(user) {
            return Err(PostError::Forbidden(
                "No permitido: solo el dueño puede subir imágenes a esta publicación".into(),
            ));
        }
        self.image_url = Some(image_url);
        Ok(())
    }

    pub fn add_comment(
        &mut self,
        author: &AuthUser,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, PostError> {
        let comment = Comment {
            id: Some(Uuid::new_v4()),
            user_id: Some(author.id),
            user_name: author.nombre_usuario.clone(),
            user_photo: author.imagen_perfil.clone(),
            content: required_content(content)?,
            date: now,
            modified: false,
            modified_at: None,
        };
        self.comments.push(comment.clone());
        Ok(comment)
    }

    pub fn edit_comment(
        &mut self,
        comment_id: Uuid,
        author: &AuthUser,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, PostError> {
        let content = required_content(content)?;
        let comment = self
            .comments
            .iter_mut()
            .find(|c| c.id == Some(comment_id))
            .ok_or(PostError::CommentNotFound)?;

        if !comment.is_authored_by(author) {
            return Err(PostError::Forbidden(
                "Solo el autor puede editar este comentario".into(),
            ));
        }

        comment.content = content;
        comment.modified = true;
        comment.modified_at = Some(now);
        Ok(comment.clone())
    }

    /// Newest comments first
    pub fn comment_page(&self, query: &CommentPageQuery) -> CommentPage {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_COMMENT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let mut sorted: Vec<&Comment> = self.comments.iter().collect();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));

        let skip = (page as usize - 1) * limit as usize;
        let comments: Vec<Comment> = sorted
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .cloned()
            .collect();

        let total = self.comments.len();
        CommentPage {
            has_more: skip + comments.len() < total,
            comments,
            total,
            page,
            limit,
        }
    }

    /// Gives every comment without an id a fresh one; returns how many
    pub fn backfill_comment_ids(&mut self) -> usize {
        let mut assigned = 0;
        for comment in self.comments.iter_mut().filter(|c| c.id.is_none()) {
            comment.id = Some(Uuid::new_v4());
            assigned += 1;
        }
        assigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::models::Role;

    fn user(name: &str, perfil: Role) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            nombre_usuario: name.to_string(),
            imagen_perfil: Some(format!("https://cdn.example.com/{name}.png")),
            perfil,
        }
    }

    fn post_by(author: &AuthUser) -> Post {
        Post::new(
            author,
            NewPost {
                title: Some("Hola".into()),
                description: None,
                content: "  primer post  ".into(),
                image_url: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_post_starts_empty_and_takes_owner_from_author() {
        let ana = user("ana", Role::Usuario);
        let post = post_by(&ana);

        assert_eq!(post.user_id, ana.id);
        assert_eq!(post.user_name, "ana");
        assert_eq!(post.user_photo, ana.imagen_perfil);
        assert_eq!(post.content, "primer post");
        assert_eq!(post.likes_count, 0);
        assert!(post.liked_users.is_empty());
        assert!(post.comments.is_empty());
        assert!(!post.deleted);
    }

    #[test]
    fn blank_content_is_rejected() {
        let ana = user("ana", Role::Usuario);
        let draft = NewPost {
            title: None,
            description: None,
            content: "   ".into(),
            image_url: None,
        };
        assert!(matches!(
            Post::new(&ana, draft, Utc::now()),
            Err(PostError::Invalid(_))
        ));
    }

    #[test]
    fn likes_are_idempotent_and_count_matches_set() {
        let ana = user("ana", Role::Usuario);
        let mut post = post_by(&ana);
        let luis = Uuid::new_v4();
        let eva = Uuid::new_v4();

        assert!(post.like(luis));
        assert!(!post.like(luis));
        assert!(post.like(eva));
        assert_eq!(post.likes_count, 2);
        assert_eq!(post.liked_users, vec![luis, eva]);

        assert!(post.unlike(luis));
        assert!(!post.unlike(luis));
        assert_eq!(post.likes_count, 1);
        assert_eq!(post.likes_count as usize, post.liked_users.len());
    }

    #[test]
    fn like_repairs_inconsistent_stored_state() {
        let ana = user("ana", Role::Usuario);
        let mut post = post_by(&ana);
        let luis = Uuid::new_v4();
        post.liked_users = vec![luis, luis];
        post.likes_count = 7;

        assert!(!post.like(luis));
        assert_eq!(post.liked_users, vec![luis]);
        assert_eq!(post.likes_count, 1);
    }

    #[test]
    fn only_owner_or_admin_may_delete() {
        let ana = user("ana", Role::Usuario);
        let intruso = user("intruso", Role::Usuario);
        let admin = user("admin", Role::Administrador);

        let mut post = post_by(&ana);
        assert!(matches!(
            post.soft_delete(&intruso, Utc::now()),
            Err(PostError::Forbidden(_))
        ));
        assert!(!post.deleted);

        post.soft_delete(&ana, Utc::now()).unwrap();
        assert!(post.deleted);
        assert!(post.deleted_at.is_some());

        let mut other = post_by(&ana);
        other.soft_delete(&admin, Utc::now()).unwrap();
        assert!(other.deleted);
    }

    #[test]
    fn account_reusing_owner_name_cannot_manage_post() {
        let ana = user("ana", Role::Usuario);
        let impostor = AuthUser {
            id: Uuid::new_v4(),
            ..ana.clone()
        };
        let mut post = post_by(&ana);

        assert!(!post.can_be_managed_by(&impostor));
        assert!(matches!(
            post.soft_delete(&impostor, Utc::now()),
            Err(PostError::Forbidden(_))
        ));
        assert!(matches!(
            post.apply_update(
                &impostor,
                UpdatePost {
                    content: Some("hacked".into()),
                    ..Default::default()
                },
            ),
            Err(PostError::Forbidden(_))
        ));
        assert!(!post.deleted);
        assert_eq!(post.content, "primer post");
    }

    #[test]
    fn update_changes_only_given_fields() {
        let ana = user("ana", Role::Usuario);
        let mut post = post_by(&ana);

        post.apply_update(
            &ana,
            UpdatePost {
                description: Some("nueva".into()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(post.title.as_deref(), Some("Hola"));
        assert_eq!(post.description.as_deref(), Some("nueva"));
        assert_eq!(post.content, "primer post");

        let luis = user("luis", Role::Usuario);
        assert!(matches!(
            post.apply_update(&luis, UpdatePost::default()),
            Err(PostError::Forbidden(_))
        ));
    }

    #[test]
    fn only_owner_may_set_image() {
        let ana = user("ana", Role::Usuario);
        let admin = user("admin", Role::Administrador);
        let mut post = post_by(&ana);

        assert!(post.set_image(&admin, "https://x/1.png".into()).is_err());
        post.set_image(&ana, "https://x/1.png".into()).unwrap();
        assert_eq!(post.image_url.as_deref(), Some("https://x/1.png"));
    }

    #[test]
    fn comments_record_author_and_are_editable_by_author_only() {
        let ana = user("ana", Role::Usuario);
        let luis = user("luis", Role::Usuario);
        let mut post = post_by(&ana);
        let now = Utc::now();

        let comment = post.add_comment(&luis, "  buenísimo ", now).unwrap();
        assert_eq!(comment.content, "buenísimo");
        assert_eq!(comment.user_id, Some(luis.id));
        assert_eq!(comment.user_name, "luis");
        let id = comment.id.unwrap();

        assert!(matches!(
            post.edit_comment(id, &ana, "cambio", now),
            Err(PostError::Forbidden(_))
        ));

        let edited = post.edit_comment(id, &luis, "editado", now).unwrap();
        assert!(edited.modified);
        assert_eq!(edited.modified_at, Some(now));
        assert_eq!(post.comments[0].content, "editado");

        assert!(matches!(
            post.edit_comment(Uuid::new_v4(), &luis, "x", now),
            Err(PostError::CommentNotFound)
        ));
        assert!(matches!(
            post.add_comment(&luis, "  ", now),
            Err(PostError::Invalid(_))
        ));
    }

    #[test]
    fn legacy_comments_are_matched_by_author_name() {
        let ana = user("ana", Role::Usuario);
        let luis = user("luis", Role::Usuario);
        let mut post = post_by(&ana);
        post.comments.push(Comment {
            id: Some(Uuid::new_v4()),
            user_id: None,
            user_name: "luis".into(),
            user_photo: None,
            content: "viejo".into(),
            date: Utc::now(),
            modified: false,
            modified_at: None,
        });
        let id = post.comments[0].id.unwrap();

        assert!(post.edit_comment(id, &ana, "no", Utc::now()).is_err());
        assert!(post.edit_comment(id, &luis, "sí", Utc::now()).is_ok());
    }

    #[test]
    fn comment_pages_are_newest_first() {
        let ana = user("ana", Role::Usuario);
        let mut post = post_by(&ana);
        let start = Utc::now();
        for i in 0..25 {
            post.add_comment(&ana, &format!("c{i}"), start + Duration::minutes(i))
                .unwrap();
        }

        let first = post.comment_page(&CommentPageQuery::default());
        assert_eq!(first.page, 1);
        assert_eq!(first.limit, 10);
        assert_eq!(first.total, 25);
        assert!(first.has_more);
        assert_eq!(first.comments[0].content, "c24");

        let last = post.comment_page(&CommentPageQuery {
            page: Some(3),
            limit: Some(10),
        });
        assert_eq!(last.comments.len(), 5);
        assert!(!last.has_more);
        assert_eq!(last.comments[4].content, "c0");

        let beyond = post.comment_page(&CommentPageQuery {
            page: Some(9),
            limit: Some(10),
        });
        assert!(beyond.comments.is_empty());
        assert!(!beyond.has_more);
    }

    #[test]
    fn backfill_assigns_ids_only_where_missing() {
        let ana = user("ana", Role::Usuario);
        let mut post = post_by(&ana);
        let kept = post.add_comment(&ana, "con id", Utc::now()).unwrap();
        let mut legacy = kept.clone();
        legacy.id = None;
        post.comments.push(legacy);

        assert_eq!(post.backfill_comment_ids(), 1);
        assert_eq!(post.comments[0].id, kept.id);
        assert!(post.comments[1].id.is_some());
        assert_eq!(post.backfill_comment_ids(), 0);
    }

    #[test]
    fn legacy_comment_json_without_ids_deserializes() {
        let comment: Comment = serde_json::from_value(serde_json::json!({
            "userName": "luis",
            "content": "hola",
            "date": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert!(comment.id.is_none());
        assert!(!comment.modified);
    }

    #[test]
    fn post_list_shape_depends_on_limit() {
        let all = serde_json::to_value(PostListResponse::All(vec![])).unwrap();
        assert!(all.is_array());

        let page = serde_json::to_value(PostListResponse::Page {
            items: vec![],
            total: 4,
            offset: 2,
            limit: 2,
        })
        .unwrap();
        assert_eq!(page["total"], 4);
        assert!(page["items"].is_array());
    }

    #[test]
    fn query_defaults_and_clamps() {
        let query = PostQuery {
            offset: Some(-3),
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(query.order, PostOrder::Fecha);
        assert_eq!(query.offset(), 0);
        assert_eq!(query.limit(), Some(100));
        assert_eq!(PostQuery::default().limit(), None);
    }

    #[test]
    fn image_index_defaults_to_one() {
        assert_eq!(ImageUploadQuery::default().index().unwrap(), 1);
        let q = ImageUploadQuery {
            image_index: Some("3".into()),
        };
        assert_eq!(q.index().unwrap(), 3);
        let bad = ImageUploadQuery {
            image_index: Some("x".into()),
        };
        assert!(bad.index().is_err());
    }
}
