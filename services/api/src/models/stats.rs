//! Dashboard aggregations over visible posts

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::post::Post;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
}

/// Inclusive time window; missing bounds are open
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn parse(query: &StatsQuery) -> Result<Self, String> {
        let start = query
            .fecha_inicio
            .as_deref()
            .map(|raw| parse_bound(raw, false))
            .transpose()?;
        let end = query
            .fecha_fin
            .as_deref()
            .map(|raw| parse_bound(raw, true))
            .transpose()?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err("fechaInicio debe ser anterior a fechaFin".to_string());
            }
        }

        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at <= end)
    }
}

/// A bare date as an end bound covers the whole day
fn parse_bound(raw: &str, is_end: bool) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }

    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("Fecha inválida: {}", raw))?;
    let time = if is_end {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| format!("Fecha inválida: {}", raw))?;

    Ok(day.and_time(time).and_utc())
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostsPerUser {
    pub user_id: Uuid,
    pub user_name: String,
    pub cantidad_publicaciones: u64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CommentsOnDay {
    pub fecha: String,
    pub cantidad: u64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentTotals {
    pub total: u64,
    pub por_fecha: Vec<CommentsOnDay>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentsPerPost {
    pub publicacion_id: Uuid,
    pub user_name: String,
    pub content: String,
    pub cantidad_comentarios: u64,
}

/// Posts dated in range grouped by author, most active first
pub fn posts_per_user(posts: &[Post], range: &DateRange) -> Vec<PostsPerUser> {
    let mut by_user: HashMap<Uuid, PostsPerUser> = HashMap::new();

    for post in posts.iter().filter(|p| !p.deleted && range.contains(p.date)) {
        by_user
            .entry(post.user_id)
            .or_insert_with(|| PostsPerUser {
                user_id: post.user_id,
                user_name: post.user_name.clone(),
                cantidad_publicaciones: 0,
            })
            .cantidad_publicaciones += 1;
    }

    let mut rows: Vec<PostsPerUser> = by_user.into_values().collect();
    rows.sort_by(|a, b| {
        b.cantidad_publicaciones
            .cmp(&a.cantidad_publicaciones)
            .then_with(|| a.user_name.cmp(&b.user_name))
    });
    rows
}

/// Comments dated in range, with a per-day breakdown
pub fn comment_totals(posts: &[Post], range: &DateRange) -> CommentTotals {
    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();

    for comment in posts
        .iter()
        .filter(|p| !p.deleted)
        .flat_map(|p| p.comments.iter())
        .filter(|c| range.contains(c.date))
    {
        *per_day.entry(comment.date.date_naive()).or_default() += 1;
    }

    CommentTotals {
        total: per_day.values().sum(),
        por_fecha: per_day
            .into_iter()
            .map(|(day, cantidad)| CommentsOnDay {
                fecha: day.format("%Y-%m-%d").to_string(),
                cantidad,
            })
            .collect(),
    }
}

/// Posts that received comments in range, most commented first
pub fn comments_per_post(posts: &[Post], range: &DateRange) -> Vec<CommentsPerPost> {
    let mut rows: Vec<(DateTime<Utc>, CommentsPerPost)> = posts
        .iter()
        .filter(|p| !p.deleted)
        .filter_map(|post| {
            let count = post
                .comments
                .iter()
                .filter(|c| range.contains(c.date))
                .count() as u64;
            (count > 0).then(|| {
                (
                    post.date,
                    CommentsPerPost {
                        publicacion_id: post.id,
                        user_name: post.user_name.clone(),
                        content: post.content.clone(),
                        cantidad_comentarios: count,
                    },
                )
            })
        })
        .collect();

    rows.sort_by(|(a_date, a), (b_date, b)| {
        b.cantidad_comentarios
            .cmp(&a.cantidad_comentarios)
            .then_with(|| b_date.cmp(a_date))
    });
    rows.into_iter().map(|(_, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AuthUser,
        post::{NewPost, Post},
    };
    use chrono::TimeZone;
    use common::models::Role;

    fn author(name: &str) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            nombre_usuario: name.into(),
            imagen_perfil: None,
            perfil: Role::Usuario,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn post(user: &AuthUser, date: DateTime<Utc>, content: &str) -> Post {
        Post::new(
            user,
            NewPost {
                title: None,
                description: None,
                content: content.into(),
                image_url: None,
            },
            date,
        )
        .unwrap()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::parse(&StatsQuery {
            fecha_inicio: Some(start.into()),
            fecha_fin: Some(end.into()),
        })
        .unwrap()
    }

    #[test]
    fn end_date_covers_whole_day() {
        let r = range("2025-03-01", "2025-03-02");
        assert!(r.contains(at(1, 0)));
        assert!(r.contains(at(2, 23)));
        assert!(!r.contains(at(3, 0)));
    }

    #[test]
    fn timestamps_and_open_ranges_parse() {
        let r = range("2025-03-01T12:00:00Z", "2025-03-01T13:00:00+00:00");
        assert!(!r.contains(at(1, 11)));
        assert!(r.contains(at(1, 12)));

        let open = DateRange::parse(&StatsQuery::default()).unwrap();
        assert!(open.contains(at(20, 5)));
    }

    #[test]
    fn invalid_or_inverted_ranges_are_rejected() {
        assert!(
            DateRange::parse(&StatsQuery {
                fecha_inicio: Some("ayer".into()),
                fecha_fin: None,
            })
            .is_err()
        );
        assert!(
            DateRange::parse(&StatsQuery {
                fecha_inicio: Some("2025-03-05".into()),
                fecha_fin: Some("2025-03-01".into()),
            })
            .is_err()
        );
    }

    #[test]
    fn counts_posts_per_user_skipping_deleted_and_out_of_range() {
        let ana = author("ana");
        let luis = author("luis");
        let mut deleted = post(&luis, at(2, 9), "borrado");
        deleted.deleted = true;

        let posts = vec![
            post(&ana, at(1, 9), "a1"),
            post(&ana, at(2, 9), "a2"),
            post(&luis, at(2, 10), "l1"),
            post(&luis, at(10, 10), "fuera"),
            deleted,
        ];

        let rows = posts_per_user(&posts, &range("2025-03-01", "2025-03-05"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_name, "ana");
        assert_eq!(rows[0].cantidad_publicaciones, 2);
        assert_eq!(rows[1].user_id, luis.id);
        assert_eq!(rows[1].cantidad_publicaciones, 1);
    }

    #[test]
    fn comment_totals_group_by_day_ascending() {
        let ana = author("ana");
        let mut p = post(&ana, at(1, 8), "p");
        p.add_comment(&ana, "uno", at(3, 10)).unwrap();
        p.add_comment(&ana, "dos", at(1, 10)).unwrap();
        p.add_comment(&ana, "tres", at(3, 22)).unwrap();

        let totals = comment_totals(&[p], &DateRange::default());
        assert_eq!(totals.total, 3);
        assert_eq!(
            totals.por_fecha,
            vec![
                CommentsOnDay {
                    fecha: "2025-03-01".into(),
                    cantidad: 1
                },
                CommentsOnDay {
                    fecha: "2025-03-03".into(),
                    cantidad: 2
                },
            ]
        );
    }

    #[test]
    fn comments_per_post_lists_commented_posts_highest_first() {
        let ana = author("ana");
        let mut quiet = post(&ana, at(1, 8), "tranquila");
        let mut busy = post(&ana, at(1, 9), "popular");
        let silent = post(&ana, at(1, 10), "sin comentarios");
        quiet.add_comment(&ana, "hola", at(2, 8)).unwrap();
        busy.add_comment(&ana, "uno", at(2, 8)).unwrap();
        busy.add_comment(&ana, "dos", at(2, 9)).unwrap();
        busy.add_comment(&ana, "viejo", at(20, 9)).unwrap();

        let rows = comments_per_post(&[quiet, busy, silent], &range("2025-03-01", "2025-03-05"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "popular");
        assert_eq!(rows[0].cantidad_comentarios, 2);
        assert_eq!(rows[1].content, "tranquila");
    }

    #[test]
    fn stats_serialize_with_dashboard_field_names() {
        let json = serde_json::to_value(CommentTotals {
            total: 0,
            por_fecha: vec![],
        })
        .unwrap();
        assert!(json.get("porFecha").is_some());
    }
}
