use std::collections::{BTreeMap, HashSet};

use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder, prelude::FromRow};
use uuid::Uuid;

/// A raw xAPI event reported by the client-side player.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    id: Uuid,
    user_id: Uuid,
    content_id: Option<Uuid>,
    verb: String,
    object_id: String,
    statement: Value,
    result: Option<Value>,
    context: Option<Value>,
    timestamp: DateTime<Utc>,
    #[sqlx(default)]
    actor_email: Option<String>,
    #[sqlx(default)]
    actor_first_name: Option<String>,
    #[sqlx(default)]
    actor_last_name: Option<String>,
    #[sqlx(default)]
    content_title: Option<String>,
    #[sqlx(default)]
    content_library: Option<String>,
    #[sqlx(default)]
    content_uploader_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct TrackingEventCreate {
    pub content_id: Option<Uuid>,
    pub verb: String,
    pub object_id: String,
    pub statement: Value,
    pub result: Option<Value>,
    pub context: Option<Value>,
}

/// Rows a requester may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingScope {
    All,
    /// Events produced by this user.
    Actor(Uuid),
    /// Events on content uploaded by this user.
    ContentOwner(Uuid),
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TrackingFilter {
    pub user_id: Option<Uuid>,
    pub content_id: Option<Uuid>,
    pub verb: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

const TRACKING_SELECT: &str = r#"
    SELECT te.*, u.email AS actor_email, u.first_name AS actor_first_name, u.last_name AS actor_last_name,
        c.title AS content_title, c.library AS content_library, c.uploader_id AS content_uploader_id
    FROM tracking_events te
    JOIN users u ON u.id = te.user_id
    LEFT JOIN h5p_contents c ON c.id = te.content_id
    WHERE TRUE
"#;

impl ResourceTyped for TrackingEvent {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::TrackingEvent
    }
}

fn push_scope(query: &mut QueryBuilder<'_, Postgres>, scope: TrackingScope) {
    match scope {
        TrackingScope::All => {}
        TrackingScope::Actor(user_id) => {
            query.push(" AND te.user_id = ").push_bind(user_id);
        }
        TrackingScope::ContentOwner(user_id) => {
            query
                .push(" AND te.content_id IN (SELECT id FROM h5p_contents WHERE uploader_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &TrackingFilter) {
    if let Some(content_id) = filter.content_id {
        query.push(" AND te.content_id = ").push_bind(content_id);
    }
    if let Some(verb) = &filter.verb {
        query.push(" AND te.verb = ").push_bind(verb.clone());
    }
    if let Some(start) = filter.start_date {
        query.push(" AND te.timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        query.push(" AND te.timestamp <= ").push_bind(end);
    }
}

impl TrackingEvent {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn content_id(&self) -> Option<Uuid> {
        self.content_id
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn content_title(&self) -> Option<&str> {
        self.content_title.as_deref()
    }

    pub fn content_uploader_id(&self) -> Option<Uuid> {
        self.content_uploader_id
    }

    /// Whether `actor` may read this event: admins always, students their own
    /// events, teachers their own events and events on content they uploaded.
    pub fn visible_to(&self, actor: &AuthenticatedUser) -> bool {
        actor.is_admin()
            || self.user_id == actor.user_id()
            || (actor.is_staff() && self.content_uploader_id == Some(actor.user_id()))
    }

    pub async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: TrackingEventCreate,
    ) -> DatabaseResult<Self> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tracking_events (id, user_id, content_id, verb, object_id, statement, result, context)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id())
        .bind(data.content_id)
        .bind(&data.verb)
        .bind(&data.object_id)
        .bind(&data.statement)
        .bind(&data.result)
        .bind(&data.context)
        .fetch_one(mm.executor())
        .await?;

        let event = Self::find_by_id(mm, id).await?;
        event.ok_or(sqlx::Error::RowNotFound.into())
    }

    pub async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as(&format!("{TRACKING_SELECT} AND te.id = $1"))
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn search(mm: &ModelManager, scope: TrackingScope, filter: &TrackingFilter) -> DatabaseResult<Vec<Self>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(TRACKING_SELECT);
        push_scope(&mut query, scope);
        push_filter(&mut query, filter);
        query.push(" ORDER BY te.timestamp DESC");

        let events = query.build_query_as().fetch_all(mm.executor()).await?;
        Ok(events)
    }

    /// Events of `user_id`, oldest first.
    pub async fn all_by_user(mm: &ModelManager, user_id: Uuid, content_id: Option<Uuid>) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(&format!(
            "{TRACKING_SELECT} AND te.user_id = $1 AND ($2::uuid IS NULL OR te.content_id = $2) ORDER BY te.timestamp ASC"
        ))
        .bind(user_id)
        .bind(content_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn delete(self, mm: &ModelManager) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM tracking_events WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerbCount {
    pub verb: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentEngagement {
    pub content_id: Uuid,
    pub interactions: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingAnalytics {
    pub total_events: i64,
    pub verb_distribution: Vec<VerbCount>,
    pub active_users: i64,
    pub content_engagement: Vec<ContentEngagement>,
}

impl TrackingAnalytics {
    pub async fn compute(mm: &ModelManager, scope: TrackingScope, filter: &TrackingFilter) -> DatabaseResult<Self> {
        let base = "FROM tracking_events te WHERE TRUE";

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT COUNT(*), COUNT(DISTINCT te.user_id) {base}"));
        push_scope(&mut query, scope);
        push_filter(&mut query, filter);
        let (total_events, active_users): (i64, i64) = query.build_query_as().fetch_one(mm.executor()).await?;

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT te.verb, COUNT(*) AS count {base}"));
        push_scope(&mut query, scope);
        push_filter(&mut query, filter);
        query.push(" GROUP BY te.verb ORDER BY count DESC");
        let verb_distribution = query.build_query_as().fetch_all(mm.executor()).await?;

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT te.content_id, COUNT(*) AS interactions {base}"));
        push_scope(&mut query, scope);
        push_filter(&mut query, filter);
        query.push(" AND te.content_id IS NOT NULL GROUP BY te.content_id ORDER BY interactions DESC");
        let content_engagement = query.build_query_as().fetch_all(mm.executor()).await?;

        Ok(Self {
            total_events,
            verb_distribution,
            active_users,
            content_engagement,
        })
    }
}

/// Per-content progress derived from a user's event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentProgress {
    pub content_id: Option<Uuid>,
    pub content_title: String,
    pub total_interactions: i64,
    pub completed_sections: i64,
    pub last_activity: DateTime<Utc>,
    pub progress: f64,
}

/// Groups `events` (oldest first) by content. Every distinct object with a
/// "completed" verb counts as a completed section.
pub fn calculate_user_progress(events: &[TrackingEvent]) -> Vec<ContentProgress> {
    let mut groups: BTreeMap<Option<Uuid>, (ContentProgress, HashSet<&str>)> = BTreeMap::new();

    for event in events {
        let (progress, completed) = groups.entry(event.content_id).or_insert_with(|| {
            (
                ContentProgress {
                    content_id: event.content_id,
                    content_title: event.content_title().unwrap_or("Unknown").to_string(),
                    total_interactions: 0,
                    completed_sections: 0,
                    last_activity: event.timestamp,
                    progress: 0.0,
                },
                HashSet::new(),
            )
        });
        progress.total_interactions += 1;
        progress.last_activity = event.timestamp;
        if is_completed_verb(&event.verb) {
            completed.insert(event.object_id.as_str());
        }
    }

    groups
        .into_values()
        .map(|(mut progress, completed)| {
            progress.completed_sections = completed.len() as i64;
            progress.progress = (progress.completed_sections as f64
                / progress.total_interactions.max(1) as f64
                * 100.0)
                .min(100.0);
            progress
        })
        .collect()
}

/// Accepts both the short verb and the ADL IRI form.
fn is_completed_verb(verb: &str) -> bool {
    verb == "completed" || verb.ends_with("/completed")
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn event(content_id: Option<Uuid>, verb: &str, object_id: &str, minute: u32) -> TrackingEvent {
        TrackingEvent {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            content_id,
            verb: verb.to_string(),
            object_id: object_id.to_string(),
            statement: serde_json::json!({}),
            result: None,
            context: None,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 8, minute, 0).unwrap(),
            actor_email: None,
            actor_first_name: None,
            actor_last_name: None,
            content_title: content_id.map(|_| "Bài tập".to_string()),
            content_library: None,
            content_uploader_id: None,
        }
    }

    #[test]
    fn progress_counts_distinct_completed_objects() {
        let content = Some(Uuid::new_v4());
        let events = vec![
            event(content, "attempted", "q1", 0),
            event(content, "completed", "q1", 1),
            event(content, "completed", "q1", 2),
            event(content, "http://adlnet.gov/expapi/verbs/completed", "q2", 3),
        ];

        let progress = calculate_user_progress(&events);
        assert_eq!(progress.len(), 1);
        let p = &progress[0];
        assert_eq!(p.total_interactions, 4);
        assert_eq!(p.completed_sections, 2);
        assert!((p.progress - 50.0).abs() < 1e-9);
        assert_eq!(p.last_activity, events[3].timestamp);
        assert_eq!(p.content_title, "Bài tập");
    }

    #[test]
    fn events_without_content_are_grouped_as_unknown() {
        let events = vec![event(None, "experienced", "page", 0)];
        let progress = calculate_user_progress(&events);
        assert_eq!(progress[0].content_id, None);
        assert_eq!(progress[0].content_title, "Unknown");
        assert_eq!(progress[0].progress, 0.0);
    }

    #[test]
    fn no_events_no_progress() {
        assert!(calculate_user_progress(&[]).is_empty());
    }
}
