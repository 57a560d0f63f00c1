use serde::{Deserialize, Serialize};

use crate::{
    model::{ModelManager, error::DatabaseResult},
    web::AuthenticatedUser,
};

#[derive(Debug, Clone, Copy)]
pub enum ResourceType {
    User,
    Class,
    ClassMembership,
    Book,
    Chapter,
    Lesson,
    Page,
    PageBlock,
    H5pContent,
    H5pLibrary,
    H5pTemporaryFile,
    H5pPackage,
    QuizConfig,
    QuizQuestion,
    QuizAttempt,
    QuestionResponse,
    QuizAnalytics,
    StudentProgress,
    TrackingEvent,
    XapiStatement,
    Audio,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
/// One slice of a listing together with the total row count.
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        Self {
            items,
            total,
            limit,
            offset,
        }
    }
}

pub trait ResourceTyped {
    fn get_resource_type() -> ResourceType;
}

#[async_trait::async_trait]
pub trait CrudRepository<T, CreateUpdate, V>
where
    T: ResourceTyped,
    V: Clone + Copy,
{
    async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: CreateUpdate,
    ) -> DatabaseResult<T>;
    async fn update(
        self,
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: CreateUpdate,
    ) -> DatabaseResult<T>
    where
        Self: Sized;

    async fn delete(self, mm: &ModelManager, actor: &AuthenticatedUser) -> DatabaseResult<()>
    where
        Self: Sized;

    async fn find_by_id(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        id: V,
    ) -> DatabaseResult<Option<T>>;
}

/// Entities served as offset pages.
#[async_trait::async_trait]
pub trait PaginatableRepository<T>
where
    T: ResourceTyped + Send,
{
    async fn list(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<T>>;

    async fn count(mm: &ModelManager, actor: &AuthenticatedUser) -> DatabaseResult<i64>;

    async fn page(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Page<T>> {
        let items = Self::list(mm, actor, limit, offset).await?;
        let total = Self::count(mm, actor).await?;
        Ok(Page::new(items, total, limit, offset))
    }
}
