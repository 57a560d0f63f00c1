use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct H5pLibrary {
    id: Uuid,
    machine_name: String,
    major_version: i32,
    minor_version: i32,
    patch_version: i32,
    title: String,
    description: String,
    author: String,
    license: String,
    runnable: bool,
    library_json: Value,
    semantics_json: Option<Value>,
    language_json: Option<Value>,
    dependencies: Value,
    files: Value,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Everything read from a library directory of a package.
#[derive(Debug, Clone)]
pub struct H5pLibraryInstall {
    pub machine_name: String,
    pub major_version: i32,
    pub minor_version: i32,
    pub patch_version: i32,
    pub title: String,
    pub description: String,
    pub author: String,
    pub license: String,
    pub runnable: bool,
    pub library_json: Value,
    pub semantics_json: Option<Value>,
    pub language_json: Option<Value>,
    pub dependencies: Value,
    pub files: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    New,
    Updated,
    AlreadyInstalled,
}

/// Latest runnable version of a content type.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct H5pContentTypeRow {
    pub machine_name: String,
    pub title: String,
    pub description: String,
    pub major_version: i32,
    pub minor_version: i32,
    pub patch_version: i32,
}

impl ResourceTyped for H5pLibrary {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::H5pLibrary
    }
}

impl H5pLibrary {
    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    pub fn patch_version(&self) -> i32 {
        self.patch_version
    }

    /// `Machine-maj.min`, the directory name used in packages and storage.
    pub fn dir_name(&self) -> String {
        format!("{}-{}.{}", self.machine_name, self.major_version, self.minor_version)
    }

    pub async fn find(
        mm: &ModelManager,
        machine_name: &str,
        major_version: i32,
        minor_version: i32,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM h5p_libraries WHERE machine_name = $1 AND major_version = $2 AND minor_version = $3",
        )
        .bind(machine_name)
        .bind(major_version)
        .bind(minor_version)
        .fetch_optional(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn all(mm: &ModelManager) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM h5p_libraries ORDER BY machine_name ASC, major_version DESC, minor_version DESC",
        )
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn content_types(mm: &ModelManager) -> DatabaseResult<Vec<H5pContentTypeRow>> {
        let result = sqlx::query_as(
            r#"
            SELECT DISTINCT ON (machine_name)
                machine_name, title, description, major_version, minor_version, patch_version
            FROM h5p_libraries
            WHERE runnable
            ORDER BY machine_name ASC, major_version DESC, minor_version DESC, patch_version DESC
            "#,
        )
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn count_all(mm: &ModelManager) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM h5p_libraries")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }

    /// Inserts the library, or replaces the stored one when `data` carries a newer patch.
    pub async fn install(mm: &ModelManager, data: &H5pLibraryInstall) -> DatabaseResult<InstallOutcome> {
        let existing = Self::find(mm, &data.machine_name, data.major_version, data.minor_version).await?;
        if existing
            .as_ref()
            .is_some_and(|lib| lib.patch_version >= data.patch_version)
        {
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        sqlx::query(
            r#"
            INSERT INTO h5p_libraries (
                id, machine_name, major_version, minor_version, patch_version, title, description,
                author, license, runnable, library_json, semantics_json, language_json, dependencies, files
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (machine_name, major_version, minor_version) DO UPDATE SET
                patch_version = EXCLUDED.patch_version,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                author = EXCLUDED.author,
                license = EXCLUDED.license,
                runnable = EXCLUDED.runnable,
                library_json = EXCLUDED.library_json,
                semantics_json = EXCLUDED.semantics_json,
                language_json = EXCLUDED.language_json,
                dependencies = EXCLUDED.dependencies,
                files = EXCLUDED.files,
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.machine_name)
        .bind(data.major_version)
        .bind(data.minor_version)
        .bind(data.patch_version)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.author)
        .bind(&data.license)
        .bind(data.runnable)
        .bind(&data.library_json)
        .bind(&data.semantics_json)
        .bind(&data.language_json)
        .bind(&data.dependencies)
        .bind(&data.files)
        .execute(mm.executor())
        .await?;

        Ok(if existing.is_some() {
            InstallOutcome::Updated
        } else {
            InstallOutcome::New
        })
    }
}
