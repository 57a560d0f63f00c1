use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::h5p::{H5pError, H5pPackage, H5pResult, H5pStorage, package};
use crate::model::entity::{H5pContent, H5pContentCreateUpdate, H5pLibrary, InstallOutcome};
use crate::model::{CrudRepository, ModelManager};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub success: bool,
    pub content_id: Option<Uuid>,
    pub libraries_installed: usize,
    pub message: String,
    pub errors: Vec<String>,
}

/// Installs the libraries bundled in an `.h5p` package and creates its content.
///
/// A library that fails to install is reported in `errors` and does not stop
/// the upload; a package without `h5p.json` or `content/content.json` is rejected.
pub async fn install_package(
    mm: &ModelManager,
    storage: &H5pStorage,
    actor: &AuthenticatedUser,
    bytes: &[u8],
    max_extracted: usize,
) -> H5pResult<InstallReport> {
    let package = H5pPackage::from_bytes(bytes, max_extracted)?;
    let problems = package.validate();
    if !problems.is_empty() {
        return Err(H5pError::InvalidPackage(problems.join(", ")));
    }

    let manifest_json = package.manifest_json()?;
    let manifest = package.manifest()?;
    let params = package.content_json()?;

    let mut libraries_installed = 0;
    let mut errors = Vec::new();
    for dir in package.library_dirs() {
        match install_library(mm, storage, &package, &dir).await {
            Ok(InstallOutcome::New | InstallOutcome::Updated) => libraries_installed += 1,
            Ok(InstallOutcome::AlreadyInstalled) => {
                tracing::debug!("library {dir} already installed");
            }
            Err(e) => {
                tracing::warn!("failed to install library {dir}: {e}");
                errors.push(format!("Failed to install library {dir}: {e}"));
            }
        }
    }

    let content = H5pContent::create(
        mm,
        actor,
        H5pContentCreateUpdate {
            title: manifest
                .title
                .clone()
                .unwrap_or_else(|| "Untitled H5P Content".to_string()),
            library: manifest.main_library_string().unwrap_or_default(),
            params,
            metadata: manifest_json,
            is_public: false,
        },
    )
    .await?;

    let content_dir = storage.content_dir(content.id());
    if let Err(e) = storage.write_files(&content_dir, package.content_files()).await {
        // without its files the content row is useless
        let _ = storage.remove_content(content.id()).await;
        content.delete(mm, actor).await?;
        return Err(e);
    }

    tracing::info!(
        "installed H5P package '{}' ({} libraries)",
        content.title(),
        libraries_installed
    );

    Ok(InstallReport {
        success: true,
        content_id: Some(content.id()),
        libraries_installed,
        message: format!("Successfully installed {libraries_installed} libraries and created content"),
        errors,
    })
}

async fn install_library(
    mm: &ModelManager,
    storage: &H5pStorage,
    package: &H5pPackage,
    dir: &str,
) -> H5pResult<InstallOutcome> {
    let library = package.read_library(dir)?;
    let outcome = H5pLibrary::install(mm, &library).await?;
    if outcome != InstallOutcome::AlreadyInstalled {
        storage
            .write_files(&storage.library_dir(dir), package.files_under(dir))
            .await?;
    }
    Ok(outcome)
}

/// `h5p.json` for an exported content: the stored manifest when the content came
/// from a package, otherwise one rebuilt from the content row.
pub fn export_manifest(content: &H5pContent) -> Value {
    let stored = content.metadata();
    if stored.get("mainLibrary").is_some() {
        let mut manifest = stored.clone();
        if let Some(map) = manifest.as_object_mut() {
            map.insert("title".to_string(), json!(content.title()));
        }
        return manifest;
    }

    let mut parts = content.library().splitn(2, ' ');
    let machine_name = parts.next().unwrap_or_default();
    let dependencies = parts
        .next()
        .and_then(|version| version.split_once('.'))
        .and_then(|(major, minor)| Some((major.parse::<i32>().ok()?, minor.parse::<i32>().ok()?)))
        .map(|(major, minor)| {
            vec![json!({
                "machineName": machine_name,
                "majorVersion": major,
                "minorVersion": minor,
            })]
        })
        .unwrap_or_default();

    json!({
        "title": content.title(),
        "language": stored.get("language").cloned().unwrap_or(json!("en")),
        "mainLibrary": machine_name,
        "embedTypes": ["iframe"],
        "preloadedDependencies": dependencies,
    })
}

/// Zips a stored content back into an `.h5p` package.
pub async fn export_content(storage: &H5pStorage, content: &H5pContent) -> H5pResult<Vec<u8>> {
    let files = storage.read_content_files(content.id()).await?;
    package::build_export(&export_manifest(content), content.params(), &files)
}
