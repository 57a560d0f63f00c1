use std::path::{Component, Path, PathBuf};

use tokio::fs;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::h5p::{H5pError, H5pResult};

/// On-disk layout for H5P data:
/// `<root>/content/<id>`, `<root>/libraries/<Machine-maj.min>` and `<root>/temp`.
#[derive(Debug, Clone)]
pub struct H5pStorage {
    root: PathBuf,
}

impl H5pStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content_dir(&self, content_id: Uuid) -> PathBuf {
        self.root.join("content").join(content_id.to_string())
    }

    pub fn library_dir(&self, dir_name: &str) -> PathBuf {
        self.root.join("libraries").join(dir_name)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    pub async fn ensure_dirs(&self) -> H5pResult<()> {
        fs::create_dir_all(self.root.join("content")).await?;
        fs::create_dir_all(self.root.join("libraries")).await?;
        fs::create_dir_all(self.temp_dir()).await?;
        Ok(())
    }

    /// Writes `files` (relative paths) below `dir`, creating parents as needed.
    pub async fn write_files<'a, I>(&self, dir: &Path, files: I) -> H5pResult<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut written = 0;
        for (relative, data) in files {
            let target = dir.join(safe_relative(relative)?);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&target, data).await?;
            written += 1;
        }
        Ok(written)
    }

    /// Every file of a content directory as `(relative path, bytes)`, sorted by path.
    pub async fn read_content_files(&self, content_id: Uuid) -> H5pResult<Vec<(String, Vec<u8>)>> {
        let base = self.content_dir(content_id);
        if fs::metadata(&base).await.is_err() {
            return Ok(Vec::new());
        }

        tokio::task::spawn_blocking(move || -> H5pResult<Vec<(String, Vec<u8>)>> {
            let mut files = Vec::new();
            for entry in WalkDir::new(&base) {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&base) else {
                    continue;
                };
                let relative = relative.to_string_lossy().replace('\\', "/");
                files.push((relative, std::fs::read(entry.path())?));
            }
            files.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(files)
        })
        .await?
    }

    pub async fn remove_content(&self, content_id: Uuid) -> H5pResult<()> {
        remove_dir_if_exists(&self.content_dir(content_id)).await
    }

    /// Stores an uploaded temporary file and returns its path.
    pub async fn store_temp(&self, filename: &str, data: &[u8]) -> H5pResult<PathBuf> {
        let dir = self.temp_dir();
        fs::create_dir_all(&dir).await?;
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let path = dir.join(format!("{}-{}", Uuid::new_v4(), name));
        fs::write(&path, data).await?;
        Ok(path)
    }

    /// Removes a stored file; a file that is already gone is not an error.
    pub async fn remove_file(&self, path: &Path) -> H5pResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn remove_dir_if_exists(path: &Path) -> H5pResult<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Rejects absolute paths and `..` components.
fn safe_relative(relative: &str) -> H5pResult<PathBuf> {
    let path = Path::new(relative);
    let clean = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if clean && !relative.is_empty() {
        Ok(path.to_path_buf())
    } else {
        Err(H5pError::InvalidPackage(format!("unsafe file path: {relative}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_escaping_paths() {
        assert!(safe_relative("images/cat.png").is_ok());
        assert!(safe_relative("../etc/passwd").is_err());
        assert!(safe_relative("/etc/passwd").is_err());
        assert!(safe_relative("").is_err());
    }

    #[tokio::test]
    async fn content_files_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = H5pStorage::new(dir.path());
        storage.ensure_dirs().await.unwrap();

        let id = Uuid::new_v4();
        let target = storage.content_dir(id);
        let files: Vec<(&str, &[u8])> = vec![
            ("images/icons/star.svg", b"<svg/>".as_slice()),
            ("content.json", b"{}".as_slice()),
            ("images/cat.png", b"png".as_slice()),
        ];
        assert_eq!(storage.write_files(&target, files).await.unwrap(), 3);

        let read = storage.read_content_files(id).await.unwrap();
        let names: Vec<&str> = read.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["content.json", "images/cat.png", "images/icons/star.svg"]);
        assert_eq!(read[2].1, b"<svg/>");

        storage.remove_content(id).await.unwrap();
        assert!(storage.read_content_files(id).await.unwrap().is_empty());
        // removing twice is fine
        storage.remove_content(id).await.unwrap();
    }

    #[tokio::test]
    async fn temp_files_keep_only_the_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = H5pStorage::new(dir.path());

        let path = storage.store_temp("../../evil.txt", b"x").await.unwrap();
        assert!(path.starts_with(storage.temp_dir()));
        assert!(path.to_string_lossy().ends_with("-evil.txt"));

        storage.remove_file(&path).await.unwrap();
        storage.remove_file(&path).await.unwrap();
    }
}
