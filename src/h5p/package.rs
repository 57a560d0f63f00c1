use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::h5p::{H5pError, H5pResult};
use crate::model::entity::H5pLibraryInstall;

pub const MANIFEST: &str = "h5p.json";
pub const CONTENT_JSON: &str = "content/content.json";
const CONTENT_PREFIX: &str = "content/";

/// Library reference as listed in `preloadedDependencies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LibraryRef {
    pub machine_name: String,
    pub major_version: i32,
    pub minor_version: i32,
    #[serde(default)]
    pub patch_version: Option<i32>,
}

/// The parts of `h5p.json` the server reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H5pManifest {
    pub title: Option<String>,
    pub main_library: Option<String>,
    pub language: Option<String>,
    pub content_type: Option<String>,
    pub license: Option<String>,
    #[serde(default)]
    pub preloaded_dependencies: Vec<LibraryRef>,
}

impl H5pManifest {
    /// Main library as stored on content rows: `Machine maj.min`, or the bare
    /// machine name when no matching dependency gives the version.
    pub fn main_library_string(&self) -> Option<String> {
        let name = self.main_library.as_deref()?;
        let versioned = self
            .preloaded_dependencies
            .iter()
            .find(|dep| dep.machine_name == name)
            .map(|dep| format!("{} {}.{}", name, dep.major_version, dep.minor_version));
        Some(versioned.unwrap_or_else(|| name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub title: String,
    pub main_library: Option<String>,
    pub language: String,
    pub content_type: String,
    pub license: String,
    pub libraries: Vec<LibraryRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PackageValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// An `.h5p` archive unpacked into memory.
#[derive(Debug, Clone)]
pub struct H5pPackage {
    files: BTreeMap<String, Vec<u8>>,
}

impl H5pPackage {
    /// Unpacks every entry, refusing archives that inflate past `max_extracted` bytes.
    /// Declared entry sizes are not trusted; the bound is enforced on the bytes read.
    pub fn from_bytes(bytes: &[u8], max_extracted: usize) -> H5pResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut files = BTreeMap::new();
        let mut extracted = 0usize;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let Some(path) = entry.enclosed_name() else {
                return Err(H5pError::InvalidPackage(format!(
                    "unsafe path in archive: {}",
                    entry.name()
                )));
            };
            let name = path.to_string_lossy().replace('\\', "/");

            let remaining = max_extracted.saturating_sub(extracted) as u64;
            let mut data = Vec::new();
            Read::by_ref(&mut entry).take(remaining + 1).read_to_end(&mut data)?;
            extracted += data.len();
            if extracted > max_extracted {
                return Err(H5pError::TooLarge {
                    size: extracted,
                    max: max_extracted,
                });
            }
            files.insert(name, data);
        }

        Ok(Self { files })
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Structural problems; empty when the package is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.has_file(MANIFEST) {
            errors.push("Missing h5p.json".to_string());
        }
        if !self.has_file(CONTENT_JSON) {
            errors.push("Missing content/content.json".to_string());
        }
        errors
    }

    fn read_json(&self, name: &str) -> H5pResult<Value> {
        let data = self
            .files
            .get(name)
            .ok_or_else(|| H5pError::InvalidPackage(format!("{name} not found")))?;
        Ok(serde_json::from_slice(data)?)
    }

    pub fn manifest_json(&self) -> H5pResult<Value> {
        self.read_json(MANIFEST)
    }

    pub fn manifest(&self) -> H5pResult<H5pManifest> {
        Ok(serde_json::from_value(self.manifest_json()?)?)
    }

    pub fn content_json(&self) -> H5pResult<Value> {
        self.read_json(CONTENT_JSON)
    }

    pub fn info(&self) -> H5pResult<PackageInfo> {
        let manifest = self.manifest()?;
        Ok(PackageInfo {
            title: manifest.title.unwrap_or_else(|| "Untitled".to_string()),
            main_library: manifest.main_library,
            language: manifest.language.unwrap_or_else(|| "en".to_string()),
            content_type: manifest.content_type.unwrap_or_else(|| "Unknown".to_string()),
            license: manifest.license.unwrap_or_else(|| "Unspecified".to_string()),
            libraries: manifest.preloaded_dependencies,
        })
    }

    /// Top-level directories named like `H5P.MultiChoice-1.16`.
    pub fn library_dirs(&self) -> Vec<String> {
        let dirs: BTreeSet<&str> = self
            .files
            .keys()
            .filter_map(|name| name.split_once('/').map(|(dir, _)| dir))
            .filter(|dir| parse_library_dir(dir).is_some())
            .collect();
        dirs.into_iter().map(str::to_string).collect()
    }

    /// Files below `prefix/`, with the prefix stripped.
    pub fn files_under<'a>(&'a self, prefix: &str) -> impl Iterator<Item = (&'a str, &'a [u8])> + 'a {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        self.files.iter().filter_map(move |(name, data)| {
            name.strip_prefix(prefix.as_str())
                .filter(|rest| !rest.is_empty())
                .map(|rest| (rest, data.as_slice()))
        })
    }

    pub fn content_files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files_under(CONTENT_PREFIX)
    }

    /// Reads the library stored in `dir` into an installable record.
    pub fn read_library(&self, dir: &str) -> H5pResult<H5pLibraryInstall> {
        let (dir_machine, dir_major, dir_minor) = parse_library_dir(dir)
            .ok_or_else(|| H5pError::InvalidPackage(format!("{dir} is not a library directory")))?;

        let library_json = self
            .read_json(&format!("{dir}/library.json"))
            .map_err(|_| H5pError::InvalidPackage(format!("{dir}: library.json not found or invalid")))?;

        let semantics_json = match self.files.get(&format!("{dir}/semantics.json")) {
            Some(data) => Some(serde_json::from_slice(data)?),
            None => None,
        };

        let mut languages = Map::new();
        let mut files = Map::new();
        for (name, data) in self.files_under(dir) {
            if let Some(lang) = name
                .strip_prefix("language/")
                .and_then(|n| n.strip_suffix(".json"))
                .filter(|n| !n.contains('/'))
            {
                languages.insert(lang.to_string(), serde_json::from_slice(data)?);
            } else if !name.contains('/') && (name.ends_with(".js") || name.ends_with(".css")) {
                files.insert(
                    name.to_string(),
                    Value::String(String::from_utf8_lossy(data).into_owned()),
                );
            }
        }

        let text = |key: &str| {
            library_json
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let version = |key: &str, fallback: i32| {
            library_json
                .get(key)
                .and_then(Value::as_i64)
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or(fallback)
        };
        let runnable = match library_json.get("runnable") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        };

        Ok(H5pLibraryInstall {
            machine_name: library_json
                .get("machineName")
                .and_then(Value::as_str)
                .unwrap_or(dir_machine.as_str())
                .to_string(),
            major_version: version("majorVersion", dir_major),
            minor_version: version("minorVersion", dir_minor),
            patch_version: version("patchVersion", 0),
            title: text("title"),
            description: text("description"),
            author: text("author"),
            license: text("license"),
            runnable,
            dependencies: json!({
                "preloadedDependencies": library_json.get("preloadedDependencies"),
                "dynamicDependencies": library_json.get("dynamicDependencies"),
                "editorDependencies": library_json.get("editorDependencies"),
            }),
            semantics_json,
            language_json: (!languages.is_empty()).then_some(Value::Object(languages)),
            files: Value::Object(files),
            library_json,
        })
    }
}

/// Splits `Machine.Name-1.2` into `("Machine.Name", 1, 2)`.
pub fn parse_library_dir(dir: &str) -> Option<(String, i32, i32)> {
    let (machine, version) = dir.rsplit_once('-')?;
    let (major, minor) = version.split_once('.')?;
    if machine.is_empty() {
        return None;
    }
    Some((machine.to_string(), major.parse().ok()?, minor.parse().ok()?))
}

/// Builds an `.h5p` archive from a manifest, the content parameters and the
/// stored content files.
pub fn build_export(manifest: &Value, content: &Value, files: &[(String, Vec<u8>)]) -> H5pResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(MANIFEST, options)?;
        zip.write_all(&serde_json::to_vec_pretty(manifest)?)?;

        zip.start_file(CONTENT_JSON, options)?;
        zip.write_all(&serde_json::to_vec_pretty(content)?)?;

        for (name, data) in files {
            // content.json is regenerated from the stored parameters
            if name == "content.json" {
                continue;
            }
            zip.start_file(format!("{CONTENT_PREFIX}{name}"), options)?;
            zip.write_all(data)?;
        }

        zip.finish()?;
    }
    Ok(buffer.into_inner())
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    const LIMIT: usize = 1024 * 1024;

    pub(crate) fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            let options = SimpleFileOptions::default();
            for (name, data) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer.into_inner()
    }

    pub(crate) fn sample_package() -> Vec<u8> {
        let manifest = json!({
            "title": "Phép cộng",
            "mainLibrary": "H5P.MultiChoice",
            "language": "vi",
            "preloadedDependencies": [
                { "machineName": "H5P.MultiChoice", "majorVersion": 1, "minorVersion": 16 }
            ]
        })
        .to_string();
        let library = json!({
            "title": "Multiple Choice",
            "machineName": "H5P.MultiChoice",
            "majorVersion": 1,
            "minorVersion": 16,
            "patchVersion": 4,
            "runnable": 1
        })
        .to_string();

        zip_of(&[
            ("h5p.json", manifest.as_bytes()),
            ("content/content.json", br#"{"question":"1 + 1 = ?"}"#),
            ("content/images/apple.png", b"png"),
            ("H5P.MultiChoice-1.16/library.json", library.as_bytes()),
            ("H5P.MultiChoice-1.16/semantics.json", b"[]"),
            ("H5P.MultiChoice-1.16/language/vi.json", br#"{"semantics":[]}"#),
            ("H5P.MultiChoice-1.16/multichoice.js", b"var H5P;"),
            ("H5P.MultiChoice-1.16/styles/extra.css", b".x{}"),
        ])
    }

    #[test]
    fn parses_library_directory_names() {
        assert_eq!(
            parse_library_dir("H5P.MultiChoice-1.16"),
            Some(("H5P.MultiChoice".to_string(), 1, 16))
        );
        assert_eq!(
            parse_library_dir("FontAwesome-4.5"),
            Some(("FontAwesome".to_string(), 4, 5))
        );
        assert_eq!(parse_library_dir("content"), None);
        assert_eq!(parse_library_dir("-1.2"), None);
        assert_eq!(parse_library_dir("H5P.Foo-a.b"), None);
    }

    #[test]
    fn reads_package_structure() {
        let package = H5pPackage::from_bytes(&sample_package(), LIMIT).unwrap();
        assert!(package.validate().is_empty());
        assert_eq!(package.library_dirs(), vec!["H5P.MultiChoice-1.16".to_string()]);

        let manifest = package.manifest().unwrap();
        assert_eq!(manifest.main_library_string().as_deref(), Some("H5P.MultiChoice 1.16"));

        let content: Vec<&str> = package.content_files().map(|(name, _)| name).collect();
        assert_eq!(content, vec!["content.json", "images/apple.png"]);
    }

    #[test]
    fn info_applies_defaults() {
        let manifest = json!({ "mainLibrary": "H5P.Blanks" }).to_string();
        let bytes = zip_of(&[("h5p.json", manifest.as_bytes())]);
        let info = H5pPackage::from_bytes(&bytes, LIMIT).unwrap().info().unwrap();

        assert_eq!(info.title, "Untitled");
        assert_eq!(info.language, "en");
        assert_eq!(info.content_type, "Unknown");
        assert_eq!(info.license, "Unspecified");
        assert!(info.libraries.is_empty());
    }

    #[test]
    fn validation_lists_missing_files() {
        let bytes = zip_of(&[("readme.txt", b"hi")]);
        let errors = H5pPackage::from_bytes(&bytes, LIMIT).unwrap().validate();
        assert_eq!(errors, vec!["Missing h5p.json", "Missing content/content.json"]);
    }

    #[test]
    fn not_a_zip_is_a_client_error() {
        let err = H5pPackage::from_bytes(b"definitely not a zip", LIMIT).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn reads_library_metadata() {
        let package = H5pPackage::from_bytes(&sample_package(), LIMIT).unwrap();
        let library = package.read_library("H5P.MultiChoice-1.16").unwrap();

        assert_eq!(library.machine_name, "H5P.MultiChoice");
        assert_eq!((library.major_version, library.minor_version, library.patch_version), (1, 16, 4));
        assert!(library.runnable);
        assert_eq!(library.semantics_json, Some(json!([])));
        assert_eq!(library.language_json, Some(json!({ "vi": { "semantics": [] } })));
        // only top-level scripts and styles are inlined
        assert_eq!(library.files, json!({ "multichoice.js": "var H5P;" }));
    }

    #[test]
    fn library_without_descriptor_is_rejected() {
        let bytes = zip_of(&[("H5P.Broken-1.0/main.js", b"")]);
        let package = H5pPackage::from_bytes(&bytes, LIMIT).unwrap();
        assert!(package.read_library("H5P.Broken-1.0").is_err());
    }

    #[test]
    fn export_is_a_readable_package() {
        let files = vec![
            ("content.json".to_string(), b"{\"stale\":true}".to_vec()),
            ("images/apple.png".to_string(), b"png".to_vec()),
        ];
        let manifest = json!({ "title": "Phép cộng", "mainLibrary": "H5P.MultiChoice" });
        let content = json!({ "question": "1 + 1 = ?" });

        let bytes = build_export(&manifest, &content, &files).unwrap();
        let package = H5pPackage::from_bytes(&bytes, LIMIT).unwrap();

        assert!(package.validate().is_empty());
        assert_eq!(package.content_json().unwrap(), content);
        assert_eq!(package.info().unwrap().title, "Phép cộng");
        assert!(package.has_file("content/images/apple.png"));
    }

    #[test]
    fn inflation_is_bounded() {
        let zeros = vec![0u8; 4 * LIMIT];
        let bytes = zip_of(&[("content/content.json", zeros.as_slice())]);
        assert!(bytes.len() < LIMIT / 16);

        let err = H5pPackage::from_bytes(&bytes, LIMIT).unwrap_err();
        assert!(matches!(err, H5pError::TooLarge { max: LIMIT, .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn inflation_bound_spans_all_entries() {
        let half = vec![b'a'; LIMIT / 2 + 1];
        let bytes = zip_of(&[("h5p.json", half.as_slice()), ("content/content.json", half.as_slice())]);

        assert!(H5pPackage::from_bytes(&bytes, 2 * LIMIT).is_ok());
        assert!(matches!(
            H5pPackage::from_bytes(&bytes, LIMIT),
            Err(H5pError::TooLarge { .. })
        ));
    }
}
