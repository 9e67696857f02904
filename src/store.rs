use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LabelerError, Result};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

// ── Data Model ──────────────────────────────────────────────────────────────

/// One labelable image, identified by its file stem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageEntry {
    pub id: String,
    pub file_name: String,
    pub path: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LabelFile {
    #[serde(default)]
    rotate: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct BookmarkFile {
    #[serde(default)]
    bookmark: Option<String>,
}

/// The `images/` + `labels/` pair under a dataset root.
#[derive(Clone, Debug)]
pub struct DatasetLayout {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
}

impl DatasetLayout {
    /// Check that `images/` exists and make sure `labels/` does too.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let images_dir = root.join("images");
        let labels_dir = root.join("labels");

        if !images_dir.is_dir() {
            return Err(LabelerError::DirectoryNotFound(images_dir));
        }
        std::fs::create_dir_all(&labels_dir).map_err(|source| LabelerError::DirectoryCreate {
            path: labels_dir.clone(),
            source,
        })?;

        Ok(Self {
            images_dir,
            labels_dir,
        })
    }
}

// ── Entries ─────────────────────────────────────────────────────────────────

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// List the supported images in `images_dir`, sorted by file name.
pub fn list_entries(images_dir: &Path) -> Result<Vec<ImageEntry>> {
    if !images_dir.is_dir() {
        return Err(LabelerError::DirectoryNotFound(images_dir.to_path_buf()));
    }
    let read_dir = std::fs::read_dir(images_dir).map_err(|e| LabelerError::io(images_dir, e))?;

    let mut entries = Vec::new();
    for dir_entry in read_dir {
        let dir_entry = dir_entry.map_err(|e| LabelerError::io(images_dir, e))?;
        let path = dir_entry.path();
        if !path.is_file() || !is_supported_image(&path) {
            continue;
        }
        let (Some(file_name), Some(id)) = (
            path.file_name().and_then(|n| n.to_str()),
            path.file_stem().and_then(|s| s.to_str()),
        ) else {
            log::warn!("skipping non UTF-8 file name {}", path.display());
            continue;
        };
        entries.push(ImageEntry {
            id: id.to_string(),
            file_name: file_name.to_string(),
            path: path.clone(),
        });
    }
    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(entries)
}

/// Index of the bookmarked entry, or 0 when there is no usable bookmark.
pub fn resolve_initial_cursor(entries: &[ImageEntry], bookmark: Option<&str>) -> usize {
    bookmark
        .and_then(|id| entries.iter().position(|entry| entry.id == id))
        .unwrap_or(0)
}

// ── Bookmark ────────────────────────────────────────────────────────────────

pub fn load_bookmark(config_path: &Path) -> Result<Option<String>> {
    if !config_path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(config_path).map_err(|e| LabelerError::io(config_path, e))?;
    let file: BookmarkFile =
        serde_json::from_str(&data).map_err(|source| LabelerError::ConfigCorrupt {
            path: config_path.to_path_buf(),
            source,
        })?;
    Ok(file.bookmark.filter(|id| !id.is_empty()))
}

pub fn save_bookmark(config_path: &Path, id: &str) -> Result<()> {
    let file = BookmarkFile {
        bookmark: Some(id.to_string()),
    };
    write_json_atomic(config_path, &file)?;
    log::info!("bookmark set to {id}");
    Ok(())
}

// ── Labels ──────────────────────────────────────────────────────────────────

pub fn label_path(labels_dir: &Path, id: &str) -> PathBuf {
    labels_dir.join(format!("{id}.json"))
}

/// Round to two decimal places, the precision labels are stored with.
/// Exact ties go to the even neighbour.
pub fn round_angle(angle: f32) -> f32 {
    ((angle as f64 * 100.0).round_ties_even() / 100.0) as f32
}

/// Persisted angle for `id`, if a label file exists.
pub fn load_label(labels_dir: &Path, id: &str) -> Result<Option<f32>> {
    let path = label_path(labels_dir, id);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path).map_err(|e| LabelerError::io(&path, e))?;
    let file: LabelFile =
        serde_json::from_str(&data).map_err(|source| LabelerError::LabelCorrupt { path, source })?;
    Ok(Some(file.rotate))
}

pub fn save_label(labels_dir: &Path, id: &str, angle: f32) -> Result<()> {
    let path = label_path(labels_dir, id);
    let file = LabelFile {
        rotate: round_angle(angle),
    };
    write_json_atomic(&path, &file)?;
    log::info!("saved {} (rotate {})", path.display(), file.rotate);
    Ok(())
}

/// Write `value` next to `path` and rename it into place, so readers never
/// see a half-written file.
///
/// The result gets the permissions of the file it replaces, or the usual
/// umask-filtered 0666 for a new file, like a plain create would.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let data = serde_json::to_vec(value).map_err(|e| LabelerError::io(path, e.into()))?;

    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // applied at creation, so the umask still filters it
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder
        .tempfile_in(dir)
        .map_err(|e| LabelerError::io(dir, e))?;
    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(|e| LabelerError::io(tmp.path(), e))?;
    }
    tmp.write_all(&data).map_err(|e| LabelerError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| LabelerError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| LabelerError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    fn entry(id: &str) -> ImageEntry {
        ImageEntry {
            id: id.to_string(),
            file_name: format!("{id}.png"),
            path: PathBuf::from(format!("{id}.png")),
        }
    }

    #[test]
    fn lists_supported_images_sorted() {
        let tmp = TempDir::new().unwrap();
        for name in ["c.JPG", "a.png", "b.jpeg", "d.Bmp", "notes.txt", "e.gif", "noext"] {
            touch(tmp.path(), name);
        }
        std::fs::create_dir(tmp.path().join("dir.png")).unwrap();

        let entries = list_entries(tmp.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["a.png", "b.jpeg", "c.JPG", "d.Bmp"]);
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);

        assert_eq!(list_entries(tmp.path()).unwrap(), entries);
    }

    #[test]
    fn listing_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let err = list_entries(&tmp.path().join("images")).unwrap_err();
        assert!(matches!(err, LabelerError::DirectoryNotFound(_)));
    }

    #[test]
    fn layout_creates_labels_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            DatasetLayout::open(tmp.path()),
            Err(LabelerError::DirectoryNotFound(_))
        ));

        std::fs::create_dir(tmp.path().join("images")).unwrap();
        let layout = DatasetLayout::open(tmp.path()).unwrap();
        assert!(layout.labels_dir.is_dir());
        // idempotent
        DatasetLayout::open(tmp.path()).unwrap();
    }

    #[test]
    fn labels_path_taken_by_a_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("images")).unwrap();
        touch(tmp.path(), "labels");
        assert!(matches!(
            DatasetLayout::open(tmp.path()),
            Err(LabelerError::DirectoryCreate { .. })
        ));
    }

    #[test]
    fn bookmark_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(load_bookmark(&tmp.path().join("config.json")).unwrap(), None);
    }

    #[test]
    fn bookmark_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        save_bookmark(&path, "img_007").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"bookmark":"img_007"}"#
        );
        assert_eq!(load_bookmark(&path).unwrap().as_deref(), Some("img_007"));
    }

    #[test]
    fn bookmark_missing_field_or_empty_is_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"other": 1}"#).unwrap();
        assert_eq!(load_bookmark(&path).unwrap(), None);
        std::fs::write(&path, r#"{"bookmark": ""}"#).unwrap();
        assert_eq!(load_bookmark(&path).unwrap(), None);
    }

    #[test]
    fn corrupt_bookmark_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_bookmark(&path),
            Err(LabelerError::ConfigCorrupt { .. })
        ));
    }

    #[test]
    fn initial_cursor_follows_bookmark() {
        let entries = vec![entry("a"), entry("b"), entry("c")];
        assert_eq!(resolve_initial_cursor(&entries, Some("c")), 2);
        assert_eq!(resolve_initial_cursor(&entries, Some("zzz")), 0);
        assert_eq!(resolve_initial_cursor(&entries, None), 0);
    }

    #[test]
    fn label_is_rounded_to_two_places() {
        let tmp = TempDir::new().unwrap();
        save_label(tmp.path(), "a", 12.3456).unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("a.json")).unwrap(),
            r#"{"rotate":12.35}"#
        );
        assert_eq!(load_label(tmp.path(), "a").unwrap(), Some(12.35));

        save_label(tmp.path(), "a", 30.0).unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("a.json")).unwrap(),
            r#"{"rotate":30.0}"#
        );
    }

    #[test]
    fn missing_label_and_missing_field() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(load_label(tmp.path(), "a").unwrap(), None);
        std::fs::write(tmp.path().join("a.json"), "{}").unwrap();
        assert_eq!(load_label(tmp.path(), "a").unwrap(), Some(0.0));
        std::fs::write(tmp.path().join("a.json"), "[1, 2]").unwrap();
        assert!(matches!(
            load_label(tmp.path(), "a"),
            Err(LabelerError::LabelCorrupt { .. })
        ));
    }

    #[test]
    fn rounding() {
        assert_eq!(round_angle(-7.004), -7.0);
        assert_eq!(round_angle(-7.006), -7.01);
        assert_eq!(round_angle(44.999), 45.0);
    }

    #[test]
    fn rounding_ties_go_to_even() {
        assert_eq!(round_angle(0.125), 0.12);
        assert_eq!(round_angle(10.625), 10.62);
        assert_eq!(round_angle(-0.375), -0.38);
    }

    #[cfg(unix)]
    #[test]
    fn new_files_get_plain_create_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("plain.json"), b"{}").unwrap();
        save_label(tmp.path(), "a", 1.0).unwrap();
        save_bookmark(&tmp.path().join("config.json"), "a").unwrap();

        let mode = |name: &str| {
            std::fs::metadata(tmp.path().join(name))
                .unwrap()
                .permissions()
                .mode()
                & 0o777
        };
        assert_eq!(mode("a.json"), mode("plain.json"));
        assert_eq!(mode("config.json"), mode("plain.json"));
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = label_path(tmp.path(), "a");
        save_label(tmp.path(), "a", 1.0).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        save_label(tmp.path(), "a", 2.0).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        assert_eq!(load_label(tmp.path(), "a").unwrap(), Some(2.0));
    }
}
