//! Turns a filesystem root (directory, `.jar`, or `.war`) into the raw
//! bytes of every `.class` file it contains.

use std::io::Read;

use camino::Utf8Path;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::{AnalysisError, Result};

pub fn discover_class_bytes(root: &Utf8Path, include_libraries: bool, library_filters: &[String]) -> Result<Vec<Vec<u8>>> {
    if root.is_dir() {
        discover_from_directory(root)
    } else {
        match root.extension() {
            Some("jar") => discover_from_jar(root),
            Some("war") => discover_from_war(root, include_libraries, library_filters),
            _ => Err(AnalysisError::InvalidInput(format!(
                "unrecognised class root (expected a directory, .jar or .war): {root}"
            ))),
        }
    }
}

fn library_matcher(library_filters: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in library_filters {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

fn discover_from_directory(root: &Utf8Path) -> Result<Vec<Vec<u8>>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(std::result::Result::ok) {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("class") {
            continue;
        }
        let bytes = std::fs::read(path).map_err(|source| AnalysisError::LoadFailure {
            path: camino::Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap_or_default(),
            source,
        })?;
        out.push(bytes);
    }
    Ok(out)
}

fn open_jar_bytes(jar_bytes: Vec<u8>, origin: &Utf8Path) -> Result<Vec<Vec<u8>>> {
    let reader = std::io::Cursor::new(jar_bytes);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| AnalysisError::LoadFailure {
        path: origin.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| AnalysisError::LoadFailure {
            path: origin.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        if !file.name().ends_with(".class") {
            continue;
        }
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes).map_err(|source| AnalysisError::LoadFailure {
            path: origin.to_path_buf(),
            source,
        })?;
        out.push(bytes);
    }
    Ok(out)
}

fn discover_from_jar(root: &Utf8Path) -> Result<Vec<Vec<u8>>> {
    let bytes = std::fs::read(root).map_err(|source| AnalysisError::LoadFailure {
        path: root.to_path_buf(),
        source,
    })?;
    open_jar_bytes(bytes, root)
}

/// A `.war`'s classes live under `WEB-INF/classes/**.class`; its library
/// dependencies are `.jar`s under `WEB-INF/lib/*.jar`, each scanned in turn
/// when `include_libraries` is set and (if `library_filters` is non-empty)
/// the jar's file name matches at least one filter.
fn discover_from_war(root: &Utf8Path, include_libraries: bool, library_filters: &[String]) -> Result<Vec<Vec<u8>>> {
    let bytes = std::fs::read(root).map_err(|source| AnalysisError::LoadFailure {
        path: root.to_path_buf(),
        source,
    })?;
    let reader = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| AnalysisError::LoadFailure {
        path: root.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    let matcher = library_matcher(library_filters);
    let filter_is_empty = library_filters.is_empty();

    let mut out = Vec::new();
    let mut nested_jars = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| AnalysisError::LoadFailure {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        let name = file.name().to_string();
        if name.starts_with("WEB-INF/classes/") && name.ends_with(".class") {
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes).map_err(|source| AnalysisError::LoadFailure {
                path: root.to_path_buf(),
                source,
            })?;
            out.push(bytes);
        } else if include_libraries && name.starts_with("WEB-INF/lib/") && name.ends_with(".jar") {
            let jar_file_name = name.rsplit('/').next().unwrap_or(&name);
            if !filter_is_empty && !matcher.is_match(jar_file_name) {
                continue;
            }
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes).map_err(|source| AnalysisError::LoadFailure {
                path: root.to_path_buf(),
                source,
            })?;
            nested_jars.push(bytes);
        }
    }
    for jar_bytes in nested_jars {
        out.extend(open_jar_bytes(jar_bytes, root)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct TempDir(std::path::PathBuf);

    impl TempDir {
        fn new(label: &str) -> Self {
            let path = std::env::temp_dir().join(format!("bci_core_discover_{label}_{}", std::process::id()));
            let _ = std::fs::remove_dir_all(&path);
            std::fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        fn path(&self) -> &std::path::Path {
            &self.0
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn discover_from_directory_finds_nested_class_files_only() {
        let dir = TempDir::new("dir");
        std::fs::write(dir.path().join("Top.class"), b"topbytes").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignore me").unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Nested.class"), b"nestedbytes").unwrap();

        let root = Utf8Path::from_path(dir.path()).unwrap();
        let mut found = discover_from_directory(root).unwrap();
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&b"topbytes".to_vec()));
        assert!(found.contains(&b"nestedbytes".to_vec()));
    }

    #[test]
    fn discover_class_bytes_rejects_unrecognised_extension() {
        let dir = TempDir::new("bad_ext");
        let file_path = dir.path().join("archive.zip");
        std::fs::write(&file_path, b"not a class root").unwrap();
        let root = Utf8Path::from_path(&file_path).unwrap();
        let err = discover_class_bytes(root, true, &[]).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    fn build_jar_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn discover_from_jar_keeps_only_class_entries() {
        let dir = TempDir::new("jar");
        let jar_bytes = build_jar_with_entries(&[("com/example/Thing.class", b"classbytes"), ("META-INF/MANIFEST.MF", b"manifest")]);
        let jar_path = dir.path().join("lib.jar");
        std::fs::write(&jar_path, &jar_bytes).unwrap();

        let root = Utf8Path::from_path(&jar_path).unwrap();
        let found = discover_class_bytes(root, true, &[]).unwrap();
        assert_eq!(found, vec![b"classbytes".to_vec()]);
    }

    #[test]
    fn discover_from_war_reads_classes_and_nested_jars() {
        let dir = TempDir::new("war");
        let nested_jar = build_jar_with_entries(&[("com/lib/Dep.class", b"depbytes")]);
        let war_bytes = build_jar_with_entries(&[
            ("WEB-INF/classes/com/example/App.class", b"appbytes"),
            ("WEB-INF/lib/dep.jar", &nested_jar),
            ("WEB-INF/web.xml", b"<web-app/>"),
        ]);
        let war_path = dir.path().join("app.war");
        std::fs::write(&war_path, &war_bytes).unwrap();

        let root = Utf8Path::from_path(&war_path).unwrap();
        let mut found = discover_class_bytes(root, true, &[]).unwrap();
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&b"appbytes".to_vec()));
        assert!(found.contains(&b"depbytes".to_vec()));
    }

    #[test]
    fn discover_from_war_skips_libraries_when_not_requested() {
        let dir = TempDir::new("war_no_libs");
        let nested_jar = build_jar_with_entries(&[("com/lib/Dep.class", b"depbytes")]);
        let war_bytes = build_jar_with_entries(&[
            ("WEB-INF/classes/com/example/App.class", b"appbytes"),
            ("WEB-INF/lib/dep.jar", &nested_jar),
        ]);
        let war_path = dir.path().join("app.war");
        std::fs::write(&war_path, &war_bytes).unwrap();

        let root = Utf8Path::from_path(&war_path).unwrap();
        let found = discover_class_bytes(root, false, &[]).unwrap();
        assert_eq!(found, vec![b"appbytes".to_vec()]);
    }

    #[test]
    fn discover_from_war_applies_library_filters() {
        let dir = TempDir::new("war_filtered_libs");
        let kept_jar = build_jar_with_entries(&[("com/lib/Kept.class", b"keptbytes")]);
        let dropped_jar = build_jar_with_entries(&[("com/lib/Dropped.class", b"droppedbytes")]);
        let war_bytes = build_jar_with_entries(&[
            ("WEB-INF/lib/keep-me.jar", &kept_jar),
            ("WEB-INF/lib/skip-me.jar", &dropped_jar),
        ]);
        let war_path = dir.path().join("app.war");
        std::fs::write(&war_path, &war_bytes).unwrap();

        let root = Utf8Path::from_path(&war_path).unwrap();
        let found = discover_class_bytes(root, true, &["keep-*.jar".to_string()]).unwrap();
        assert_eq!(found, vec![b"keptbytes".to_vec()]);
    }
}
