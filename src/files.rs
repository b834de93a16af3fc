//! Input discovery and output naming for the command-line tool.

use crate::error::{Result, SubtransError};
use crate::subtitle::SubtitleFormat;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Subtitle files under `path`. A file path is returned as-is; a directory
/// is scanned for `.srt`, `.vtt`, `.ass` and `.ssa` files, descending only
/// when `recursive`.
pub fn collect_subtitle_files(path: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(SubtransError::FileNotFound(path.display().to_string()));
    }

    if path.is_file() {
        SubtitleFormat::from_path(path)?;
        return Ok(vec![path.to_path_buf()]);
    }

    let walker = WalkDir::new(path).follow_links(true);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| SubtransError::Io(std::io::Error::other(e)))?;
        let entry_path = entry.path();
        if entry_path.is_file() && SubtitleFormat::from_path(entry_path).is_ok() {
            files.push(entry_path.to_path_buf());
        }
    }

    files.sort();
    debug!("Found {} subtitle files in {:?}", files.len(), path);
    Ok(files)
}

/// `{stem}_{target}{.ext}`.
pub fn output_file_name(input: &Path, target: &str) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "subtitles".to_string());
    match input.extension() {
        Some(ext) => format!("{}_{}.{}", stem, target, ext.to_string_lossy()),
        None => format!("{}_{}", stem, target),
    }
}

/// Where the translation of `input` is written.
///
/// Without `output_dir` the file lands beside its input. With one, the
/// input's path relative to `input_root` is mirrored inside it.
pub fn derive_output_path(
    input: &Path,
    input_root: &Path,
    output_dir: Option<&Path>,
    target: &str,
) -> PathBuf {
    let name = output_file_name(input, target);
    match output_dir {
        None => input.with_file_name(name),
        Some(dir) => {
            let relative_parent = input
                .parent()
                .and_then(|parent| parent.strip_prefix(input_root).ok())
                .unwrap_or_else(|| Path::new(""));
            dir.join(relative_parent).join(name)
        }
    }
}

/// Write `content`, creating parent directories as needed.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(Path::new("/media/movie.en.srt"), "nld_Latn"),
            "movie.en_nld_Latn.srt"
        );
        assert_eq!(output_file_name(Path::new("talk.vtt"), "fra_Latn"), "talk_fra_Latn.vtt");
    }

    #[test]
    fn test_derive_output_beside_input() {
        let path = derive_output_path(
            Path::new("/media/show/ep1.srt"),
            Path::new("/media"),
            None,
            "deu_Latn",
        );
        assert_eq!(path, PathBuf::from("/media/show/ep1_deu_Latn.srt"));
    }

    #[test]
    fn test_derive_output_mirrors_tree() {
        let path = derive_output_path(
            Path::new("/media/show/ep1.srt"),
            Path::new("/media"),
            Some(Path::new("/out")),
            "deu_Latn",
        );
        assert_eq!(path, PathBuf::from("/out/show/ep1_deu_Latn.srt"));
    }

    #[test]
    fn test_collect_respects_recursion() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.srt"));
        touch(&dir.path().join("b.vtt"));
        touch(&dir.path().join("c.ass"));
        touch(&dir.path().join("d.ssa"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("nested/c.srt"));

        let flat = collect_subtitle_files(dir.path(), false).unwrap();
        assert_eq!(flat.len(), 4);

        let deep = collect_subtitle_files(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 5);
        assert!(deep.iter().any(|p| p.ends_with("nested/c.srt")));
    }

    #[test]
    fn test_collect_single_file_and_errors() {
        let dir = TempDir::new().unwrap();
        let srt = dir.path().join("a.srt");
        touch(&srt);
        assert_eq!(collect_subtitle_files(&srt, false).unwrap(), vec![srt]);

        let txt = dir.path().join("a.txt");
        touch(&txt);
        assert!(matches!(
            collect_subtitle_files(&txt, false),
            Err(SubtransError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            collect_subtitle_files(&dir.path().join("missing.srt"), false),
            Err(SubtransError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_write_output_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x/y/out.srt");
        write_output(&path, "1\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "1\n");
    }
}
