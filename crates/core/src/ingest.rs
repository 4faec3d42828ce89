use crate::JobError;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if is_pdf(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable_by(|left, right| left.as_os_str().cmp(right.as_os_str()));
    files
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

pub fn validate_root(root: &str) -> Result<PathBuf, JobError> {
    let trimmed = root.trim();
    if trimmed.is_empty() {
        return Err(JobError::Validation("no path provided".to_string()));
    }

    let path = PathBuf::from(trimmed);
    let metadata = fs::metadata(&path)
        .map_err(|_| JobError::Validation(format!("directory does not exist: {}", path.display())))?;

    if !metadata.is_dir() {
        return Err(JobError::Validation(format!(
            "path is not a directory: {}",
            path.display()
        )));
    }

    fs::read_dir(&path).map_err(|error| {
        JobError::Validation(format!(
            "directory is not readable: {}: {error}",
            path.display()
        ))
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::{discover_pdf_files, validate_root};
    use crate::JobError;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        fs::write(base.join("notes.txt"), b"not a pdf")?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn discovery_order_is_lexicographic_by_full_path() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        fs::create_dir(base.join("b"))?;
        fs::write(base.join("c.pdf"), b"c")?;
        fs::write(base.join("b").join("z.pdf"), b"z")?;
        fs::write(base.join("a.pdf"), b"a")?;

        let names = discover_pdf_files(base)
            .into_iter()
            .map(|path| path.strip_prefix(base).map(|p| p.to_string_lossy().to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        assert_eq!(names, vec!["a.pdf", "b/z.pdf", "c.pdf"]);
        Ok(())
    }

    #[test]
    fn validation_rejects_missing_and_non_directories() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file = dir.path().join("file.pdf");
        fs::write(&file, b"x")?;

        assert!(matches!(validate_root(""), Err(JobError::Validation(_))));
        assert!(matches!(
            validate_root(&dir.path().join("missing").to_string_lossy()),
            Err(JobError::Validation(_))
        ));
        assert!(matches!(
            validate_root(&file.to_string_lossy()),
            Err(JobError::Validation(_))
        ));
        assert_eq!(validate_root(&dir.path().to_string_lossy())?, dir.path());
        Ok(())
    }
}
