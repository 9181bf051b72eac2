//! Summary report files

use deepthink_core::{Result, SubjectId};
use deepthink_memory::write_atomic;
use std::path::{Path, PathBuf};

/// `<dir>/<SUBJECT>_summary.md`
pub fn summary_path(dir: &Path, subject: &SubjectId) -> PathBuf {
    dir.join(format!("{subject}_summary.md"))
}

/// Write the summary markdown of `subject` into `dir`
pub async fn write_summary(dir: &Path, subject: &SubjectId, summary: &str) -> Result<PathBuf> {
    let path = summary_path(dir, subject);
    write_atomic(&path, summary.as_bytes()).await?;
    tracing::info!(subject = %subject, path = %path.display(), "Summary written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_summary_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("results");
        let subject = SubjectId::new("amzn").unwrap();

        let path = write_summary(&dir, &subject, "# Investment Summary for AMZN\n")
            .await
            .unwrap();

        assert_eq!(path, dir.join("AMZN_summary.md"));
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "# Investment Summary for AMZN\n");
    }
}
