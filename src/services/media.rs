//! Uploaded image storage under the media root.

use std::io;
use std::path::Path;

/// Write an uploaded file under `media_root/subdir`, returning the path
/// relative to the media root. Filenames are sanitized and deduplicated
/// with a timestamp suffix.
pub fn save_upload(
    media_root: &Path,
    subdir: &str,
    filename: &str,
    bytes: &[u8],
) -> io::Result<String> {
    let safe_name = sanitize_filename(filename);
    let dir = media_root.join(subdir);
    std::fs::create_dir_all(&dir)?;

    let mut target = dir.join(&safe_name);
    if target.exists() {
        let suffixed = format!(
            "{}_{}",
            chrono::Utc::now().timestamp_millis(),
            safe_name
        );
        target = dir.join(suffixed);
    }

    std::fs::write(&target, bytes)?;

    let relative = format!(
        "{}/{}",
        subdir,
        target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&safe_name)
    );
    tracing::debug!("Stored upload at {}", relative);
    Ok(relative)
}

/// Keep only characters that are safe in a filename; path components are
/// stripped so uploads cannot escape the media root.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
