use std::{
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
};

use axum::body::Bytes;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::{fs, task};

use crate::error::AppError;

pub fn get_json_from_body(body: &Bytes) -> Result<Value, AppError> {
    serde_json::from_slice(body).map_err(|_| AppError::MalformedPayload)
}

pub async fn read_json(path: &Path) -> Result<Value, AppError> {
    let bytes = fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => AppError::DataNotFound,
        _ => AppError::internal(e),
    })?;

    serde_json::from_slice(&bytes).map_err(AppError::internal)
}

/// Writes pretty JSON to a uniquely named file next to the target, then renames over it.
pub async fn write_json(path: &Path, value: &Value) -> Result<(), AppError> {
    let contents = serde_json::to_vec_pretty(value).map_err(AppError::internal)?;
    let path = path.to_path_buf();

    task::spawn_blocking(move || -> io::Result<()> {
        let parent = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;

        let mut staging = NamedTempFile::new_in(parent)?;
        staging.write_all(&contents)?;
        staging.persist(&path)?;

        Ok(())
    })
    .await
    .map_err(AppError::internal)?
    .map_err(AppError::internal)
}

/// Compares every byte, without stopping at the first difference.
pub fn tokens_match(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }

    let diff = provided
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b));

    diff == 0
}

/// Maps a request path onto a file under `frontend_root`. Pages without an extension get
/// `.html`, anything under `api/` is reserved.
pub fn static_path(frontend_root: &Path, request_path: &str) -> Option<PathBuf> {
    let request_path = request_path
        .strip_prefix("frontend/")
        .unwrap_or(request_path);

    if request_path == "api" || request_path.starts_with("api/") {
        return None;
    }

    let mut segments: Vec<&str> = request_path.split('/').collect();
    if segments.last() == Some(&"") {
        segments.pop();
    }

    if segments.is_empty()
        || segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains(['\\', '\0']))
    {
        return None;
    }

    let mut path = frontend_root.to_path_buf();
    path.extend(&segments);

    if segments.last().is_some_and(|last| !last.contains('.')) {
        path.set_extension("html");
    }

    Some(path)
}

/// Follows symlinks and keeps the file only while it stays under `frontend_root` and outside
/// `data_dir`.
pub async fn confine_static(
    file: &Path,
    frontend_root: &Path,
    data_dir: &Path,
) -> Option<PathBuf> {
    let file = fs::canonicalize(file).await.ok()?;
    let frontend_root = fs::canonicalize(frontend_root).await.ok()?;

    if !file.starts_with(&frontend_root) {
        return None;
    }

    match fs::canonicalize(data_dir).await {
        Ok(data_dir) if file.starts_with(&data_dir) => None,
        _ => Some(file),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn static_paths() {
        let root = Path::new("/clients/acme.com/frontend");

        assert_eq!(
            static_path(root, "style.css"),
            Some(root.join("style.css"))
        );
        assert_eq!(
            static_path(root, "assets/imgs/logo.jpeg"),
            Some(root.join("assets/imgs/logo.jpeg"))
        );
        assert_eq!(
            static_path(root, "demo-design-1"),
            Some(root.join("demo-design-1.html"))
        );
        assert_eq!(
            static_path(root, "msn_55512.json"),
            Some(root.join("msn_55512.json"))
        );

        assert_eq!(
            static_path(root, "frontend/style.css"),
            Some(root.join("style.css"))
        );
        assert_eq!(
            static_path(root, "frontend/about"),
            Some(root.join("about.html"))
        );
        assert_eq!(static_path(root, "frontend/../data/orders.json"), None);

        assert_eq!(static_path(root, "api/sites"), None);
        assert_eq!(static_path(root, "../data/orders.json"), None);
        assert_eq!(static_path(root, "assets/../../data/orders.json"), None);
        assert_eq!(static_path(root, "a//b.css"), None);
        assert_eq!(static_path(root, ""), None);
    }

    #[tokio::test]
    async fn json_files_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data/orders.json");

        assert!(matches!(read_json(&path).await, Err(AppError::DataNotFound)));

        write_json(&path, &json!({ "orders": [1, 2] })).await.unwrap();

        assert_eq!(read_json(&path).await.unwrap(), json!({ "orders": [1, 2] }));
        assert_eq!(std::fs::read_dir(dir.path().join("data")).unwrap().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_to_one_file_all_land() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data/orders.json");

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let path = path.clone();
                tokio::spawn(async move { write_json(&path, &json!({ "writer": i })).await })
            })
            .collect();

        for writer in writers {
            assert!(writer.await.unwrap().is_ok());
        }

        let stored = read_json(&path).await.unwrap();
        assert!(stored["writer"].as_u64().is_some_and(|i| i < 16));
        assert_eq!(std::fs::read_dir(dir.path().join("data")).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn static_files_never_resolve_into_data() {
        let dir = tempdir().unwrap();
        let frontend = dir.path().join("frontend");
        let data = dir.path().join("data");
        std::fs::create_dir_all(&frontend).unwrap();
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(frontend.join("style.css"), "h1 {}").unwrap();
        std::fs::write(data.join("orders.json"), "{}").unwrap();
        std::os::unix::fs::symlink(data.join("orders.json"), frontend.join("orders.json"))
            .unwrap();

        let style = confine_static(&frontend.join("style.css"), &frontend, &data).await;
        assert!(style.is_some_and(|file| file.ends_with("frontend/style.css")));

        assert_eq!(confine_static(&frontend.join("orders.json"), &frontend, &data).await, None);
        assert_eq!(confine_static(&frontend.join("missing.css"), &frontend, &data).await, None);
        assert_eq!(confine_static(&data.join("orders.json"), &frontend, &data).await, None);
    }

    #[test]
    fn token_comparison() {
        assert!(tokens_match(b"s3cret", b"s3cret"));

        assert!(!tokens_match(b"s3cres", b"s3cret"));
        assert!(!tokens_match(b"S3cret", b"s3cret"));
        assert!(!tokens_match(b"s3cre", b"s3cret"));
        assert!(!tokens_match(b"s3crett", b"s3cret"));
        assert!(!tokens_match(b"", b"s3cret"));
    }

    #[test]
    fn bodies_must_be_json() {
        assert!(get_json_from_body(&Bytes::from_static(b"{\"a\": 1}")).is_ok());
        assert!(matches!(
            get_json_from_body(&Bytes::from_static(b"not json")),
            Err(AppError::MalformedPayload)
        ));
    }
}
