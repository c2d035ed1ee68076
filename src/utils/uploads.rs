use axum::extract::Multipart;
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use uuid::Uuid;

use crate::domain::errors::UploadError;

/// Multipart field names accepted as the uploaded file.
pub const FILE_FIELDS: [&str; 2] = ["file", "image"];

/// A parsed multipart body. `file` is the stored filename of the attachment, if any.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub file: Option<String>,
}

impl FormData {
    /// Trimmed value of a text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Untrimmed value of a field, for passwords where whitespace is significant.
    pub fn secret(&self, name: &str) -> Option<String> {
        self.fields.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

/// Avatar files on local disk.
#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Writes `bytes` under a fresh unique name derived from `original_name`.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let filename = format!("{}-{}", Uuid::new_v4(), sanitize_filename(original_name));
        tokio::fs::write(self.path_of(&filename), bytes).await?;
        tracing::debug!("stored upload >>> {}", filename);

        Ok(filename)
    }

    /// A file that is already gone counts as deleted.
    pub async fn delete(&self, filename: &str) -> Result<(), UploadError> {
        match tokio::fs::remove_file(self.path_of(filename)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("upload to delete was already missing >>> {}", filename);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal used on rollback paths; failures are only logged.
    pub async fn discard(&self, filename: Option<&str>) {
        if let Some(filename) = filename {
            if let Err(e) = self.delete(filename).await {
                tracing::error!("failed to discard upload {} >>> {}", filename, e);
            }
        }
    }

    /// Reads every field of a multipart body, storing the file field (if any) to disk.
    /// If reading fails after the file was stored, the file is removed again.
    pub async fn read_form(&self, mut multipart: Multipart) -> Result<FormData, UploadError> {
        let mut form = FormData::default();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    self.discard(form.file.as_deref()).await;
                    return Err(UploadError::Multipart(e.to_string()));
                }
            };

            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(|f| f.to_string());

            match file_name {
                Some(original) if FILE_FIELDS.contains(&name.as_str()) => {
                    let bytes = match field.bytes().await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            self.discard(form.file.as_deref()).await;
                            return Err(UploadError::Multipart(e.to_string()));
                        }
                    };
                    if bytes.is_empty() {
                        continue;
                    }
                    if form.file.is_some() {
                        self.discard(form.file.as_deref()).await;
                        return Err(UploadError::Multipart(
                            "only one file may be uploaded".to_string(),
                        ));
                    }
                    form.file = Some(self.save(&original, &bytes).await?);
                }
                _ => match field.text().await {
                    Ok(value) => {
                        form.fields.insert(name, value);
                    }
                    Err(e) => {
                        self.discard(form.file.as_deref()).await;
                        return Err(UploadError::Multipart(e.to_string()));
                    }
                },
            }
        }

        Ok(form)
    }
}

fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_lose_directories_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\pics\\me photo.png"), "me_photo.png");
        assert_eq!(sanitize_filename("..."), "upload");
    }

    #[test]
    fn secrets_keep_their_whitespace() {
        let mut form = FormData::default();
        form.fields.insert("name".into(), "  Alice ".into());
        form.fields.insert("password".into(), "  spaced pass  ".into());
        form.fields.insert("blank".into(), String::new());

        assert_eq!(form.text("name").as_deref(), Some("Alice"));
        assert_eq!(form.secret("password").as_deref(), Some("  spaced pass  "));
        assert_eq!(form.secret("blank"), None);
        assert_eq!(form.secret("missing"), None);
    }

    #[tokio::test]
    async fn deleting_a_missing_file_is_not_an_error() {
        let dir = std::env::temp_dir().join(format!("uploads-{}", Uuid::new_v4()));
        let store = UploadStore::new(&dir);

        let name = store.save("avatar.png", b"png-bytes").await.unwrap();
        assert!(store.path_of(&name).exists());

        store.delete(&name).await.unwrap();
        assert!(!store.path_of(&name).exists());
        store.delete(&name).await.unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }
}
