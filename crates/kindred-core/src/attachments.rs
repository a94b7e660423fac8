use std::collections::BTreeSet;

use tracing::debug;

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("{name}: file type {mime_type} is not accepted")]
    UnsupportedType { name: String, mime_type: String },
    #[error("{name}: {size_bytes} bytes exceeds the {limit_bytes} byte limit")]
    TooLarge {
        name: String,
        size_bytes: u64,
        limit_bytes: u64,
    },
}

/// Issues preview handles for selected files and tracks which are live.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlRegistry {
    next: u64,
    live: BTreeSet<ObjectUrl>,
    revoked: u64,
}

impl ObjectUrlRegistry {
    pub fn create(&mut self) -> ObjectUrl {
        self.next += 1;
        let url = ObjectUrl(format!("blob:kindred/{}", self.next));
        self.live.insert(url.clone());
        url
    }

    /// Releases a handle. A second release of the same handle returns false.
    pub fn revoke(&mut self, url: &ObjectUrl) -> bool {
        let released = self.live.remove(url);
        if released {
            self.revoked += 1;
        } else {
            debug!(url = url.as_str(), "object url already released");
        }
        released
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn revoked_count(&self) -> u64 {
        self.revoked
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: u64,
    pub file: AttachmentFile,
    pub url: ObjectUrl,
}

pub fn validate_attachment(file: &AttachmentFile, limit_bytes: u64) -> Result<(), AttachmentError> {
    if !ALLOWED_MIME_TYPES.contains(&file.mime_type.as_str()) {
        return Err(AttachmentError::UnsupportedType {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
        });
    }
    if file.size_bytes > limit_bytes {
        return Err(AttachmentError::TooLarge {
            name: file.name.clone(),
            size_bytes: file.size_bytes,
            limit_bytes,
        });
    }
    Ok(())
}

/// Files collected for a report before it is submitted or thrown away.
#[derive(Debug, Clone, Default)]
pub struct ReportDraft {
    attachments: Vec<Attachment>,
    next_id: u64,
}

impl ReportDraft {
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Validates and adds each file on its own; one bad file does not
    /// reject the others.
    pub fn add_files(
        &mut self,
        files: Vec<AttachmentFile>,
        limit_bytes: u64,
        urls: &mut ObjectUrlRegistry,
    ) -> Vec<Result<u64, AttachmentError>> {
        files
            .into_iter()
            .map(|file| self.add(file, limit_bytes, urls))
            .collect()
    }

    pub fn add(
        &mut self,
        file: AttachmentFile,
        limit_bytes: u64,
        urls: &mut ObjectUrlRegistry,
    ) -> Result<u64, AttachmentError> {
        validate_attachment(&file, limit_bytes)?;
        self.next_id += 1;
        let id = self.next_id;
        self.attachments.push(Attachment {
            id,
            file,
            url: urls.create(),
        });
        Ok(id)
    }

    pub fn remove(&mut self, id: u64, urls: &mut ObjectUrlRegistry) -> bool {
        let Some(pos) = self.attachments.iter().position(|a| a.id == id) else {
            return false;
        };
        let attachment = self.attachments.remove(pos);
        urls.revoke(&attachment.url);
        true
    }

    /// Releases every handle and returns the file metadata.
    pub fn release(self, urls: &mut ObjectUrlRegistry) -> Vec<AttachmentFile> {
        self.attachments
            .into_iter()
            .map(|attachment| {
                urls.revoke(&attachment.url);
                attachment.file
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const LIMIT: u64 = 10 * 1024 * 1024;

    fn file(name: &str, mime_type: &str, size_bytes: u64) -> AttachmentFile {
        AttachmentFile {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes,
        }
    }

    #[test]
    fn invalid_files_are_rejected_individually() {
        let mut urls = ObjectUrlRegistry::default();
        let mut draft = ReportDraft::default();
        let results = draft.add_files(
            vec![
                file("a.png", "image/png", 1_000),
                file("b.exe", "application/x-msdownload", 10),
                file("c.pdf", "application/pdf", LIMIT + 1),
                file("d.txt", "text/plain", LIMIT),
            ],
            LIMIT,
            &mut urls,
        );

        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(AttachmentError::UnsupportedType { .. })
        ));
        assert!(matches!(results[2], Err(AttachmentError::TooLarge { .. })));
        assert!(results[3].is_ok());
        assert_eq!(draft.attachments().len(), 2);
        assert_eq!(urls.live_count(), 2);
    }

    #[test]
    fn urls_are_released_exactly_once() {
        let mut urls = ObjectUrlRegistry::default();
        let mut draft = ReportDraft::default();
        let first = draft
            .add(file("a.png", "image/png", 10), LIMIT, &mut urls)
            .expect("add");
        draft
            .add(file("b.png", "image/png", 10), LIMIT, &mut urls)
            .expect("add");

        assert!(draft.remove(first, &mut urls));
        assert!(!draft.remove(first, &mut urls));
        let files = draft.release(&mut urls);

        assert_eq!(files.len(), 1);
        assert_eq!(urls.live_count(), 0);
        assert_eq!(urls.revoked_count(), 2);
    }

    #[test]
    fn double_revoke_is_refused() {
        let mut urls = ObjectUrlRegistry::default();
        let url = urls.create();
        assert!(urls.revoke(&url));
        assert!(!urls.revoke(&url));
        assert_eq!(urls.revoked_count(), 1);
    }
}
