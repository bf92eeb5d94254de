// ── Storage explorer ──
//
// Holds the listing of one remote folder at a time. Listings are fetched
// per path and not cached across navigation. Artifact events trigger a
// re-fetch only when they concern the folder on screen.

mod natural;

use std::sync::Arc;

use tracing::{debug, info};

use camsync_api::ControlClient;

use crate::convert::entry_from_dto;
use crate::error::CoreError;
use crate::model::{DirectoryEntry, StreamEvent, join_path, parent_path};

pub use natural::{entry_cmp, natural_cmp};

/// Asks the user before anything is deleted.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The user declined; no request was sent.
    Cancelled,
}

pub struct DirectoryExplorer {
    api: Arc<ControlClient>,
    path: String,
    entries: Vec<DirectoryEntry>,
}

impl DirectoryExplorer {
    /// Start at the storage root with an empty listing.
    pub fn new(api: Arc<ControlClient>) -> Self {
        Self {
            api,
            path: String::new(),
            entries: Vec::new(),
        }
    }

    /// Current folder, `""` at the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Path of `name` inside the current folder.
    pub fn child_path(&self, name: &str) -> String {
        join_path(&self.path, name)
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// Fetch `path` and make it the current folder.
    pub async fn list(&mut self, path: &str) -> Result<&[DirectoryEntry], CoreError> {
        let path = path.trim_matches('/').to_owned();
        let dtos = self
            .api
            .list_directory(&path)
            .await
            .map_err(CoreError::rejected("list directory"))?;
        let mut entries: Vec<DirectoryEntry> =
            dtos.into_iter().map(|dto| entry_from_dto(dto, &path)).collect();
        entries.sort_by(entry_cmp);
        debug!(path = %path, count = entries.len(), "listing fetched");

        self.path = path;
        self.entries = entries;
        Ok(&self.entries)
    }

    /// Descend into a child folder of the current listing.
    pub async fn navigate(&mut self, child: &str) -> Result<&[DirectoryEntry], CoreError> {
        let target = self
            .entries
            .iter()
            .find(|e| e.is_folder() && e.name == child)
            .map(|e| e.path.clone())
            .ok_or_else(|| CoreError::ValidationFailed {
                message: format!("no folder named {child:?} in /{}", self.path),
            })?;
        self.list(&target).await
    }

    /// Go to the parent folder. At the root this re-lists the root.
    pub async fn up(&mut self) -> Result<&[DirectoryEntry], CoreError> {
        let parent = parent_path(&self.path).to_owned();
        self.list(&parent).await
    }

    pub async fn refresh(&mut self) -> Result<&[DirectoryEntry], CoreError> {
        let path = self.path.clone();
        self.list(&path).await
    }

    // ── Deletion ─────────────────────────────────────────────────────

    pub async fn delete_file(
        &mut self,
        path: &str,
        confirm: &impl Confirm,
    ) -> Result<DeleteOutcome, CoreError> {
        if !confirm.confirm(&format!("Delete file {path}?")) {
            return Ok(DeleteOutcome::Cancelled);
        }
        self.api
            .delete_file(path)
            .await
            .map_err(CoreError::rejected("delete file"))?;
        info!(path, "file deleted");
        self.remove_local(path);
        Ok(DeleteOutcome::Deleted)
    }

    /// Delete a folder and its contents.
    pub async fn delete_folder(
        &mut self,
        path: &str,
        confirm: &impl Confirm,
    ) -> Result<DeleteOutcome, CoreError> {
        if !confirm.confirm(&format!("Delete folder {path} and everything in it?")) {
            return Ok(DeleteOutcome::Cancelled);
        }
        self.api
            .delete_folder(path)
            .await
            .map_err(CoreError::rejected("delete folder"))?;
        info!(path, "folder deleted");
        self.remove_local(path);
        Ok(DeleteOutcome::Deleted)
    }

    /// Download a folder as an archive.
    pub async fn download_folder(&self, path: &str) -> Result<bytes::Bytes, CoreError> {
        self.api
            .download_folder(path)
            .await
            .map_err(CoreError::rejected("download folder"))
    }

    fn remove_local(&mut self, path: &str) {
        let path = path.trim_matches('/');
        self.entries.retain(|e| e.path != path);
    }

    // ── Auto-refresh ─────────────────────────────────────────────────

    /// Whether `event` makes the current listing stale.
    ///
    /// An artifact in exactly the current folder does. At the root, an
    /// artifact under a top-level folder that is not listed yet does too.
    pub fn should_refresh(&self, event: &StreamEvent) -> bool {
        let StreamEvent::ArtifactCreated { folder, .. } = event else {
            return false;
        };
        let folder = folder.trim_matches('/');
        if folder == self.path {
            return true;
        }
        if self.is_root() {
            let top = folder.split('/').next().unwrap_or_default();
            return !top.is_empty()
                && !self
                    .entries
                    .iter()
                    .any(|e| e.is_folder() && e.name == top);
        }
        false
    }

    /// Re-fetch if `event` concerns the current listing. Returns whether a
    /// re-fetch happened.
    pub async fn on_event(&mut self, event: &StreamEvent) -> Result<bool, CoreError> {
        if !self.should_refresh(event) {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::EntryKind;

    fn explorer(path: &str, entries: &[(&str, EntryKind)]) -> DirectoryExplorer {
        let api = Arc::new(ControlClient::with_client(
            reqwest::Client::new(),
            url::Url::parse("http://127.0.0.1:9").unwrap(),
        ));
        let mut ex = DirectoryExplorer::new(api);
        ex.path = path.to_owned();
        ex.entries = entries
            .iter()
            .map(|(name, kind)| DirectoryEntry {
                name: (*name).to_owned(),
                path: join_path(path, name),
                kind: *kind,
            })
            .collect();
        ex
    }

    fn artifact(folder: &str) -> StreamEvent {
        StreamEvent::ArtifactCreated {
            path: join_path(folder, "img.jpg"),
            folder: folder.to_owned(),
        }
    }

    #[test]
    fn exact_folder_match_refreshes() {
        let ex = explorer("2024-05-01", &[]);
        assert!(ex.should_refresh(&artifact("2024-05-01")));
    }

    #[test]
    fn ancestor_or_descendant_does_not_refresh() {
        let ex = explorer("2024-05-01", &[]);
        assert!(!ex.should_refresh(&artifact("2024-05-01/burst")));
        assert!(!ex.should_refresh(&artifact("")));
    }

    #[test]
    fn root_refreshes_for_new_top_level_folder_only() {
        let ex = explorer("", &[("2024-05-01", EntryKind::Folder)]);
        assert!(ex.should_refresh(&artifact("2024-05-02")));
        assert!(!ex.should_refresh(&artifact("2024-05-01")));
        assert!(ex.should_refresh(&artifact("")));
    }

    #[test]
    fn other_events_are_ignored() {
        let ex = explorer("", &[]);
        assert!(!ex.should_refresh(&StreamEvent::SnapshotApplied {
            changed_keys: vec![]
        }));
    }

    #[tokio::test]
    async fn declined_delete_sends_nothing() {
        // Port 9 is closed: any request would fail, so Ok proves none was sent.
        let mut ex = explorer("", &[("a.jpg", EntryKind::File)]);
        let outcome = ex.delete_file("a.jpg", &|_: &str| false).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Cancelled);
        assert_eq!(ex.entries().len(), 1);
    }
}
