// Storage endpoints: directory listings, deletion, folder archives.

use tracing::debug;

use crate::client::ControlClient;
use crate::error::Error;
use crate::models::{FileEntryDto, FileListResponse};

impl ControlClient {
    /// List one directory under the storage root. `""` is the root.
    ///
    /// `GET /api/files?path=...`
    pub async fn list_directory(&self, path: &str) -> Result<Vec<FileEntryDto>, Error> {
        let url = self.api_url(&["files"])?;
        let resp: FileListResponse = self.get_with_params(url, &[("path", path)]).await?;
        Ok(resp.into())
    }

    /// `DELETE /api/files?path=...`
    pub async fn delete_file(&self, path: &str) -> Result<(), Error> {
        let url = self.api_url(&["files"])?;
        debug!(path, "deleting file");
        self.delete_with_params(url, &[("path", path)]).await
    }

    /// Delete a folder and everything below it.
    ///
    /// `DELETE /api/folders?path=...`
    pub async fn delete_folder(&self, path: &str) -> Result<(), Error> {
        let url = self.api_url(&["folders"])?;
        debug!(path, "deleting folder");
        self.delete_with_params(url, &[("path", path)]).await
    }

    /// Download a folder as an archive (the service picks the format,
    /// normally zip).
    ///
    /// `GET /api/folders/download?path=...`
    pub async fn download_folder(&self, path: &str) -> Result<bytes::Bytes, Error> {
        let url = self.api_url(&["folders", "download"])?;
        self.get_bytes(url, &[("path", path)]).await
    }
}
