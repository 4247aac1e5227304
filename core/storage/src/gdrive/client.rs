//! Google Drive API client.

use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use drivekeep_common::{Error, FileId, Result};

use super::auth::Credential;
use crate::catalog::{MediaChunk, RemoteEntry};
use crate::transfer::TransferState;

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Chunk size for resumable uploads (must be a multiple of 256 KiB).
const UPLOAD_CHUNK_SIZE: usize = 32 * 256 * 1024; // 8 MiB

/// Fields requested for every file resource.
const FILE_FIELDS: &str = "id,name,mimeType,parents";

/// Google Drive file metadata from API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    #[serde(default)]
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: String,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == RemoteEntry::FOLDER_MIME_TYPE
    }

    /// Convert into the backend-neutral entry.
    pub fn into_entry(self) -> Result<RemoteEntry> {
        let parents = self
            .parents
            .into_iter()
            .map(FileId::new)
            .collect::<Result<Vec<_>>>()?;

        Ok(RemoteEntry {
            id: FileId::new(self.id)?,
            name: self.name,
            mime_type: self.mime_type,
            parents,
        })
    }
}

/// One page of `files.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// `storageQuota` of `about.get`. The API encodes int64 values as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageQuota {
    /// Absent for accounts with unlimited storage.
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub usage: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutResponse {
    storage_quota: StorageQuota,
}

/// Google Drive API client.
///
/// Shares the credential's HTTP client, so token and API requests use one
/// connection pool.
pub struct DriveClient {
    http: Client,
    credential: Arc<Credential>,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a client for the public Drive endpoints.
    pub fn new(credential: Arc<Credential>) -> Self {
        Self::with_base_urls(credential, DRIVE_API_BASE, DRIVE_UPLOAD_BASE)
    }

    /// Create a client for other API and upload roots, e.g. a local server.
    pub fn with_base_urls(
        credential: Arc<Credential>,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            http: credential.http_client().clone(),
            credential,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get authorization header.
    async fn auth_header(&self) -> Result<String> {
        let token = self.credential.access_token().await?;
        Ok(format!("Bearer {}", token.expose()))
    }

    /// Query the account's storage quota.
    pub async fn storage_quota(&self) -> Result<StorageQuota> {
        let url = format!("{}/about", self.api_base);
        let auth = self.auth_header().await?;

        debug!("Fetching storage quota");

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", "storageQuota")])
            .send()
            .await
            .map_err(|e| Error::Service(format!("Failed to fetch quota: {}", e)))?;

        let about: AboutResponse = self.handle_response(response).await?;
        Ok(about.storage_quota)
    }

    /// Fetch the first page of a folder's children.
    pub async fn list_children(&self, folder_id: &str, page_size: usize) -> Result<FilePage> {
        let url = format!("{}/files", self.api_base);
        let auth = self.auth_header().await?;

        let query = parent_query(folder_id);
        let fields = format!("nextPageToken,files({})", FILE_FIELDS);
        let page_size = page_size.to_string();

        debug!(folder_id, "Listing folder");

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[
                ("q", query.as_str()),
                ("fields", fields.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Service(format!("Failed to list folder: {}", e)))?;

        self.handle_response(response).await
    }

    /// Start a resumable upload session and return its session URI.
    pub async fn start_resumable_upload(
        &self,
        name: &str,
        parent_id: Option<&str>,
        total_size: u64,
    ) -> Result<String> {
        let url = format!("{}/files", self.upload_base);
        let auth = self.auth_header().await?;

        let mut metadata = serde_json::json!({ "name": name });
        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header("X-Upload-Content-Length", total_size.to_string())
            .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Transfer(format!("Failed to start resumable upload: {}", e)))?;

        if !response.status().is_success() {
            return Err(into_transfer(api_error(response).await));
        }

        // Extract upload URI from Location header
        let upload_uri = response
            .headers()
            .get(header::LOCATION)
            .ok_or_else(|| Error::Transfer("No upload URI in response".to_string()))?
            .to_str()
            .map_err(|e| Error::Transfer(format!("Invalid upload URI: {}", e)))?
            .to_string();

        Ok(upload_uri)
    }

    /// Upload a chunk to a resumable upload session.
    ///
    /// Returns the created file once the final chunk is accepted.
    pub async fn upload_chunk(
        &self,
        upload_uri: &str,
        data: Vec<u8>,
        start_byte: u64,
        total_size: u64,
    ) -> Result<Option<DriveFile>> {
        let content_range = content_range(start_byte, data.len() as u64, total_size);

        let response = self
            .http
            .put(upload_uri)
            .header(header::CONTENT_LENGTH, data.len().to_string())
            .header(header::CONTENT_RANGE, content_range)
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Transfer(format!("Failed to upload chunk: {}", e)))?;

        let status = response.status();

        if status == StatusCode::OK || status == StatusCode::CREATED {
            // Upload complete
            let file: DriveFile = response
                .json()
                .await
                .map_err(|e| Error::Transfer(format!("Failed to parse upload response: {}", e)))?;
            Ok(Some(file))
        } else if status == StatusCode::PERMANENT_REDIRECT {
            // More chunks needed (308 Resume Incomplete)
            Ok(None)
        } else {
            Err(into_transfer(api_error(response).await))
        }
    }

    /// Upload `total_size` bytes read from `reader` as a new file.
    pub async fn upload_resumable<R>(
        &self,
        name: &str,
        parent_id: Option<&str>,
        reader: &mut R,
        total_size: u64,
    ) -> Result<DriveFile>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut upload = ResumableUpload::new(total_size);
        upload.begin(self, name, parent_id).await?;

        let mut buffer = vec![0u8; UPLOAD_CHUNK_SIZE];

        loop {
            let filled = match read_full(reader, &mut buffer).await {
                Ok(filled) => filled,
                Err(e) => {
                    upload.state = TransferState::Failed;
                    return Err(Error::Transfer(format!("Failed to read {}: {}", name, e)));
                }
            };

            if let Some(file) = upload.send(self, buffer[..filled].to_vec()).await? {
                return Ok(file);
            }

            if filled == 0 {
                upload.state = TransferState::Failed;
                return Err(Error::Transfer(format!(
                    "Upload of {} did not complete after {} of {} bytes",
                    name, upload.sent, total_size
                )));
            }
        }
    }

    /// Read `len` bytes of a file's content starting at `offset`.
    pub async fn download_range(&self, file_id: &str, offset: u64, len: u64) -> Result<MediaChunk> {
        let url = format!("{}/files/{}", self.api_base, file_id);
        let auth = self.auth_header().await?;
        let last = offset + len.max(1) - 1;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .header(header::RANGE, format!("bytes={}-{}", offset, last))
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::Transfer(format!("Failed to download chunk: {}", e)))?;

        let status = response.status();
        let reported_total = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(total_from_content_range);

        match status {
            StatusCode::PARTIAL_CONTENT => {
                let data = read_body(response).await?;
                let total_size = reported_total.unwrap_or(offset + data.len() as u64);
                Ok(MediaChunk { data, total_size })
            }
            StatusCode::OK => {
                // Range ignored; the body is the whole object.
                let mut data = read_body(response).await?;
                let total_size = data.len() as u64;
                let start = offset.min(total_size) as usize;
                let end = (offset + len).min(total_size) as usize;
                data.truncate(end);
                data.drain(..start);
                Ok(MediaChunk { data, total_size })
            }
            StatusCode::RANGE_NOT_SATISFIABLE => Ok(MediaChunk {
                data: Vec::new(),
                total_size: reported_total.unwrap_or(offset),
            }),
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!("File not found: {}", file_id))),
            _ => Err(into_transfer(api_error(response).await)),
        }
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Service(format!("Failed to parse response: {}", e)))
        } else {
            Err(api_error(response).await)
        }
    }
}

/// Client-side state of one resumable upload session.
struct ResumableUpload {
    uri: Option<String>,
    total: u64,
    sent: u64,
    state: TransferState,
}

impl ResumableUpload {
    fn new(total: u64) -> Self {
        Self {
            uri: None,
            total,
            sent: 0,
            state: TransferState::Init,
        }
    }

    async fn begin(&mut self, client: &DriveClient, name: &str, parent_id: Option<&str>) -> Result<()> {
        match client
            .start_resumable_upload(name, parent_id, self.total)
            .await
        {
            Ok(uri) => {
                self.uri = Some(uri);
                self.state = TransferState::InProgress;
                debug!(name, total = self.total, "Resumable upload started");
                Ok(())
            }
            Err(e) => {
                self.state = TransferState::Failed;
                Err(e)
            }
        }
    }

    async fn send(&mut self, client: &DriveClient, data: Vec<u8>) -> Result<Option<DriveFile>> {
        let uri = match (&self.state, &self.uri) {
            (TransferState::InProgress, Some(uri)) => uri.clone(),
            _ => {
                return Err(Error::Transfer(format!(
                    "Upload session is {:?}; restart the upload",
                    self.state
                )));
            }
        };

        let len = data.len() as u64;
        match client.upload_chunk(&uri, data, self.sent, self.total).await {
            Ok(result) => {
                self.sent += len;
                if result.is_some() {
                    self.state = TransferState::Complete;
                }
                debug!(sent = self.sent, total = self.total, "Uploaded chunk");
                Ok(result)
            }
            Err(e) => {
                self.state = TransferState::Failed;
                Err(e)
            }
        }
    }
}

/// Drive query selecting the immediate children of `folder_id`.
fn parent_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}' in parents", escaped)
}

/// `Content-Range` header for a chunk of `len` bytes at `start`.
fn content_range(start: u64, len: u64, total: u64) -> String {
    if len == 0 {
        format!("bytes */{}", total)
    } else {
        format!("bytes {}-{}/{}", start, start + len - 1, total)
    }
}

/// Total size from a `Content-Range` value such as `bytes 0-99/1000`.
fn total_from_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Fill `buffer` from `reader`, stopping early only at end of input.
async fn read_full<R>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn read_body(response: Response) -> Result<Vec<u8>> {
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| Error::Transfer(format!("Failed to read download response: {}", e)))
}

/// Map a failed API response onto the error taxonomy.
async fn api_error(response: Response) -> Error {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Error::NotFound("Resource not found".to_string());
    }
    if status == StatusCode::UNAUTHORIZED {
        return Error::CredentialInvalid("Invalid or expired token".to_string());
    }
    let body = response.text().await.unwrap_or_default();
    Error::Service(format!("API error: {} - {}", status, body.trim()))
}

/// Failures inside a transfer are transfer errors.
fn into_transfer(error: Error) -> Error {
    match error {
        Error::Service(message) => Error::Transfer(message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive_file(mime_type: &str) -> DriveFile {
        DriveFile {
            id: "1".to_string(),
            name: "backup.tar.gz".to_string(),
            mime_type: mime_type.to_string(),
            parents: vec!["root-id".to_string()],
        }
    }

    #[test]
    fn test_drive_file_is_folder() {
        assert!(drive_file(RemoteEntry::FOLDER_MIME_TYPE).is_folder());
        assert!(!drive_file("application/gzip").is_folder());
    }

    #[test]
    fn test_drive_file_into_entry() {
        let entry = drive_file("application/gzip").into_entry().unwrap();
        assert_eq!(entry.id.as_str(), "1");
        assert_eq!(entry.name, "backup.tar.gz");
        assert_eq!(entry.parents, vec![FileId::new("root-id").unwrap()]);
    }

    #[test]
    fn test_file_page_deserialization() {
        let json = r#"{
            "nextPageToken": "tok",
            "files": [
                {"id": "a", "name": "one.txt", "mimeType": "text/plain"},
                {"id": "b", "name": "dir", "mimeType": "application/vnd.google-apps.folder", "parents": ["root-id"]}
            ]
        }"#;

        let page: FilePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.files.len(), 2);
        assert_eq!(page.next_page_token.as_deref(), Some("tok"));
        assert!(page.files[1].is_folder());
        assert!(page.files[0].parents.is_empty());
    }

    #[test]
    fn test_empty_file_page() {
        let page: FilePage = serde_json::from_str("{}").unwrap();
        assert!(page.files.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_about_deserialization() {
        let json = r#"{"storageQuota": {"limit": "16106127360", "usage": "1073741824"}}"#;
        let about: AboutResponse = serde_json::from_str(json).unwrap();
        assert_eq!(about.storage_quota.limit.as_deref(), Some("16106127360"));
        assert_eq!(about.storage_quota.usage.as_deref(), Some("1073741824"));

        let unlimited: AboutResponse =
            serde_json::from_str(r#"{"storageQuota": {"usage": "5"}}"#).unwrap();
        assert!(unlimited.storage_quota.limit.is_none());
    }

    #[test]
    fn test_parent_query_escapes_quotes() {
        assert_eq!(parent_query("abc"), "'abc' in parents");
        assert_eq!(parent_query("a'b"), "'a\\'b' in parents");
        assert_eq!(parent_query("a\\b"), "'a\\\\b' in parents");
    }

    #[test]
    fn test_content_range() {
        assert_eq!(content_range(0, 10, 25), "bytes 0-9/25");
        assert_eq!(content_range(20, 5, 25), "bytes 20-24/25");
        assert_eq!(content_range(0, 0, 0), "bytes */0");
    }

    #[test]
    fn test_total_from_content_range() {
        assert_eq!(total_from_content_range("bytes 0-99/1000"), Some(1000));
        assert_eq!(total_from_content_range("bytes */0"), Some(0));
        assert_eq!(total_from_content_range("bytes 0-99/*"), None);
        assert_eq!(total_from_content_range("garbage"), None);
    }

    #[test]
    fn test_upload_chunk_size_is_aligned() {
        assert_eq!(UPLOAD_CHUNK_SIZE % (256 * 1024), 0);
    }

    #[tokio::test]
    async fn test_read_full_fills_buffer() {
        let data = vec![9u8; 10];
        let mut reader = &data[..];
        let mut buffer = [0u8; 4];

        assert_eq!(read_full(&mut reader, &mut buffer).await.unwrap(), 4);
        assert_eq!(read_full(&mut reader, &mut buffer).await.unwrap(), 4);
        assert_eq!(read_full(&mut reader, &mut buffer).await.unwrap(), 2);
        assert_eq!(read_full(&mut reader, &mut buffer).await.unwrap(), 0);
    }

    #[test]
    fn test_into_transfer() {
        assert!(matches!(
            into_transfer(Error::Service("x".to_string())),
            Error::Transfer(_)
        ));
        assert!(matches!(
            into_transfer(Error::NotFound("x".to_string())),
            Error::NotFound(_)
        ));
    }

    mod http {
        //! `DriveClient` against a local server replaying canned responses.

        use super::super::*;
        use crate::gdrive::auth::{Credential, Tokens};
        use drivekeep_common::Error;
        use std::sync::Arc;
        use tokio::io::AsyncReadExt;
        use chrono::{Duration, Utc};
        use drivekeep_common::{SensitiveString, DRIVE_SCOPE};
        use std::path::Path;
        use tokio::io::AsyncWriteExt;
        use tokio::net::{TcpListener, TcpStream};
        use tokio::task::JoinHandle;

        const FIXTURE_KEY: &str =
            concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/service_account.json");

        fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
            let mut raw = format!("HTTP/1.1 {}\r\n", status);
            for (name, value) in headers {
                raw.push_str(&format!("{}: {}\r\n", name, value));
            }
            raw.push_str(&format!(
                "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            ));
            raw
        }

        async fn read_request(socket: &mut TcpStream) -> String {
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);

                if let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&raw[..end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|value| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }
            String::from_utf8_lossy(&raw).into_owned()
        }

        /// Answer one connection per response, in order, and hand back
        /// the raw requests.
        fn serve(listener: TcpListener, responses: Vec<String>) -> JoinHandle<Vec<String>> {
            tokio::spawn(async move {
                let mut requests = Vec::new();
                for reply in responses {
                    let (mut socket, _) = listener.accept().await.unwrap();
                    requests.push(read_request(&mut socket).await);
                    socket.write_all(reply.as_bytes()).await.unwrap();
                    socket.shutdown().await.unwrap();
                }
                requests
            })
        }

        async fn bind() -> (TcpListener, String) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            (listener, base)
        }

        async fn client_for(base: &str) -> DriveClient {
            let credential =
                Credential::from_file(Path::new(FIXTURE_KEY), &[DRIVE_SCOPE.to_string()]).unwrap();
            credential
                .update_tokens(Tokens {
                    access_token: SensitiveString::new("test-token"),
                    expires_at: Utc::now() + Duration::hours(1),
                })
                .await;
            DriveClient::with_base_urls(Arc::new(credential), base, format!("{}/upload", base))
        }

        #[tokio::test]
        async fn test_download_range_not_found() {
            let (listener, base) = bind().await;
            let server = serve(listener, vec![response("404 Not Found", &[], "")]);
            let client = client_for(&base).await;

            let result = client.download_range("missing", 0, 4).await;
            assert!(matches!(result, Err(Error::NotFound(_))));

            let requests = server.await.unwrap();
            let request = requests[0].to_lowercase();
            assert!(request.starts_with("get /files/missing?alt=media"));
            assert!(request.contains("authorization: bearer test-token"));
            assert!(request.contains("range: bytes=0-3"));
            assert!(request.contains("user-agent: drivekeep/"));
        }

        #[tokio::test]
        async fn test_download_range_empty_object() {
            let (listener, base) = bind().await;
            let server = serve(
                listener,
                vec![response(
                    "416 Range Not Satisfiable",
                    &[("Content-Range", "bytes */0")],
                    "",
                )],
            );
            let client = client_for(&base).await;

            let chunk = client.download_range("empty", 0, 4).await.unwrap();
            assert!(chunk.data.is_empty());
            assert_eq!(chunk.total_size, 0);
            server.await.unwrap();
        }

        #[tokio::test]
        async fn test_download_range_partial_content() {
            let (listener, base) = bind().await;
            let server = serve(
                listener,
                vec![response(
                    "206 Partial Content",
                    &[("Content-Range", "bytes 4-7/10")],
                    "4567",
                )],
            );
            let client = client_for(&base).await;

            let chunk = client.download_range("obj", 4, 4).await.unwrap();
            assert_eq!(chunk.data, b"4567");
            assert_eq!(chunk.total_size, 10);
            server.await.unwrap();
        }

        #[tokio::test]
        async fn test_download_range_ignored_is_sliced() {
            let (listener, base) = bind().await;
            let server = serve(listener, vec![response("200 OK", &[], "0123456789")]);
            let client = client_for(&base).await;

            let chunk = client.download_range("obj", 2, 4).await.unwrap();
            assert_eq!(chunk.data, b"2345");
            assert_eq!(chunk.total_size, 10);
            server.await.unwrap();
        }

        #[tokio::test]
        async fn test_download_range_server_error_is_transfer() {
            let (listener, base) = bind().await;
            let server = serve(listener, vec![response("500 Internal Server Error", &[], "boom")]);
            let client = client_for(&base).await;

            let result = client.download_range("obj", 0, 4).await;
            assert!(matches!(result, Err(Error::Transfer(_))));
            server.await.unwrap();
        }

        #[tokio::test]
        async fn test_resumable_upload_continue_then_created() {
            let (listener, base) = bind().await;
            let session = format!("{}/session/1", base);
            let server = serve(
                listener,
                vec![
                    response("200 OK", &[("Location", session.as_str())], ""),
                    response("308 Resume Incomplete", &[("Range", "bytes=0-3")], ""),
                    response(
                        "201 Created",
                        &[("Content-Type", "application/json")],
                        r#"{"id": "new-id", "name": "notes.txt", "mimeType": "text/plain", "parents": ["root"]}"#,
                    ),
                ],
            );
            let client = client_for(&base).await;

            let uri = client.start_resumable_upload("notes.txt", None, 8).await.unwrap();
            assert_eq!(uri, session);

            let first = client.upload_chunk(&uri, b"abcd".to_vec(), 0, 8).await.unwrap();
            assert!(first.is_none());

            let created = client
                .upload_chunk(&uri, b"efgh".to_vec(), 4, 8)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(created.id, "new-id");
            assert_eq!(created.name, "notes.txt");

            let requests = server.await.unwrap();
            let start = requests[0].to_lowercase();
            assert!(start.starts_with("post /upload/files?uploadtype=resumable"));
            assert!(start.contains("x-upload-content-length: 8"));
            assert!(requests[1].to_lowercase().contains("content-range: bytes 0-3/8"));
            assert!(requests[2].to_lowercase().contains("content-range: bytes 4-7/8"));
            assert!(requests[2].ends_with("efgh"));
        }

        #[tokio::test]
        async fn test_upload_resumable_reads_source() {
            let (listener, base) = bind().await;
            let session = format!("{}/session/2", base);
            let server = serve(
                listener,
                vec![
                    response("200 OK", &[("Location", session.as_str())], ""),
                    response("200 OK", &[], r#"{"id": "whole-id", "name": "a.bin"}"#),
                ],
            );
            let client = client_for(&base).await;

            let data = b"payload".to_vec();
            let mut reader = &data[..];
            let file = client
                .upload_resumable("a.bin", Some("folder-1"), &mut reader, 7)
                .await
                .unwrap();
            assert_eq!(file.id, "whole-id");

            let requests = server.await.unwrap();
            assert!(requests[0].contains(r#""parents":["folder-1"]"#));
            assert!(requests[1].to_lowercase().contains("content-range: bytes 0-6/7"));
        }

        #[tokio::test]
        async fn test_upload_chunk_rejection_is_transfer() {
            let (listener, base) = bind().await;
            let server = serve(listener, vec![response("400 Bad Request", &[], "bad range")]);
            let client = client_for(&base).await;

            let uri = format!("{}/session/3", base);
            let result = client.upload_chunk(&uri, b"x".to_vec(), 0, 1).await;
            assert!(matches!(result, Err(Error::Transfer(_))));
            server.await.unwrap();
        }

        #[tokio::test]
        async fn test_storage_quota_and_unauthorized() {
            let (listener, base) = bind().await;
            let server = serve(
                listener,
                vec![
                    response(
                        "200 OK",
                        &[("Content-Type", "application/json")],
                        r#"{"storageQuota": {"limit": "100", "usage": "40"}}"#,
                    ),
                    response("401 Unauthorized", &[], ""),
                ],
            );
            let client = client_for(&base).await;

            let quota = client.storage_quota().await.unwrap();
            assert_eq!(quota.limit.as_deref(), Some("100"));
            assert_eq!(quota.usage.as_deref(), Some("40"));

            let result = client.storage_quota().await;
            assert!(matches!(result, Err(Error::CredentialInvalid(_))));

            let requests = server.await.unwrap();
            assert!(requests[0].starts_with("GET /about?fields=storageQuota"));
        }

        #[tokio::test]
        async fn test_list_children_query() {
            let (listener, base) = bind().await;
            let server = serve(
                listener,
                vec![response(
                    "200 OK",
                    &[("Content-Type", "application/json")],
                    r#"{"nextPageToken": "more", "files": [{"id": "a", "name": "one.txt"}]}"#,
                )],
            );
            let client = client_for(&base).await;

            let page = client.list_children("root", 1000).await.unwrap();
            assert_eq!(page.files.len(), 1);
            assert_eq!(page.next_page_token.as_deref(), Some("more"));

            let requests = server.await.unwrap();
            let request_line = requests[0].lines().next().unwrap();
            assert!(request_line.contains("pageSize=1000"));
            assert!(request_line.contains("in+parents") || request_line.contains("in%20parents"));
        }
    }
}
