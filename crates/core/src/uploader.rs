//! Reference file uploads: validation, chunked reading with progress, base64.
//!
//! Every accepted file is read on its own task and owns one status slot.
//! Listeners get two `watch` channels: every status change, and the list of
//! successfully encoded attachments. The latter only fires when the list's
//! signature (name and encoded length of each entry) changes.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use tokio::{fs::File, io::AsyncReadExt, sync::watch, task::JoinSet};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::Attachment;

const MIB: u64 = 1024 * 1024;
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_files: usize,
    pub max_bytes: u64,
    /// Exact MIME types, or `type/*` wildcards.
    pub allowed_mime: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_files: 3,
            max_bytes: 5 * MIB,
            allowed_mime: vec![
                "image/*".to_string(),
                "text/plain".to_string(),
                "application/pdf".to_string(),
            ],
        }
    }
}

impl UploadPolicy {
    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_mime.iter().any(|allowed| {
            match allowed.strip_suffix("/*") {
                Some(prefix) => mime_type
                    .split_once('/')
                    .is_some_and(|(kind, _)| kind == prefix),
                None => allowed == mime_type,
            }
        })
    }

    pub fn max_megabytes(&self) -> u64 {
        self.max_bytes.div_ceil(MIB)
    }
}

/// MIME type guessed from the file extension.
pub fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Pending,
    Uploading,
    Success,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct FileStatus {
    pub id: Uuid,
    pub path: PathBuf,
    pub name: String,
    pub mime_type: String,
    pub progress: u8,
    pub state: UploadState,
    pub result: Option<Attachment>,
}

#[derive(Default)]
struct Board {
    files: Vec<FileStatus>,
    last_signature: Vec<(String, usize)>,
}

struct Shared {
    board: Mutex<Board>,
    statuses: watch::Sender<Vec<FileStatus>>,
    attachments: watch::Sender<Vec<Attachment>>,
}

impl Shared {
    fn with_board(&self, f: impl FnOnce(&mut Board)) {
        let mut board = self.board.lock().expect("upload board poisoned");
        f(&mut board);
        self.publish(&mut board);
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut FileStatus)) {
        self.with_board(|board| {
            // Removed entries may still have a task in flight.
            if let Some(file) = board.files.iter_mut().find(|f| f.id == id) {
                f(file);
            }
        });
    }

    fn fail(&self, id: Uuid, message: String) {
        self.update(id, |file| file.state = UploadState::Error(message));
    }

    fn publish(&self, board: &mut Board) {
        self.statuses.send_replace(board.files.clone());

        let valid = valid_attachments(&board.files);
        let signature = valid
            .iter()
            .map(|a| (a.name.clone(), a.data_base64.len()))
            .collect::<Vec<_>>();

        if signature != board.last_signature {
            debug!(count = valid.len(), "Attachment list changed");
            board.last_signature = signature;
            self.attachments.send_replace(valid);
        }
    }
}

fn valid_attachments(files: &[FileStatus]) -> Vec<Attachment> {
    files
        .iter()
        .filter(|f| f.state == UploadState::Success)
        .filter_map(|f| f.result.clone())
        .collect()
}

pub struct Uploader {
    policy: UploadPolicy,
    shared: Arc<Shared>,
    tasks: JoinSet<()>,
}

impl Uploader {
    pub fn new(policy: UploadPolicy) -> Self {
        let (statuses, _) = watch::channel(Vec::new());
        let (attachments, _) = watch::channel(Vec::new());
        Self {
            policy,
            shared: Arc::new(Shared {
                board: Mutex::new(Board::default()),
                statuses,
                attachments,
            }),
            tasks: JoinSet::new(),
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn subscribe_statuses(&self) -> watch::Receiver<Vec<FileStatus>> {
        self.shared.statuses.subscribe()
    }

    pub fn subscribe_attachments(&self) -> watch::Receiver<Vec<Attachment>> {
        self.shared.attachments.subscribe()
    }

    /// Queue files for upload. Only as many as there are free slots are taken;
    /// returns the ids of the accepted entries.
    pub fn add_files<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> Vec<Uuid> {
        let paths: Vec<PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        let used = self.shared.board.lock().expect("upload board poisoned").files.len();
        let remaining = self.policy.max_files.saturating_sub(used);

        if paths.len() > remaining {
            warn!(
                skipped = paths.len() - remaining,
                max_files = self.policy.max_files,
                "Too many files, extra files ignored"
            );
        }

        let entries: Vec<FileStatus> = paths
            .into_iter()
            .take(remaining)
            .map(|path| FileStatus {
                id: Uuid::new_v4(),
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string()),
                mime_type: mime_from_path(&path).to_string(),
                progress: 0,
                state: UploadState::Pending,
                result: None,
                path,
            })
            .collect();

        let ids = entries.iter().map(|e| e.id).collect();
        self.shared
            .with_board(|board| board.files.extend(entries.iter().cloned()));

        for entry in entries {
            let shared = Arc::clone(&self.shared);
            let policy = self.policy.clone();
            self.tasks
                .spawn(process_file(shared, policy, entry.id, entry.path, entry.name, entry.mime_type));
        }

        ids
    }

    /// Wait until every queued file has finished (successfully or not).
    pub async fn wait(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Upload task panicked");
            }
        }
    }

    pub fn remove(&self, id: Uuid) {
        self.shared.with_board(|board| board.files.retain(|f| f.id != id));
    }

    pub fn clear(&self) {
        self.shared.with_board(|board| board.files.clear());
    }

    pub fn statuses(&self) -> Vec<FileStatus> {
        self.shared.statuses.borrow().clone()
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        self.shared.attachments.borrow().clone()
    }
}

async fn process_file(
    shared: Arc<Shared>,
    policy: UploadPolicy,
    id: Uuid,
    path: PathBuf,
    name: String,
    mime_type: String,
) {
    shared.update(id, |file| {
        file.state = UploadState::Uploading;
        file.progress = 0;
    });

    let total = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Cannot stat upload");
            shared.fail(id, "read failed".to_string());
            return;
        }
    };

    if total > policy.max_bytes {
        warn!(file = %name, size = total, "Upload over size limit");
        shared.fail(
            id,
            format!("exceeds the {} MB limit", policy.max_megabytes()),
        );
        return;
    }

    if !policy.allows(&mime_type) {
        warn!(file = %name, mime = %mime_type, "Upload type not allowed");
        shared.fail(id, format!("unsupported file type {}", mime_type));
        return;
    }

    match read_with_progress(&shared, id, &path, total, policy.max_bytes).await {
        // The file grew between the size check and the read.
        Ok(bytes) if bytes.len() as u64 > policy.max_bytes => {
            warn!(file = %name, "Upload grew past size limit while reading");
            shared.fail(
                id,
                format!("exceeds the {} MB limit", policy.max_megabytes()),
            );
        }
        Ok(bytes) => {
            let data_base64 = STANDARD.encode(&bytes);
            debug!(file = %name, bytes = bytes.len(), "Upload encoded");
            shared.update(id, |file| {
                file.state = UploadState::Success;
                file.progress = 100;
                file.result = Some(Attachment {
                    name,
                    mime_type,
                    data_base64,
                });
            });
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Upload read failed");
            shared.fail(id, "read failed".to_string());
        }
    }
}

async fn read_with_progress(
    shared: &Shared,
    id: Uuid,
    path: &Path,
    total: u64,
    max_bytes: u64,
) -> std::io::Result<Vec<u8>> {
    // One byte past the ceiling is enough to tell the file is too large.
    let mut file = File::open(path).await?.take(max_bytes.saturating_add(1));
    let mut bytes = Vec::with_capacity(total.min(max_bytes) as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);

        let loaded = bytes.len() as u64;
        if total > 0 {
            let percent = ((loaded * 100 + total / 2) / total).min(100) as u8;
            shared.update(id, |file| file.progress = percent);
        }
    }

    Ok(bytes)
}
