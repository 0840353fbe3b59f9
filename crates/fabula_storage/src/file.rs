//! JSON-file implementation of SessionRepository.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<session_id>/chapters/chapter_001.json
//! <root>/<session_id>/inputs.jsonl
//! <root>/<session_id>/summary.json
//! <root>/<session_id>/ranking.json
//! ```
//!
//! Chapter files are replaced on revision; the input log is append-only.

use async_trait::async_trait;
use derive_getters::Getters;
use fabula_error::{PersistenceError, PersistenceErrorKind};
use fabula_interface::{
    ChapterRecord, RankingRecord, SessionId, SessionRepository, SessionSnapshot,
    SessionSummaryRecord, UserInputRecord,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

const CHAPTERS_DIR: &str = "chapters";
const INPUTS_FILE: &str = "inputs.jsonl";
const SUMMARY_FILE: &str = "summary.json";
const RANKING_FILE: &str = "ranking.json";

/// Session repository backed by JSON files, one directory per session.
#[derive(Debug, Clone, Getters)]
pub struct FileSessionRepository {
    /// Directory holding one subdirectory per session
    root: PathBuf,
}

impl FileSessionRepository {
    /// Creates a repository rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| {
                PersistenceError::new(PersistenceErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    root.display(),
                    e
                )))
            })?;
        }
        debug!(path = %root.display(), "Initialized file session repository");
        Ok(Self { root })
    }

    fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.to_string())
    }

    fn chapter_path(&self, session_id: &SessionId, index: usize) -> PathBuf {
        self.session_dir(session_id)
            .join(CHAPTERS_DIR)
            .join(format!("chapter_{:03}.json", index))
    }

    async fn ensure_dir(path: &Path) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(path).await.map_err(|e| {
            PersistenceError::new(PersistenceErrorKind::DirectoryCreation(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })
    }

    /// Write a document atomically: temp file, then rename over the target.
    async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            Self::ensure_dir(parent).await?;
        }
        let contents = serde_json::to_string_pretty(value).map_err(|e| {
            PersistenceError::new(PersistenceErrorKind::Serialization(e.to_string()))
        })?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await.map_err(|e| {
            PersistenceError::new(PersistenceErrorKind::Write(format!(
                "{}: {}",
                tmp.display(),
                e
            )))
        })?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            PersistenceError::new(PersistenceErrorKind::Write(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PersistenceError::new(PersistenceErrorKind::Read(format!(
                    "{}: {}",
                    path.display(),
                    e
                ))));
            }
        };
        serde_json::from_str(&contents).map(Some).map_err(|e| {
            PersistenceError::new(PersistenceErrorKind::Serialization(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })
    }

    async fn read_chapters(dir: &Path) -> Result<Vec<ChapterRecord>, PersistenceError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PersistenceError::new(PersistenceErrorKind::Read(format!(
                    "{}: {}",
                    dir.display(),
                    e
                ))));
            }
        };

        let mut chapters = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| {
                PersistenceError::new(PersistenceErrorKind::Read(format!(
                    "{}: {}",
                    dir.display(),
                    e
                )))
            })?;
            let Some(entry) = entry else { break };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(chapter) = Self::read_json::<ChapterRecord>(&path).await? {
                chapters.push(chapter);
            }
        }
        chapters.sort_by_key(|c| c.chapter_index);
        Ok(chapters)
    }

    async fn read_inputs(path: &Path) -> Result<Vec<UserInputRecord>, PersistenceError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PersistenceError::new(PersistenceErrorKind::Read(format!(
                    "{}: {}",
                    path.display(),
                    e
                ))));
            }
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| {
                    PersistenceError::new(PersistenceErrorKind::Corrupt(format!(
                        "{} line {}: {}",
                        path.display(),
                        n + 1,
                        e
                    )))
                })
            })
            .collect()
    }
}

#[async_trait]
impl SessionRepository for FileSessionRepository {
    #[instrument(skip(self, record), fields(session_id = %session_id, chapter = record.chapter_index))]
    async fn save_chapter(
        &self,
        session_id: &SessionId,
        record: &ChapterRecord,
    ) -> Result<(), PersistenceError> {
        let path = self.chapter_path(session_id, record.chapter_index);
        Self::write_json(&path, record).await?;
        debug!(path = %path.display(), "Saved chapter");
        Ok(())
    }

    #[instrument(skip(self, record), fields(session_id = %session_id))]
    async fn save_user_input(
        &self,
        session_id: &SessionId,
        record: &UserInputRecord,
    ) -> Result<(), PersistenceError> {
        let dir = self.session_dir(session_id);
        Self::ensure_dir(&dir).await?;
        let path = dir.join(INPUTS_FILE);

        let mut line = serde_json::to_string(record).map_err(|e| {
            PersistenceError::new(PersistenceErrorKind::Serialization(e.to_string()))
        })?;
        line.push('\n');

        let write_err = |e: std::io::Error| {
            PersistenceError::new(PersistenceErrorKind::Write(format!(
                "{}: {}",
                path.display(),
                e
            )))
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(write_err)?;
        file.write_all(line.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        debug!("Appended user input");
        Ok(())
    }

    #[instrument(skip(self, record), fields(session_id = %session_id))]
    async fn save_session_summary(
        &self,
        session_id: &SessionId,
        record: &SessionSummaryRecord,
    ) -> Result<(), PersistenceError> {
        Self::write_json(&self.session_dir(session_id).join(SUMMARY_FILE), record).await?;
        debug!(chapters = record.num_chapters, "Saved session summary");
        Ok(())
    }

    #[instrument(skip(self, record), fields(session_id = %session_id))]
    async fn save_ranking(
        &self,
        session_id: &SessionId,
        record: &RankingRecord,
    ) -> Result<(), PersistenceError> {
        Self::write_json(&self.session_dir(session_id).join(RANKING_FILE), record).await?;
        debug!(entries = record.entries.len(), "Saved ranking");
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionSnapshot>, PersistenceError> {
        let dir = self.session_dir(session_id);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            debug!("No stored session");
            return Ok(None);
        }

        let chapters = Self::read_chapters(&dir.join(CHAPTERS_DIR)).await?;
        let inputs = Self::read_inputs(&dir.join(INPUTS_FILE)).await?;
        let summary = Self::read_json(&dir.join(SUMMARY_FILE)).await?;
        let ranking = Self::read_json(&dir.join(RANKING_FILE)).await?;

        if let Some(stray) = chapters.iter().find(|c| c.session_id != *session_id) {
            warn!(
                chapter = stray.chapter_index,
                stored_session = %stray.session_id,
                "Chapter record belongs to a different session"
            );
            return Err(PersistenceError::new(PersistenceErrorKind::Corrupt(format!(
                "chapter {} in {} belongs to session {}",
                stray.chapter_index,
                dir.display(),
                stray.session_id
            ))));
        }

        debug!(chapters = chapters.len(), inputs = inputs.len(), "Loaded session");
        Ok(Some(SessionSnapshot {
            session_id: *session_id,
            chapters,
            inputs,
            summary,
            ranking,
        }))
    }
}
