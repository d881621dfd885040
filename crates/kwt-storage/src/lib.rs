//! Flat JSON persistence for category, trending, and metadata documents.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use kwt_core::{Clock, NormalizedKeywordRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

pub const SOURCE_LABEL: &str = "Apple Search Ads";
pub const METADATA_VERSION: &str = "1.0";
pub const TRENDING_DATE_FORMAT: &str = "%Y-%m-%d";

const CATEGORIES_DIR: &str = "categories";
const TRENDING_DIR: &str = "trending";
const METADATA_FILE: &str = "metadata.json";

/// Document shape shared by category files and the daily trending file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordDocument {
    pub keywords: Vec<NormalizedKeywordRecord>,
    pub generated_at: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeywordDocumentRef<'a> {
    keywords: &'a [NormalizedKeywordRecord],
    generated_at: DateTime<Utc>,
    source: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
    pub categories: Vec<String>,
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenDocument {
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub content_hash: String,
    pub byte_size: usize,
}

/// Output tree rooted at a directory:
///
/// ```text
/// <root>/categories/<category>.json
/// <root>/trending/<YYYY-MM-DD>.json
/// <root>/metadata.json
/// ```
///
/// Writes replace files through a temp file + rename. There is no locking, so
/// overlapping runs against the same root race.
#[derive(Clone)]
pub struct KeywordStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl KeywordStore {
    pub fn new(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    pub fn category_relative_path(category: &str) -> Result<PathBuf> {
        if !is_safe_segment(category) {
            bail!("category {category:?} is not usable as a file name");
        }
        Ok(PathBuf::from(CATEGORIES_DIR).join(format!("{category}.json")))
    }

    pub fn trending_relative_path(date: NaiveDate) -> PathBuf {
        PathBuf::from(TRENDING_DIR).join(format!("{}.json", date.format(TRENDING_DATE_FORMAT)))
    }

    pub fn metadata_relative_path() -> PathBuf {
        PathBuf::from(METADATA_FILE)
    }

    pub async fn write_category(
        &self,
        category: &str,
        keywords: &[NormalizedKeywordRecord],
    ) -> Result<WrittenDocument> {
        let relative = Self::category_relative_path(category)?;
        let doc = KeywordDocumentRef {
            keywords,
            generated_at: self.clock.now(),
            source: SOURCE_LABEL,
        };
        let written = self.write_json(&relative, &doc).await?;
        info!(
            category,
            keywords = keywords.len(),
            path = %written.relative_path.display(),
            "wrote category file"
        );
        Ok(written)
    }

    /// Writes the trending set to the file for the clock's current UTC date,
    /// replacing any earlier run from the same day.
    pub async fn write_trending(
        &self,
        keywords: &[NormalizedKeywordRecord],
    ) -> Result<WrittenDocument> {
        let generated_at = self.clock.now();
        let relative = Self::trending_relative_path(generated_at.date_naive());
        let doc = KeywordDocumentRef {
            keywords,
            generated_at,
            source: SOURCE_LABEL,
        };
        let written = self.write_json(&relative, &doc).await?;
        info!(
            keywords = keywords.len(),
            path = %written.relative_path.display(),
            "wrote trending file"
        );
        Ok(written)
    }

    pub async fn write_metadata(&self, categories: &[String]) -> Result<WrittenDocument> {
        let doc = MetadataDocument {
            categories: categories.to_vec(),
            last_updated: self.clock.now(),
            version: METADATA_VERSION.to_string(),
        };
        let written = self.write_json(&Self::metadata_relative_path(), &doc).await?;
        info!(
            categories = categories.len(),
            path = %written.relative_path.display(),
            "wrote metadata file"
        );
        Ok(written)
    }

    pub async fn read_category(&self, category: &str) -> Result<KeywordDocument> {
        self.read_json(&Self::category_relative_path(category)?).await
    }

    pub async fn read_trending(&self, date: NaiveDate) -> Result<KeywordDocument> {
        self.read_json(&Self::trending_relative_path(date)).await
    }

    pub async fn read_metadata(&self) -> Result<MetadataDocument> {
        self.read_json(&Self::metadata_relative_path()).await
    }

    /// Like [`read_metadata`](Self::read_metadata), but a missing file is
    /// `None`. Unreadable or malformed files are still errors.
    pub async fn read_metadata_if_present(&self) -> Result<Option<MetadataDocument>> {
        let path = self.root.join(Self::metadata_relative_path());
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
        };
        let doc = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(doc))
    }

    /// Most recent date with a trending file on disk, ignoring files whose
    /// stem is not a calendar date.
    pub async fn latest_trending_date(&self) -> Result<Option<NaiveDate>> {
        let dir = self.root.join(TRENDING_DIR);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("reading {}", dir.display())),
        };

        let mut latest: Option<NaiveDate> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("reading {}", dir.display()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(date) = NaiveDate::parse_from_str(stem, TRENDING_DATE_FORMAT) {
                latest = latest.max(Some(date));
            }
        }
        Ok(latest)
    }

    async fn read_json<T: DeserializeOwned>(&self, relative: &Path) -> Result<T> {
        let path = self.root.join(relative);
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    async fn write_json<T: Serialize>(
        &self,
        relative: &Path,
        value: &T,
    ) -> Result<WrittenDocument> {
        let mut bytes = serde_json::to_vec_pretty(value)
            .with_context(|| format!("serializing {}", relative.display()))?;
        bytes.push(b'\n');

        let absolute_path = self.root.join(relative);
        let parent = absolute_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating directory {}", parent.display()))?;

        let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp file {}", temp_path.display()))?;
        if let Err(err) = file.write_all(&bytes).await {
            drop(file);
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| format!("writing temp file {}", temp_path.display()));
        }
        file.flush()
            .await
            .with_context(|| format!("flushing temp file {}", temp_path.display()))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &absolute_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!(
                    "renaming temp file {} -> {}",
                    temp_path.display(),
                    absolute_path.display()
                )
            });
        }

        Ok(WrittenDocument {
            relative_path: relative.to_path_buf(),
            absolute_path,
            content_hash: Self::sha256_hex(&bytes),
            byte_size: bytes.len(),
        })
    }
}

impl std::fmt::Debug for KeywordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordStore").field("root", &self.root).finish_non_exhaustive()
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
