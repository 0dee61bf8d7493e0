//! Reads persona/identity/owner/tools markdown files plus dated memory notes
//! into a single workspace context string, with a short TTL cache and an
//! append-only write path.

use chrono::{Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration as StdDuration, Instant};
use tracing::warn;

/// Known persona/identity files, read in this order.
const KNOWN_FILES: &[&str] = &["SOUL.md", "IDENTITY.md", "OWNER.md", "MEMORY.md", "TOOLS.md"];

/// Per-file cap when reading a persona file.
const PERSONA_FILE_CAP: usize = 4_000;
/// Per-file cap when reading a dated memory file.
const MEMORY_FILE_CAP: usize = 2_000;

const CACHE_TTL: StdDuration = StdDuration::from_secs(60);

/// Returned to callers who are not the privileged owner — the workspace
/// context itself must never reach them.
pub const FALLBACK_PERSONA_LINE: &str =
    "I'm an assistant without access to this owner's personal workspace.";

struct CacheEntry {
    context: String,
    at: Instant,
}

/// Reads and assembles workspace files, caching the result for a short TTL.
pub struct WorkspaceLoader {
    root: PathBuf,
    memory_dir: PathBuf,
    cache: RwLock<Option<CacheEntry>>,
}

impl WorkspaceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let memory_dir = root.join("memory");
        Self {
            root,
            memory_dir,
            cache: RwLock::new(None),
        }
    }

    /// Returns the assembled workspace context for the owner caller. Other
    /// callers must use [`Self::context_for`] which enforces the fallback.
    pub async fn get_context(&self) -> String {
        if let Some(entry) = self.cache.read().unwrap().as_ref() {
            if entry.at.elapsed() < CACHE_TTL {
                return entry.context.clone();
            }
        }

        let context = self.build_context().await;
        *self.cache.write().unwrap() = Some(CacheEntry {
            context: context.clone(),
            at: Instant::now(),
        });
        context
    }

    /// Security boundary: only the owner caller receives the real
    /// workspace context; everyone else gets a generic fallback line.
    pub async fn context_for(&self, caller_id: &str, owner_id: &str) -> String {
        if caller_id == owner_id {
            self.get_context().await
        } else {
            FALLBACK_PERSONA_LINE.to_string()
        }
    }

    async fn build_context(&self) -> String {
        let mut parts = Vec::new();

        for name in KNOWN_FILES {
            if let Some(content) = read_capped(&self.root.join(name), PERSONA_FILE_CAP).await {
                parts.push(content);
            }
        }

        let today = Utc::now().date_naive();
        let yesterday = today - Duration::days(1);
        for date in [today, yesterday] {
            let path = self
                .memory_dir
                .join(format!("{}.md", date.format("%Y-%m-%d")));
            if let Some(content) = read_capped(&path, MEMORY_FILE_CAP).await {
                parts.push(format!("<!-- {} -->\n{}", date.format("%Y-%m-%d"), content));
            }
        }

        parts.join("\n\n---\n\n")
    }

    /// Append a timestamped block to today's dated memory file, creating the
    /// memory directory if needed, then invalidate the cache.
    pub async fn write_memory(&self, content: &str, label: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.memory_dir).await?;

        let today = Utc::now().date_naive();
        let path = self.memory_dir.join(format!("{}.md", today.format("%Y-%m-%d")));
        let timestamp = Utc::now().format("%H:%M");

        let block = format!("\n\n## [{timestamp}] {label}\n\n{content}");

        let new_content = match tokio::fs::read_to_string(&path).await {
            Ok(existing) => format!("{existing}{block}"),
            Err(_) => format!("# {}\n{block}", today.format("%Y-%m-%d")),
        };

        tokio::fs::write(&path, new_content).await?;
        self.invalidate_cache();
        Ok(())
    }

    pub fn invalidate_cache(&self) {
        *self.cache.write().unwrap() = None;
    }
}

async fn read_capped(path: &Path, cap: usize) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content.chars().take(cap).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read workspace file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_owner_gets_fallback_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "secret persona").unwrap();
        let loader = WorkspaceLoader::new(dir.path());

        assert_eq!(loader.context_for("guest42", "owner").await, FALLBACK_PERSONA_LINE);
        assert!(loader.context_for("owner", "owner").await.contains("secret persona"));
    }

    #[tokio::test]
    async fn write_memory_creates_dated_file_and_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let loader = WorkspaceLoader::new(dir.path());

        let _ = loader.get_context().await;
        loader.write_memory("user likes tea", "Memory Flush").await.unwrap();

        let today = Utc::now().date_naive();
        let memory_path = dir.path().join("memory").join(format!("{}.md", today.format("%Y-%m-%d")));
        let content = std::fs::read_to_string(memory_path).unwrap();
        assert!(content.contains("user likes tea"));
        assert!(loader.get_context().await.contains("user likes tea"));
    }

    #[tokio::test]
    async fn per_file_cap_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let long = "x".repeat(10_000);
        std::fs::write(dir.path().join("SOUL.md"), &long).unwrap();
        let loader = WorkspaceLoader::new(dir.path());
        assert!(loader.get_context().await.len() <= PERSONA_FILE_CAP);
    }
}
