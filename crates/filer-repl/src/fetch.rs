//! Chunk content retrieval from the source cluster.

use crate::config::Config;
use crate::entry::{FileChunk, NamespaceEntry};
use crate::error::{ReplError, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tracing::trace;

/// Reads the bytes of one chunk from wherever the source stores it.
#[async_trait]
pub trait ChunkFetcher: Send + Sync {
    /// Fetch the full content of `chunk`.
    async fn fetch_chunk(&self, chunk: &FileChunk) -> Result<Bytes>;
}

/// Fetches chunks over HTTP from a volume server: `GET {base}/{file_id}`.
#[derive(Debug, Clone)]
pub struct HttpChunkFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChunkFetcher {
    /// Create a fetcher for the given volume server base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build from the `source.filer` section; `None` if `volumeServerUrl` is unset.
    pub fn from_config(source: &Config) -> Option<Self> {
        let url = source.get_string("volumeServerUrl");
        if url.is_empty() {
            None
        } else {
            Some(Self::new(url))
        }
    }

    /// URL a chunk is read from.
    pub fn chunk_url(&self, file_id: &str) -> String {
        format!("{}/{}", self.base_url, file_id)
    }
}

#[async_trait]
impl ChunkFetcher for HttpChunkFetcher {
    async fn fetch_chunk(&self, chunk: &FileChunk) -> Result<Bytes> {
        let url = self.chunk_url(&chunk.file_id);
        trace!("fetch {}", url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ReplError::Fetch {
                file_id: chunk.file_id.clone(),
                msg: format!("{} returned {}", url, response.status()),
            });
        }
        Ok(response.bytes().await?)
    }
}

/// Largest file assembled in memory unless `source.filer.maxFileSize` says otherwise.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

/// Assemble the content of a file entry from its chunks.
///
/// Chunks are applied oldest first, so where they overlap the most recently
/// written chunk wins. Gaps read as zeros. Directories have no content.
/// A file whose chunks reach past `max_size` is rejected before anything is
/// fetched or allocated.
pub async fn fetch_content(
    fetcher: Option<&dyn ChunkFetcher>,
    entry: &NamespaceEntry,
    max_size: u64,
) -> Result<Bytes> {
    if entry.is_directory || entry.chunks.is_empty() {
        return Ok(Bytes::new());
    }
    let first = &entry.chunks[0].file_id;
    let Some(fetcher) = fetcher else {
        return Err(ReplError::Fetch {
            file_id: first.clone(),
            msg: "no volume server configured for chunk reads".to_string(),
        });
    };

    let total = entry.total_size().ok_or_else(|| ReplError::Fetch {
        file_id: first.clone(),
        msg: "chunk extent overflows the file size".to_string(),
    })?;
    if total > max_size {
        return Err(ReplError::Fetch {
            file_id: first.clone(),
            msg: format!("file size {} exceeds limit of {} bytes", total, max_size),
        });
    }
    let total = usize::try_from(total).map_err(|_| ReplError::Fetch {
        file_id: first.clone(),
        msg: format!("file size {} does not fit in memory", total),
    })?;

    let mut chunks: Vec<&FileChunk> = entry.chunks.iter().collect();
    chunks.sort_by_key(|c| c.mtime);

    let mut buf = BytesMut::zeroed(total);
    for chunk in chunks {
        let data = fetcher.fetch_chunk(chunk).await?;
        if (data.len() as u64) < chunk.size {
            return Err(ReplError::Fetch {
                file_id: chunk.file_id.clone(),
                msg: format!("short read: {} of {} bytes", data.len(), chunk.size),
            });
        }
        // both bounds are within `total`, which fits in usize
        let start = chunk.offset as usize;
        let size = chunk.size as usize;
        buf[start..start + size].copy_from_slice(&data[..size]);
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<String, Bytes>);

    #[async_trait]
    impl ChunkFetcher for MapFetcher {
        async fn fetch_chunk(&self, chunk: &FileChunk) -> Result<Bytes> {
            self.0.get(&chunk.file_id).cloned().ok_or_else(|| ReplError::Fetch {
                file_id: chunk.file_id.clone(),
                msg: "404".to_string(),
            })
        }
    }

    fn chunk(file_id: &str, offset: u64, size: u64, mtime: i64) -> FileChunk {
        FileChunk {
            file_id: file_id.to_string(),
            offset,
            size,
            mtime,
        }
    }

    fn fetcher(pairs: &[(&str, &'static [u8])]) -> MapFetcher {
        MapFetcher(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Bytes::from_static(v)))
                .collect(),
        )
    }

    mod assemble {
        use super::*;

        #[tokio::test]
        async fn test_chunks_placed_by_offset() {
            let f = fetcher(&[("1,a", b"hello "), ("1,b", b"world")]);
            let entry = NamespaceEntry::file("f", vec![chunk("1,b", 6, 5, 2), chunk("1,a", 0, 6, 1)]);
            let content = fetch_content(Some(&f), &entry, DEFAULT_MAX_FILE_SIZE).await.unwrap();
            assert_eq!(&content[..], b"hello world");
        }

        #[tokio::test]
        async fn test_newer_chunk_wins_overlap() {
            let f = fetcher(&[("1,old", b"aaaa"), ("1,new", b"BB")]);
            let entry = NamespaceEntry::file("f", vec![chunk("1,new", 1, 2, 20), chunk("1,old", 0, 4, 10)]);
            let content = fetch_content(Some(&f), &entry, DEFAULT_MAX_FILE_SIZE).await.unwrap();
            assert_eq!(&content[..], b"aBBa");
        }

        #[tokio::test]
        async fn test_gap_reads_as_zeros() {
            let f = fetcher(&[("1,a", b"z")]);
            let entry = NamespaceEntry::file("f", vec![chunk("1,a", 3, 1, 0)]);
            let content = fetch_content(Some(&f), &entry, DEFAULT_MAX_FILE_SIZE).await.unwrap();
            assert_eq!(&content[..], &[0, 0, 0, b'z']);
        }

        #[tokio::test]
        async fn test_short_read_fails() {
            let f = fetcher(&[("1,a", b"ab")]);
            let entry = NamespaceEntry::file("f", vec![chunk("1,a", 0, 4, 0)]);
            let err = fetch_content(Some(&f), &entry, DEFAULT_MAX_FILE_SIZE).await.unwrap_err();
            assert!(err.to_string().contains("short read"));
        }

        #[tokio::test]
        async fn test_directory_and_empty_file_need_no_fetcher() {
            assert!(fetch_content(None, &NamespaceEntry::directory("d"), 0).await.unwrap().is_empty());
            assert!(fetch_content(None, &NamespaceEntry::file("e", vec![]), 0).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_chunks_without_fetcher_fail() {
            let entry = NamespaceEntry::file("f", vec![chunk("7,ff", 0, 1, 0)]);
            let err = fetch_content(None, &entry, DEFAULT_MAX_FILE_SIZE).await.unwrap_err();
            assert!(matches!(err, ReplError::Fetch { ref file_id, .. } if file_id == "7,ff"));
            assert!(!err.is_fatal());
        }

        #[tokio::test]
        async fn test_overflowing_extent_fails() {
            let f = fetcher(&[("1,a", b"a")]);
            let entry = NamespaceEntry::file("f", vec![chunk("1,a", u64::MAX, 1, 0)]);
            let err = fetch_content(Some(&f), &entry, DEFAULT_MAX_FILE_SIZE).await.unwrap_err();
            assert!(matches!(err, ReplError::Fetch { ref msg, .. } if msg.contains("overflows")));
        }

        #[tokio::test]
        async fn test_sparse_file_over_limit_fails_before_fetching() {
            // no chunk is registered: a fetch attempt would fail with "404"
            let f = fetcher(&[]);
            let entry = NamespaceEntry::file("f", vec![chunk("1,a", 1 << 45, 1, 0)]);
            let err = fetch_content(Some(&f), &entry, DEFAULT_MAX_FILE_SIZE).await.unwrap_err();
            assert!(matches!(err, ReplError::Fetch { ref msg, .. } if msg.contains("exceeds limit")));
        }

        #[tokio::test]
        async fn test_file_at_limit_is_assembled() {
            let f = fetcher(&[("1,a", b"abcd")]);
            let entry = NamespaceEntry::file("f", vec![chunk("1,a", 0, 4, 0)]);
            let content = fetch_content(Some(&f), &entry, 4).await.unwrap();
            assert_eq!(&content[..], b"abcd");
            assert!(fetch_content(Some(&f), &entry, 3).await.is_err());
        }
    }

    mod http {
        use super::*;

        #[test]
        fn test_chunk_url() {
            let f = HttpChunkFetcher::new("http://volume:8080/");
            assert_eq!(f.chunk_url("3,01637037d6"), "http://volume:8080/3,01637037d6");
        }

        #[test]
        fn test_from_config() {
            assert!(HttpChunkFetcher::from_config(&Config::new()).is_none());
            let section = Config::new().with("volumeServerUrl", "http://10.0.0.5:8080");
            let f = HttpChunkFetcher::from_config(&section).unwrap();
            assert_eq!(f.chunk_url("1,2"), "http://10.0.0.5:8080/1,2");
        }
    }
}
