//! 보관 파일 압축 저장소
//!
//! 기본 저장소를 감싸서, 보관 처리된 파일을 보관 정책이 검사하기 전에 압축합니다.
//! 압축에 실패하면 원본 보관 파일을 그대로 둡니다.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{LogError, Result};
use crate::store::record::split_log_suffix;
use crate::store::{DefaultFileStore, FileRecord, FileStore};

/// 압축 함수: 파일 경로를 받아 압축된 파일 경로를 반환 (`None` = 실패 또는 건너뜀)
pub type CompressFn = Arc<dyn Fn(&Path) -> Option<PathBuf> + Send + Sync>;

/// gzip 압축 (`<path>.gz` 생성 후 원본 삭제)
///
/// 수정 시각은 원본과 같게 유지됩니다. 실패하면 만들던 압축 파일을 지우고 원본을 남깁니다.
pub fn gzip_compress(path: &Path) -> Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    let modified = fs::metadata(path)?.modified().ok();
    let written = (|| -> io::Result<()> {
        let mut input = File::open(path)?;
        let mut encoder = GzEncoder::new(File::create(&target)?, Compression::default());
        io::copy(&mut input, &mut encoder)?;
        let output = encoder.finish()?;
        if let Some(modified) = modified {
            output.set_modified(modified)?;
        }
        output.sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&target);
        return Err(LogError::Compression {
            path: path.to_path_buf(),
            reason: e.to_string(),
        });
    }

    fs::remove_file(path)?;
    Ok(target)
}

/// gzip 파일 내용 복원
pub fn gzip_decompress(path: &Path) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(File::open(path)?);
    let mut content = Vec::new();
    decoder
        .read_to_end(&mut content)
        .map_err(|e| LogError::Compression {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(content)
}

fn default_compress_fn() -> CompressFn {
    Arc::new(|path: &Path| match gzip_compress(path) {
        Ok(compressed) => Some(compressed),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "보관 로그 파일 gzip 압축 실패");
            None
        }
    })
}

/// 압축 저장소
pub struct CompressingFileStore {
    inner: DefaultFileStore,
    enabled: AtomicBool,
    compress: RwLock<CompressFn>,
}

impl CompressingFileStore {
    /// gzip 압축을 쓰는 저장소 생성 (압축은 꺼진 상태로 시작)
    pub fn new(inner: DefaultFileStore) -> Self {
        Self {
            inner,
            enabled: AtomicBool::new(false),
            compress: RwLock::new(default_compress_fn()),
        }
    }

    /// 감싼 기본 저장소
    pub fn inner(&self) -> &DefaultFileStore {
        &self.inner
    }

    pub fn is_compression_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_compression_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// 압축 함수 교체
    pub fn set_compress_fn(&self, compress: CompressFn) {
        *self.compress.write() = compress;
    }

    /// 현재 압축 함수
    pub fn compress_fn(&self) -> CompressFn {
        self.compress.read().clone()
    }

    /// 이미 보관된 압축 전 파일들을 모두 압축
    ///
    /// 압축된 파일 개수를 반환합니다. 압축이 꺼져 있으면 아무 것도 하지 않습니다.
    pub fn compress_archived_files(&self) -> usize {
        if !self.is_compression_enabled() {
            return 0;
        }

        self.inner
            .unsorted_log_file_records()
            .iter()
            .filter(|record| record.is_archived() && !is_compressed(record))
            .filter_map(|record| self.compress_file(record.path()))
            .count()
    }

    /// 파일 하나 압축 (꺼져 있거나 실패하면 `None`, 원본 유지)
    fn compress_file(&self, path: &Path) -> Option<PathBuf> {
        if !self.is_compression_enabled() || !path.exists() {
            return None;
        }

        let compress = self.compress_fn();
        match compress(path) {
            Some(compressed) if compressed.exists() => {
                debug!(
                    original = %path.display(),
                    compressed = %compressed.display(),
                    "보관 로그 파일 압축됨"
                );
                Some(compressed)
            }
            Some(missing) => {
                warn!(
                    path = %path.display(),
                    result = %missing.display(),
                    "압축 결과 파일이 없음, 원본 유지"
                );
                None
            }
            None => None,
        }
    }
}

fn is_compressed(record: &FileRecord) -> bool {
    split_log_suffix(record.file_name()).is_some_and(|(_, suffix)| suffix != ".log")
}

impl FileStore for CompressingFileStore {
    fn logs_directory(&self) -> &Path {
        self.inner.logs_directory()
    }

    fn maximum_number_of_log_files(&self) -> usize {
        self.inner.maximum_number_of_log_files()
    }

    fn set_maximum_number_of_log_files(&self, count: usize) {
        self.inner.set_maximum_number_of_log_files(count);
    }

    fn log_files_disk_quota(&self) -> u64 {
        self.inner.log_files_disk_quota()
    }

    fn set_log_files_disk_quota(&self, quota: u64) {
        self.inner.set_log_files_disk_quota(quota);
    }

    fn unsorted_log_file_paths(&self) -> Vec<PathBuf> {
        self.inner.unsorted_log_file_paths()
    }

    fn create_new_log_file(&self) -> Result<PathBuf> {
        self.inner.create_new_log_file()
    }

    fn did_archive_log_file(&self, path: &Path) {
        self.compress_file(path);
    }

    fn did_roll_and_archive_log_file(&self, path: &Path) {
        self.compress_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn archived_file(dir: &TempDir, content: &[u8]) -> PathBuf {
        let path = dir.path().join("app 2024-01-01 00-00-00-000.archived.log");
        fs::write(&path, content).expect("Test assertion failed");
        path
    }

    fn store_in(dir: &TempDir) -> CompressingFileStore {
        CompressingFileStore::new(
            DefaultFileStore::new(Some(dir.path().to_path_buf())).with_identifier("app"),
        )
    }

    #[test]
    fn test_gzip_round_trip() {
        let dir = TempDir::new().expect("Test assertion failed");
        let content = b"line one\nline two\n".repeat(50);
        let path = archived_file(&dir, &content);
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .expect("Test assertion failed");

        let compressed = gzip_compress(&path).expect("Test assertion failed");
        assert!(!path.exists());
        assert!(compressed.to_string_lossy().ends_with(".archived.log.gz"));
        assert_eq!(
            fs::metadata(&compressed)
                .and_then(|m| m.modified())
                .expect("Test assertion failed"),
            modified
        );

        assert_eq!(gzip_decompress(&compressed).expect("Test assertion failed"), content);
    }

    #[test]
    fn test_disabled_store_passes_through() {
        let dir = TempDir::new().expect("Test assertion failed");
        let store = store_in(&dir);
        let path = archived_file(&dir, b"data");

        store.did_roll_and_archive_log_file(&path);
        assert!(path.exists());
    }

    #[test]
    fn test_enabled_store_compresses_on_archive() {
        let dir = TempDir::new().expect("Test assertion failed");
        let store = store_in(&dir);
        store.set_compression_enabled(true);
        let path = archived_file(&dir, b"data");

        store.did_archive_log_file(&path);
        assert!(!path.exists());

        let records = store.sorted_log_file_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_archived());
        assert!(records[0].file_name().ends_with(".log.gz"));
    }

    #[test]
    fn test_failed_compression_keeps_original() {
        let dir = TempDir::new().expect("Test assertion failed");
        let store = store_in(&dir);
        store.set_compression_enabled(true);
        store.set_compress_fn(Arc::new(|_: &Path| -> Option<PathBuf> { None }));
        let path = archived_file(&dir, b"keep me");

        store.did_roll_and_archive_log_file(&path);
        assert_eq!(fs::read(&path).expect("Test assertion failed"), b"keep me");

        // 존재하지 않는 결과 경로도 실패로 처리
        store.set_compress_fn(Arc::new(|p: &Path| Some(p.with_extension("missing"))));
        store.did_archive_log_file(&path);
        assert!(path.exists());
    }

    #[test]
    fn test_compress_archived_files_skips_active_and_compressed() {
        let dir = TempDir::new().expect("Test assertion failed");
        let store = store_in(&dir);
        archived_file(&dir, b"old");
        fs::write(dir.path().join("app 2024-01-02 00-00-00-000.log"), b"active")
            .expect("Test assertion failed");

        assert_eq!(store.compress_archived_files(), 0);
        store.set_compression_enabled(true);
        assert_eq!(store.compress_archived_files(), 1);
        assert_eq!(store.compress_archived_files(), 0);
        assert!(dir.path().join("app 2024-01-02 00-00-00-000.log").exists());
    }
}
