//! 파일 어펜더
//!
//! 현재 로그 파일 하나에 기록하다가 크기/주기/명시적 요청에 따라 파일을 순환합니다.
//!
//! # 상태
//! ```text
//! 파일 없음 ──(첫 기록)──▶ 파일 열림 ──(순환 조건)──▶ 보관 처리 ──(다음 기록)──▶ 새 파일 열림
//! ```
//! 순환 시 현재 파일에 보관 표시를 하고 저장소 훅을 호출한 뒤 보관 정책을 적용합니다.
//! 순환을 일으킨 메시지는 새 파일에 기록됩니다.

use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::appender::{Appender, AppenderCore};
use crate::config::{DEFAULT_MAX_FILE_SIZE, DEFAULT_ROLLING_FREQUENCY};
use crate::error::{LogError, Result};
use crate::event::LogEvent;
use crate::formatter::{DefaultFormatter, Formatter};
use crate::queue::LoggingQueue;
use crate::store::{FileRecord, FileStore};

/// 최근 파일을 보관 처리할지 판단하는 사용자 조건
pub type ArchivePredicate = Arc<dyn Fn(&FileRecord) -> bool + Send + Sync>;

struct OpenLogFile {
    record: FileRecord,
    file: File,
    size: u64,
}

/// 순환 파일 어펜더
pub struct FileAppender {
    core: AppenderCore,
    store: Arc<dyn FileStore>,
    current: Mutex<Option<OpenLogFile>>,
    maximum_file_size: AtomicU64,
    rolling_frequency_ms: AtomicU64,
    do_not_reuse_log_files: AtomicBool,
    automatically_append_newline: AtomicBool,
    archive_predicate: RwLock<Option<ArchivePredicate>>,
    write_failures: AtomicU64,
}

impl FileAppender {
    /// 텍스트 포매터를 쓰는 파일 어펜더 생성
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self::with_formatter(store, Box::new(DefaultFormatter::text(false)))
    }

    /// 포매터를 지정해 생성
    pub fn with_formatter(store: Arc<dyn FileStore>, formatter: Box<dyn Formatter>) -> Self {
        Self {
            core: AppenderCore::with_formatter("file", formatter),
            store,
            current: Mutex::new(None),
            maximum_file_size: AtomicU64::new(DEFAULT_MAX_FILE_SIZE),
            rolling_frequency_ms: AtomicU64::new(DEFAULT_ROLLING_FREQUENCY.as_millis() as u64),
            do_not_reuse_log_files: AtomicBool::new(false),
            automatically_append_newline: AtomicBool::new(true),
            archive_predicate: RwLock::new(None),
            write_failures: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    /// 파일 하나의 최대 크기 (0 = 제한 없음)
    pub fn maximum_file_size(&self) -> u64 {
        self.maximum_file_size.load(Ordering::Relaxed)
    }

    pub fn set_maximum_file_size(&self, size: u64) {
        self.maximum_file_size.store(size, Ordering::Relaxed);
    }

    /// 순환 주기 (0 = 제한 없음)
    pub fn rolling_frequency(&self) -> Duration {
        Duration::from_millis(self.rolling_frequency_ms.load(Ordering::Relaxed))
    }

    pub fn set_rolling_frequency(&self, frequency: Duration) {
        self.rolling_frequency_ms
            .store(frequency.as_millis() as u64, Ordering::Relaxed);
    }

    /// 시작 시 이전 실행의 파일을 이어 쓰지 않고 항상 새 파일을 만들지 여부
    pub fn set_do_not_reuse_log_files(&self, enabled: bool) {
        self.do_not_reuse_log_files.store(enabled, Ordering::Relaxed);
    }

    /// 줄바꿈 자동 추가 여부 (기본값: true)
    pub fn set_automatically_append_newline(&self, enabled: bool) {
        self.automatically_append_newline
            .store(enabled, Ordering::Relaxed);
    }

    /// 최근 파일 보관 조건 지정 (`None` = 해제)
    ///
    /// 조건이 참이면 현재 파일을 순환하고, 열 때는 최근 파일을 재사용하지 않습니다.
    pub fn set_archive_predicate(&self, predicate: Option<ArchivePredicate>) {
        *self.archive_predicate.write() = predicate;
    }

    /// 흡수된 쓰기 실패 횟수
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// 현재 로그 파일 경로 (열린 파일이 없으면 새로 엶)
    pub fn current_log_file(self: &Arc<Self>) -> Option<PathBuf> {
        let (tx, rx) = crossbeam::channel::bounded(1);
        let this = Arc::clone(self);
        self.core.queue().submit_and_wait(move || {
            let mut current = this.current.lock();
            let path = if this.open_if_needed(&mut current) {
                current.as_ref().map(|open| open.record.path().to_path_buf())
            } else {
                None
            };
            let _ = tx.send(path);
        });
        rx.try_recv().ok().flatten()
    }

    /// 어펜더 큐에서 순환 예약
    ///
    /// 반환된 수신자는 순환이 끝난 뒤 완료됩니다.
    pub fn roll_log_file(self: &Arc<Self>) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let this = Arc::clone(self);
        // 완료 신호는 oneshot으로 전달하므로 큐 완료 핸들은 필요 없음
        let _ = self.core.queue().submit_tracked(move || {
            this.roll_now();
            let _ = tx.send(());
        });
        rx
    }

    /// 순환이 끝날 때까지 대기
    pub fn roll_log_file_and_wait(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.core.queue().submit_and_wait(move || this.roll_now());
    }

    fn roll_now(&self) {
        let mut current = self.current.lock();
        self.roll_locked(&mut current);
    }

    /// 현재 파일 보관 처리 (잠금 보유 상태)
    fn roll_locked(&self, current: &mut Option<OpenLogFile>) {
        let Some(OpenLogFile { mut record, file, size }) = current.take() else {
            return;
        };

        if let Err(e) = file.sync_all() {
            warn!(path = %record.path().display(), error = %e, "순환 전 로그 파일 동기화 실패");
        }
        drop(file);

        match record.set_archived(true) {
            Ok(()) => {
                info!(path = %record.path().display(), size, "로그 파일 순환됨");
                self.store.did_roll_and_archive_log_file(record.path());
            }
            Err(e) => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!(path = %record.path().display(), error = %e, "로그 파일 보관 처리 실패");
            }
        }

        self.store.delete_old_log_files(None);
    }

    /// 기록 전에 순환이 필요한지 확인
    fn should_roll(&self, open: &mut OpenLogFile, incoming: u64) -> bool {
        let max_size = self.maximum_file_size();
        if max_size > 0 && open.size > 0 && open.size + incoming > max_size {
            return true;
        }

        let frequency = self.rolling_frequency();
        if !frequency.is_zero() && open.record.age() >= frequency {
            return true;
        }

        match self.archive_predicate.read().as_ref() {
            Some(predicate) => {
                open.record.reset();
                predicate(&open.record)
            }
            None => false,
        }
    }

    /// 최근 파일을 이어 쓰지 않고 보관해야 하는지 확인
    fn should_archive_recent_file(&self, record: &FileRecord) -> bool {
        if self.do_not_reuse_log_files.load(Ordering::Relaxed) {
            return true;
        }

        let max_size = self.maximum_file_size();
        if max_size > 0 && record.size() >= max_size {
            return true;
        }

        let frequency = self.rolling_frequency();
        if !frequency.is_zero() && record.age() >= frequency {
            return true;
        }

        self.archive_predicate
            .read()
            .as_ref()
            .is_some_and(|predicate| predicate(record))
    }

    /// 기록할 파일 열기 (최근 파일 재사용 또는 새 파일 생성)
    fn open_log_file(&self) -> Result<OpenLogFile> {
        let recent = self
            .store
            .sorted_log_file_records()
            .into_iter()
            .next()
            .filter(|record| !record.is_archived());

        if let Some(mut recent) = recent {
            if !self.should_archive_recent_file(&recent) {
                let file = OpenOptions::new().append(true).open(recent.path())?;
                let size = file.metadata()?.len();
                debug!(path = %recent.path().display(), size, "기존 로그 파일 재사용");
                return Ok(OpenLogFile {
                    record: recent,
                    file,
                    size,
                });
            }

            match recent.set_archived(true) {
                Ok(()) => {
                    debug!(path = %recent.path().display(), "이전 로그 파일 보관 처리됨");
                    self.store.did_archive_log_file(recent.path());
                    self.store.delete_old_log_files(None);
                }
                Err(e) => {
                    warn!(path = %recent.path().display(), error = %e, "이전 로그 파일 보관 처리 실패");
                }
            }
        }

        let path = self.store.create_new_log_file()?;
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(OpenLogFile {
            record: FileRecord::new(path),
            file,
            size: 0,
        })
    }

    /// 열린 파일이 없으면 열기 (실패는 기록 후 `false`)
    fn open_if_needed(&self, current: &mut Option<OpenLogFile>) -> bool {
        if current.is_some() {
            return true;
        }
        match self.open_log_file() {
            Ok(open) => {
                *current = Some(open);
                true
            }
            Err(e) => {
                self.record_failure(&e);
                false
            }
        }
    }

    fn record_failure(&self, error: &LogError) {
        let failures = self.write_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            directory = %self.store.logs_directory().display(),
            error = %error,
            failures,
            "로그 파일 기록 실패"
        );
    }
}

impl Appender for FileAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn write(&self, formatted: &str, _event: &LogEvent) {
        let mut line = formatted.to_string();
        if self.automatically_append_newline.load(Ordering::Relaxed) && !line.ends_with('\n') {
            line.push('\n');
        }
        let bytes = line.as_bytes();

        let mut current = self.current.lock();
        let roll = current
            .as_mut()
            .is_some_and(|open| self.should_roll(open, bytes.len() as u64));
        if roll {
            self.roll_locked(&mut current);
        }

        if !self.open_if_needed(&mut current) {
            return;
        }

        if let Some(open) = current.as_mut() {
            match open.file.write_all(bytes) {
                Ok(()) => open.size += bytes.len() as u64,
                Err(e) => self.record_failure(&e.into()),
            }
        }
    }

    fn on_attached_in(&self, queue: &LoggingQueue) {
        debug!(
            queue = %queue.label(),
            directory = %self.store.logs_directory().display(),
            "파일 어펜더 연결됨"
        );
    }

    fn on_detaching(&self) {
        if let Some(open) = self.current.lock().take() {
            if let Err(e) = open.file.sync_all() {
                warn!(path = %open.record.path().display(), error = %e, "로그 파일 닫기 전 동기화 실패");
            }
        }
    }

    fn flush(&self) {
        if let Some(open) = self.current.lock().as_mut() {
            if let Err(e) = open.file.sync_data() {
                self.record_failure(&e.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appender::deliver;
    use crate::store::DefaultFileStore;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn appender_in(dir: &TempDir) -> Arc<FileAppender> {
        let store = DefaultFileStore::new(Some(dir.path().to_path_buf())).with_identifier("app");
        let appender = FileAppender::new(Arc::new(store));
        appender.core().set_formatter(None);
        Arc::new(appender)
    }

    fn write(appender: &FileAppender, message: &str) {
        deliver(appender, &LogEvent::brief(message, None));
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).expect("Test assertion failed")
    }

    #[test]
    fn test_size_limit_rolls_once_and_keeps_triggering_message() {
        let dir = TempDir::new().expect("Test assertion failed");
        let appender = appender_in(&dir);
        appender.set_maximum_file_size(100);

        let first = "a".repeat(59);
        let second = "b".repeat(59);
        write(&appender, &first);
        write(&appender, &second);

        let records = appender.store().sorted_log_file_records();
        assert_eq!(records.len(), 2);
        let archived: Vec<_> = records.iter().filter(|r| r.is_archived()).collect();
        let active: Vec<_> = records.iter().filter(|r| !r.is_archived()).collect();
        assert_eq!(archived.len(), 1);
        assert_eq!(active.len(), 1);
        assert_eq!(read(archived[0].path()), format!("{first}\n"));
        assert_eq!(read(active[0].path()), format!("{second}\n"));
    }

    #[test]
    fn test_first_message_larger_than_limit_is_written() {
        let dir = TempDir::new().expect("Test assertion failed");
        let appender = appender_in(&dir);
        appender.set_maximum_file_size(10);

        write(&appender, &"x".repeat(50));
        let records = appender.store().sorted_log_file_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size(), 51);
    }

    #[tokio::test]
    async fn test_roll_completion_fires_after_roll() {
        let dir = TempDir::new().expect("Test assertion failed");
        let appender = appender_in(&dir);

        let path = appender.current_log_file().expect("Test assertion failed");
        write(&appender, "before roll");

        appender
            .roll_log_file()
            .await
            .expect("Test assertion failed");
        assert!(!path.exists());
        let records = appender.store().sorted_log_file_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_archived());
        assert_eq!(read(records[0].path()), "before roll\n");

        write(&appender, "after roll");
        let next = appender.current_log_file().expect("Test assertion failed");
        assert_ne!(next, path);
        assert_eq!(read(&next), "after roll\n");
    }

    #[test]
    fn test_roll_without_open_file_is_noop() {
        let dir = TempDir::new().expect("Test assertion failed");
        let appender = appender_in(&dir);
        appender.roll_log_file_and_wait();
        assert!(appender.store().unsorted_log_file_paths().is_empty());
    }

    #[test]
    fn test_recent_unarchived_file_is_reused() {
        let dir = TempDir::new().expect("Test assertion failed");
        let existing = dir.path().join(format!(
            "app {}.log",
            chrono::Local::now().format("%Y-%m-%d %H-%M-%S-%3f")
        ));
        fs::write(&existing, "old\n").expect("Test assertion failed");

        let appender = appender_in(&dir);
        write(&appender, "new");
        assert_eq!(read(&existing), "old\nnew\n");
    }

    #[test]
    fn test_do_not_reuse_archives_previous_file() {
        let dir = TempDir::new().expect("Test assertion failed");
        let existing = dir.path().join("app 2024-01-01 00-00-00-000.log");
        fs::write(&existing, "old\n").expect("Test assertion failed");

        let appender = appender_in(&dir);
        appender.set_rolling_frequency(Duration::ZERO);
        appender.set_do_not_reuse_log_files(true);
        write(&appender, "new");

        assert!(!existing.exists());
        assert!(dir
            .path()
            .join("app 2024-01-01 00-00-00-000.archived.log")
            .exists());
        let current = appender.current_log_file().expect("Test assertion failed");
        assert_eq!(read(&current), "new\n");
    }

    #[test]
    fn test_stale_file_is_not_reused() {
        let dir = TempDir::new().expect("Test assertion failed");
        // 이름의 타임스탬프 기준으로 24시간보다 오래됨
        let existing = dir.path().join("app 2020-01-01 00-00-00-000.log");
        fs::write(&existing, "ancient\n").expect("Test assertion failed");

        let appender = appender_in(&dir);
        write(&appender, "fresh");
        assert!(!existing.exists());
        assert_eq!(appender.store().sorted_log_file_records().len(), 2);
    }

    #[test]
    fn test_rolling_frequency_triggers_roll() {
        let dir = TempDir::new().expect("Test assertion failed");
        let appender = appender_in(&dir);
        appender.set_rolling_frequency(Duration::from_millis(20));

        write(&appender, "one");
        std::thread::sleep(Duration::from_millis(50));
        write(&appender, "two");

        let records = appender.store().sorted_log_file_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().filter(|r| r.is_archived()).count(), 1);
    }

    #[test]
    fn test_archive_predicate_triggers_roll() {
        let dir = TempDir::new().expect("Test assertion failed");
        let appender = appender_in(&dir);
        appender.set_archive_predicate(Some(Arc::new(|record: &FileRecord| record.size() >= 6)));

        write(&appender, "12345");
        write(&appender, "more");

        let records = appender.store().sorted_log_file_records();
        assert_eq!(records.len(), 2);
        let archived = records
            .iter()
            .find(|r| r.is_archived())
            .expect("Test assertion failed");
        assert_eq!(read(archived.path()), "12345\n");
    }

    #[test]
    fn test_newline_not_duplicated() {
        let dir = TempDir::new().expect("Test assertion failed");
        let appender = appender_in(&dir);
        write(&appender, "line\n");
        appender.set_automatically_append_newline(false);
        write(&appender, "raw");

        let path = appender.current_log_file().expect("Test assertion failed");
        assert_eq!(read(&path), "line\nraw");
    }

    struct BrokenStore {
        directory: PathBuf,
    }

    impl FileStore for BrokenStore {
        fn logs_directory(&self) -> &Path {
            &self.directory
        }
        fn maximum_number_of_log_files(&self) -> usize {
            0
        }
        fn set_maximum_number_of_log_files(&self, _count: usize) {}
        fn log_files_disk_quota(&self) -> u64 {
            0
        }
        fn set_log_files_disk_quota(&self, _quota: u64) {}
        fn unsorted_log_file_paths(&self) -> Vec<PathBuf> {
            Vec::new()
        }
        fn create_new_log_file(&self) -> Result<PathBuf> {
            Err(LogError::Rotation("disk unavailable".to_string()))
        }
    }

    #[test]
    fn test_write_failure_is_absorbed() {
        let appender = Arc::new(FileAppender::new(Arc::new(BrokenStore {
            directory: PathBuf::from("/nonexistent"),
        })));

        write(&appender, "lost");
        write(&appender, "lost again");
        assert_eq!(appender.write_failures(), 2);
        assert!(appender.current_log_file().is_none());
        assert_eq!(appender.write_failures(), 3);
    }
}
