//! 기본 로그 파일 저장소
//!
//! `<식별자> <YYYY-MM-DD> <HH-MM-SS-mmm>.log` 형식으로 파일을 만들고,
//! 같은 디렉토리에서 이 형식을 따르는 파일만 관리 대상으로 봅니다.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, error, warn};

use crate::config::{DEFAULT_LOG_FILES_DISK_QUOTA, DEFAULT_MAX_NUM_LOG_FILES};
use crate::error::{LogError, Result};
use crate::store::record::{split_log_suffix, timestamp_from_name};
use crate::store::FileStore;

/// 디렉토리를 지정하지 않았을 때의 로그 디렉토리
pub const DEFAULT_LOGS_DIRECTORY: &str = "./logs";

/// 같은 시각에 만들어진 파일 이름 충돌 시 최대 시도 횟수
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// 기본 파일 저장소
#[derive(Debug)]
pub struct DefaultFileStore {
    directory: PathBuf,
    identifier: String,
    max_files: AtomicUsize,
    disk_quota: AtomicU64,
}

impl DefaultFileStore {
    /// 새 저장소 생성
    ///
    /// 디렉토리를 만들 수 없으면 임시 디렉토리 아래로 대체합니다.
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self {
            directory: resolve_directory(directory.as_deref()),
            identifier: default_identifier(),
            max_files: AtomicUsize::new(DEFAULT_MAX_NUM_LOG_FILES as usize),
            disk_quota: AtomicU64::new(DEFAULT_LOG_FILES_DISK_QUOTA),
        }
    }

    /// 파일 이름 앞부분에 쓸 식별자 지정
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// 파일 이름 식별자 (기본값: 실행 파일 이름)
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// 지금 만들 새 파일의 이름
    pub fn next_log_file_name(&self) -> String {
        format!(
            "{} {}.log",
            self.identifier,
            Local::now().format("%Y-%m-%d %H-%M-%S-%3f")
        )
    }

    /// 이 저장소가 관리하는 로그 파일 이름인지 확인
    pub fn is_log_file(&self, file_name: &str) -> bool {
        file_name
            .strip_prefix(self.identifier.as_str())
            .is_some_and(|rest| rest.starts_with(' '))
            && split_log_suffix(file_name).is_some()
            && timestamp_from_name(file_name).is_some()
    }
}

impl FileStore for DefaultFileStore {
    fn logs_directory(&self) -> &Path {
        &self.directory
    }

    fn maximum_number_of_log_files(&self) -> usize {
        self.max_files.load(Ordering::Relaxed)
    }

    fn set_maximum_number_of_log_files(&self, count: usize) {
        self.max_files.store(count, Ordering::Relaxed);
    }

    fn log_files_disk_quota(&self) -> u64 {
        self.disk_quota.load(Ordering::Relaxed)
    }

    fn set_log_files_disk_quota(&self, quota: u64) {
        self.disk_quota.store(quota, Ordering::Relaxed);
    }

    fn unsorted_log_file_paths(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    directory = %self.directory.display(),
                    error = %e,
                    "로그 디렉토리 읽기 실패"
                );
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .filter(|entry| self.is_log_file(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .collect()
    }

    fn create_new_log_file(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory).map_err(|source| LogError::CreateDirectory {
            path: self.directory.clone(),
            source,
        })?;

        let file_name = self.next_log_file_name();
        let base = file_name.trim_end_matches(".log");

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                file_name.clone()
            } else {
                format!("{base} {attempt}.log")
            };
            let path = self.directory.join(&candidate);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!(path = %path.display(), "새 로그 파일 생성됨");
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(LogError::Rotation(format!(
            "사용 가능한 로그 파일 이름이 없음: {file_name}"
        )))
    }
}

/// 로그 디렉토리 결정
///
/// 요청한 디렉토리(없으면 `./logs`)를 만들 수 없으면 `<임시>/smartlog/logs`를 씁니다.
pub fn resolve_directory(requested: Option<&Path>) -> PathBuf {
    let preferred = requested
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGS_DIRECTORY));

    match fs::create_dir_all(&preferred) {
        Ok(()) => preferred,
        Err(e) => {
            let fallback = std::env::temp_dir().join("smartlog").join("logs");
            warn!(
                requested = %preferred.display(),
                fallback = %fallback.display(),
                error = %e,
                "로그 디렉토리 생성 실패, 대체 디렉토리 사용"
            );
            if let Err(e) = fs::create_dir_all(&fallback) {
                error!(path = %fallback.display(), error = %e, "대체 로그 디렉토리 생성 실패");
            }
            fallback
        }
    }
}

fn default_identifier() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "smartlog".to_string())
}
