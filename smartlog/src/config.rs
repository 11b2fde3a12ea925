//! 파일 로거 설정 관리
//!
//! 파일 어펜더의 순환/보관 한도와 로그 레벨을 담습니다. 0 값은 "기본값 사용"을 뜻합니다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::LogError;
use crate::event::LogLevel;

/// 파일 하나의 기본 최대 크기 (1MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// 기본 순환 주기 (24시간)
pub const DEFAULT_ROLLING_FREQUENCY: Duration = Duration::from_secs(60 * 60 * 24);

/// 기본 보관 파일 개수
pub const DEFAULT_MAX_NUM_LOG_FILES: u32 = 10;

/// 기본 디스크 할당량 (50MB)
pub const DEFAULT_LOG_FILES_DISK_QUOTA: u64 = 50 * 1024 * 1024;

/// 파일 로거 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggerConfig {
    /// 보관 파일 최대 개수 (0 = 기본값 10)
    pub max_number_of_files: u32,

    /// 파일 하나의 최대 크기 (바이트 단위, 0 = 기본값 1MB)
    pub max_file_size: u64,

    /// 로그 파일 전체 크기 제한 (바이트 단위, 0 = 기본값 50MB)
    pub disk_quota: u64,

    /// 로그 디렉토리 (없으면 `./logs`)
    pub directory: Option<PathBuf>,

    /// 순환 주기 (0 = 기본값 24시간)
    pub rolling_frequency: Duration,

    /// 파일 어펜더가 받을 레벨 (`OFF` = 기본값 `ALL`)
    pub level: LogLevel,
}

impl Default for FileLoggerConfig {
    /// 모든 필드가 0인 설정 (레벨 포함)
    fn default() -> Self {
        Self {
            max_number_of_files: 0,
            max_file_size: 0,
            disk_quota: 0,
            directory: None,
            rolling_frequency: Duration::ZERO,
            level: LogLevel::OFF,
        }
    }
}

impl FileLoggerConfig {
    /// 0 값을 기본값으로 채운 설정
    pub fn resolved(&self) -> Self {
        Self {
            max_number_of_files: non_zero_or(self.max_number_of_files, DEFAULT_MAX_NUM_LOG_FILES),
            max_file_size: non_zero_or(self.max_file_size, DEFAULT_MAX_FILE_SIZE),
            disk_quota: non_zero_or(self.disk_quota, DEFAULT_LOG_FILES_DISK_QUOTA),
            directory: self.directory.clone(),
            rolling_frequency: if self.rolling_frequency.is_zero() {
                DEFAULT_ROLLING_FREQUENCY
            } else {
                self.rolling_frequency
            },
            level: if self.level.is_off() {
                LogLevel::ALL
            } else {
                self.level
            },
        }
    }

    /// 환경변수에서 설정 로드
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SMARTLOG_MAX_FILES") {
            if let Ok(count) = val.parse() {
                config.max_number_of_files = count;
            }
        }

        if let Ok(val) = std::env::var("SMARTLOG_MAX_FILE_SIZE") {
            if let Ok(size) = val.parse() {
                config.max_file_size = size;
            }
        }

        if let Ok(val) = std::env::var("SMARTLOG_DISK_QUOTA") {
            if let Ok(quota) = val.parse() {
                config.disk_quota = quota;
            }
        }

        if let Ok(val) = std::env::var("SMARTLOG_DIRECTORY") {
            if !val.trim().is_empty() {
                config.directory = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("SMARTLOG_ROLLING_FREQUENCY") {
            if let Ok(secs) = val.parse::<u64>() {
                config.rolling_frequency = Duration::from_secs(secs);
            }
        }

        if let Ok(val) = std::env::var("SMARTLOG_LEVEL") {
            if let Ok(level) = val.parse() {
                config.level = level;
            }
        }

        config
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(directory) = &self.directory {
            if directory.exists() && !directory.is_dir() {
                return Err(LogError::Configuration(format!(
                    "로그 디렉토리 경로가 디렉토리가 아님: {}",
                    directory.display()
                ))
                .into());
            }
        }

        Ok(())
    }
}

fn non_zero_or<T: PartialEq + Default>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}
