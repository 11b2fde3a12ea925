//! 로그 파일 메타데이터
//!
//! 파일 하나의 경로, 크기, 시간 정보와 보관(archived) 표시를 다룹니다.
//! 보관 표시는 파일 이름의 `.archived` 접미사로 저장되어 프로세스 재시작 후에도 유지됩니다.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{LogError, Result};

/// 보관 표시 접미사
pub const ARCHIVED_MARKER: &str = ".archived";

/// 관리 대상 로그 파일 확장자 (긴 것부터 검사)
const LOG_SUFFIXES: [&str; 3] = [".log.gz", ".log.zip", ".log"];

/// 파일 이름에 들어간 생성 시각 (`YYYY-MM-DD HH-MM-SS-mmm`)
static NAME_TIMESTAMP: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2} \d{2}-\d{2}-\d{2})-(\d{3})").ok());

/// 파일 이름을 (기본 이름, 로그 확장자)로 분리
pub(crate) fn split_log_suffix(name: &str) -> Option<(&str, &str)> {
    LOG_SUFFIXES.iter().find_map(|suffix| {
        name.strip_suffix(suffix)
            .filter(|base| !base.is_empty())
            .map(|base| (base, *suffix))
    })
}

/// 파일 이름의 타임스탬프를 로컬 시각으로 해석
pub(crate) fn timestamp_from_name(name: &str) -> Option<DateTime<Local>> {
    let captures = NAME_TIMESTAMP.as_ref()?.captures(name)?;
    let naive = NaiveDateTime::parse_from_str(captures.get(1)?.as_str(), "%Y-%m-%d %H-%M-%S").ok()?;
    let millis: i64 = captures.get(2)?.as_str().parse().ok()?;
    let naive = naive + chrono::Duration::milliseconds(millis);
    Local.from_local_datetime(&naive).earliest()
}

#[derive(Debug, Clone, Copy)]
struct Attributes {
    size: u64,
    created: DateTime<Local>,
    modified: DateTime<Local>,
}

/// 로그 파일 하나의 메타데이터 캐시
///
/// 속성은 처음 조회할 때 읽어 캐시합니다. 파일이 외부에서 바뀌었다면
/// [`FileRecord::reset`]으로 캐시를 비워야 합니다.
#[derive(Debug, Clone)]
pub struct FileRecord {
    path: PathBuf,
    file_name: String,
    attributes: OnceCell<Attributes>,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            file_name,
            attributes: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// 파일 크기 (바이트)
    pub fn size(&self) -> u64 {
        self.attributes().size
    }

    /// 생성 시각
    ///
    /// 이름에 타임스탬프가 있으면 그것을 쓰므로 이름 변경이나 압축 후에도 같은 값을 유지합니다.
    pub fn creation_date(&self) -> DateTime<Local> {
        self.attributes().created
    }

    pub fn modification_date(&self) -> DateTime<Local> {
        self.attributes().modified
    }

    /// 생성 후 경과 시간 (미래 시각이면 0)
    pub fn age(&self) -> Duration {
        (Local::now() - self.creation_date()).to_std().unwrap_or_default()
    }

    /// 보관 표시 여부
    pub fn is_archived(&self) -> bool {
        split_log_suffix(&self.file_name).is_some_and(|(base, _)| base.ends_with(ARCHIVED_MARKER))
    }

    /// 보관 표시 설정/해제 (파일 이름 변경)
    pub fn set_archived(&mut self, archived: bool) -> Result<()> {
        if self.is_archived() == archived {
            return Ok(());
        }

        let (base, suffix) = split_log_suffix(&self.file_name).ok_or_else(|| {
            LogError::Rotation(format!("로그 파일 이름이 아님: {}", self.file_name))
        })?;

        let new_name = if archived {
            format!("{base}{ARCHIVED_MARKER}{suffix}")
        } else {
            format!("{}{suffix}", base.trim_end_matches(ARCHIVED_MARKER))
        };
        self.rename_file(&new_name)
    }

    /// 같은 디렉토리 안에서 이름 변경
    pub fn rename_file(&mut self, new_name: &str) -> Result<()> {
        let new_path = self.path.with_file_name(new_name);
        fs::rename(&self.path, &new_path)?;
        self.path = new_path;
        self.file_name = new_name.to_string();
        self.reset();
        Ok(())
    }

    /// 캐시된 속성 무효화
    pub fn reset(&mut self) {
        self.attributes = OnceCell::new();
    }

    /// 최신 생성 순 비교 (같으면 최신 수정 순)
    pub fn reverse_compare_by_creation_date(&self, other: &FileRecord) -> Ordering {
        other
            .creation_date()
            .cmp(&self.creation_date())
            .then_with(|| other.modification_date().cmp(&self.modification_date()))
    }

    /// 최신 수정 순 비교
    pub fn reverse_compare_by_modification_date(&self, other: &FileRecord) -> Ordering {
        other.modification_date().cmp(&self.modification_date())
    }

    fn attributes(&self) -> &Attributes {
        self.attributes.get_or_init(|| {
            let metadata = fs::metadata(&self.path).ok();
            let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
            let modified = metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let created = timestamp_from_name(&self.file_name).unwrap_or_else(|| {
                metadata
                    .as_ref()
                    .and_then(|m| m.created().ok())
                    .map(DateTime::<Local>::from)
                    .unwrap_or_else(|| DateTime::<Local>::from(modified))
            });

            Attributes {
                size,
                created,
                modified: DateTime::<Local>::from(modified),
            }
        })
    }
}

impl PartialEq for FileRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileRecord {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use tempfile::TempDir;

    #[test]
    fn test_split_log_suffix() {
        assert_eq!(split_log_suffix("app.log"), Some(("app", ".log")));
        assert_eq!(split_log_suffix("app.archived.log.gz"), Some(("app.archived", ".log.gz")));
        assert_eq!(split_log_suffix("notes.txt"), None);
        assert_eq!(split_log_suffix(".log"), None);
    }

    #[test]
    fn test_timestamp_from_name() {
        let parsed = timestamp_from_name("app 2024-03-05 13-07-09-250.archived.log")
            .expect("Test assertion failed");
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 3, 5));
        assert_eq!((parsed.hour(), parsed.minute(), parsed.second()), (13, 7, 9));
        assert_eq!(parsed.timestamp_subsec_millis(), 250);
        assert!(timestamp_from_name("app.log").is_none());
    }

    #[test]
    fn test_archive_marker_round_trip() {
        let dir = TempDir::new().expect("Test assertion failed");
        let path = dir.path().join("app 2024-01-01 00-00-00-000.log");
        fs::write(&path, b"hello").expect("Test assertion failed");

        let mut record = FileRecord::new(&path);
        assert!(!record.is_archived());
        assert_eq!(record.size(), 5);
        let created = record.creation_date();

        record.set_archived(true).expect("Test assertion failed");
        assert!(record.is_archived());
        assert_eq!(record.file_name(), "app 2024-01-01 00-00-00-000.archived.log");
        assert!(record.path().exists());
        assert!(!path.exists());
        // 이름의 타임스탬프가 유지되므로 생성 시각도 같음
        assert_eq!(record.creation_date(), created);

        record.set_archived(false).expect("Test assertion failed");
        assert_eq!(record.path(), path.as_path());
    }

    #[test]
    fn test_reset_reloads_size() {
        let dir = TempDir::new().expect("Test assertion failed");
        let path = dir.path().join("a.log");
        fs::write(&path, b"12").expect("Test assertion failed");

        let mut record = FileRecord::new(&path);
        assert_eq!(record.size(), 2);
        fs::write(&path, b"12345").expect("Test assertion failed");
        assert_eq!(record.size(), 2);
        record.reset();
        assert_eq!(record.size(), 5);
    }

    #[test]
    fn test_newest_first_ordering() {
        let dir = TempDir::new().expect("Test assertion failed");
        let older = dir.path().join("app 2024-01-01 00-00-00-000.log");
        let newer = dir.path().join("app 2024-01-02 00-00-00-000.log");
        fs::write(&older, b"").expect("Test assertion failed");
        fs::write(&newer, b"").expect("Test assertion failed");

        let mut records = vec![FileRecord::new(&older), FileRecord::new(&newer)];
        records.sort_by(|a, b| a.reverse_compare_by_creation_date(b));
        assert_eq!(records[0].path(), newer.as_path());
    }
}
