//! 로그 파일 저장소
//!
//! 디렉토리 안의 로그 파일을 나열, 정렬, 생성하고 보관 정책(최대 파일 수, 디스크 할당량)을
//! 적용합니다. 파일 어펜더는 [`FileStore`] 트레이트를 통해서만 파일 시스템에 접근합니다.

pub mod compress;
pub mod default;
pub mod record;

pub use compress::{gzip_compress, gzip_decompress, CompressFn, CompressingFileStore};
pub use default::DefaultFileStore;
pub use record::FileRecord;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

/// 보관 정책 적용 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// 삭제된 파일
    pub deleted: Vec<PathBuf>,
    /// 삭제하지 못한 파일 (다음 정리 때 다시 시도됨)
    pub failed: Vec<PathBuf>,
}

impl RetentionReport {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.failed.is_empty()
    }
}

/// 로그 파일 저장소 인터페이스
///
/// 구현체는 파일 목록과 생성만 제공하면 되고, 정렬된 조회와 보관 정책은 기본 구현을 씁니다.
/// 보관 훅은 파일 하나당 정확히 한 번, 보관 정책이 그 파일을 검사하기 전에 동기적으로 호출됩니다.
pub trait FileStore: Send + Sync {
    /// 로그 디렉토리
    fn logs_directory(&self) -> &Path;

    /// 보관 파일 최대 개수 (0 = 제한 없음)
    fn maximum_number_of_log_files(&self) -> usize;

    fn set_maximum_number_of_log_files(&self, count: usize);

    /// 보관 파일 전체 크기 제한 (바이트, 0 = 제한 없음)
    fn log_files_disk_quota(&self) -> u64;

    fn set_log_files_disk_quota(&self, quota: u64);

    /// 관리 대상 로그 파일 경로 (순서 없음)
    fn unsorted_log_file_paths(&self) -> Vec<PathBuf>;

    /// 새 로그 파일 생성 후 경로 반환
    fn create_new_log_file(&self) -> Result<PathBuf>;

    /// 기존 파일이 보관 처리된 직후 호출 (열 때 재사용하지 않기로 한 파일)
    fn did_archive_log_file(&self, _path: &Path) {}

    /// 순환으로 현재 파일이 보관 처리된 직후 호출
    fn did_roll_and_archive_log_file(&self, _path: &Path) {}

    fn unsorted_log_file_names(&self) -> Vec<String> {
        self.unsorted_log_file_records()
            .into_iter()
            .map(|record| record.file_name().to_string())
            .collect()
    }

    fn unsorted_log_file_records(&self) -> Vec<FileRecord> {
        self.unsorted_log_file_paths()
            .into_iter()
            .map(FileRecord::new)
            .collect()
    }

    /// 최신 생성 순 경로
    fn sorted_log_file_paths(&self) -> Vec<PathBuf> {
        self.sorted_log_file_records()
            .into_iter()
            .map(|record| record.path().to_path_buf())
            .collect()
    }

    /// 최신 생성 순 파일 이름
    fn sorted_log_file_names(&self) -> Vec<String> {
        self.sorted_log_file_records()
            .into_iter()
            .map(|record| record.file_name().to_string())
            .collect()
    }

    /// 최신 생성 순 레코드 (생성 시각이 같으면 최신 수정 순)
    fn sorted_log_file_records(&self) -> Vec<FileRecord> {
        let mut records = self.unsorted_log_file_records();
        records.sort_by(|a, b| a.reverse_compare_by_creation_date(b));
        records
    }

    /// 보관 정책에 따라 오래된 파일 삭제
    ///
    /// `active`로 지정된 파일은 검사 대상에서 제외됩니다. 삭제 실패는 기록만 하고
    /// 나머지 파일 정리를 계속합니다.
    fn delete_old_log_files(&self, active: Option<&Path>) -> RetentionReport {
        let records: Vec<FileRecord> = self
            .sorted_log_file_records()
            .into_iter()
            .filter(|record| active != Some(record.path()))
            .collect();

        let sizes: Vec<u64> = records.iter().map(FileRecord::size).collect();
        let cut = retention_cut(
            &sizes,
            self.maximum_number_of_log_files(),
            self.log_files_disk_quota(),
        );

        let mut report = RetentionReport::default();
        for record in records.iter().skip(cut) {
            match fs::remove_file(record.path()) {
                Ok(()) => {
                    debug!(path = %record.path().display(), "오래된 로그 파일 삭제됨");
                    report.deleted.push(record.path().to_path_buf());
                }
                Err(e) => {
                    warn!(
                        path = %record.path().display(),
                        error = %e,
                        "로그 파일 삭제 실패"
                    );
                    report.failed.push(record.path().to_path_buf());
                }
            }
        }

        if !report.is_empty() {
            debug!(
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                kept = cut,
                "로그 파일 보관 정책 적용 완료"
            );
        }
        report
    }
}

/// 최신 순 크기 목록에서 보관할 파일 개수 계산
///
/// 개수 제한을 먼저 적용하고, 누적 크기가 할당량을 넘는 지점부터 잘라냅니다.
/// 가장 최신 파일 하나는 혼자 할당량을 넘더라도 남깁니다.
pub(crate) fn retention_cut(sizes_newest_first: &[u64], max_files: usize, disk_quota: u64) -> usize {
    let mut cut = sizes_newest_first.len();
    if max_files > 0 {
        cut = cut.min(max_files);
    }

    if disk_quota > 0 {
        let mut total: u64 = 0;
        for (index, size) in sizes_newest_first.iter().take(cut).enumerate() {
            total = total.saturating_add(*size);
            if total > disk_quota {
                cut = index.max(1);
                break;
            }
        }
    }
    cut
}
