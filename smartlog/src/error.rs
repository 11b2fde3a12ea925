//! 로깅 프레임워크 에러 정의
//!
//! 파일 시스템과 맞닿은 연산(파일 생성, 이름 변경, 압축)만 에러를 반환합니다.
//! `log` / `flush` 호출 경로로는 절대 전파되지 않으며, 어펜더 경계에서 흡수됩니다.

use std::io;
use std::path::PathBuf;

/// 로깅 연산 결과 타입
pub type Result<T> = std::result::Result<T, LogError>;

/// 로깅 프레임워크 에러
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] io::Error),

    /// 로그 디렉토리 생성 실패
    #[error("로그 디렉토리 생성 실패 ({path}): {source}")]
    CreateDirectory {
        /// 생성하려던 경로
        path: PathBuf,
        /// 원인 에러
        source: io::Error,
    },

    /// 로그 파일 순환 실패
    #[error("로그 파일 순환 실패: {0}")]
    Rotation(String),

    /// 보관 파일 압축 실패
    #[error("로그 파일 압축 실패 ({path}): {reason}")]
    Compression {
        /// 압축 대상 파일
        path: PathBuf,
        /// 실패 사유
        reason: String,
    },

    /// 설정 오류
    #[error("설정 오류: {0}")]
    Configuration(String),
}
