//! 비동기 다중 출력 로깅 라이브러리
//!
//! 여러 스레드에서 발생한 로그 이벤트를 레벨 마스크에 따라 여러 어펜더로 분배합니다.
//! 각 어펜더는 전용 직렬 큐에서 포매팅과 출력을 수행합니다.
//!
//! # 주요 기능
//!
//! - **레벨 마스크 분배**: 어펜더별 `ERROR < WARNING < INFO < DEBUG` 마스크 필터링
//! - **동기/비동기 기록**: 에러는 모든 어펜더가 기록을 마칠 때까지 대기
//! - **파일 순환**: 크기, 주기, 명시적 요청에 따른 로그 파일 순환
//! - **보관 정책**: 최대 파일 수와 디스크 할당량 적용
//! - **보관 파일 압축**: gzip 또는 사용자 지정 압축 함수
//!
//! # 아키텍처
//!
//! ```text
//! SmartLogger (facade)
//! ├── Dispatcher (조정 큐 + 어펜더 목록 스냅샷)
//! │   └── AppenderNode (어펜더, 레벨 마스크)
//! ├── Appender (어펜더별 LoggingQueue)
//! │   ├── ConsoleAppender (표준 에러)
//! │   ├── FileAppender (순환 상태 기계)
//! │   └── MemoryAppender (테스트/진단)
//! ├── Formatter
//! │   ├── DefaultFormatter (통과, 텍스트, JSON)
//! │   └── QueueFormatter (큐 라벨 접두, Shared/Alone)
//! └── FileStore
//!     ├── DefaultFileStore (이름 규칙, 보관 정책)
//!     └── CompressingFileStore (보관 시 압축)
//! ```
//!
//! # 사용 예시
//!
//! ```no_run
//! use smartlog::{log_error, log_info, FileLoggerConfig, SmartLogger};
//!
//! let logger = SmartLogger::new(FileLoggerConfig {
//!     max_number_of_files: 5,
//!     ..FileLoggerConfig::default()
//! });
//! log_info!(logger: &logger, tag: "boot", "서버 시작됨: 포트 {}", 8080);
//! log_error!(logger: &logger, "연결 실패");
//! logger.flush();
//! ```

pub mod appender;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod facade;
pub mod formatter;
pub mod queue;
pub mod queue_formatter;
pub mod store;

pub use appender::{
    is_on_global_logging_queue, Appender, AppenderCore, ConsoleAppender, FileAppender,
    MemoryAppender,
};
pub use appender::file::ArchivePredicate;
pub use config::FileLoggerConfig;
pub use dispatcher::{Dispatcher, GLOBAL_QUEUE_LABEL};
pub use error::{LogError, Result};
pub use event::{LogEvent, LogFlag, LogLevel};
pub use facade::{init_logging, shared, SmartLogger};
pub use formatter::{DefaultFormatter, FormatStyle, Formatter};
pub use queue::LoggingQueue;
pub use queue_formatter::{QueueFormatter, QueueFormatterMode};
pub use store::{
    gzip_compress, gzip_decompress, CompressFn, CompressingFileStore, DefaultFileStore,
    FileRecord, FileStore, RetentionReport,
};
