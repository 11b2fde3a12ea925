//! 로거 진입점
//!
//! 디스패처, 콘솔 어펜더, 압축 저장소를 쓰는 파일 어펜더를 하나로 묶은 로거입니다.
//! 프로세스 전역 인스턴스는 [`shared`]로 얻고, 매크로(`log_error!` 등)는 이 인스턴스를 씁니다.

use anyhow::Context;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::appender::{Appender, ConsoleAppender, FileAppender};
use crate::config::FileLoggerConfig;
use crate::dispatcher::Dispatcher;
use crate::event::{LogEvent, LogFlag, LogLevel};
use crate::store::{CompressFn, CompressingFileStore, DefaultFileStore, FileStore};

static SHARED: Lazy<SmartLogger> = Lazy::new(|| SmartLogger::new(FileLoggerConfig::from_env()));

/// 환경변수 설정으로 만들어진 프로세스 전역 로거
pub fn shared() -> &'static SmartLogger {
    &SHARED
}

/// 설정을 검증한 뒤 로거 생성
///
/// # Examples
/// ```no_run
/// use smartlog::{init_logging, FileLoggerConfig};
///
/// fn main() -> anyhow::Result<()> {
///     let logger = init_logging(FileLoggerConfig::default())?;
///     smartlog::log_info!(logger: &logger, "서버 시작됨: {}", 8080);
///     logger.flush();
///     Ok(())
/// }
/// ```
pub fn init_logging(config: FileLoggerConfig) -> anyhow::Result<SmartLogger> {
    config.validate().context("로깅 설정 유효성 검증 실패")?;
    Ok(SmartLogger::new(config))
}

struct FileLogging {
    config: FileLoggerConfig,
    store: Arc<CompressingFileStore>,
    appender: Arc<FileAppender>,
}

impl FileLogging {
    fn build(config: FileLoggerConfig) -> Self {
        let store = Arc::new(CompressingFileStore::new(DefaultFileStore::new(
            config.directory.clone(),
        )));
        let appender = Arc::new(FileAppender::new(store.clone()));
        let file_logging = Self {
            config,
            store,
            appender,
        };
        file_logging.apply_limits();
        file_logging
    }

    fn apply_limits(&self) {
        self.store
            .set_maximum_number_of_log_files(self.config.max_number_of_files as usize);
        self.store.set_log_files_disk_quota(self.config.disk_quota);
        self.appender.set_maximum_file_size(self.config.max_file_size);
        self.appender.set_rolling_frequency(self.config.rolling_frequency);
    }
}

/// 로거
pub struct SmartLogger {
    dispatcher: Arc<Dispatcher>,
    console: Arc<ConsoleAppender>,
    file: RwLock<FileLogging>,
    global_level: AtomicU32,
    release: AtomicBool,
}

impl SmartLogger {
    /// 파일 어펜더(와 디버그 빌드에서는 콘솔 어펜더)가 등록된 로거 생성
    pub fn new(config: FileLoggerConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "로깅 설정이 올바르지 않음, 대체 디렉토리 사용");
        }

        let release = !cfg!(debug_assertions);
        let global_level = if release {
            LogLevel::INFO
        } else {
            LogLevel::DEBUG
        };

        let file = FileLogging::build(config.resolved());
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.add_appender_with_level(file.appender.clone(), file.config.level);

        let console = Arc::new(ConsoleAppender::new());
        if !release {
            dispatcher.add_appender(console.clone());
        }

        info!(
            directory = %file.store.logs_directory().display(),
            config = ?file.config,
            release,
            "로깅 시스템 초기화 완료"
        );

        Self {
            dispatcher,
            console,
            file: RwLock::new(file),
            global_level: AtomicU32::new(global_level.bits()),
            release: AtomicBool::new(release),
        }
    }

    /// 이벤트 기록
    ///
    /// `level`이 `flag`를 포함하지 않으면 메시지를 만들지 않고 건너뜁니다.
    #[allow(clippy::too_many_arguments)]
    pub fn log(
        &self,
        asynchronous: bool,
        level: LogLevel,
        flag: LogFlag,
        file: &str,
        function: &str,
        line: u32,
        tag: Option<&str>,
        args: fmt::Arguments<'_>,
    ) {
        if !level.contains(flag) {
            return;
        }

        let event = LogEvent::new(fmt::format(args), flag, file, Some(function), line, tag);
        self.dispatcher.log(event, asynchronous);
    }

    /// 포매터를 거치지 않고 메시지를 그대로 기록
    pub fn direct_log(&self, asynchronous: bool, tag: Option<&str>, message: impl Into<String>) {
        let event = LogEvent::brief(message, tag).without_formatter();
        self.dispatcher.log(event, asynchronous);
    }

    /// 모든 어펜더가 기록을 마칠 때까지 대기
    pub fn flush(&self) {
        self.dispatcher.flush();
    }

    /// 보관 파일 압축 설정
    ///
    /// 켜면 이미 보관된 파일들도 파일 어펜더 큐에서 압축합니다.
    pub fn toggle_compression(&self, enabled: bool) {
        let file = self.file.read();
        file.store.set_compression_enabled(enabled);
        if !enabled {
            return;
        }

        let store = file.store.clone();
        file.appender.core().queue().submit(move || {
            let compressed = store.compress_archived_files();
            if compressed > 0 {
                debug!(compressed, "기존 보관 로그 파일 압축 완료");
            }
        });
    }

    pub fn is_compression_enabled(&self) -> bool {
        self.file.read().store.is_compression_enabled()
    }

    /// 압축 함수 교체 (기본값: gzip)
    pub fn set_compress_fn(&self, compress: CompressFn) {
        self.file.read().store.set_compress_fn(compress);
    }

    /// 파일 로거 설정 변경
    ///
    /// 파일 어펜더는 새 레벨로 다시 등록됩니다. 디렉토리가 바뀌면 저장소와 어펜더를 새로 만들고
    /// 압축 설정은 그대로 옮깁니다.
    pub fn set_file_logger_config(&self, config: FileLoggerConfig) {
        let resolved = config.resolved();
        let mut file = self.file.write();

        if resolved.directory != file.config.directory {
            let rebuilt = FileLogging::build(resolved);
            rebuilt
                .store
                .set_compression_enabled(file.store.is_compression_enabled());
            rebuilt.store.set_compress_fn(file.store.compress_fn());

            self.dispatcher.remove_appender(&*file.appender);
            self.dispatcher
                .add_appender_with_level(rebuilt.appender.clone(), rebuilt.config.level);
            info!(
                directory = %rebuilt.store.logs_directory().display(),
                "로그 디렉토리 변경됨"
            );
            *file = rebuilt;
            return;
        }

        file.config = resolved;
        file.apply_limits();
        self.dispatcher
            .add_appender_with_level(file.appender.clone(), file.config.level);
        debug!(config = ?file.config, "파일 로거 설정 변경됨");
    }

    /// 현재 적용된 파일 로거 설정 (기본값이 채워진 상태)
    pub fn file_logger_config(&self) -> FileLoggerConfig {
        self.file.read().config.clone()
    }

    pub fn logs_directory(&self) -> PathBuf {
        self.file.read().store.logs_directory().to_path_buf()
    }

    /// 관리 중인 로그 파일 경로 (최신 순)
    pub fn log_files(&self) -> Vec<PathBuf> {
        self.file.read().store.sorted_log_file_paths()
    }

    /// 매크로가 사용하는 전역 레벨
    pub fn global_level(&self) -> LogLevel {
        LogLevel::from_bits(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level.bits(), Ordering::Relaxed);
    }

    pub fn is_release(&self) -> bool {
        self.release.load(Ordering::SeqCst)
    }

    /// 릴리스 모드 설정 (릴리스 모드에서는 콘솔 어펜더를 분리)
    pub fn set_release(&self, release: bool) {
        if self.release.swap(release, Ordering::SeqCst) == release {
            return;
        }

        if release {
            self.dispatcher.remove_appender(&*self.console);
        } else {
            self.dispatcher.add_appender(self.console.clone());
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn file_appender(&self) -> Arc<FileAppender> {
        self.file.read().appender.clone()
    }

    pub fn file_store(&self) -> Arc<CompressingFileStore> {
        self.file.read().store.clone()
    }
}

/// 전역 레벨을 확인한 뒤 기록 (매크로 내부용)
#[macro_export]
macro_rules! log_maybe {
    ($logger:expr, $async:expr, $flag:expr, $tag:expr, $($arg:tt)+) => {{
        let logger: &$crate::SmartLogger = $logger;
        logger.log(
            $async,
            logger.global_level(),
            $flag,
            file!(),
            module_path!(),
            line!(),
            $tag,
            format_args!($($arg)+),
        )
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __smartlog_event {
    ($async:expr, $flag:expr, logger: $logger:expr, tag: $tag:expr, $($arg:tt)+) => {
        $crate::log_maybe!($logger, $async, $flag, Some($tag), $($arg)+)
    };
    ($async:expr, $flag:expr, logger: $logger:expr, $($arg:tt)+) => {
        $crate::log_maybe!($logger, $async, $flag, None, $($arg)+)
    };
    ($async:expr, $flag:expr, tag: $tag:expr, $($arg:tt)+) => {
        $crate::log_maybe!($crate::shared(), $async, $flag, Some($tag), $($arg)+)
    };
    ($async:expr, $flag:expr, $($arg:tt)+) => {
        $crate::log_maybe!($crate::shared(), $async, $flag, None, $($arg)+)
    };
}

/// 에러 로그 (동기 기록)
///
/// `log_error!("실패: {}", e)`, `log_error!(tag: "net", "...")`,
/// `log_error!(logger: &logger, "...")` 형태를 지원합니다.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__smartlog_event!(false, $crate::LogFlag::Error, $($arg)+) };
}

/// 경고 로그 (비동기)
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)+) => { $crate::__smartlog_event!(true, $crate::LogFlag::Warning, $($arg)+) };
}

/// 정보 로그 (비동기)
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__smartlog_event!(true, $crate::LogFlag::Info, $($arg)+) };
}

/// 디버그 로그 (비동기)
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__smartlog_event!(true, $crate::LogFlag::Debug, $($arg)+) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::gzip_decompress;
    use std::fs;
    use tempfile::TempDir;

    fn logger_in(dir: &TempDir) -> SmartLogger {
        let logger = SmartLogger::new(FileLoggerConfig {
            directory: Some(dir.path().to_path_buf()),
            ..FileLoggerConfig::default()
        });
        logger.set_release(true);
        logger
    }

    fn file_contents(logger: &SmartLogger) -> String {
        logger
            .log_files()
            .iter()
            .filter(|path| !path.to_string_lossy().ends_with(".gz"))
            .map(|path| fs::read_to_string(path).expect("Test assertion failed"))
            .collect()
    }

    #[test]
    fn test_macros_write_through_file_appender() {
        let dir = TempDir::new().expect("Test assertion failed");
        let logger = logger_in(&dir);

        crate::log_error!(logger: &logger, "disk {} failed", "sda");
        crate::log_info!(logger: &logger, tag: "net", "connected to {}", 42);
        logger.flush();

        let contents = file_contents(&logger);
        assert!(contents.contains("[ERROR] disk sda failed"));
        assert!(contents.contains("[INFO] [net] connected to 42"));
    }

    #[test]
    fn test_global_level_gates_macros() {
        let dir = TempDir::new().expect("Test assertion failed");
        let logger = logger_in(&dir);
        logger.set_global_level(LogLevel::WARNING);

        crate::log_debug!(logger: &logger, "hidden debug");
        crate::log_info!(logger: &logger, "hidden info");
        crate::log_warn!(logger: &logger, "visible warning");
        logger.flush();

        let contents = file_contents(&logger);
        assert!(!contents.contains("hidden"));
        assert!(contents.contains("visible warning"));
    }

    #[test]
    fn test_direct_log_skips_formatter() {
        let dir = TempDir::new().expect("Test assertion failed");
        let logger = logger_in(&dir);

        logger.direct_log(false, Some("raw"), "exactly this");
        assert_eq!(file_contents(&logger), "exactly this\n");
    }

    #[test]
    fn test_file_level_filters_events() {
        let dir = TempDir::new().expect("Test assertion failed");
        let logger = logger_in(&dir);
        logger.set_file_logger_config(FileLoggerConfig {
            directory: Some(dir.path().to_path_buf()),
            level: LogLevel::ERROR,
            ..FileLoggerConfig::default()
        });
        assert_eq!(logger.dispatcher().appenders().len(), 1);

        crate::log_warn!(logger: &logger, "not stored");
        crate::log_error!(logger: &logger, "stored");
        logger.flush();

        let contents = file_contents(&logger);
        assert!(!contents.contains("not stored"));
        assert!(contents.contains("stored"));
    }

    #[test]
    fn test_release_mode_detaches_console() {
        let dir = TempDir::new().expect("Test assertion failed");
        let logger = logger_in(&dir);
        assert!(logger.is_release());
        assert_eq!(logger.dispatcher().appenders().len(), 1);

        logger.set_release(false);
        assert_eq!(logger.dispatcher().appenders().len(), 2);
        logger.set_release(false);
        assert_eq!(logger.dispatcher().appenders().len(), 2);
    }

    #[test]
    fn test_directory_change_rebuilds_store_and_keeps_compression() {
        let first = TempDir::new().expect("Test assertion failed");
        let second = TempDir::new().expect("Test assertion failed");
        let logger = logger_in(&first);
        logger.toggle_compression(true);
        crate::log_error!(logger: &logger, "in first");

        logger.set_file_logger_config(FileLoggerConfig {
            directory: Some(second.path().to_path_buf()),
            ..FileLoggerConfig::default()
        });
        crate::log_error!(logger: &logger, "in second");

        assert_eq!(logger.logs_directory(), second.path());
        assert!(logger.is_compression_enabled());
        assert_eq!(logger.dispatcher().appenders().len(), 1);
        assert!(file_contents(&logger).contains("in second"));
        assert!(!file_contents(&logger).contains("in first"));
    }

    #[test]
    fn test_toggle_compression_compresses_existing_archives() {
        let dir = TempDir::new().expect("Test assertion failed");
        let logger = logger_in(&dir);
        crate::log_error!(logger: &logger, "archived line");
        logger.file_appender().roll_log_file_and_wait();

        logger.toggle_compression(true);
        logger.file_appender().core().queue().drain();

        let files = logger.log_files();
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with(".archived.log.gz"));
        let content = gzip_decompress(&files[0]).expect("Test assertion failed");
        assert!(String::from_utf8_lossy(&content).contains("archived line"));
    }
}
