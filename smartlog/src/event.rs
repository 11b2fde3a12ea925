//! 로그 이벤트와 심각도 정의
//!
//! 이벤트는 호출 지점에서 한 번 생성된 뒤 변경되지 않으며,
//! 각 어펜더의 큐로 값 복사되어 전달됩니다.

use chrono::{DateTime, Local};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::queue::LoggingQueue;

/// 단일 심각도 비트
///
/// 이벤트 하나는 항상 정확히 하나의 플래그를 가집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum LogFlag {
    /// 오류
    Error = 1 << 0,
    /// 경고
    Warning = 1 << 1,
    /// 일반 정보
    Info = 1 << 2,
    /// 디버깅 정보
    Debug = 1 << 4,
}

impl LogFlag {
    /// 비트 값
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// 플래그를 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFlag::Error => "ERROR",
            LogFlag::Warning => "WARN",
            LogFlag::Info => "INFO",
            LogFlag::Debug => "DEBUG",
        }
    }

    /// ANSI 색상 코드 반환
    pub fn color_code(&self) -> &'static str {
        match self {
            LogFlag::Error => "\x1b[31m",   // 빨간색
            LogFlag::Warning => "\x1b[33m", // 노란색
            LogFlag::Info => "\x1b[32m",    // 녹색
            LogFlag::Debug => "\x1b[36m",   // 청록색
        }
    }
}

impl fmt::Display for LogFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 허용 플래그들의 합집합 (비트마스크)
///
/// 상위 레벨은 하위 레벨을 모두 포함합니다: `OFF < ERROR < WARNING < INFO < DEBUG`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogLevel(u32);

impl LogLevel {
    pub const OFF: LogLevel = LogLevel(0);
    pub const ERROR: LogLevel = LogLevel(LogFlag::Error as u32);
    pub const WARNING: LogLevel = LogLevel(Self::ERROR.0 | LogFlag::Warning as u32);
    pub const INFO: LogLevel = LogLevel(Self::WARNING.0 | LogFlag::Info as u32);
    pub const DEBUG: LogLevel = LogLevel(Self::INFO.0 | LogFlag::Debug as u32);
    pub const ALL: LogLevel = LogLevel(u32::MAX);

    /// 임의의 비트마스크로 레벨 생성
    ///
    /// 예: 디버그만 제외하려면 `LogLevel::from_bits(LogLevel::ALL.bits() ^ LogFlag::Debug.bits())`
    pub const fn from_bits(bits: u32) -> Self {
        LogLevel(bits)
    }

    /// 비트 값
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// 해당 플래그가 이 마스크에 포함되는지 확인
    #[inline]
    pub fn contains(self, flag: LogFlag) -> bool {
        self.0 & flag.bits() != 0
    }

    /// 아무 플래그도 허용하지 않는지 확인
    pub fn is_off(self) -> bool {
        self.0 == 0
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::ALL
    }
}

impl From<LogFlag> for LogLevel {
    /// 플래그와 그보다 덜 심각한 모든 플래그의 합집합
    fn from(flag: LogFlag) -> Self {
        match flag {
            LogFlag::Error => LogLevel::ERROR,
            LogFlag::Warning => LogLevel::WARNING,
            LogFlag::Info => LogLevel::INFO,
            LogFlag::Debug => LogLevel::DEBUG,
        }
    }
}

impl BitOr<LogFlag> for LogLevel {
    type Output = LogLevel;

    fn bitor(self, rhs: LogFlag) -> LogLevel {
        LogLevel(self.0 | rhs.bits())
    }
}

impl BitOr for LogLevel {
    type Output = LogLevel;

    fn bitor(self, rhs: LogLevel) -> LogLevel {
        LogLevel(self.0 | rhs.0)
    }
}

impl BitOrAssign<LogFlag> for LogLevel {
    fn bitor_assign(&mut self, rhs: LogFlag) {
        self.0 |= rhs.bits();
    }
}

impl fmt::Debug for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LogLevel::OFF => f.write_str("LogLevel::OFF"),
            LogLevel::ERROR => f.write_str("LogLevel::ERROR"),
            LogLevel::WARNING => f.write_str("LogLevel::WARNING"),
            LogLevel::INFO => f.write_str("LogLevel::INFO"),
            LogLevel::DEBUG => f.write_str("LogLevel::DEBUG"),
            LogLevel::ALL => f.write_str("LogLevel::ALL"),
            LogLevel(bits) => write!(f, "LogLevel({bits:#b})"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    /// 레벨 이름 또는 10진수 비트마스크 파싱
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OFF" => Ok(LogLevel::OFF),
            "ERROR" => Ok(LogLevel::ERROR),
            "WARN" | "WARNING" => Ok(LogLevel::WARNING),
            "INFO" => Ok(LogLevel::INFO),
            "DEBUG" => Ok(LogLevel::DEBUG),
            "ALL" => Ok(LogLevel::ALL),
            other => other.parse::<u32>().map(LogLevel).map_err(|_| ()),
        }
    }
}

/// 불변 로그 이벤트
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    message: String,
    level: LogLevel,
    flag: LogFlag,
    file: String,
    #[serde(skip)]
    file_name: OnceCell<String>,
    function: Option<String>,
    line: u32,
    tag: Option<String>,
    timestamp: DateTime<Local>,
    thread_id: String,
    thread_name: Option<String>,
    queue_label: String,
    #[serde(skip)]
    no_formatter: bool,
}

impl LogEvent {
    /// 새 로그 이벤트 생성
    ///
    /// 스레드 정보와 큐 라벨은 반드시 생산자 스레드에서 캡처되어야 하므로
    /// 생성 시점에 기록합니다.
    pub fn new(
        message: impl Into<String>,
        flag: LogFlag,
        file: impl Into<String>,
        function: Option<&str>,
        line: u32,
        tag: Option<&str>,
    ) -> Self {
        let current = std::thread::current();
        let thread_id = format!("{:?}", current.id());
        let thread_name = current.name().map(str::to_string);
        let queue_label = LoggingQueue::current_label()
            .map(|label| label.to_string())
            .or_else(|| thread_name.clone())
            .unwrap_or_else(|| thread_id.clone());

        Self {
            message: message.into(),
            level: LogLevel::from(flag),
            flag,
            file: file.into(),
            file_name: OnceCell::new(),
            function: function.map(str::to_string),
            line,
            tag: tag.map(str::to_string),
            timestamp: Local::now(),
            thread_id,
            thread_name,
            queue_label,
            no_formatter: false,
        }
    }

    /// 간단한 이벤트 생성 (위치 정보 없음, INFO 플래그)
    pub fn brief(message: impl Into<String>, tag: Option<&str>) -> Self {
        Self::new(message, LogFlag::Info, "", None, 0, tag)
    }

    /// 포매터를 거치지 않는 이벤트로 표시
    pub fn without_formatter(mut self) -> Self {
        self.no_formatter = true;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn flag(&self) -> LogFlag {
        self.flag
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// 소스 파일 경로의 마지막 구성 요소 (지연 계산)
    pub fn file_name(&self) -> &str {
        self.file_name.get_or_init(|| {
            self.file
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or_default()
                .to_string()
        })
    }

    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// 이벤트를 만든 실행 컨텍스트의 라벨
    pub fn queue_label(&self) -> &str {
        &self.queue_label
    }

    pub fn no_formatter(&self) -> bool {
        self.no_formatter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_is_union_of_less_severe_flags() {
        assert_eq!(LogLevel::from(LogFlag::Error), LogLevel::ERROR);
        assert!(LogLevel::WARNING.contains(LogFlag::Error));
        assert!(LogLevel::INFO.contains(LogFlag::Warning));
        assert!(!LogLevel::INFO.contains(LogFlag::Debug));
        assert!(LogLevel::DEBUG.contains(LogFlag::Info));
        assert!(!LogLevel::OFF.contains(LogFlag::Error));
        assert!(LogLevel::ALL.contains(LogFlag::Debug));
    }

    #[test]
    fn test_original_numeric_levels() {
        assert_eq!(LogLevel::DEBUG.bits(), 23);
        assert_eq!(LogLevel::INFO.bits(), 7);
        // 비트 3은 사용되지 않으므로 31과 DEBUG는 같은 플래그 집합을 허용
        let legacy = LogLevel::from_bits(31);
        for flag in [LogFlag::Error, LogFlag::Warning, LogFlag::Info, LogFlag::Debug] {
            assert_eq!(legacy.contains(flag), LogLevel::DEBUG.contains(flag));
        }
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("debug".parse(), Ok(LogLevel::DEBUG));
        assert_eq!("WARN".parse(), Ok(LogLevel::WARNING));
        assert_eq!("15".parse(), Ok(LogLevel::from_bits(15)));
        assert_eq!("verbose".parse::<LogLevel>(), Err(()));
    }

    #[test]
    fn test_custom_mask() {
        let mask = LogLevel::ERROR | LogFlag::Debug;
        assert!(mask.contains(LogFlag::Error));
        assert!(mask.contains(LogFlag::Debug));
        assert!(!mask.contains(LogFlag::Warning));
    }

    #[test]
    fn test_event_creation() {
        let event = LogEvent::new(
            "Test message",
            LogFlag::Warning,
            "src/net/socket.rs",
            Some("connect"),
            42,
            Some("net"),
        );

        assert_eq!(event.message(), "Test message");
        assert_eq!(event.flag(), LogFlag::Warning);
        assert_eq!(event.level(), LogLevel::WARNING);
        assert_eq!(event.file_name(), "socket.rs");
        assert_eq!(event.function(), Some("connect"));
        assert_eq!(event.line(), 42);
        assert_eq!(event.tag(), Some("net"));
        assert!(!event.thread_id().is_empty());
        assert!(!event.queue_label().is_empty());
        assert!(!event.no_formatter());
    }

    #[test]
    fn test_queue_label_falls_back_to_thread_name() {
        let handle = std::thread::Builder::new()
            .name("worker-7".to_string())
            .spawn(|| LogEvent::brief("hi", None))
            .expect("Test assertion failed");
        let event = handle.join().expect("Test assertion failed");
        assert_eq!(event.thread_name(), Some("worker-7"));
        assert_eq!(event.queue_label(), "worker-7");
    }
}
