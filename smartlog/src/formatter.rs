//! 로그 포매터
//!
//! 이벤트를 한 줄의 문자열로 변환합니다. `None`을 반환하면 해당 이벤트는 출력되지 않습니다.

use serde_json::json;
use tracing::warn;

use crate::event::LogEvent;
use crate::queue::LoggingQueue;

/// 포매터 인터페이스
///
/// 포매터는 자신이 붙은 어펜더의 큐 위에서만 호출되므로 `&mut self`를 받습니다.
/// 여러 어펜더가 상태를 공유해야 한다면 구현체가 직접 동기화해야 합니다
/// ([`QueueFormatter::shared`](crate::QueueFormatter::shared) 참고).
pub trait Formatter: Send {
    /// 이벤트 포매팅 (`None`이면 출력 생략)
    fn format(&mut self, event: &LogEvent) -> Option<String>;

    /// 어펜더에 연결된 직후 호출
    fn did_add_to_appender(&mut self, _appender_name: &str) {}

    /// 어펜더에 연결된 직후 호출 (어펜더의 큐 정보 포함)
    fn did_add_to_appender_in_queue(&mut self, appender_name: &str, _queue: &LoggingQueue) {
        self.did_add_to_appender(appender_name);
    }

    /// 어펜더에서 분리되기 직전 호출
    fn will_remove_from_appender(&mut self, _appender_name: &str) {}
}

/// 기본 포매터 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStyle {
    /// 메시지를 그대로 통과
    Passthrough,
    /// `타임스탬프 [레벨] [태그] 메시지` 텍스트 형식
    Text {
        /// ANSI 색상 출력 여부
        colored: bool,
    },
    /// 한 줄 JSON
    Json,
}

/// 기본 포매터
#[derive(Debug, Clone)]
pub struct DefaultFormatter {
    style: FormatStyle,
}

impl DefaultFormatter {
    /// 지정된 형식으로 포매터 생성
    pub fn new(style: FormatStyle) -> Self {
        Self { style }
    }

    /// 메시지를 그대로 통과시키는 포매터
    pub fn passthrough() -> Self {
        Self::new(FormatStyle::Passthrough)
    }

    /// 텍스트 포매터
    pub fn text(colored: bool) -> Self {
        Self::new(FormatStyle::Text { colored })
    }

    /// JSON 포매터
    pub fn json() -> Self {
        Self::new(FormatStyle::Json)
    }

    pub fn style(&self) -> FormatStyle {
        self.style
    }

    /// JSON 형식으로 포매팅
    fn format_json(&self, event: &LogEvent) -> Option<String> {
        let value = json!({
            "timestamp": event.timestamp().to_rfc3339(),
            "level": event.flag().as_str(),
            "message": event.message(),
            "tag": event.tag(),
            "file": event.file_name(),
            "function": event.function(),
            "line": event.line(),
            "thread": event.thread_id(),
            "queue": event.queue_label(),
        });

        match serde_json::to_string(&value) {
            Ok(json_str) => Some(json_str),
            Err(e) => {
                warn!(error = %e, "로그 이벤트 JSON 직렬화 실패");
                None
            }
        }
    }

    /// 텍스트 형식으로 포매팅
    fn format_text(&self, event: &LogEvent, colored: bool) -> String {
        let timestamp = event.timestamp().format("%Y-%m-%d %H:%M:%S%.3f");
        let flag = event.flag();
        let level_str = if colored {
            format!(
                "{}[{}]{}{}",
                flag.color_code(),
                flag.as_str(),
                "\x1b[0m", // 색상 리셋
                " ".repeat(5 - flag.as_str().len()) // 정렬용 패딩
            )
        } else {
            format!("[{}]", flag.as_str())
        };

        let mut formatted = format!("{} {}", timestamp, level_str);
        if let Some(tag) = event.tag() {
            formatted.push_str(&format!(" [{}]", tag));
        }
        formatted.push(' ');
        formatted.push_str(event.message());
        formatted
    }
}

impl Default for DefaultFormatter {
    fn default() -> Self {
        Self::passthrough()
    }
}

impl Formatter for DefaultFormatter {
    fn format(&mut self, event: &LogEvent) -> Option<String> {
        match self.style {
            FormatStyle::Passthrough => Some(event.message().to_string()),
            FormatStyle::Text { colored } => Some(self.format_text(event, colored)),
            FormatStyle::Json => self.format_json(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LogFlag;

    fn sample_event() -> LogEvent {
        LogEvent::new(
            "Test message",
            LogFlag::Info,
            "src/lib.rs",
            Some("main"),
            7,
            Some("boot"),
        )
    }

    #[test]
    fn test_passthrough() {
        let mut formatter = DefaultFormatter::passthrough();
        assert_eq!(formatter.format(&sample_event()).as_deref(), Some("Test message"));
    }

    #[test]
    fn test_formatter_text() {
        let mut formatter = DefaultFormatter::text(false);
        let formatted = formatter.format(&sample_event()).expect("Test assertion failed");

        assert!(formatted.contains("[INFO]"));
        assert!(formatted.contains("[boot]"));
        assert!(formatted.ends_with("Test message"));
        let current_year = chrono::Local::now().format("%Y").to_string();
        assert!(formatted.starts_with(&current_year));
    }

    #[test]
    fn test_formatter_colored_text() {
        let mut formatter = DefaultFormatter::text(true);
        let formatted = formatter.format(&sample_event()).expect("Test assertion failed");
        assert!(formatted.contains("\x1b[32m[INFO]\x1b[0m"));
    }

    #[test]
    fn test_formatter_json() {
        let mut formatter = DefaultFormatter::json();
        let formatted = formatter.format(&sample_event()).expect("Test assertion failed");

        let parsed: serde_json::Value = serde_json::from_str(&formatted).expect("Test assertion failed");
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["message"], "Test message");
        assert_eq!(parsed["tag"], "boot");
        assert_eq!(parsed["file"], "lib.rs");
        assert_eq!(parsed["line"], 7);
        assert!(parsed["timestamp"].is_string());
    }
}
