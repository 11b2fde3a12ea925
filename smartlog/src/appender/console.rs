//! 콘솔 어펜더
//!
//! 포매팅된 메시지를 표준 에러로 출력합니다. 상태가 없는 단순 출력기입니다.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::appender::{Appender, AppenderCore};
use crate::event::LogEvent;
use crate::formatter::DefaultFormatter;

/// 표준 에러 출력 어펜더
pub struct ConsoleAppender {
    core: AppenderCore,
    automatically_append_newline: AtomicBool,
}

impl ConsoleAppender {
    /// 터미널이면 색상 텍스트 포매터를 사용하는 콘솔 어펜더 생성
    pub fn new() -> Self {
        let colored = io::stderr().is_terminal();
        Self {
            core: AppenderCore::with_formatter("console", Box::new(DefaultFormatter::text(colored))),
            automatically_append_newline: AtomicBool::new(true),
        }
    }

    /// 줄바꿈 자동 추가 여부 (기본값: true)
    pub fn set_automatically_append_newline(&self, enabled: bool) {
        self.automatically_append_newline.store(enabled, Ordering::Relaxed);
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn write(&self, formatted: &str, _event: &LogEvent) {
        let mut stderr = io::stderr().lock();
        let newline = self.automatically_append_newline.load(Ordering::Relaxed) && !formatted.ends_with('\n');
        // 콘솔 출력 실패는 보고할 곳이 없으므로 무시
        let _ = stderr.write_all(formatted.as_bytes());
        if newline {
            let _ = stderr.write_all(b"\n");
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
