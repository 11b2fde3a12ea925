//! 메모리 내 어펜더
//!
//! 포매팅된 로그를 메모리에 보관합니다. 테스트와 진단 화면에서 사용합니다.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::appender::{Appender, AppenderCore};
use crate::event::{LogEvent, LogFlag};
use crate::formatter::Formatter;

/// 메모리 내 어펜더
pub struct MemoryAppender {
    core: AppenderCore,
    /// 로그 항목들 (포매팅된 문자열, 플래그)
    entries: Mutex<Vec<(String, LogFlag)>>,
    flushes: AtomicUsize,
}

impl MemoryAppender {
    /// 새 메모리 어펜더 생성 (포매터 없음)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: AppenderCore::new(name),
            entries: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
        }
    }

    /// 포매터를 지정해 생성
    pub fn with_formatter(name: impl Into<String>, formatter: Box<dyn Formatter>) -> Self {
        Self {
            core: AppenderCore::with_formatter(name, formatter),
            entries: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
        }
    }

    /// 모든 로그 항목 반환
    pub fn get_logs(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(line, _)| line.clone()).collect()
    }

    /// 받은 이벤트의 플래그 목록
    pub fn flags(&self) -> Vec<LogFlag> {
        self.entries.lock().iter().map(|(_, flag)| *flag).collect()
    }

    /// 로그 개수 반환
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// 로그가 비어있는지 확인
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 로그 지우기
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// `flush` 호출 횟수
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Appender for MemoryAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn write(&self, formatted: &str, event: &LogEvent) {
        self.entries.lock().push((formatted.to_string(), event.flag()));
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }
}
