//! 어펜더 (로그 출력 대상)
//!
//! 모든 어펜더는 전용 직렬 큐를 가지며, 포매팅과 출력은 그 큐 위에서만 일어납니다.

pub mod console;
pub mod file;
pub mod memory;

pub use console::ConsoleAppender;
pub use file::FileAppender;
pub use memory::MemoryAppender;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::dispatcher::GLOBAL_QUEUE_LABEL;
use crate::event::LogEvent;
use crate::formatter::Formatter;
use crate::queue::LoggingQueue;

/// 어펜더 인터페이스
///
/// 디스패처는 [`Appender::core`]가 제공하는 큐에 작업을 넣고,
/// 그 큐 위에서 포매터를 거친 문자열로 [`Appender::write`]를 호출합니다.
pub trait Appender: Send + Sync + 'static {
    /// 이름, 큐, 포매터를 담은 공통 상태
    fn core(&self) -> &AppenderCore;

    /// 포매팅된 메시지 출력 (어펜더 큐에서만 호출됨)
    fn write(&self, formatted: &str, event: &LogEvent);

    /// 디스패처에 등록된 직후 어펜더 큐에서 호출
    fn on_attached(&self) {}

    /// 디스패처에 등록된 직후 어펜더 큐에서 호출 (큐 정보 포함)
    fn on_attached_in(&self, _queue: &LoggingQueue) {
        self.on_attached();
    }

    /// 디스패처에서 제거되기 직전 어펜더 큐에서 호출
    fn on_detaching(&self) {}

    /// 버퍼링된 출력 비우기
    fn flush(&self) {}

    /// 진단용 이름
    fn name(&self) -> &str {
        self.core().name()
    }
}

/// 어펜더 공통 상태
pub struct AppenderCore {
    name: String,
    queue: LoggingQueue,
    formatter: Arc<Mutex<Option<Box<dyn Formatter>>>>,
    attached: Arc<AtomicBool>,
}

impl AppenderCore {
    /// 전용 큐(`smartlog.appender.<name>`)와 함께 생성
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let queue = LoggingQueue::new(format!("smartlog.appender.{name}"));
        Self {
            name,
            queue,
            formatter: Arc::new(Mutex::new(None)),
            attached: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 포매터를 지정해 생성
    pub fn with_formatter(name: impl Into<String>, formatter: Box<dyn Formatter>) -> Self {
        let core = Self::new(name);
        *core.formatter.lock() = Some(formatter);
        core
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> &LoggingQueue {
        &self.queue
    }

    /// 포매터 교체 (`None` = 메시지 통과)
    ///
    /// 교체는 어펜더 큐에서 일어나므로 이미 들어간 이벤트는 이전 포매터로 출력됩니다.
    /// 디스패처에 등록된 상태라면 이전 포매터에는 분리 훅, 새 포매터에는 연결 훅이
    /// 같은 큐에서 호출됩니다. 등록 전에 지정한 포매터의 연결 훅은 등록 시 한 번 호출됩니다.
    pub fn set_formatter(&self, formatter: Option<Box<dyn Formatter>>) {
        let slot = self.formatter.clone();
        let attached = self.attached.clone();
        let name = self.name.clone();
        let queue = self.queue.clone();

        self.queue.submit_and_wait(move || {
            let mut slot = slot.lock();
            let attached = attached.load(Ordering::SeqCst);
            if attached {
                if let Some(previous) = slot.as_mut() {
                    previous.will_remove_from_appender(&name);
                }
            }
            *slot = formatter;
            if attached {
                if let Some(current) = slot.as_mut() {
                    current.did_add_to_appender_in_queue(&name, &queue);
                }
            }
        });
    }

    /// 포매터가 설정되어 있는지 확인
    pub fn has_formatter(&self) -> bool {
        self.formatter.lock().is_some()
    }

    /// 이벤트 포매팅
    ///
    /// 포매터가 없거나 이벤트가 포매터 생략을 요구하면 메시지를 그대로 반환합니다.
    pub fn format(&self, event: &LogEvent) -> Option<String> {
        if event.no_formatter() {
            return Some(event.message().to_string());
        }
        match self.formatter.lock().as_mut() {
            Some(formatter) => formatter.format(event),
            None => Some(event.message().to_string()),
        }
    }

    /// 연결 훅을 현재 포매터에 전달
    pub(crate) fn notify_formatter_attached(&self) {
        self.attached.store(true, Ordering::SeqCst);
        if let Some(formatter) = self.formatter.lock().as_mut() {
            formatter.did_add_to_appender_in_queue(&self.name, &self.queue);
        }
    }

    /// 분리 훅을 현재 포매터에 전달
    pub(crate) fn notify_formatter_detaching(&self) {
        if let Some(formatter) = self.formatter.lock().as_mut() {
            formatter.will_remove_from_appender(&self.name);
        }
        self.attached.store(false, Ordering::SeqCst);
    }

    /// 현재 스레드가 이 어펜더의 큐인지 확인
    pub fn is_on_internal_queue(&self) -> bool {
        self.queue.is_current()
    }
}

/// 현재 스레드가 전역 조정 큐인지 확인
pub fn is_on_global_logging_queue() -> bool {
    LoggingQueue::current_label().is_some_and(|label| &*label == GLOBAL_QUEUE_LABEL)
}

/// 이벤트 하나를 어펜더에 전달 (어펜더 큐에서 실행)
pub(crate) fn deliver(appender: &dyn Appender, event: &LogEvent) {
    if let Some(formatted) = appender.core().format(event) {
        appender.write(&formatted, event);
    }
}
