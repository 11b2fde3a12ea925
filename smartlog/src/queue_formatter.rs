//! 실행 컨텍스트 라벨을 덧붙이는 포매터
//!
//! 기반 포매터의 출력 앞에 이벤트를 만든 스레드/큐의 라벨을 붙입니다.
//! 내부 라벨(예: 전역 조정 큐 이름)은 사용자가 등록한 짧은 별칭으로 치환됩니다.
//!
//! # 모드
//! - [`QueueFormatterMode::Shared`]: 하나의 인스턴스(및 그 복제본)를 여러 어펜더에
//!   동시에 붙일 때 사용합니다. 라벨 테이블이 `RwLock`으로 보호됩니다.
//! - [`QueueFormatterMode::Alone`]: 어펜더 하나에만 붙입니다. 라벨 테이블은 그 어펜더의
//!   큐에서만 바뀌므로 잠금을 쓰지 않습니다. 복제하면 독립된 테이블을 갖지만, 복제본을
//!   다른 어펜더에 붙이면 경고를 남깁니다.
//!
//! 기반 포매터는 두 모드 모두 복제본끼리 공유됩니다.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::dispatcher::GLOBAL_QUEUE_LABEL;
use crate::event::LogEvent;
use crate::formatter::{DefaultFormatter, Formatter};

/// 라벨 테이블 공유 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueFormatterMode {
    /// 여러 어펜더에서 동시에 사용 (스레드 안전)
    Shared,
    /// 단일 어펜더 전용 (잠금 없음)
    Alone,
}

#[derive(Debug, Clone, Default)]
struct LabelTable {
    replacements: HashMap<String, String>,
    min_length: usize,
    max_length: usize,
}

impl LabelTable {
    fn with_defaults() -> Self {
        let mut table = Self::default();
        table
            .replacements
            .insert(GLOBAL_QUEUE_LABEL.to_string(), "global".to_string());
        table
    }

    /// 치환과 길이 제한을 적용한 라벨
    fn render(&self, label: &str) -> String {
        let mut rendered = self
            .replacements
            .get(label)
            .cloned()
            .unwrap_or_else(|| label.to_string());

        if self.max_length > 0 && rendered.chars().count() > self.max_length {
            rendered = rendered.chars().take(self.max_length).collect();
        }
        let len = rendered.chars().count();
        if len < self.min_length {
            rendered.push_str(&" ".repeat(self.min_length - len));
        }
        rendered
    }
}

enum Labels {
    Shared(Arc<RwLock<LabelTable>>),
    Alone(LabelTable),
}

/// 복제본끼리 공유하는 기반 포매터와 연결 목록
struct Decorated {
    base: Box<dyn Formatter>,
    attached_to: Vec<String>,
}

/// 큐 라벨 접두 포매터
///
/// 기반 포매터는 모든 복제본이 함께 씁니다.
pub struct QueueFormatter {
    labels: Labels,
    decorated: Arc<Mutex<Decorated>>,
}

impl QueueFormatter {
    /// 모드를 지정해 생성 (기반 포매터는 메시지 통과)
    pub fn new(mode: QueueFormatterMode) -> Self {
        Self::with_base(mode, Box::new(DefaultFormatter::passthrough()))
    }

    /// 기반 포매터를 감싸는 포매터 생성
    pub fn with_base(mode: QueueFormatterMode, base: Box<dyn Formatter>) -> Self {
        let table = LabelTable::with_defaults();
        let labels = match mode {
            QueueFormatterMode::Shared => Labels::Shared(Arc::new(RwLock::new(table))),
            QueueFormatterMode::Alone => Labels::Alone(table),
        };
        Self {
            labels,
            decorated: Arc::new(Mutex::new(Decorated {
                base,
                attached_to: Vec::new(),
            })),
        }
    }

    /// 여러 어펜더가 함께 쓰는 포매터
    pub fn shared() -> Self {
        Self::new(QueueFormatterMode::Shared)
    }

    /// 한 어펜더 전용 포매터
    pub fn alone() -> Self {
        Self::new(QueueFormatterMode::Alone)
    }

    pub fn mode(&self) -> QueueFormatterMode {
        match self.labels {
            Labels::Shared(_) => QueueFormatterMode::Shared,
            Labels::Alone(_) => QueueFormatterMode::Alone,
        }
    }

    /// 라벨 별칭 등록
    ///
    /// 예: `"smartlog.global"` → `"global"`, `"main"` → `"M"`.
    /// 공유 모드에서는 모든 복제본에 즉시 반영됩니다.
    pub fn set_replacement_label(&mut self, long_label: impl Into<String>, short_label: impl Into<String>) {
        let (long_label, short_label) = (long_label.into(), short_label.into());
        self.update(|table| {
            table.replacements.insert(long_label, short_label);
        });
    }

    /// 라벨 최소 길이 (짧으면 공백으로 채움, 0 = 제한 없음)
    pub fn set_min_queue_length(&mut self, length: usize) {
        self.update(|table| table.min_length = length);
    }

    /// 라벨 최대 길이 (길면 자름, 0 = 제한 없음)
    pub fn set_max_queue_length(&mut self, length: usize) {
        self.update(|table| table.max_length = length);
    }

    /// 이벤트의 표시용 라벨
    pub fn queue_label(&self, event: &LogEvent) -> String {
        match &self.labels {
            Labels::Shared(table) => table.read().render(event.queue_label()),
            Labels::Alone(table) => table.render(event.queue_label()),
        }
    }

    /// 이 포매터(와 복제본)가 연결된 어펜더 이름
    pub fn attached_appenders(&self) -> Vec<String> {
        self.decorated.lock().attached_to.clone()
    }

    fn update(&mut self, apply: impl FnOnce(&mut LabelTable)) {
        match &mut self.labels {
            Labels::Shared(table) => apply(&mut table.write()),
            Labels::Alone(table) => apply(table),
        }
    }
}

impl Clone for QueueFormatter {
    /// 공유 모드는 라벨 테이블을 공유하고, 단독 모드는 깊은 복사합니다.
    fn clone(&self) -> Self {
        let labels = match &self.labels {
            Labels::Shared(table) => Labels::Shared(table.clone()),
            Labels::Alone(table) => Labels::Alone(table.clone()),
        };
        Self {
            labels,
            decorated: self.decorated.clone(),
        }
    }
}

impl Formatter for QueueFormatter {
    fn format(&mut self, event: &LogEvent) -> Option<String> {
        let text = self.decorated.lock().base.format(event)?;
        Some(format!("[{}] {}", self.queue_label(event), text))
    }

    fn did_add_to_appender(&mut self, appender_name: &str) {
        let mode = self.mode();
        let mut decorated = self.decorated.lock();
        if mode == QueueFormatterMode::Alone {
            if let Some(previous) = decorated.attached_to.iter().find(|name| *name != appender_name) {
                warn!(
                    previous = %previous,
                    appender = %appender_name,
                    "단독 모드 큐 포매터가 두 번째 어펜더에 연결됨"
                );
            }
        }
        decorated.attached_to.push(appender_name.to_string());
        decorated.base.did_add_to_appender(appender_name);
    }

    fn will_remove_from_appender(&mut self, appender_name: &str) {
        let mut decorated = self.decorated.lock();
        if let Some(index) = decorated.attached_to.iter().position(|name| name == appender_name) {
            decorated.attached_to.remove(index);
        }
        decorated.base.will_remove_from_appender(appender_name);
    }
}
