//! 로그 디스패처
//!
//! 등록된 어펜더 목록(어펜더, 레벨 마스크)을 관리하고 이벤트를 각 어펜더의 큐로 분배합니다.
//!
//! # 동시성
//! - 등록/해제는 조정 큐([`GLOBAL_QUEUE_LABEL`]) 하나에서 직렬화됩니다.
//! - 목록은 쓰기 시 복사되는 스냅샷이라 `log`는 변경 전 또는 변경 후 목록만 봅니다.
//! - `log`와 `flush`는 조정 큐를 거치지 않으므로 어펜더 콜백 안에서 호출해도 교착되지 않습니다.
//!   단, 자기 큐 위에서 호출하면 대기하지 않고 큐에 넣기만 합니다.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::appender::{deliver, Appender};
use crate::event::{LogEvent, LogLevel};
use crate::queue::{Completion, LoggingQueue};

/// 디스패처 조정 큐 라벨
pub const GLOBAL_QUEUE_LABEL: &str = "smartlog.global";

#[derive(Clone)]
struct AppenderNode {
    appender: Arc<dyn Appender>,
    level: LogLevel,
}

impl AppenderNode {
    fn id(&self) -> usize {
        appender_id(&*self.appender)
    }
}

type Registry = Arc<RwLock<Arc<Vec<AppenderNode>>>>;

/// 어펜더 식별 값 (인스턴스 주소)
fn appender_id<A: Appender + ?Sized>(appender: &A) -> usize {
    appender as *const A as *const () as usize
}

/// 로그 디스패처
pub struct Dispatcher {
    coordination: LoggingQueue,
    registry: Registry,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            coordination: LoggingQueue::new(GLOBAL_QUEUE_LABEL),
            registry: Arc::new(RwLock::new(Arc::new(Vec::new()))),
        }
    }

    /// 모든 레벨을 받는 어펜더 등록
    pub fn add_appender(&self, appender: Arc<dyn Appender>) {
        self.add_appender_with_level(appender, LogLevel::ALL);
    }

    /// 레벨 마스크를 지정해 어펜더 등록
    ///
    /// 이미 등록된 어펜더라면 마스크만 교체하고 연결 훅은 다시 호출하지 않습니다.
    pub fn add_appender_with_level(&self, appender: Arc<dyn Appender>, level: LogLevel) {
        let registry = self.registry.clone();
        self.coordination.submit_and_wait(move || {
            let mut guard = registry.write();
            let mut nodes: Vec<AppenderNode> = guard.as_ref().clone();
            let id = appender_id(&*appender);

            if let Some(existing) = nodes.iter_mut().find(|node| node.id() == id) {
                existing.level = level;
                *guard = Arc::new(nodes);
                debug!(appender = %appender.name(), ?level, "어펜더 레벨 교체됨");
                return;
            }

            nodes.push(AppenderNode {
                appender: appender.clone(),
                level,
            });
            *guard = Arc::new(nodes);

            // 잠금을 쥔 채로 넣어야 연결 훅이 첫 이벤트보다 먼저 실행됨
            let queue = appender.core().queue().clone();
            let attached = appender.clone();
            queue.clone().submit(move || {
                attached.core().notify_formatter_attached();
                attached.on_attached_in(&queue);
            });
            drop(guard);

            debug!(appender = %appender.name(), ?level, "어펜더 등록됨");
        });
    }

    /// 어펜더 해제
    ///
    /// 분리 훅은 어펜더 큐에서 비동기로 실행되므로 그 어펜더의 콜백 안에서 호출해도 됩니다.
    pub fn remove_appender<A: Appender + ?Sized>(&self, appender: &A) {
        let id = appender_id(appender);
        self.remove_where(move |node| node.id() == id);
    }

    /// 모든 어펜더 해제
    pub fn remove_all_appenders(&self) {
        self.remove_where(|_| true);
    }

    fn remove_where<F>(&self, matches: F)
    where
        F: Fn(&AppenderNode) -> bool + Send + 'static,
    {
        let registry = self.registry.clone();
        self.coordination.submit_and_wait(move || {
            let removed: Vec<AppenderNode> = {
                let mut guard = registry.write();
                let (removed, kept): (Vec<_>, Vec<_>) =
                    guard.iter().cloned().partition(|node| matches(node));
                if removed.is_empty() {
                    return;
                }
                *guard = Arc::new(kept);
                removed
            };

            for node in removed {
                debug!(appender = %node.appender.name(), "어펜더 해제됨");
                let appender = node.appender;
                appender.core().queue().clone().submit(move || {
                    appender.core().notify_formatter_detaching();
                    appender.on_detaching();
                });
            }
        });
    }

    /// 등록된 어펜더와 레벨 스냅샷
    pub fn appenders(&self) -> Vec<(Arc<dyn Appender>, LogLevel)> {
        self.snapshot()
            .iter()
            .map(|node| (node.appender.clone(), node.level))
            .collect()
    }

    /// 이벤트 분배
    ///
    /// 레벨 마스크가 이벤트 플래그를 포함하는 어펜더에만 전달됩니다.
    /// `asynchronous`가 `false`면 대상 어펜더가 모두 기록을 마칠 때까지 대기합니다.
    pub fn log(&self, event: LogEvent, asynchronous: bool) {
        let snapshot = self.snapshot();
        let flag = event.flag();
        let event = Arc::new(event);

        let mut pending: Vec<Completion> = Vec::new();
        for node in snapshot.iter().filter(|node| node.level.contains(flag)) {
            let appender = node.appender.clone();
            let event = event.clone();
            let queue = appender.core().queue().clone();
            let job = move || deliver(&*appender, &event);

            if asynchronous || queue.is_current() {
                queue.submit(job);
            } else {
                pending.push(queue.submit_tracked(job));
            }
        }

        for completion in pending {
            completion.wait();
        }
    }

    /// 모든 어펜더의 대기 중인 작업과 `flush` 훅이 끝날 때까지 대기
    pub fn flush(&self) {
        let snapshot = self.snapshot();

        let mut pending: Vec<Completion> = Vec::new();
        for node in snapshot.iter() {
            let appender = node.appender.clone();
            let queue = appender.core().queue().clone();
            let job = move || appender.flush();

            if queue.is_current() {
                queue.submit(job);
            } else {
                pending.push(queue.submit_tracked(job));
            }
        }

        for completion in pending {
            completion.wait();
        }
    }

    /// 비운 뒤 모든 어펜더 해제
    pub fn shutdown(&self) {
        self.flush();
        self.remove_all_appenders();
    }

    /// 현재 스레드가 이 디스패처의 조정 큐인지 확인
    pub fn is_on_coordination_queue(&self) -> bool {
        self.coordination.is_current()
    }

    fn snapshot(&self) -> Arc<Vec<AppenderNode>> {
        self.registry.read().clone()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
