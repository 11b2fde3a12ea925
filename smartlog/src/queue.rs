//! 직렬 실행 컨텍스트 (로깅 큐)
//!
//! 어펜더마다 전용 스레드 하나가 채널로 들어온 작업을 제출 순서대로 실행합니다.
//! 디스패처의 레지스트리 변경도 같은 방식의 조정 큐 하나에서 직렬화됩니다.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// 현재 스레드가 소비 중인 큐 (id, 라벨)
    static CURRENT_QUEUE: RefCell<Option<(u64, Arc<str>)>> = const { RefCell::new(None) };
}

/// 단일 소비자 직렬 작업 큐
///
/// 복제본은 같은 큐를 가리킵니다. 마지막 핸들이 사라지면 남은 작업을 모두
/// 처리한 뒤 스레드가 종료됩니다.
#[derive(Clone)]
pub struct LoggingQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    id: u64,
    label: Arc<str>,
    sender: Option<Sender<Job>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// 추적 제출된 작업의 완료 신호
pub struct Completion {
    receiver: Option<Receiver<()>>,
}

impl Completion {
    /// 이미 완료된 신호 (인라인 실행 시)
    fn done() -> Self {
        Self { receiver: None }
    }

    /// 작업이 끝날 때까지 대기
    ///
    /// 작업이 패닉으로 끝나도 반환합니다.
    pub fn wait(self) {
        if let Some(receiver) = self.receiver {
            let _ = receiver.recv();
        }
    }
}

impl LoggingQueue {
    /// 새 큐와 전용 작업 스레드 생성
    ///
    /// 스레드를 만들 수 없으면 호출자 스레드에서 바로 실행하는 큐로 동작합니다.
    pub fn new(label: impl Into<String>) -> Self {
        let label: Arc<str> = Arc::from(label.into());
        let id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = channel::unbounded::<Job>();

        let worker_label = label.clone();
        let spawned = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || Self::worker_loop(id, worker_label, receiver));

        let (sender, worker) = match spawned {
            Ok(handle) => (Some(sender), Some(handle)),
            Err(e) => {
                error!(queue = %label, error = %e, "로깅 큐 스레드 생성 실패, 인라인 실행으로 전환");
                (None, None)
            }
        };

        Self {
            inner: Arc::new(QueueInner {
                id,
                label,
                sender,
                worker: Mutex::new(worker),
            }),
        }
    }

    /// 작업 스레드 루프
    fn worker_loop(id: u64, label: Arc<str>, receiver: Receiver<Job>) {
        CURRENT_QUEUE.with(|current| *current.borrow_mut() = Some((id, label.clone())));
        debug!(queue = %label, "로깅 큐 시작됨");

        for job in receiver.iter() {
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!(queue = %label, "로깅 큐 작업이 패닉으로 종료됨");
            }
        }

        debug!(queue = %label, "로깅 큐 종료됨");
    }

    /// 큐 라벨
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// 현재 스레드가 이 큐의 작업 스레드인지 확인
    pub fn is_current(&self) -> bool {
        CURRENT_QUEUE.with(|current| {
            current
                .borrow()
                .as_ref()
                .is_some_and(|(id, _)| *id == self.inner.id)
        })
    }

    /// 현재 스레드가 소비 중인 큐의 라벨 (큐 스레드가 아니면 `None`)
    pub fn current_label() -> Option<Arc<str>> {
        CURRENT_QUEUE.with(|current| current.borrow().as_ref().map(|(_, label)| label.clone()))
    }

    /// 같은 큐를 가리키는지 확인
    pub fn same_queue(&self, other: &LoggingQueue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 작업 제출 (논블로킹)
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job: Job = Box::new(job);
        let job = match &self.inner.sender {
            Some(sender) => match sender.send(job) {
                Ok(()) => return,
                Err(channel::SendError(job)) => job,
            },
            None => job,
        };

        // 작업 스레드가 없으면 호출자에서 실행
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!(queue = %self.inner.label, "인라인 작업이 패닉으로 종료됨");
        }
    }

    /// 작업 제출 후 완료 신호 반환
    ///
    /// 이미 이 큐 위에서 호출되면 즉시 인라인으로 실행합니다.
    pub fn submit_tracked<F>(&self, job: F) -> Completion
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_current() {
            job();
            return Completion::done();
        }

        let (done_tx, done_rx) = channel::bounded(1);
        self.submit(move || {
            job();
            let _ = done_tx.send(());
        });

        Completion {
            receiver: Some(done_rx),
        }
    }

    /// 작업을 제출하고 끝날 때까지 대기
    pub fn submit_and_wait<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_tracked(job).wait();
    }

    /// 지금까지 제출된 모든 작업이 끝날 때까지 대기
    pub fn drain(&self) {
        self.submit_and_wait(|| {});
    }
}

impl std::fmt::Debug for LoggingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingQueue")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .finish()
    }
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        // 송신자를 먼저 닫아야 작업 스레드가 남은 작업을 처리하고 빠져나옴
        drop(self.sender.take());

        let current = CURRENT_QUEUE.with(|current| {
            current
                .borrow()
                .as_ref()
                .is_some_and(|(id, _)| *id == self.id)
        });
        if current {
            return;
        }

        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_jobs_run_in_submission_order() {
        let queue = LoggingQueue::new("test.fifo");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = seen.clone();
            queue.submit(move || seen.lock().push(i));
        }
        queue.drain();

        let seen = seen.lock();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_is_current_and_label() {
        let queue = LoggingQueue::new("test.current");
        assert!(!queue.is_current());
        assert!(LoggingQueue::current_label().is_none());

        let probe = queue.clone();
        let (tx, rx) = channel::bounded(1);
        queue.submit(move || {
            let _ = tx.send((probe.is_current(), LoggingQueue::current_label()));
        });

        let (is_current, label) = rx.recv().expect("Test assertion failed");
        assert!(is_current);
        assert_eq!(label.as_deref(), Some("test.current"));
    }

    #[test]
    fn test_submit_and_wait_on_own_queue_runs_inline() {
        let queue = LoggingQueue::new("test.reentrant");
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_queue = queue.clone();
        let inner_counter = counter.clone();
        queue.submit_and_wait(move || {
            // 같은 큐에서 다시 대기해도 교착되지 않아야 함
            let nested = inner_counter.clone();
            inner_queue.submit_and_wait(move || {
                nested.fetch_add(1, Ordering::SeqCst);
            });
            inner_counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_job_does_not_stop_queue() {
        let queue = LoggingQueue::new("test.panic");
        let counter = Arc::new(AtomicUsize::new(0));

        queue.submit(|| panic!("boom"));
        let after = counter.clone();
        queue.submit_and_wait(move || {
            after.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_drains_pending_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let queue = LoggingQueue::new("test.drop");
            for _ in 0..10 {
                let counter = counter.clone();
                queue.submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }
}
