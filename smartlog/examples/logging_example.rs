//! smartlog 로깅 라이브러리 사용 예제
//!
//! 이 예제는 로거 구성, 레벨 마스크, 파일 순환, 압축, 큐 라벨 포매터 사용법을 보여줍니다.

use anyhow::Result;
use smartlog::{
    init_logging, log_debug, log_error, log_info, log_warn, FileLoggerConfig, LogLevel,
    MemoryAppender, QueueFormatter, SmartLogger,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<()> {
    // 라이브러리 내부 진단 출력 (순환, 보관 정책, 실패 경고)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("📝 smartlog 로깅 예제 시작");

    let logger = init_logging(FileLoggerConfig {
        directory: Some("./logs".into()),
        max_number_of_files: 5,
        max_file_size: 4 * 1024,
        ..FileLoggerConfig::default()
    })?;

    // === 예제 1: 기본 사용법 ===
    println!("\n📝 예제 1: 레벨별 로그 기록");
    basic_logging_example(&logger);

    // === 예제 2: 레벨 마스크 ===
    println!("\n⚙️ 예제 2: 어펜더별 레벨 마스크");
    level_mask_example(&logger);

    // === 예제 3: 파일 순환과 압축 ===
    println!("\n🗜️ 예제 3: 파일 순환과 보관 파일 압축");
    rolling_example(&logger).await?;

    // === 예제 4: 성능 테스트 ===
    println!("\n⚡ 예제 4: 대량 비동기 기록");
    performance_example(&logger);

    logger.flush();
    println!("\n✅ 모든 예제 완료! {} 디렉토리를 확인하세요.", logger.logs_directory().display());
    Ok(())
}

/// 예제 1: 매크로로 레벨별 기록
fn basic_logging_example(logger: &SmartLogger) {
    log_debug!(logger: logger, "디버깅 정보: step={}", 1);
    log_info!(logger: logger, tag: "server", "서버 시작됨: port={}", 50051);
    log_warn!(logger: logger, "메모리 사용량 {}% (임계값 {}%)", 85, 80);
    // 에러는 모든 어펜더가 기록을 마칠 때까지 대기
    log_error!(logger: logger, tag: "db", "데이터베이스 연결 실패: {}", "timeout");
    logger.direct_log(false, None, "=== 포매터 없이 그대로 기록된 구분선 ===");
    println!("   ✓ {}개의 로그 파일", logger.log_files().len());
}

/// 예제 2: 에러만 받는 메모리 어펜더
fn level_mask_example(logger: &SmartLogger) {
    let mut formatter = QueueFormatter::shared();
    formatter.set_replacement_label("main", "M");
    let errors_only = Arc::new(MemoryAppender::with_formatter("errors", Box::new(formatter)));
    logger
        .dispatcher()
        .add_appender_with_level(errors_only.clone(), LogLevel::ERROR);

    log_info!(logger: logger, "이 메시지는 메모리 어펜더에 전달되지 않음");
    log_error!(logger: logger, "이 메시지만 전달됨");

    for line in errors_only.get_logs() {
        println!("   → {line}");
    }
    logger.dispatcher().remove_appender(&*errors_only);
}

/// 예제 3: 명시적 순환과 압축
async fn rolling_example(logger: &SmartLogger) -> Result<()> {
    logger.toggle_compression(true);
    for i in 0..50 {
        log_info!(logger: logger, tag: "rolling", "순환 테스트 메시지 #{:03}", i);
    }

    logger.file_appender().roll_log_file().await?;
    println!("   ✓ 순환 완료");
    for path in logger.log_files() {
        println!("   - {}", path.display());
    }
    Ok(())
}

/// 예제 4: 비동기 기록 처리량
fn performance_example(logger: &SmartLogger) {
    let count = 10_000;
    let started = Instant::now();
    for i in 0..count {
        log_debug!(logger: logger, "성능 테스트 메시지 {}", i);
    }
    let submitted = started.elapsed();
    logger.flush();
    let flushed = started.elapsed();

    println!(
        "   ✓ {}개 제출 {:?}, 기록 완료 {:?} (평균 {:?}/건)",
        count,
        submitted,
        flushed,
        flushed.checked_div(count).unwrap_or(Duration::ZERO)
    );
}
