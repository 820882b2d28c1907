//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 기록은 무시됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `peerlab_`
//! - 영역: `node_`, `connection_`, `assertion_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(peerlab_core::metrics::NODE_STARTS_TOTAL, "variant" => "bitcoind").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 노드 변형 레이블 키 (florestad, utreexod, bitcoind)
pub const LABEL_VARIANT: &str = "variant";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 시그널 레이블 키 (term, kill)
pub const LABEL_SIGNAL: &str = "signal";

/// 시나리오 레이블 키. `peerlab run`의 스크레이프 엔드포인트가 전역으로 붙입니다.
pub const LABEL_SCENARIO: &str = "scenario";

// ─── Node 메트릭 ───────────────────────────────────────────────────

/// Node: 성공한 시작 수 (counter, label: variant)
pub const NODE_STARTS_TOTAL: &str = "peerlab_node_starts_total";

/// Node: 실패한 시작 시도 수 (counter, label: variant)
pub const NODE_START_FAILURES_TOTAL: &str = "peerlab_node_start_failures_total";

/// Node: 시작 성공까지 걸린 시도 횟수 (histogram)
pub const NODE_START_ATTEMPTS: &str = "peerlab_node_start_attempts";

/// Node: 시작부터 RPC 소켓 열림까지 걸린 시간 (histogram, 초)
pub const NODE_START_DURATION_SECONDS: &str = "peerlab_node_start_duration_seconds";

/// Node: graceful 종료 실패 후 보낸 시그널 수 (counter, label: signal)
pub const NODE_FORCED_SIGNALS_TOTAL: &str = "peerlab_node_forced_signals_total";

// ─── Connection 메트릭 ─────────────────────────────────────────────

/// Connection: 연결 상태 대기 수 (counter, label: result)
pub const CONNECTION_WAITS_TOTAL: &str = "peerlab_connection_waits_total";

/// Connection: 연결 상태 수렴까지 걸린 시간 (histogram, 초)
pub const CONNECTION_WAIT_DURATION_SECONDS: &str = "peerlab_connection_wait_duration_seconds";

// ─── Harness 메트릭 ────────────────────────────────────────────────

/// Harness: 실패한 단언 수 (counter)
pub const ASSERTION_FAILURES_TOTAL: &str = "peerlab_assertion_failures_total";

/// Harness: 실행된 테스트 케이스 수 (counter, label: result)
pub const TEST_CASES_TOTAL: &str = "peerlab_test_cases_total";

/// 시간 측정 히스토그램 버킷 (초)
pub const DURATION_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0];

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없어도 패닉하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    // Node
    describe_counter!(NODE_STARTS_TOTAL, "Node processes started successfully");
    describe_counter!(
        NODE_START_FAILURES_TOTAL,
        "Failed node start attempts (retried or fatal)"
    );
    describe_histogram!(
        NODE_START_ATTEMPTS,
        "Number of attempts needed before a node started"
    );
    describe_histogram!(
        NODE_START_DURATION_SECONDS,
        "Time from spawn until the RPC socket accepted connections"
    );
    describe_counter!(
        NODE_FORCED_SIGNALS_TOTAL,
        "Signals sent after a graceful stop was unavailable"
    );

    // Connection
    describe_counter!(
        CONNECTION_WAITS_TOTAL,
        "Connection-state waits by outcome (success, failure)"
    );
    describe_histogram!(
        CONNECTION_WAIT_DURATION_SECONDS,
        "Time until two peers reached the expected connection state"
    );

    // Harness
    describe_counter!(
        ASSERTION_FAILURES_TOTAL,
        "Assertions that failed and triggered teardown"
    );
    describe_counter!(TEST_CASES_TOTAL, "Test cases run by outcome");
}
