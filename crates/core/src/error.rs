//! 에러 타입: 설정/환경 관련 에러 정의

/// 설정 관련 에러
///
/// 설정 에러는 항상 치명적이며 재시도하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 필수 환경변수가 설정되지 않음
    #[error("required environment variable '{var}' is not set")]
    MissingEnv { var: String },

    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 알 수 없는 노드 변형
    #[error("unknown node variant '{0}', expected 'florestad', 'utreexod' or 'bitcoind'")]
    UnknownVariant(String),

    /// 범위 안의 모든 포트가 예약됐거나 사용 중
    #[error("no free port left in {start}-{end}")]
    PortsExhausted { start: u16, end: u16 },

    /// TLS 키/인증서 생성 실패
    #[error("tls material generation failed: {reason}")]
    Tls { reason: String },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
