//! 설정 관리: peerlab.toml 파싱 및 런타임 설정
//!
//! [`HarnessConfig`]는 하네스 실행 전체의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`PEERLAB_TIMEOUTS_START_ATTEMPTS=5` 형식, `PEERLAB_TEMP_DIR`)
//! 2. 설정 파일 (`peerlab.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! `paths.temp_dir`는 필수입니다. 파일에도 없고 `PEERLAB_TEMP_DIR`도 없으면
//! [`ConfigError::MissingEnv`]로 즉시 실패합니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), peerlab_core::error::ConfigError> {
//! use peerlab_core::config::HarnessConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HarnessConfig::load("peerlab.toml").await?;
//!
//! // 파일 없이 환경변수만 사용
//! let config = HarnessConfig::from_env()?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::ports::DEFAULT_PORT_RANGE;
use crate::types::NodeVariant;

/// 임시 디렉토리를 지정하는 필수 환경변수
pub const TEMP_DIR_ENV: &str = "PEERLAB_TEMP_DIR";

/// 포트 범위의 최소 크기
///
/// 노드마다 RPC, P2P, Electrum, Electrum TLS 포트를 받으므로 가장 큰
/// 하네스(노드 3개)가 쓰는 12개보다 여유 있게 잡습니다.
pub const MIN_PORT_RANGE: u32 = 16;

/// peerlab 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 경로 설정
    #[serde(default)]
    pub paths: PathsConfig,
    /// 포트 범위 설정
    #[serde(default)]
    pub ports: PortsConfig,
    /// 대기/재시도 설정
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// TLS 설정
    #[serde(default)]
    pub tls: TlsSettings,
}

impl HarnessConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일 없이 기본값과 환경변수만으로 설정을 만듭니다.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PEERLAB_{SECTION}_{FIELD}`.
    /// `PEERLAB_TEMP_DIR`은 `PEERLAB_PATHS_TEMP_DIR`보다 우선합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PEERLAB_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PEERLAB_GENERAL_LOG_FORMAT");
        override_bool(&mut self.general.log_to_file, "PEERLAB_GENERAL_LOG_TO_FILE");

        // Paths
        override_string(&mut self.paths.temp_dir, "PEERLAB_PATHS_TEMP_DIR");
        override_string(&mut self.paths.temp_dir, TEMP_DIR_ENV);
        override_string(&mut self.paths.binaries_dir, "PEERLAB_PATHS_BINARIES_DIR");

        // Ports
        override_u16(&mut self.ports.range_start, "PEERLAB_PORTS_RANGE_START");
        override_u16(&mut self.ports.range_end, "PEERLAB_PORTS_RANGE_END");

        // Timeouts
        override_u64(
            &mut self.timeouts.socket_wait_secs,
            "PEERLAB_TIMEOUTS_SOCKET_WAIT_SECS",
        );
        override_u64(
            &mut self.timeouts.rpc_request_secs,
            "PEERLAB_TIMEOUTS_RPC_REQUEST_SECS",
        );
        override_u64(
            &mut self.timeouts.connection_deadline_secs,
            "PEERLAB_TIMEOUTS_CONNECTION_DEADLINE_SECS",
        );
        override_u64(
            &mut self.timeouts.poll_interval_ms,
            "PEERLAB_TIMEOUTS_POLL_INTERVAL_MS",
        );
        override_u32(
            &mut self.timeouts.start_attempts,
            "PEERLAB_TIMEOUTS_START_ATTEMPTS",
        );
        override_u64(
            &mut self.timeouts.shutdown_grace_secs,
            "PEERLAB_TIMEOUTS_SHUTDOWN_GRACE_SECS",
        );

        // TLS
        override_string(&mut self.tls.common_name, "PEERLAB_TLS_COMMON_NAME");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        if self.paths.temp_dir.trim().is_empty() {
            return Err(ConfigError::MissingEnv {
                var: TEMP_DIR_ENV.to_owned(),
            });
        }

        if self.ports.range_start == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ports.range_start".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.ports.range_start > self.ports.range_end {
            return Err(ConfigError::InvalidValue {
                field: "ports.range_start".to_owned(),
                reason: format!(
                    "range start {} is greater than range end {}",
                    self.ports.range_start, self.ports.range_end
                ),
            });
        }

        let span = u32::from(self.ports.range_end - self.ports.range_start) + 1;
        if span < MIN_PORT_RANGE {
            return Err(ConfigError::InvalidValue {
                field: "ports.range_end".to_owned(),
                reason: format!("port range must hold at least {MIN_PORT_RANGE} ports, got {span}"),
            });
        }

        let non_zero = [
            ("timeouts.socket_wait_secs", self.timeouts.socket_wait_secs),
            ("timeouts.rpc_request_secs", self.timeouts.rpc_request_secs),
            (
                "timeouts.connection_deadline_secs",
                self.timeouts.connection_deadline_secs,
            ),
            ("timeouts.poll_interval_ms", self.timeouts.poll_interval_ms),
            (
                "timeouts.shutdown_grace_secs",
                self.timeouts.shutdown_grace_secs,
            ),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        if self.timeouts.start_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeouts.start_attempts".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        if self.tls.common_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "tls.common_name".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        Ok(())
    }

    // ─── 경로 도우미 ─────────────────────────────────────────────────

    /// 하네스 임시 디렉토리
    pub fn temp_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.temp_dir)
    }

    /// 노드 실행 파일 디렉토리 (기본값 `{temp_dir}/binaries`)
    pub fn binaries_dir(&self) -> PathBuf {
        if self.paths.binaries_dir.trim().is_empty() {
            self.temp_dir().join("binaries")
        } else {
            PathBuf::from(&self.paths.binaries_dir)
        }
    }

    /// TLS 키/인증서 디렉토리 (`{temp_dir}/data/tls`)
    pub fn tls_dir(&self) -> PathBuf {
        self.temp_dir().join("data").join("tls")
    }

    /// 현재 커밋별 로그 디렉토리 (`{temp_dir}/logs/{git describe}`)
    ///
    /// `git describe`가 실패하면 `unknown`을 사용합니다.
    pub fn logs_dir(&self) -> PathBuf {
        self.temp_dir().join("logs").join(git_describe())
    }

    /// 테스트 케이스 로그 파일 경로 (`{logs_dir}/{case}.log`)
    pub fn test_log_path(&self, case: &str) -> PathBuf {
        self.logs_dir().join(format!("{case}.log"))
    }

    /// 테스트 케이스의 노드 데이터 디렉토리 경로를 계산합니다.
    ///
    /// `{temp_dir}/data/{case}/{variant}{ordinal}` 형식이며,
    /// `ordinal`은 같은 변형 중 몇 번째 노드인지를 나타냅니다.
    pub fn node_data_dir(&self, case: &str, variant: NodeVariant, ordinal: usize) -> PathBuf {
        self.temp_dir()
            .join("data")
            .join(case.to_lowercase())
            .join(format!("{}{}", variant.as_str(), ordinal))
    }

    /// `{temp_dir}/data/{base_name}/node-{i}` 디렉토리 `count`개를 생성합니다.
    pub fn create_data_dirs(
        &self,
        base_name: &str,
        count: usize,
    ) -> Result<Vec<PathBuf>, ConfigError> {
        let mut paths = Vec::with_capacity(count);
        for i in 0..count {
            let path = self
                .temp_dir()
                .join("data")
                .join(base_name)
                .join(format!("node-{i}"));
            std::fs::create_dir_all(&path)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

fn git_describe() -> String {
    let output = std::process::Command::new("git")
        .args(["describe", "--tags", "--always"])
        .output();
    match output {
        Ok(out) if out.status.success() => {
            let describe = String::from_utf8_lossy(&out.stdout).trim().to_owned();
            if describe.is_empty() {
                "unknown".to_owned()
            } else {
                describe
            }
        }
        Ok(out) => {
            warn!(status = %out.status, "git describe failed, using 'unknown' logs dir");
            "unknown".to_owned()
        }
        Err(e) => {
            warn!(error = %e, "git not available, using 'unknown' logs dir");
            "unknown".to_owned()
        }
    }
}

// ─── 섹션별 설정 ────────────────────────────────────────────────────

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 테스트 케이스별 로그 파일 기록 여부
    pub log_to_file: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            log_to_file: true,
        }
    }
}

/// 경로 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// 데이터/로그/바이너리의 기준 디렉토리 (비어 있으면 `PEERLAB_TEMP_DIR`)
    pub temp_dir: String,
    /// 노드 실행 파일 디렉토리 (비어 있으면 `{temp_dir}/binaries`)
    pub binaries_dir: String,
}

/// 포트 범위 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    /// 범위 시작 (포함)
    pub range_start: u16,
    /// 범위 끝 (포함)
    pub range_end: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            range_start: *DEFAULT_PORT_RANGE.start(),
            range_end: *DEFAULT_PORT_RANGE.end(),
        }
    }
}

/// 대기/재시도 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// RPC 소켓 열림/닫힘 대기 시간 (초)
    pub socket_wait_secs: u64,
    /// RPC 요청 하나의 제한 시간 (초)
    pub rpc_request_secs: u64,
    /// 피어 연결 상태 수렴 대기 시간 (초)
    pub connection_deadline_secs: u64,
    /// 연결 상태 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 노드 시작 시도 횟수
    pub start_attempts: u32,
    /// SIGTERM 후 프로세스 종료를 기다리는 시간 (초)
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            socket_wait_secs: 30,
            rpc_request_secs: 30,
            connection_deadline_secs: 15,
            poll_interval_ms: 1000,
            start_attempts: 3,
            shutdown_grace_secs: 10,
        }
    }
}

impl TimeoutsConfig {
    pub fn socket_wait(&self) -> Duration {
        Duration::from_secs(self.socket_wait_secs)
    }

    pub fn rpc_request(&self) -> Duration {
        Duration::from_secs(self.rpc_request_secs)
    }

    pub fn connection_deadline(&self) -> Duration {
        Duration::from_secs(self.connection_deadline_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// TLS 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    /// 자체 서명 인증서의 CN
    pub common_name: String,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            common_name: "florestad".to_owned(),
        }
    }
}

// ─── 환경변수 오버라이드 도우미 ─────────────────────────────────────

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
