//! 랜덤 포트 선택
//!
//! 범위 안에서 포트를 균등하게 뽑고, localhost에 TCP 연결을 시도해
//! 실패하면 (아무도 listen하지 않으면) 그 포트를 사용합니다.
//!
//! 확인과 실제 바인딩 사이에는 다른 프로세스가 같은 포트를 잡을 수 있는
//! 시간차가 있습니다. 이 경우 노드 시작이 실패하고 재시도 시 새 포트로
//! 다시 설정됩니다.
//!
//! [`PortAllocator`]는 무작위 추출을 제한된 횟수만 하고, 그래도 못 찾으면
//! 범위를 한 바퀴 훑은 뒤 [`ConfigError::PortsExhausted`]를 반환합니다.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tokio::net::TcpStream;
use tracing::{trace, warn};

use crate::config::PortsConfig;
use crate::endpoint::LOCALHOST;
use crate::error::ConfigError;

/// 기본 포트 범위
pub const DEFAULT_PORT_RANGE: RangeInclusive<u16> = 2000..=65535;

/// 연결 시도 제한 시간. 응답이 없으면 사용 가능한 포트로 봅니다.
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// 할당기가 범위를 훑기 전에 시도하는 무작위 추출 횟수
const RANDOM_DRAWS: usize = 64;

/// localhost의 `port`에 아무도 listen하지 않는지 확인합니다.
pub async fn is_port_free(port: u16) -> bool {
    match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((LOCALHOST, port))).await {
        Ok(Ok(_stream)) => false,
        Ok(Err(_)) | Err(_) => true,
    }
}

/// `[start, end]` 범위에서 사용 가능한 포트를 하나 뽑습니다.
///
/// 시도 횟수 제한은 없습니다.
pub async fn random_port(start: u16, end: u16) -> Result<u16, ConfigError> {
    validate_range(start, end)?;
    loop {
        let port = rand::thread_rng().gen_range(start..=end);
        if is_port_free(port).await {
            return Ok(port);
        }
        trace!(port, "port in use, sampling again");
    }
}

/// [`DEFAULT_PORT_RANGE`]에서 사용 가능한 포트를 하나 뽑습니다.
pub async fn default_random_port() -> u16 {
    let range = DEFAULT_PORT_RANGE;
    loop {
        let port = rand::thread_rng().gen_range(range.clone());
        if is_port_free(port).await {
            return port;
        }
    }
}

fn validate_range(start: u16, end: u16) -> Result<(), ConfigError> {
    if start == 0 {
        return Err(ConfigError::InvalidValue {
            field: "ports.range_start".to_owned(),
            reason: "must be greater than 0".to_owned(),
        });
    }
    if start > end {
        return Err(ConfigError::InvalidValue {
            field: "ports.range_start".to_owned(),
            reason: format!("range start {start} is greater than range end {end}"),
        });
    }
    Ok(())
}

// ─── PortAllocator ───────────────────────────────────────────────────

/// 한 번의 실행 동안 이미 나눠준 포트를 기억하는 할당기
///
/// 같은 프로세스 안에서 두 노드가 같은 포트를 받지 않도록 합니다.
/// 다른 프로세스와의 경쟁은 막지 못합니다.
#[derive(Debug)]
pub struct PortAllocator {
    start: u16,
    end: u16,
    reserved: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    /// 범위를 검증하고 할당기를 생성합니다.
    pub fn new(start: u16, end: u16) -> Result<Self, ConfigError> {
        validate_range(start, end)?;
        Ok(Self {
            start,
            end,
            reserved: Mutex::new(HashSet::new()),
        })
    }

    /// `[ports]` 설정 섹션에서 생성합니다.
    pub fn from_config(config: &PortsConfig) -> Result<Self, ConfigError> {
        Self::new(config.range_start, config.range_end)
    }

    /// 아직 나눠주지 않았고 현재 사용 중이 아닌 포트를 반환합니다.
    ///
    /// 범위 전체가 예약됐거나 사용 중이면 `PortsExhausted`를 반환합니다.
    pub async fn next_port(&self) -> Result<u16, ConfigError> {
        for _ in 0..RANDOM_DRAWS {
            let port = rand::thread_rng().gen_range(self.start..=self.end);
            if self.is_reserved(port) {
                tokio::task::yield_now().await;
                continue;
            }
            if self.claim(port).await {
                return Ok(port);
            }
        }

        // 임의 위치에서 시작해 범위를 한 바퀴 돕니다
        let span = u32::from(self.end - self.start) + 1;
        let offset = rand::thread_rng().gen_range(0..span);
        for i in 0..span {
            let port = self.start + ((offset + i) % span) as u16;
            if !self.is_reserved(port) && self.claim(port).await {
                return Ok(port);
            }
        }

        warn!(
            start = self.start,
            end = self.end,
            reserved = self.reserved_count(),
            "port range exhausted"
        );
        Err(ConfigError::PortsExhausted {
            start: self.start,
            end: self.end,
        })
    }

    /// 포트를 다시 할당 가능한 상태로 돌려놓습니다.
    pub fn release(&self, port: u16) {
        let removed = self
            .reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&port);
        if removed {
            trace!(port, "port released");
        }
    }

    async fn claim(&self, port: u16) -> bool {
        if !is_port_free(port).await {
            trace!(port, "port in use");
            return false;
        }
        // 확인하는 동안 다른 태스크가 같은 포트를 예약했을 수 있음
        self.reserve(port)
    }

    /// 지금까지 나눠준 포트 수
    pub fn reserved_count(&self) -> usize {
        self.reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// 이 할당기가 `port`를 나눠준 상태인지 여부
    pub fn is_reserved(&self, port: u16) -> bool {
        self.reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&port)
    }

    fn reserve(&self, port: u16) -> bool {
        self.reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(port)
    }
}
