//! peerlab 공통 크레이트
//!
//! 하네스의 모든 크레이트가 공유하는 타입, 에러, 설정과
//! 노드 엔드포인트 설정 생성기를 제공합니다.
//!
//! - [`config`]: `peerlab.toml` 파싱, 환경변수 오버라이드, 경로 도우미
//! - [`generator`]: 충돌 없는 RPC/P2P/Electrum 설정 생성
//! - [`ports`]: localhost 연결 확인 기반 랜덤 포트 선택
//! - [`tls`]: Electrum용 자체 서명 인증서
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod endpoint;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod ports;
pub mod tls;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::ConfigError;

// 설정
pub use config::{HarnessConfig, TEMP_DIR_ENV};

// 엔드포인트
pub use endpoint::{ElectrumConfig, EndpointSet, P2pConfig, RpcConfig, TlsConfig};
pub use generator::ConfigGenerator;
pub use ports::{PortAllocator, default_random_port, random_port};

// 도메인 타입
pub use types::{ConnectionInfo, EndpointKind, NodeVariant, PeerInfoKeys};
