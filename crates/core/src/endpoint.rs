//! 엔드포인트 설정: 노드 하나가 사용하는 RPC, P2P, Electrum 설정
//!
//! 세 설정은 서로 독립적이며 노드 하나가 소유합니다.
//! 기본값 생성은 [`ConfigGenerator`](crate::generator::ConfigGenerator)가 담당합니다.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 모든 엔드포인트가 바인딩하는 기본 호스트
pub const LOCALHOST: &str = "127.0.0.1";

// ─── RpcConfig ───────────────────────────────────────────────────────

/// JSON-RPC 엔드포인트 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// 바인딩 호스트
    pub host: String,
    /// 포트
    pub port: u16,
    /// 사용자 이름 (인증 없는 변형은 `None`)
    pub user: Option<String>,
    /// 비밀번호 (인증 없는 변형은 `None`)
    pub password: Option<String>,
}

impl RpcConfig {
    /// `host:port` 형식의 소켓 주소
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// HTTP 요청 URL
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// 사용자 이름과 비밀번호가 모두 있으면 반환합니다.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }
}

// ─── P2pConfig ───────────────────────────────────────────────────────

/// 피어 간 프로토콜 엔드포인트 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct P2pConfig {
    /// 바인딩 호스트
    pub host: String,
    /// listen 포트
    pub port: u16,
}

impl P2pConfig {
    /// 다른 노드가 `addnode`에 넘기는 `host:port` 주소
    pub fn url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ─── ElectrumConfig ──────────────────────────────────────────────────

/// Electrum TLS 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PKCS#8 PEM 개인키 경로
    pub key_file: PathBuf,
    /// 자체 서명 인증서 PEM 경로
    pub cert_file: PathBuf,
    /// TLS 리스너 포트
    pub port: u16,
}

/// Electrum 서버 엔드포인트 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectrumConfig {
    /// 바인딩 호스트
    pub host: String,
    /// 평문 리스너 포트
    pub port: u16,
    /// TLS 리스너 (선택)
    pub tls: Option<TlsConfig>,
}

impl ElectrumConfig {
    /// 평문 리스너 `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// TLS 리스너 `host:port` (TLS가 없으면 `None`)
    pub fn tls_address(&self) -> Option<String> {
        self.tls
            .as_ref()
            .map(|tls| format!("{}:{}", self.host, tls.port))
    }
}

// ─── EndpointSet ─────────────────────────────────────────────────────

/// 노드 하나에 필요한 세 엔드포인트 묶음
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSet {
    pub rpc: RpcConfig,
    pub p2p: P2pConfig,
    pub electrum: ElectrumConfig,
}

impl EndpointSet {
    /// 이 묶음이 차지하는 모든 포트 (Electrum TLS 포함)
    pub fn ports(&self) -> Vec<u16> {
        let mut ports = vec![self.rpc.port, self.p2p.port, self.electrum.port];
        ports.extend(self.electrum.tls.as_ref().map(|tls| tls.port));
        ports
    }
}
