//! 도메인 타입: 노드 변형, 연결 정보, 엔드포인트 종류
//!
//! [`NodeVariant`]는 같은 프로토콜 계열의 세 구현체를 나타내는 닫힌 집합입니다.
//! 변형마다 실행 파일 이름, 피어에게 보이는 식별 문자열,
//! `getpeerinfo` 응답의 필드 이름이 다릅니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ─── NodeVariant ─────────────────────────────────────────────────────

/// 노드 구현 변형
///
/// `Florestad`가 기본(primary) 변형입니다. RPC 인증이 없고
/// P2P listen 포트를 설정할 수 없습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeVariant {
    /// Floresta 경량 노드
    Florestad,
    /// utreexo 누산기를 지원하는 btcd 포크
    Utreexod,
    /// Bitcoin Core
    Bitcoind,
}

impl NodeVariant {
    /// 모든 변형 (선언 순서)
    pub const ALL: [NodeVariant; 3] = [Self::Florestad, Self::Utreexod, Self::Bitcoind];

    /// 소문자 이름 (`"florestad"` 등)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Florestad => "florestad",
            Self::Utreexod => "utreexod",
            Self::Bitcoind => "bitcoind",
        }
    }

    /// `binaries` 디렉토리 안의 실행 파일 이름
    pub fn binary_name(&self) -> &'static str {
        self.as_str()
    }

    /// 피어의 user agent에 포함되는 식별 문자열
    pub fn identity(&self) -> &'static str {
        match self {
            Self::Florestad => "Floresta",
            Self::Utreexod => "utreexod",
            Self::Bitcoind => "Satoshi",
        }
    }

    /// 이 변형의 `getpeerinfo` 응답에서 사용하는 필드 이름
    pub fn peer_info_keys(&self) -> PeerInfoKeys {
        match self {
            Self::Florestad => PeerInfoKeys {
                identity: "user_agent",
                address: "address",
            },
            Self::Utreexod | Self::Bitcoind => PeerInfoKeys {
                identity: "subver",
                address: "addr",
            },
        }
    }

    /// P2P listen 포트를 설정할 수 있는지 여부
    ///
    /// florestad는 listen 포트를 받지 않으므로 다른 노드가 주소로 식별할 수 없습니다.
    pub fn has_configurable_p2p_port(&self) -> bool {
        !matches!(self, Self::Florestad)
    }

    /// `getpeerinfo`의 주소 필드가 피어의 listen 주소를 담는지 여부
    ///
    /// utreexod는 연결 정보를 `addrlocal`에 표시하므로 `addr` 값으로 비교할 수 없습니다.
    pub fn reports_peer_listen_address(&self) -> bool {
        !matches!(self, Self::Utreexod)
    }

    /// RPC 인증이 필요한 변형인지 여부
    pub fn requires_rpc_auth(&self) -> bool {
        !matches!(self, Self::Florestad)
    }
}

impl fmt::Display for NodeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "florestad" => Ok(Self::Florestad),
            "utreexod" => Ok(Self::Utreexod),
            "bitcoind" => Ok(Self::Bitcoind),
            _ => Err(ConfigError::UnknownVariant(s.to_owned())),
        }
    }
}

// ─── PeerInfoKeys ────────────────────────────────────────────────────

/// `getpeerinfo` 응답의 식별/주소 필드 이름 쌍
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfoKeys {
    /// user agent 필드 (`user_agent` 또는 `subver`)
    pub identity: &'static str,
    /// 주소 필드 (`address` 또는 `addr`)
    pub address: &'static str,
}

// ─── ConnectionInfo ──────────────────────────────────────────────────

/// 다른 노드가 이 노드를 피어 목록에서 알아보는 데 쓰는 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// user agent에 포함되는 식별 문자열
    pub identity: String,
    /// `host:port` 형식의 P2P 주소 (listen 포트를 설정할 수 없는 변형은 `None`)
    pub address: Option<String>,
}

// ─── EndpointKind ────────────────────────────────────────────────────

/// 노드가 노출하는 엔드포인트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// JSON-RPC
    Rpc,
    /// 피어 간 프로토콜
    P2p,
    /// Electrum 서버
    Electrum,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc => write!(f, "rpc"),
            Self::P2p => write!(f, "p2p"),
            Self::Electrum => write!(f, "electrum"),
        }
    }
}
