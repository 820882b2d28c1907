//! 설정 생성기: 노드 하나가 쓸 충돌 없는 엔드포인트 설정을 만듭니다.
//!
//! 모든 포트는 [`PortAllocator`]에서 받으므로 같은 실행 안에서는 겹치지 않습니다.
//! TLS를 요청하면 `{temp_dir}/data/tls`에 키/인증서를 기록하고 경로를 붙입니다.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::config::HarnessConfig;
use crate::endpoint::{ElectrumConfig, EndpointSet, LOCALHOST, P2pConfig, RpcConfig, TlsConfig};
use crate::error::ConfigError;
use crate::ports::PortAllocator;
use crate::tls;
use crate::types::NodeVariant;

/// 인증이 필요한 변형이 사용하는 RPC 사용자 이름/비밀번호
pub const DEFAULT_RPC_USER: &str = "test";
pub const DEFAULT_RPC_PASSWORD: &str = "test";

/// 엔드포인트 기본 설정 생성기
#[derive(Debug, Clone)]
pub struct ConfigGenerator {
    ports: Arc<PortAllocator>,
    tls_dir: PathBuf,
    tls_common_name: String,
}

impl ConfigGenerator {
    /// 하네스 설정에서 생성기를 만듭니다.
    pub fn new(config: &HarnessConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            ports: Arc::new(PortAllocator::from_config(&config.ports)?),
            tls_dir: config.tls_dir(),
            tls_common_name: config.tls.common_name.clone(),
        })
    }

    /// 이미 있는 포트 할당기를 공유하는 생성기를 만듭니다.
    pub fn with_allocator(
        ports: Arc<PortAllocator>,
        tls_dir: impl Into<PathBuf>,
        tls_common_name: impl Into<String>,
    ) -> Self {
        Self {
            ports,
            tls_dir: tls_dir.into(),
            tls_common_name: tls_common_name.into(),
        }
    }

    /// 공유 포트 할당기
    pub fn allocator(&self) -> &Arc<PortAllocator> {
        &self.ports
    }

    /// 기본 RPC 설정. 기본 변형(florestad)에는 인증 정보를 넣지 않습니다.
    pub async fn rpc(&self, variant: NodeVariant) -> Result<RpcConfig, ConfigError> {
        let (user, password) = if variant.requires_rpc_auth() {
            (
                Some(DEFAULT_RPC_USER.to_owned()),
                Some(DEFAULT_RPC_PASSWORD.to_owned()),
            )
        } else {
            (None, None)
        };
        Ok(RpcConfig {
            host: LOCALHOST.to_owned(),
            port: self.ports.next_port().await?,
            user,
            password,
        })
    }

    /// 기본 P2P 설정
    pub async fn p2p(&self) -> Result<P2pConfig, ConfigError> {
        Ok(P2pConfig {
            host: LOCALHOST.to_owned(),
            port: self.ports.next_port().await?,
        })
    }

    /// 기본 Electrum 설정. `tls`가 참이면 키/인증서를 생성해 붙입니다.
    pub async fn electrum(&self, tls: bool) -> Result<ElectrumConfig, ConfigError> {
        let port = self.ports.next_port().await?;
        let tls = if tls {
            let tls_port = self.ports.next_port().await?;
            let material = tls::write_self_signed(
                &self.tls_dir,
                &self.tls_common_name,
                &format!("{}-{tls_port}", self.tls_common_name),
            )
            .await?;
            debug!(port = tls_port, "generated electrum tls listener");
            Some(TlsConfig {
                key_file: material.key_file,
                cert_file: material.cert_file,
                port: tls_port,
            })
        } else {
            None
        };

        Ok(ElectrumConfig {
            host: LOCALHOST.to_owned(),
            port,
            tls,
        })
    }

    /// 세 엔드포인트를 한 번에 생성합니다.
    pub async fn generate(
        &self,
        variant: NodeVariant,
        tls: bool,
    ) -> Result<EndpointSet, ConfigError> {
        Ok(EndpointSet {
            rpc: self.rpc(variant).await?,
            p2p: self.p2p().await?,
            electrum: self.electrum(tls).await?,
        })
    }
}
