//! Electrum TLS 리스너용 자체 서명 인증서 생성
//!
//! PKCS#8 PEM 개인키와 자체 서명 인증서를 지정한 디렉토리에 기록합니다.

use std::path::{Path, PathBuf};

use rcgen::{Certificate, CertificateParams, DistinguishedName, DnType};
use tracing::debug;

use crate::error::ConfigError;

/// 디스크에 기록된 키/인증서 경로
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    /// PKCS#8 PEM 개인키
    pub key_file: PathBuf,
    /// PEM 인증서
    pub cert_file: PathBuf,
}

/// `dir` 아래에 `{stem}-key.pem`, `{stem}-cert.pem`을 생성합니다.
///
/// 디렉토리가 없으면 만듭니다. 같은 `stem`으로 다시 호출하면 덮어씁니다.
pub async fn write_self_signed(
    dir: &Path,
    common_name: &str,
    stem: &str,
) -> Result<TlsMaterial, ConfigError> {
    if common_name.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "tls.common_name".to_owned(),
            reason: "must not be empty".to_owned(),
        });
    }

    let mut params = CertificateParams::new(vec![common_name.to_owned(), "localhost".to_owned()]);
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);

    let cert = Certificate::from_params(params).map_err(|e| ConfigError::Tls {
        reason: e.to_string(),
    })?;
    let cert_pem = cert.serialize_pem().map_err(|e| ConfigError::Tls {
        reason: e.to_string(),
    })?;
    let key_pem = cert.serialize_private_key_pem();

    tokio::fs::create_dir_all(dir).await?;
    let key_file = dir.join(format!("{stem}-key.pem"));
    let cert_file = dir.join(format!("{stem}-cert.pem"));
    tokio::fs::write(&key_file, key_pem).await?;
    tokio::fs::write(&cert_file, cert_pem).await?;

    debug!(
        key = %key_file.display(),
        cert = %cert_file.display(),
        "wrote self-signed tls material"
    );

    Ok(TlsMaterial {
        key_file,
        cert_file,
    })
}
