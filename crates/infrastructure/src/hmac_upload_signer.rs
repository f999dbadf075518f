//! HMAC-SHA256 signatures for single-use upload URLs.

use helmspan_application::UploadSigner;
use helmspan_core::{AppError, AppResult, DeploymentId};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Operator-keyed upload URL signer.
pub struct HmacUploadSigner {
    key: Vec<u8>,
}

impl HmacUploadSigner {
    /// Creates a signer; the key must be at least 32 bytes.
    pub fn new(key: impl Into<Vec<u8>>) -> AppResult<Self> {
        let key = key.into();
        if key.len() < 32 {
            return Err(AppError::Validation(
                "upload signing key must be at least 32 bytes".to_owned(),
            ));
        }
        Ok(Self { key })
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(self.key.as_slice())
            .map_err(|error| AppError::Internal(format!("invalid signing key: {error}")))
    }
}

impl UploadSigner for HmacUploadSigner {
    fn sign(&self, deployment_id: DeploymentId) -> AppResult<String> {
        let mut mac = self.mac()?;
        mac.update(deployment_id.as_uuid().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn verify(&self, deployment_id: DeploymentId, signature: &str) -> AppResult<bool> {
        let Ok(decoded) = hex::decode(signature) else {
            return Ok(false);
        };

        let mut mac = self.mac()?;
        mac.update(deployment_id.as_uuid().as_bytes());
        Ok(mac.verify_slice(decoded.as_slice()).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use helmspan_application::UploadSigner;
    use helmspan_core::DeploymentId;

    use super::HmacUploadSigner;

    fn signer(key_byte: u8) -> HmacUploadSigner {
        HmacUploadSigner::new(vec![key_byte; 32]).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn rejects_short_keys() {
        assert!(HmacUploadSigner::new(vec![1u8; 16]).is_err());
    }

    #[test]
    fn signatures_round_trip() {
        let signer = signer(7);
        let deployment_id = DeploymentId::new();
        let signature = signer
            .sign(deployment_id)
            .unwrap_or_else(|_| unreachable!());
        assert!(signer.verify(deployment_id, &signature).unwrap_or_default());
    }

    #[test]
    fn signature_is_bound_to_the_deployment() {
        let signer = signer(7);
        let signature = signer
            .sign(DeploymentId::new())
            .unwrap_or_else(|_| unreachable!());
        assert!(!signer.verify(DeploymentId::new(), &signature).unwrap_or_default());
    }

    #[test]
    fn different_keys_do_not_verify() {
        let deployment_id = DeploymentId::new();
        let signature = signer(7)
            .sign(deployment_id)
            .unwrap_or_else(|_| unreachable!());
        assert!(!signer(8).verify(deployment_id, &signature).unwrap_or_default());
    }

    #[test]
    fn malformed_hex_is_rejected_without_error() {
        let signer = signer(7);
        assert!(!signer.verify(DeploymentId::new(), "not-hex").unwrap_or_default());
    }
}
