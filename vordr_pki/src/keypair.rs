use std::fmt::Debug;

#[derive(Debug, thiserror::Error)]
pub enum ParseKeyPairError {
    #[error("error parsing private key: {0}")]
    ParseError(rcgen::Error),
}

/// Private key used to sign certificates and authenticate connections.
///
/// Freshly generated keys are always Ed25519. Keys loaded from PEM may use
/// any algorithm rcgen supports, so operator-provided CA keys keep working.
pub struct KeyPair {
    keypair: rcgen::KeyPair,
}

impl Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair").finish()
    }
}

impl KeyPair {
    pub fn generate() -> Self {
        let keypair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();

        Self { keypair }
    }

    pub fn from_pem(pem: &str) -> Result<Self, ParseKeyPairError> {
        let keypair = rcgen::KeyPair::from_pem(pem).map_err(ParseKeyPairError::ParseError)?;

        Ok(Self { keypair })
    }

    pub fn serialize_pem(&self) -> String {
        self.keypair.serialize_pem()
    }

    pub(crate) fn rcgen(&self) -> &rcgen::KeyPair {
        &self.keypair
    }

    #[cfg(feature = "rustls")]
    pub fn rustls_private_key(&self) -> rustls::pki_types::PrivateKeyDer<'static> {
        rustls::pki_types::PrivateKeyDer::try_from(self.keypair.serialized_der().to_owned())
            .unwrap()
    }
}
