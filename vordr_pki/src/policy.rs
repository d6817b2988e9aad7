use rcgen::{
    DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyIdMethod, KeyUsagePurpose,
};
use time::{Duration, OffsetDateTime};

use crate::request::CertificateRequest;

/// Rewrites a certificate request so the issued certificate can only be
/// used as a server identity, no matter what the requester asked for.
pub struct SigningPolicy {
    validity: Duration,
}

/// What [`SigningPolicy::enforce`] changed about a request.
#[derive(Debug, Default)]
pub struct PolicyOutcome {
    /// Organization values dropped from the subject.
    pub removed_organization: Vec<String>,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        Self {
            validity: Duration::days(365),
        }
    }
}

impl SigningPolicy {
    pub fn with_validity(validity: Duration) -> Self {
        Self { validity }
    }

    /// Applies the policy to the request in place.
    ///
    /// The subject alternative names and public key stay untouched. The
    /// organization is dropped from the subject because client identities
    /// encode their role there and the issued certificate must not keep it.
    pub fn enforce(&self, request: &mut CertificateRequest) -> PolicyOutcome {
        let params = &mut request.csr.params;

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now.saturating_add(self.validity);

        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        params.use_authority_key_identifier_extension = true;
        params.key_identifier_method = KeyIdMethod::Sha256;

        let mut outcome = PolicyOutcome::default();

        if params
            .distinguished_name
            .get(&DnType::OrganizationName)
            .is_some()
        {
            let mut distinguished_name = DistinguishedName::new();

            for (ty, value) in params.distinguished_name.iter() {
                if *ty == DnType::OrganizationName {
                    continue;
                }

                distinguished_name.push(ty.clone(), value.clone());
            }

            params.distinguished_name = distinguished_name;
            outcome.removed_organization = request.organization().to_vec();
        }

        outcome
    }
}
