mod certificate;
mod credential;
mod keypair;
mod policy;
mod request;

// Exports
pub use certificate::{Certificate, ParseCertificateError, SignatureVerificationError};
pub use credential::{Credential, IssuedCertificate, LoadCredentialError, SignRequestError};
pub use keypair::{KeyPair, ParseKeyPairError};
pub use policy::{PolicyOutcome, SigningPolicy};
pub use request::{CertificateRequest, ParseRequestError};
