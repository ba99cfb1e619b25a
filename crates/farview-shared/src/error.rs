use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceIdError {
    #[error("device id has {0} characters, expected 56")]
    InvalidLength(usize),

    #[error("device id contains a character outside the base32 alphabet")]
    InvalidCharacter,

    #[error("device id check digit mismatch")]
    CheckDigitMismatch,

    #[error("PEM document contains no certificate")]
    NoCertificate,

    #[error("PEM parse error: {0}")]
    Pem(String),
}
