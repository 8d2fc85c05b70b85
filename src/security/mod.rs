pub mod fingerprint;

pub use fingerprint::{DEVICE_ID_HEADER, fingerprint_request, hash_user_agent};
