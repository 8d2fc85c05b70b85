pub mod admission;
pub mod claim_checks;
pub mod request_info;

pub use admission::{AdmissionGate, RouteRules};
pub use claim_checks::{verify_device_binding, verify_ip, verify_user_agent};
pub use request_info::{bearer_token, client_ip, user_agent};
