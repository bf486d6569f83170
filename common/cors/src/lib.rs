pub mod gate;
pub mod policy;

pub use gate::{cors_gate, CorsGate};
pub use policy::{CorsPolicy, ALLOW_ANY_ORIGIN};
