pub mod eshelby;
pub mod schemes;

pub use eshelby::{ClosedFormEshelby, EshelbyProvider};
pub use schemes::{ChildPhase, Scheme, SchemeResult, SelfConsistentSettings};
