pub mod executor;
pub mod observer;
pub mod policy;
pub mod store;

pub use executor::*;
pub use observer::*;
pub use policy::*;
pub use store::*;
