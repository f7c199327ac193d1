pub mod company;
pub mod error;
pub mod traits;
pub mod types;

pub use company::*;
pub use error::*;
pub use traits::*;
pub use types::*;
