pub mod actions;
pub mod config;
pub mod environment;
pub mod error;
pub mod frame;
pub mod gate;
pub mod normalize;
pub mod reducer;
pub mod state;

pub use actions::*;
pub use config::*;
pub use environment::*;
pub use error::*;
pub use frame::*;
pub use gate::*;
pub use normalize::*;
pub use reducer::*;
pub use state::*;
