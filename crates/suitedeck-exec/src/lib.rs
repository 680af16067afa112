pub mod backend;
pub mod contracts;
pub mod dispatcher;
pub mod effects;
pub mod stream;

pub use backend::*;
pub use contracts::*;
pub use dispatcher::*;
pub use effects::*;
pub use stream::*;
