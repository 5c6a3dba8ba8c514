pub mod engine;
pub mod waiting_queue;
pub mod state;
pub mod seed;

pub use engine::*;
pub use waiting_queue::*;
pub use state::*;
pub use seed::*;
