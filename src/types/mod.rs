pub mod candle;
pub mod level;
pub mod signals;

pub use candle::*;
pub use level::*;
pub use signals::*;
