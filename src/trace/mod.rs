pub mod ping;
pub mod resolve;
pub mod route;

pub use ping::*;
pub use resolve::*;
pub use route::*;
