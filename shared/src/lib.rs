pub mod map_info;
pub mod mark;
pub mod poi;
pub mod sprite;

pub use map_info::*;
pub use mark::*;
pub use poi::PoiRecord;
pub use sprite::*;
