pub mod api;
pub mod saves;
