pub mod auth;
pub mod landing;
pub mod predict;
pub mod responses;
pub mod router;
pub mod session;
pub mod state;
pub mod storage;
pub mod templates;
pub mod uploads;

pub use responses::AppError;
pub use state::AppState;
