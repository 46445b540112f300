mod models;
mod views;

pub use models::*;
pub use views::*;
