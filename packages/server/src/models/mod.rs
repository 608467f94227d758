pub mod auth;
pub mod comment;
pub mod follow;
pub mod post;
pub mod shared;
pub mod upload;
pub mod user;
