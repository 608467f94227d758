pub mod comment;
pub mod follow;
pub mod post;
pub mod post_like;
pub mod profile_image;
pub mod user;
