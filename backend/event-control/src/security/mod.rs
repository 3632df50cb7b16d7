pub mod admin_token;
pub mod password;
pub mod viewer_token;
