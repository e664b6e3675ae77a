//! Route paths.

pub const GET_ROOT: &str = "/";
pub const POST_REGISTER: &str = "/register";
pub const POST_LOGIN: &str = "/login";
pub const POST_REFRESH: &str = "/refresh";
pub const POST_LOGOUT: &str = "/logout";
pub const GET_USERS_ME: &str = "/users/me";
