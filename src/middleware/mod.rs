pub mod response;
pub mod timing;
