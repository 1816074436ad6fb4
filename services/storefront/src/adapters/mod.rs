pub mod http;
pub mod token_file;

pub use http::ReqwestTransport;
pub use token_file::FileSessionStore;
