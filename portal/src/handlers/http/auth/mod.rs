pub mod logout;
pub mod session;

pub use logout::handle_signout;
pub use session::handle_session;
