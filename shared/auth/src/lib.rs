pub mod jwt;
pub mod password;
pub mod session;
pub mod middleware;

pub use jwt::*;
pub use password::*;
pub use session::*;
pub use middleware::*;
