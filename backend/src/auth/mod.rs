pub mod extract;
pub mod password;
pub mod token;

pub use extract::{ADMIN_COOKIE, AdminAuth, STUDENT_COOKIE, StudentAuth, clear_cookie, session_cookie};
pub use password::{MIN_PASSWORD_LEN, hash_password, verify_password};
pub use token::{Claims, Role, issue_token, verify_token};
