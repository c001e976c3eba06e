pub mod mock_auth_server;

pub use mock_auth_server::{BROKEN_EMAIL, MockAuthServer, PASSWORD, USER_EMAIL};
