/// Integration tests for portal-session
///
/// These tests drive the session manager against a mock portal backend
/// served over real HTTP, with an in-memory credential store.
mod common;

mod integration {
    pub mod api_client_flows;
    pub mod login_flows;
}
