pub mod identity_directory;
pub mod registration_service;
pub mod session_manager;

pub use identity_directory::IdentityDirectory;
pub use registration_service::{RegistrationRequest, RegistrationService};
pub use session_manager::SessionManager;
