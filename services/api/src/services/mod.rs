pub mod analytics;
pub mod assistant;
pub mod directory;
pub mod emergency;
pub mod identity;
pub mod reporting;
pub mod session;

pub use analytics::AnalyticsService;
pub use assistant::AssistantService;
pub use directory::DirectoryService;
pub use emergency::EmergencyService;
pub use identity::{IdentityService, LoginOutcome};
pub use reporting::ReportingService;
pub use session::SessionStore;
