//! Pure view reducers over the normalized device list.

pub mod alerts;
pub mod report;
pub mod stats;
pub mod users;

pub use alerts::{notifications, Notifications, DEFAULT_ALERT_LIMIT};
pub use report::{report_rows, ReportQuery, ReportRow, StatusFilter};
pub use stats::{dashboard_stats, DashboardStats};
pub use users::{user_rows, UserRow};
