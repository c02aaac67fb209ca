//! Terminal dashboard for watching a check run

mod dashboard;

pub use dashboard::CheckerDashboard;
