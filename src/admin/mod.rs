/// Admin panel queries
///
/// Account and playlist management reuse `AccountManager` and `PlaylistStore`;
/// this module adds the dashboard aggregates.

mod dashboard;

pub use dashboard::{AdminDashboard, Dashboard, DashboardTotals, RecentActivity};

use serde::Deserialize;

/// Default page size for admin listings
pub const DEFAULT_PAGE_SIZE: i64 = 50;
/// Largest page an admin listing returns
pub const MAX_PAGE_SIZE: i64 = 200;

/// `?limit&offset` query for admin listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Clamp to a sane window
    pub fn resolve(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}
