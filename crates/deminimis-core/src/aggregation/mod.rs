pub mod group;
pub mod status;

pub use group::{aggregate, Associate, GroupAggregateResult, GroupAggregator, GroupMember, MemberRole, Methodology};
pub use status::{utilization_pct, AidStatus};
