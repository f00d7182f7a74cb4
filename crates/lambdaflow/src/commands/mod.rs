pub mod decommission;
pub mod deploy;
pub mod destroy;
pub mod plan;
pub mod release;
pub mod status;
pub mod unrelease;
