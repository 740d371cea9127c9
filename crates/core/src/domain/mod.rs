pub mod rate;
pub mod trip;
