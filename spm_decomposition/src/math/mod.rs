pub mod quantile;
pub mod weighted;
