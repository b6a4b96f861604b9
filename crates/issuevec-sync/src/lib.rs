pub mod clickhouse;
pub mod pipeline;

pub use clickhouse::ClickHouseClient;
pub use pipeline::{zip_rows, RowPipeline};
