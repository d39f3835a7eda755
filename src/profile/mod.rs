//! Profile data: the eight fixed tables, their records, and the operations
//! the data manager performs on them through the tool server.

pub mod aggregator;
pub mod errors;
pub mod params;
pub mod service;
pub mod sql;
pub mod tables;
pub mod types;
pub mod view;

pub use aggregator::{FetchPlan, FetchReport, TableOutcome};
pub use errors::ProfileError;
pub use service::ProfileService;
pub use tables::{ProfileTable, COMMON_FIELDS};
pub use types::{
    validate_record, Persona, ProfileData, ProfileRecord, QueryPage, QueryParams, RecordFilter,
    SortOrder, SqlResult, TableData, TableStats,
};
pub use view::DeletedSet;
