pub mod case_id;
pub mod case_type;
pub mod configure;
pub mod counter;
pub mod gateway;
pub mod logger;
pub mod time_bucket;
