use crate::case_type::CaseType;
use crate::time_bucket::MonthBucket;

/// Render the human-readable case identifier `TYPE-YYYY-MM-SEQ`.
///
/// The sequence is zero-padded to a minimum of 4 digits; wider values pass
/// through untruncated, so the id simply widens past seq 9999.
pub fn format_case_id(case_type: CaseType, bucket: &MonthBucket, seq: i64) -> String {
    format!("{}-{}-{}-{:04}", case_type, bucket.year, bucket.month, seq)
}
