use tracing::Level;

use crate::modules::{error::code::ErrorCode, logger::parse_log_level};

#[test]
fn log_levels_are_validated() {
    assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
    assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
    assert_eq!(
        parse_log_level("verbose").unwrap_err().code(),
        ErrorCode::InvalidParameter
    );
}
