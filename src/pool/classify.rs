use crate::driver::DriverError;
use crate::error::SqlLoomError;
use crate::types::Dialect;

/// Codes reported when the server rejects the login or refuses the session.
const AUTHENTICATION_CODES: &[&str] = &["ECONNREFUSED", "ER_ACCESS_DENIED_ERROR"];
/// Codes reported when the server cannot be reached at all.
const CONNECTIVITY_CODES: &[&str] = &["ENOTFOUND", "EHOSTUNREACH", "EINVAL"];

/// Map a connect failure onto the surfaced error.
///
/// Only the message changes; unknown codes pass through as
/// `SqlLoomError::ConnectionError` with the driver's own text.
#[must_use]
pub fn classify_connect_error(dialect: Dialect, err: DriverError) -> SqlLoomError {
    let name = dialect.display_name();
    match err.code() {
        Some(code) if AUTHENTICATION_CODES.contains(&code) => SqlLoomError::AuthenticationError(
            format!("Failed to authenticate for {name}. Please double check your settings."),
        ),
        Some(code) if CONNECTIVITY_CODES.contains(&code) => SqlLoomError::ConnectivityError(
            format!("Failed to find {name} server. Please double check your settings."),
        ),
        _ => SqlLoomError::ConnectionError(err.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_and_denied_are_authentication_failures() {
        for code in ["ECONNREFUSED", "ER_ACCESS_DENIED_ERROR"] {
            let err = classify_connect_error(Dialect::Oracle, DriverError::with_code(code, "boom"));
            assert!(matches!(
                &err,
                SqlLoomError::AuthenticationError(msg)
                    if msg == "Failed to authenticate for ORACLE. Please double check your settings."
            ));
        }
    }

    #[test]
    fn unreachable_hosts_are_connectivity_failures() {
        for code in ["ENOTFOUND", "EHOSTUNREACH", "EINVAL"] {
            let err = classify_connect_error(Dialect::Oracle, DriverError::with_code(code, "boom"));
            assert!(matches!(
                &err,
                SqlLoomError::ConnectivityError(msg)
                    if msg == "Failed to find ORACLE server. Please double check your settings."
            ));
        }
    }

    #[test]
    fn other_failures_keep_the_driver_message() {
        let err = classify_connect_error(
            Dialect::Mysql,
            DriverError::with_code("ORA-12514", "listener does not know of service"),
        );
        assert_eq!(
            err.to_string(),
            "Connection error: listener does not know of service"
        );
        assert!(matches!(
            classify_connect_error(Dialect::Mysql, DriverError::new("eof")),
            SqlLoomError::ConnectionError(_)
        ));
    }
}
