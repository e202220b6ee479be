//! Option validation.
//!
//! # Responsibilities
//! - Check each listener port lies in `[1, 65535]`
//! - Detect listener ports that collide
//! - Reject negative log verbosity
//!
//! # Design Decisions
//! - Returns the first failure only; startup aborts on any of them
//! - Pure functions over already-parsed values

use std::collections::HashSet;

use thiserror::Error;

pub const MIN_PORT: i32 = 1;
pub const MAX_PORT: i32 = 65535;

/// Validation errors for [`ServerOptions`](crate::config::ServerOptions)
/// and [`LoggingOptions`](crate::observability::logging::LoggingOptions).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("invalid value {port} for flag {flag:?}: must be between 1 and 65535")]
    PortOutOfRange { flag: &'static str, port: i32 },

    #[error(
        "port conflict: grpc-port ({grpc_port}), grpc-health-port ({grpc_health_port}), \
         and metrics-port ({metrics_port}) must all be different"
    )]
    PortConflict {
        grpc_port: i32,
        grpc_health_port: i32,
        metrics_port: i32,
    },

    #[error("invalid log verbosity: must be a non-negative integer")]
    InvalidLogVerbosity,
}

/// Check a single port against `[MIN_PORT, MAX_PORT]`.
pub fn validate_port(flag: &'static str, port: i32) -> Result<(), OptionsError> {
    if !(MIN_PORT..=MAX_PORT).contains(&port) {
        return Err(OptionsError::PortOutOfRange { flag, port });
    }
    Ok(())
}

/// Require the three listener ports to be pairwise distinct.
pub fn validate_distinct_ports(
    grpc_port: i32,
    grpc_health_port: i32,
    metrics_port: i32,
) -> Result<(), OptionsError> {
    let ports: HashSet<i32> = [grpc_port, grpc_health_port, metrics_port].into_iter().collect();
    if ports.len() < 3 {
        return Err(OptionsError::PortConflict {
            grpc_port,
            grpc_health_port,
            metrics_port,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_bounds() {
        assert!(validate_port("grpc-port", 1).is_ok());
        assert!(validate_port("grpc-port", 65535).is_ok());
        assert_eq!(
            validate_port("grpc-port", 0),
            Err(OptionsError::PortOutOfRange { flag: "grpc-port", port: 0 })
        );
        assert!(validate_port("metrics-port", 65536).is_err());
        assert!(validate_port("metrics-port", -80).is_err());
    }

    #[test]
    fn test_port_error_names_flag_and_value() {
        let err = validate_port("grpc-health-port", 70000).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value 70000 for flag \"grpc-health-port\": must be between 1 and 65535"
        );
    }

    #[test]
    fn test_distinct_ports() {
        assert!(validate_distinct_ports(9004, 9005, 9090).is_ok());

        for (a, b, c) in [(9004, 9004, 9090), (9004, 9005, 9004), (1, 2, 2), (7, 7, 7)] {
            let err = validate_distinct_ports(a, b, c).unwrap_err();
            assert_eq!(
                err,
                OptionsError::PortConflict {
                    grpc_port: a,
                    grpc_health_port: b,
                    metrics_port: c,
                }
            );
        }
    }

    #[test]
    fn test_conflict_message_reports_all_ports() {
        let err = validate_distinct_ports(9004, 9004, 9090).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("grpc-port (9004)"));
        assert!(msg.contains("grpc-health-port (9004)"));
        assert!(msg.contains("metrics-port (9090)"));
    }
}
