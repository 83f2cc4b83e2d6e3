use std::env;
use std::str::FromStr;
use tracing::warn;

/// Reads and parses an environment variable, falling back to `default` when
/// it is unset or cannot be parsed.
///
/// # Arguments
/// - `var`: The name of the environment variable.
/// - `default`: The value used when the variable is absent or invalid.
pub fn get_env_var_or<T>(var: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(var) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "Ignoring invalid value {:?} for {}, using {:?}",
                    raw, var, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// Retrieves an environment variable as a string with a default.
pub fn get_env_var_string(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}
