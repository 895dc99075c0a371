/// Bcrypt password hashing compatible with Spring's BCryptPasswordEncoder
use bcrypt::BcryptError;

pub use bcrypt::DEFAULT_COST;

/// Hash a password with a fresh random salt at the default cost
pub fn encode_password(plain: &str) -> Result<String, BcryptError> {
    encode_password_with_cost(plain, DEFAULT_COST)
}

pub fn encode_password_with_cost(plain: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(plain, cost)
}

/// Verify a password against an existing bcrypt hash
///
/// A malformed hash is an error, not a mismatch.
pub fn check_password(plain: &str, hash: &str) -> Result<bool, BcryptError> {
    bcrypt::verify(plain, hash)
}

/// Hash as Spring's DelegatingPasswordEncoder stores it
pub fn spring_hash(hash: &str) -> String {
    format!("{{bcrypt}}{}", hash)
}

/// Escape `$` for docker compose files, which would otherwise interpolate it
pub fn docker_escape(value: &str) -> String {
    value.replace('$', "$$")
}
