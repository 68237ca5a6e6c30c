/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and validation
/// - [`policy`]: role-based permission checks used by every service
///
/// # Example
///
/// ```
/// use runbook_core::auth::password::{hash_password_with, verify_password, PasswordParams};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password_with("user_password", &PasswordParams::insecure_fast())?;
/// assert!(verify_password("user_password", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod password;
pub mod policy;
