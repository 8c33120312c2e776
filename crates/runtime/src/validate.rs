//! Identifier validation for user-supplied references.

use crate::error::RuntimeError;

/// Validates an engine resource identifier (container ID/name, image
/// reference, volume or network name).
///
/// Accepts hex IDs (short or full), names built from alphanumerics plus
/// `-_./:@` (covering tags, registries and digests), and rejects anything
/// carrying shell metacharacters or absurd lengths before it reaches the
/// engine or a subprocess.
pub fn validate_ref(id: &str) -> Result<(), RuntimeError> {
    if id.is_empty() {
        return Err(RuntimeError::InvalidState(
            "identifier cannot be empty".to_string(),
        ));
    }
    if id.len() > 256 {
        return Err(RuntimeError::InvalidState(
            "identifier too long".to_string(),
        ));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:@".contains(c))
    {
        return Err(RuntimeError::InvalidState(format!(
            "invalid identifier: {id}"
        )));
    }
    Ok(())
}
