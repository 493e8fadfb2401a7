use crate::{clock::SystemClock, hardware, totp};
use anyhow::{bail, Result};
use secrecy::{ExposeSecret, SecretString};

/// Print the current code and how long it stays current.
///
/// # Errors
/// Returns an error if the secret holds no Base32 data.
pub fn code(secret: &SecretString) -> Result<()> {
    let secret = secret.expose_secret();
    if totp::base32::decode(secret).is_empty() {
        bail!("TOTP secret contains no Base32 characters");
    }
    println!(
        "{}  ({}s left)",
        totp::generate_code(secret, &SystemClock),
        totp::remaining_seconds(&SystemClock)
    );
    Ok(())
}

/// # Errors
/// Returns an error if the JSON output cannot be rendered.
pub fn hardware_id(json: bool) -> Result<()> {
    let fingerprint = hardware::fingerprint();
    let computer_name = hardware::computer_name();
    if json {
        let value = serde_json::json!({
            "hardware_id": fingerprint,
            "computer_name": computer_name,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{fingerprint}  {computer_name}");
    }
    Ok(())
}
