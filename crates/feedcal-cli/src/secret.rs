//! Secret reference resolver.
//!
//! Google credentials in `config.toml` may point outside the file instead
//! of holding the secret itself:
//!
//! - `pass::path/in/store` reads the first line of `pass show path/in/store`
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is used verbatim

/// Resolves a credential value that may be a secret reference.
///
/// Surrounding whitespace is trimmed from whatever the reference yields, and
/// an empty result is an error.
pub fn resolve(value: &str) -> Result<String, String> {
    let resolved = match value.split_once("::") {
        Some(("pass", path)) => resolve_pass(path)?,
        Some(("env", var)) => resolve_env(var)?,
        _ => return Ok(value.to_string()),
    };

    let resolved = resolved.trim();
    if resolved.is_empty() {
        return Err(format!("secret reference `{}` resolved to an empty value", value));
    }
    Ok(resolved.to_string())
}

/// Runs `pass show <path>` and returns the first line of stdout.
fn resolve_pass(path: &str) -> Result<String, String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| format!("failed to run `pass show {}`: {}", path, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`pass show {}` failed (exit {}): {}",
            path,
            output.status,
            stderr.trim()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .next()
        .map(|s| s.to_string())
        .ok_or_else(|| format!("`pass show {}` produced no output", path))
}

/// Reads an environment variable.
fn resolve_env(var: &str) -> Result<String, String> {
    std::env::var(var).map_err(|_| format!("environment variable `{}` is not set", var))
}
