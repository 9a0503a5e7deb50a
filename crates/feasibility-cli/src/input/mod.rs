use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

/// Read a JSON document from a file, or from stdin when `path` is `-`.
pub fn read_json_value(path: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if path == "-" {
        return read_stdin()?.ok_or_else(|| "stdin is empty or interactive".into());
    }
    let file = resolve_path(path)?;
    let contents = fs::read_to_string(&file)
        .map_err(|e| format!("Failed to read '{}': {}", file.display(), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", file.display(), e).into())
}

pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let value = read_json_value(path)?;
    serde_json::from_value(value).map_err(|e| format!("Invalid document '{path}': {e}").into())
}

/// JSON piped on stdin; `None` when stdin is a terminal or empty.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = PathBuf::from(path);
    let full = if p.is_absolute() {
        p
    } else {
        std::env::current_dir()?.join(p)
    };
    if !full.is_file() {
        return Err(format!("Parameter file not found: {}", full.display()).into());
    }
    Ok(full)
}
