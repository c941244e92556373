use std::path::Path;

use crate::config::Config;

/// Check a freshly downloaded file before it replaces the installed one.
/// Configuration has to load, JSON has to parse and anything else has to at
/// least be text.
pub fn validate_file(path: &Path) -> Result<(), String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let text = String::from_utf8(bytes).map_err(|e| format!("not UTF-8: {}", e))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("ron") => Config::parse(&text)
            .map(|_| ())
            .map_err(|e| format!("not a valid configuration: {}", e)),
        Some("json") => serde_json::from_str::<serde_json::Value>(&text)
            .map(|_| ())
            .map_err(|e| format!("not valid JSON: {}", e)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, contents: &[u8]) -> Result<(), String> {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        let result = validate_file(&path);
        std::fs::remove_file(&path).ok();
        result
    }

    #[test]
    fn test_validate_by_extension() {
        assert!(check("ok.json", br#"{"version": 2}"#).is_ok());
        assert!(check("bad.json", b"{version").is_err());
        assert!(check("notes.txt", b"anything goes").is_ok());
        assert!(check("blob.bin", &[0xff, 0xfe, 0x00]).is_err());
        assert!(check("bad.ron", b"(hostname: )").is_err());
        assert!(check(
            "good.ron",
            br#"(hostname: "mailbox", reed_switch: (pin: Gpio(GpioPin(22))), notify: (request_url: "https://example.com/"))"#
        )
        .is_ok());
    }
}
