//! Obtain the raw delimited-text payload from a file, stdin, or URL.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::LoadError;

/// Where a payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Stdin,
    File(PathBuf),
    Url(String),
}

impl SourceLocation {
    /// `-` is stdin, `http://` / `https://` is a URL, anything else a path.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s == "-" {
            Self::Stdin
        } else if s.starts_with("http://") || s.starts_with("https://") {
            Self::Url(s.to_string())
        } else {
            Self::File(PathBuf::from(s))
        }
    }

    /// Short name used to derive a default output file name.
    pub fn stem(&self) -> String {
        let name = match self {
            Self::Stdin => None,
            Self::File(path) => path.file_stem().map(|s| s.to_string_lossy().to_string()),
            Self::Url(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|base| base.trim_end_matches('/').rsplit('/').next())
                .map(|last| last.split('.').next().unwrap_or(last).to_string()),
        };
        name.filter(|n| !n.is_empty())
            .unwrap_or_else(|| "stdin".to_string())
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => f.write_str("<stdin>"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Load the payload as UTF-8 text. Any failure is `SourceUnavailable`.
pub fn load_source(location: &SourceLocation, timeout: Duration) -> Result<String, LoadError> {
    let describe = location.to_string();
    let bytes = match location {
        SourceLocation::Stdin => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .map_err(|e| LoadError::source_unavailable(&describe, e))?;
            buffer
        }
        SourceLocation::File(path) => {
            std::fs::read(path).map_err(|e| LoadError::source_unavailable(&describe, e))?
        }
        SourceLocation::Url(url) => fetch(url, timeout)?,
    };

    let text =
        String::from_utf8(bytes).map_err(|e| LoadError::source_unavailable(&describe, e))?;
    log::info!("Loaded {} bytes from {describe}", text.len());
    Ok(text)
}

fn fetch(url: &str, timeout: Duration) -> Result<Vec<u8>, LoadError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LoadError::source_unavailable(url, e))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| LoadError::source_unavailable(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::source_unavailable(
            url,
            format!("HTTP error! status: {}", status.as_u16()),
        ));
    }

    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| LoadError::source_unavailable(url, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_locations() {
        assert_eq!(SourceLocation::parse("-"), SourceLocation::Stdin);
        assert_eq!(
            SourceLocation::parse("https://example.org/MycoDB.csv"),
            SourceLocation::Url("https://example.org/MycoDB.csv".to_string())
        );
        assert_eq!(
            SourceLocation::parse("data/MycoDB.csv"),
            SourceLocation::File(PathBuf::from("data/MycoDB.csv"))
        );
    }

    #[test]
    fn stems() {
        assert_eq!(SourceLocation::parse("data/MycoDB_v4.csv").stem(), "MycoDB_v4");
        assert_eq!(
            SourceLocation::parse("https://example.org/db/MycoDB.csv?raw=1").stem(),
            "MycoDB"
        );
        assert_eq!(SourceLocation::Stdin.stem(), "stdin");
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let location = SourceLocation::parse("/definitely/not/here.csv");
        let err = load_source(&location, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, LoadError::SourceUnavailable { .. }));
    }

    #[test]
    fn invalid_utf8_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.csv");
        std::fs::write(&path, [b'a', b',', 0xE9, b'\n']).unwrap();
        let err = load_source(&SourceLocation::File(path), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, LoadError::SourceUnavailable { .. }));
    }
}
