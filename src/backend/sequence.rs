use log::info;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use super::fetch::is_remote;
use super::listing::{self, TimeWindow};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed listing: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub locator: String,
    pub label: String,
}

impl Entry {
    pub fn new(locator: String) -> Self {
        let label = label_for(&locator);
        Self { locator, label }
    }
}

/// The fixed, ordered list of images for one session.
#[derive(Debug, Default)]
pub struct Sequence {
    entries: Vec<Entry>,
}

impl Sequence {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn from_locators(locators: Vec<String>) -> Self {
        Self::new(locators.into_iter().map(Entry::new).collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn locator(&self, position: usize) -> Option<&str> {
        self.entries.get(position).map(|e| e.locator.as_str())
    }

    pub fn label(&self, position: usize) -> Option<&str> {
        self.entries.get(position).map(|e| e.label.as_str())
    }
}

pub enum SequenceSource {
    /// JSON array of locators, relative to the index location.
    Index(String),
    /// Camera API photo listing, reduced to one photo per day.
    Listing {
        source: String,
        token: Option<String>,
        window: TimeWindow,
    },
}

pub async fn load(
    source: &SequenceSource,
    client: &reqwest::Client,
) -> Result<Sequence, LoadError> {
    let sequence = match source {
        SequenceSource::Index(index) => {
            let text = read_source(index, client, None).await?;
            let names: Vec<String> = serde_json::from_str(&text)?;
            let locators = names
                .iter()
                .map(|name| resolve(index, name))
                .collect::<Result<Vec<_>, _>>()?;
            Sequence::from_locators(locators)
        }
        SequenceSource::Listing {
            source,
            token,
            window,
        } => {
            let text = read_source(source, client, token.as_deref()).await?;
            let photos = listing::parse_listing(&text)?;
            Sequence::new(listing::daily_entries(photos, window, &chrono::Local))
        }
    };
    info!("loaded sequence of {} images", sequence.len());
    Ok(sequence)
}

pub(crate) async fn read_source(
    source: &str,
    client: &reqwest::Client,
    bearer: Option<&str>,
) -> Result<String, LoadError> {
    if is_remote(source) {
        let mut request = client.get(source);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                status,
                url: source.to_string(),
            });
        }
        Ok(response.text().await?)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|source_err| LoadError::Io {
                path: PathBuf::from(source),
                source: source_err,
            })
    }
}

/// Resolves `name` against the directory or URL that holds `index`.
fn resolve(index: &str, name: &str) -> Result<String, LoadError> {
    if is_remote(name) {
        return Ok(name.to_string());
    }
    if is_remote(index) {
        return Ok(Url::parse(index)?.join(name)?.to_string());
    }
    let path = Path::new(name);
    if path.is_absolute() {
        return Ok(name.to_string());
    }
    let dir = Path::new(index).parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(path).to_string_lossy().into_owned())
}

/// First `YYYY-MM-DD` in the file name, else the file name itself.
fn label_for(locator: &str) -> String {
    let name = locator
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(locator)
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let bytes = name.as_bytes();
    for start in 0..bytes.len().saturating_sub(9) {
        let window = &bytes[start..start + 10];
        let is_date = window.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
        if is_date {
            return name[start..start + 10].to_string();
        }
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> reqwest::Client {
        crate::backend::fetch::build_client("dashview-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_labels() {
        assert_eq!(label_for("assets/2024-05-01.jpg"), "2024-05-01");
        assert_eq!(label_for("https://cdn.example/x/cam_2023-12-31_0800.jpg?sig=1"), "2023-12-31");
        assert_eq!(label_for("assets/photo.jpg"), "photo.jpg");
        assert_eq!(label_for("2024-1-01.jpg"), "2024-1-01.jpg");
    }

    #[test]
    fn test_resolve_relative_to_index() {
        assert_eq!(
            resolve("https://example.com/assets/index.json", "2024-05-01.jpg").unwrap(),
            "https://example.com/assets/2024-05-01.jpg"
        );
        assert_eq!(
            resolve("https://example.com/assets/index.json", "https://cdn.example/a.jpg").unwrap(),
            "https://cdn.example/a.jpg"
        );
        assert_eq!(
            resolve("assets/index.json", "2024-05-01.jpg").unwrap(),
            Path::new("assets").join("2024-05-01.jpg").to_string_lossy()
        );
        assert_eq!(resolve("index.json", "a.jpg").unwrap(), "a.jpg");
    }

    #[test]
    fn test_sequence_accessors() {
        let sequence = Sequence::from_locators(vec!["a/2024-01-02.jpg".into(), "a/b.png".into()]);
        assert_eq!(sequence.len(), 2);
        assert_eq!(sequence.locator(1), Some("a/b.png"));
        assert_eq!(sequence.label(0), Some("2024-01-02"));
        assert_eq!(sequence.label(2), None);
    }

    #[tokio::test]
    async fn test_load_index_file() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.json");
        std::fs::write(&index, r#"["2024-05-01.jpg", "2024-05-02.jpg"]"#).unwrap();

        let source = SequenceSource::Index(index.to_string_lossy().into_owned());
        let sequence = load(&source, &client()).await.unwrap();
        assert_eq!(sequence.len(), 2);
        assert_eq!(
            sequence.locator(1).map(PathBuf::from),
            Some(dir.path().join("2024-05-02.jpg"))
        );
        assert_eq!(sequence.label(0), Some("2024-05-01"));
    }

    #[tokio::test]
    async fn test_load_failures() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let missing = SequenceSource::Index(missing.to_string_lossy().into_owned());
        assert!(matches!(load(&missing, &client()).await, Err(LoadError::Io { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        let bad = SequenceSource::Index(bad.to_string_lossy().into_owned());
        assert!(matches!(load(&bad, &client()).await, Err(LoadError::Json(_))));
    }

    #[tokio::test]
    async fn test_empty_index_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.json");
        std::fs::write(&index, "[]").unwrap();

        let source = SequenceSource::Index(index.to_string_lossy().into_owned());
        assert!(load(&source, &client()).await.unwrap().is_empty());
    }
}
