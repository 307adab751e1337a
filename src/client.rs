use std::path::Path;

use crate::{
    error::ApiError,
    models::{Image, Os, Search},
};

const IMAGE_PATH: &str = "api/image/";
const OS_PATH: &str = "api/os/";
const UPLOAD_PATH: &str = "api/upload/";

/// The remote calls the CLI needs from the Talus web service.
///
/// Everything else (resolution, refresh, children, the lifecycle requests) is
/// built on top of these in `crate::images`.
#[async_trait::async_trait]
pub trait TalusApi: Send + Sync {
    /// List images matching the search.
    async fn list_images(&self, search: &Search) -> Result<Vec<Image>, ApiError>;

    /// Create the image if it has no id, update it otherwise. The image is
    /// replaced with what the service returns.
    async fn save_image(&self, image: &mut Image) -> Result<(), ApiError>;

    /// List operating systems matching the search.
    async fn list_oses(&self, search: &Search) -> Result<Vec<Os>, ApiError>;

    /// Upload a local file, returning the id the service assigned to it.
    async fn upload_file(&self, path: &Path) -> Result<String, ApiError>;
}

/// A `TalusApi` backed by the service's REST endpoints.
pub struct Client {
    http: reqwest::Client,
    base: url::Url,
}

impl Client {
    /// Create a client for the web app rooted at `host`.
    ///
    /// A host without a scheme gets `http://` when it is local and `https://`
    /// otherwise.
    pub fn new(host: &str) -> Result<Self, ApiError> {
        let base = parse_base_url(host)?;

        let http = reqwest::Client::builder()
            .user_agent(format!("talus/{}", clap::crate_version!()))
            .build()?;

        Ok(Client { http, base })
    }

    fn url(&self, path: &str) -> Result<url::Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::Remote(format!("invalid api path {}: {}", path, e)))
    }

    async fn get_list<T: serde::de::DeserializeOwned>(&self, path: &str, search: &Search) -> Result<Vec<T>, ApiError> {
        let url = self.url(path)?;
        log::debug!("GET {} {:?}", url, search.pairs());

        let resp = self.http.get(url.clone()).query(search.pairs()).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(ApiError::remote(&format!("Could not list {}", url), &text));
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Remote(format!("invalid response from {}: {}", url, e)))
    }
}

#[async_trait::async_trait]
impl TalusApi for Client {
    async fn list_images(&self, search: &Search) -> Result<Vec<Image>, ApiError> {
        self.get_list(IMAGE_PATH, search).await
    }

    async fn save_image(&self, image: &mut Image) -> Result<(), ApiError> {
        let req = match &image.id {
            Some(id) => {
                let url = self.url(&format!("{}{}/", IMAGE_PATH, id))?;
                log::debug!("PUT {}", url);
                self.http.put(url)
            }
            None => {
                let url = self.url(IMAGE_PATH)?;
                log::debug!("POST {}", url);
                self.http.post(url)
            }
        };

        let resp = req.json(&*image).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(ApiError::remote("Could not save model", &text));
        }

        *image = serde_json::from_str(&text).map_err(|e| ApiError::Remote(format!("invalid image in response: {}", e)))?;

        Ok(())
    }

    async fn list_oses(&self, search: &Search) -> Result<Vec<Os>, ApiError> {
        self.get_list(OS_PATH, search).await
    }

    async fn upload_file(&self, path: &Path) -> Result<String, ApiError> {
        if !path.exists() {
            return Err(ApiError::NotFound(format!("file {}", path.display())));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ApiError::Remote(format!("could not open {}: {}", path.display(), e)))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| ApiError::Remote(format!("could not stat {}: {}", path.display(), e)))?
            .len();

        let part = reqwest::multipart::Part::stream_with_length(reqwest::Body::from(file), len)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = self.url(UPLOAD_PATH)?;
        log::debug!("POST {} ({} bytes)", url, len);

        let resp = self.http.post(url).multipart(form).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(ApiError::remote("Could not upload file!", &text));
        }

        Ok(unquote(text.trim()).to_string())
    }
}

/// Normalize the configured host into the root URL of the web app.
pub fn parse_base_url(host: &str) -> Result<url::Url, ApiError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ApiError::validation("no talus host configured, set one with `talus config set host URL`"));
    }

    let mut base = if host.contains("://") {
        host.to_string()
    } else if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        format!("http://{}", host)
    } else {
        format!("https://{}", host)
    };

    if !base.ends_with('/') {
        base.push('/');
    }

    url::Url::parse(&base).map_err(|e| ApiError::validation(format!("invalid talus host {}: {}", host, e)))
}

/// The upload endpoint answers with the id as a JSON string.
fn unquote(s: &str) -> &str {
    let quoted = s.len() >= 2 && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')));
    if quoted {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    pub struct TestItem {
        name: String,
        host: String,
        want: String,
        want_err: bool,
    }

    #[test]
    fn test_parse_base_url() {
        let tests = vec![
            TestItem {
                name: "full url".to_string(),
                host: "http://talus.internal:8001".to_string(),
                want: "http://talus.internal:8001/".to_string(),
                want_err: false,
            },
            TestItem {
                name: "localhost without scheme".to_string(),
                host: "localhost:8001".to_string(),
                want: "http://localhost:8001/".to_string(),
                want_err: false,
            },
            TestItem {
                name: "remote without scheme".to_string(),
                host: "talus.example.com".to_string(),
                want: "https://talus.example.com/".to_string(),
                want_err: false,
            },
            TestItem {
                name: "sub path".to_string(),
                host: "https://example.com/talus".to_string(),
                want: "https://example.com/talus/".to_string(),
                want_err: false,
            },
            TestItem {
                name: "empty".to_string(),
                host: " ".to_string(),
                want: "".to_string(),
                want_err: true,
            },
        ];

        for t in tests {
            match parse_base_url(&t.host) {
                Ok(url) => {
                    assert!(!t.want_err, "test {}: expected an error", t.name);
                    assert_eq!(url.to_string(), t.want, "test {}", t.name);
                }
                Err(err) => assert!(t.want_err, "test {}: {}", t.name, err),
            }
        }
    }

    #[test]
    fn test_client_joins_api_paths() {
        let client = Client::new("http://localhost:8001/talus").unwrap();
        assert_eq!(
            client.url(IMAGE_PATH).unwrap().to_string(),
            "http://localhost:8001/talus/api/image/"
        );
        assert_eq!(
            client.url(&format!("{}{}/", IMAGE_PATH, "abc")).unwrap().to_string(),
            "http://localhost:8001/talus/api/image/abc/"
        );
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"5543a1f0\""), "5543a1f0");
        assert_eq!(unquote("'5543a1f0'"), "5543a1f0");
        assert_eq!(unquote("5543a1f0"), "5543a1f0");
        assert_eq!(unquote("\""), "\"");
    }
}
