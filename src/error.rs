use std::path::PathBuf;

use thiserror::Error;

/// The file the full body of an HTML error page is written to.
const ERROR_PAGE_FILE: &str = "talus_client_error.html";

/// Errors surfaced by the Talus API and the image operations built on it.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The referenced image, base image, OS or record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The image is the base of other images and cannot be changed.
    #[error("the image {0} has dependent snapshots")]
    HasDependents(String),

    /// Required fields are missing or a value is malformed.
    #[error("{}", .0.join("\n"))]
    Validation(Vec<String>),

    /// Any other failure reported by the remote service or the transport.
    #[error("{0}")]
    Remote(String),
}

impl ApiError {
    #[cfg(test)]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(vec![msg.into()])
    }

    /// Build a remote error from a failed response body.
    ///
    /// The service renders unhandled exceptions as HTML pages. When the body
    /// looks like one, the title and exception text are pulled out of it and
    /// the whole page is saved to a temp file for later inspection.
    pub fn remote(msg: &str, body: &str) -> Self {
        let mut msg = msg.to_string();

        if body.trim().is_empty() {
            return ApiError::Remote(msg);
        }

        if let Some(summary) = summarize_error_page(body) {
            msg.push_str("\n\n");
            msg.push_str(&summary);
        }

        match save_error_page(body) {
            Ok(path) => {
                msg.push_str(&format!("\n\nFull error text can be found at {}", path.display()));
            }
            Err(err) => {
                log::debug!("could not save error page: {}", err);
            }
        }

        ApiError::Remote(msg)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            if let Some(url) = err.url() {
                return ApiError::Remote(format!("could not connect to {}", url));
            }
        }

        ApiError::Remote(err.to_string())
    }
}

/// Pull "<title>: <exception>" out of an HTML error page.
pub fn summarize_error_page(body: &str) -> Option<String> {
    let title_re = regex::Regex::new(r"(?s)<h1>(.*?)</h1>").ok()?;
    let value_re = regex::Regex::new(r#"(?s)<pre class=.exception_value.>([^<]*)</pre>"#).ok()?;

    let title = title_re.captures(body)?.get(1)?.as_str().trim().to_string();
    let value = value_re.captures(body)?.get(1)?.as_str();

    Some(format!("{}: {}", title, unescape_html(value)))
}

fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn save_error_page(body: &str) -> std::io::Result<PathBuf> {
    let path = std::env::temp_dir().join(ERROR_PAGE_FILE);
    std::fs::write(&path, body)?;
    Ok(path)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    pub struct TestItem {
        name: String,
        body: String,
        want: Option<String>,
    }

    #[test]
    fn test_summarize_error_page() {
        let tests = vec![
            TestItem {
                name: "django error page".to_string(),
                body: r#"<html><body>
<h1>KeyError at /api/image/</h1>
<pre class="exception_value">&#39;base_image&#39; is not &lt;valid&gt;</pre>
</body></html>"#
                    .to_string(),
                want: Some("KeyError at /api/image/: 'base_image' is not <valid>".to_string()),
            },
            TestItem {
                name: "title without exception".to_string(),
                body: "<h1>Server Error (500)</h1>".to_string(),
                want: None,
            },
            TestItem {
                name: "plain text".to_string(),
                body: "bad request".to_string(),
                want: None,
            },
        ];

        for t in tests {
            assert_eq!(summarize_error_page(&t.body), t.want, "test {}", t.name);
        }
    }

    #[test]
    fn test_remote_error_empty_body() {
        let err = ApiError::remote("Could not save model", "  ");
        assert_eq!(err.to_string(), "Could not save model");
    }

    #[test]
    fn test_validation_error_joins_messages() {
        let err = ApiError::Validation(vec![
            "You must specify the os".to_string(),
            "You must specify a name for the image".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "You must specify the os\nYou must specify a name for the image"
        );
        assert!(!err.is_not_found());
        assert!(ApiError::NotFound("image foo".to_string()).is_not_found());
    }
}
