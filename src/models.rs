use serde::{Deserialize, Serialize};

/// Lifecycle states an image moves through.
pub mod state {
    pub const IMPORT: &str = "import";
    pub const CREATE: &str = "create";
    pub const CONFIGURE: &str = "configure";
    pub const CONFIGURING: &str = "configuring";
    pub const READY: &str = "ready";
    pub const DELETE: &str = "delete";
}

/// A VM image (or snapshot of one) stored in Talus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Reference>,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: ImageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<Reference>,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub timestamps: Timestamps,
}

fn default_username() -> String {
    "user".to_string()
}

fn default_password() -> String {
    "password".to_string()
}

impl Default for Image {
    fn default() -> Self {
        Image {
            id: None,
            name: String::new(),
            os: None,
            desc: String::new(),
            tags: Vec::new(),
            status: ImageStatus::default(),
            base_image: None,
            username: default_username(),
            password: default_password(),
            md5: String::new(),
            timestamps: Timestamps::default(),
        }
    }
}

impl Image {
    /// The remote id, or an empty string for an image that was never saved.
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn base_image_id(&self) -> Option<&str> {
        self.base_image.as_ref().map(|r| r.id())
    }

    pub fn add_tag(&mut self, tag: &str) {
        if !tag.is_empty() && !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }
}

/// A reference to another record.
///
/// The API returns references either as a bare id or expanded into an object
/// carrying at least the id and name. They are always sent back as the id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    Id(String),
    Expanded {
        id: String,
        #[serde(default)]
        name: String,
    },
}

impl Reference {
    pub fn id(&self) -> &str {
        match self {
            Reference::Id(id) => id,
            Reference::Expanded { id, .. } => id,
        }
    }

    /// The referenced name when it is known, the id otherwise.
    pub fn nice_name(&self, show_id: bool) -> String {
        match self {
            Reference::Expanded { id, name } if !name.is_empty() => {
                if show_id {
                    format!("{} ({})", name, id)
                } else {
                    name.to_string()
                }
            }
            _ => self.id().to_string(),
        }
    }
}

impl From<&str> for Reference {
    fn from(id: &str) -> Self {
        Reference::Id(id.to_string())
    }
}

impl Serialize for Reference {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

/// The status of an image: a state name plus whatever the service attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageStatus {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageStatus {
    pub fn new(name: &str) -> Self {
        ImageStatus {
            name: name.to_string(),
            extra: Default::default(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn is(&self, state: &str) -> bool {
        self.name == state
    }

    /// The error the service reported for the image, if any.
    pub fn error(&self) -> Option<String> {
        match self.extra.get("error")? {
            serde_json::Value::String(s) => Some(s.to_string()),
            serde_json::Value::Null => None,
            v => Some(v.to_string()),
        }
    }

    /// The VNC address of a running configuration VM.
    pub fn vnc_uri(&self) -> Option<&str> {
        self.extra.get("vnc")?.get("vnc")?.get("uri")?.as_str()
    }

    pub fn user_interaction(&self) -> bool {
        self.extra
            .get("user_interaction")
            .and_then(|v| v.as_bool())
            .unwrap_or_default()
    }

    pub fn vagrantfile(&self) -> Option<&str> {
        self.extra.get("vagrantfile")?.as_str()
    }

    /// What to show in a status column: the VNC address while one is up.
    pub fn display(&self) -> String {
        match self.vnc_uri() {
            Some(uri) => uri.to_string(),
            None => self.name.to_string(),
        }
    }
}

/// Creation and modification times, in seconds since the epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<f64>,
}

impl Timestamps {
    pub fn now() -> f64 {
        chrono::Utc::now().timestamp_millis() as f64 / 1000.0
    }

    /// The time `epoch` seconds after the epoch, or `None` when chrono cannot
    /// represent it.
    pub fn to_datetime(epoch: f64) -> Option<chrono::DateTime<chrono::Utc>> {
        if !epoch.is_finite() || epoch < 0.0 || epoch >= i64::MAX as f64 {
            return None;
        }

        let secs = epoch.trunc() as i64;
        let nanos = ((epoch.fract() * 1e9) as u32).min(999_999_999);
        chrono::TimeZone::timestamp_opt(&chrono::Utc, secs, nanos).single()
    }
}

/// An operating system record images are tied to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Os {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "type")]
    pub os_type: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Query parameters for listing records.
///
/// Keys may repeat; repeated keys are sent as repeated query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Search(Vec<(String, String)>);

impl Search {
    pub fn new() -> Self {
        Search(Vec::new())
    }

    /// A search with a single term.
    pub fn by(key: &str, value: &str) -> Self {
        let mut search = Search::new();
        search.push(key, value);
        search
    }

    /// Add a value for `key`, keeping existing values.
    pub fn push(&mut self, key: &str, value: &str) {
        self.0.push((key.to_string(), value.to_string()));
    }

    /// Replace every value of `key` with `value`.
    pub fn set(&mut self, key: &str, value: &str) {
        self.0.retain(|(k, _)| k != key);
        self.push(key, value);
    }

    pub fn set_default(&mut self, key: &str, value: &str) {
        if !self.contains(key) {
            self.push(key, value);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Vec<&str> {
        self.0.iter().filter(|(k, _)| k == key).map(|(_, v)| v.as_str()).collect()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_image_deserialize_references() {
        let image: Image = serde_json::from_value(serde_json::json!({
            "id": "222222222222222222222222",
            "name": "win7 updated",
            "os": {"id": "555", "name": "win7pro", "arch": "x64"},
            "base_image": "111111111111111111111111",
            "tags": ["windows", "jane"],
            "status": {"name": "ready"},
        }))
        .unwrap();

        assert_eq!(image.id(), "222222222222222222222222");
        assert_eq!(image.base_image_id(), Some("111111111111111111111111"));
        assert_eq!(image.os.as_ref().unwrap().nice_name(true), "win7pro (555)");
        assert_eq!(image.os.as_ref().unwrap().nice_name(false), "win7pro");
        assert_eq!(image.base_image.as_ref().unwrap().nice_name(true), "111111111111111111111111");
        assert_eq!(image.username, "user");
        assert_eq!(image.password, "password");
    }

    #[test]
    fn test_image_serialize_references_as_ids() {
        let image = Image {
            name: "child".to_string(),
            os: Some(Reference::Expanded {
                id: "555".to_string(),
                name: "win7pro".to_string(),
            }),
            base_image: Some(Reference::from("111")),
            ..Default::default()
        };

        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(value["os"], serde_json::json!("555"));
        assert_eq!(value["base_image"], serde_json::json!("111"));
        // Unsaved images must not send an id.
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_status_details() {
        let status: ImageStatus = serde_json::from_value(serde_json::json!({
            "name": "configuring",
            "vnc": {"vnc": {"uri": "vnc://10.0.0.5:5901"}},
            "user_interaction": true,
        }))
        .unwrap();

        assert!(status.is(state::CONFIGURING));
        assert_eq!(status.vnc_uri(), Some("vnc://10.0.0.5:5901"));
        assert_eq!(status.display(), "vnc://10.0.0.5:5901");
        assert!(status.user_interaction());
        assert_eq!(status.error(), None);

        let status = ImageStatus::new(state::DELETE).with("error", "disk busy");
        assert_eq!(status.error(), Some("disk busy".to_string()));
        assert_eq!(status.display(), "delete");

        // Extra keys survive a round trip to the service.
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value, serde_json::json!({"name": "delete", "error": "disk busy"}));
    }

    #[test]
    fn test_search_terms() {
        let mut search = Search::by("tags", "jane");
        search.push("tags", "windows");
        search.set_default("sort", "timestamps.created");
        search.set_default("sort", "-timestamps.created");
        assert_eq!(search.get("tags"), vec!["jane", "windows"]);
        assert_eq!(search.get("sort"), vec!["timestamps.created"]);

        search.set("tags", "bob");
        assert_eq!(search.get("tags"), vec!["bob"]);
        assert!(!search.contains("num"));
    }

    #[test]
    fn test_timestamps_to_datetime() {
        let t = Timestamps::to_datetime(1_400_000_000.5).unwrap();
        assert_eq!(t.timestamp(), 1_400_000_000);
        assert_eq!(t.timestamp_subsec_millis(), 500);

        // Microseconds by mistake, far past anything chrono can hold.
        assert_eq!(Timestamps::to_datetime(1.4e15), None);
        assert_eq!(Timestamps::to_datetime(1e20), None);
        assert_eq!(Timestamps::to_datetime(-1.0), None);
        assert_eq!(Timestamps::to_datetime(f64::NAN), None);
        assert_eq!(Timestamps::to_datetime(f64::INFINITY), None);
    }

    #[test]
    fn test_add_tag_once() {
        let mut image = Image::default();
        image.add_tag("jane");
        image.add_tag("jane");
        image.add_tag("");
        assert_eq!(image.tags, vec!["jane".to_string()]);
    }
}
