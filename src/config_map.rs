use anyhow::{anyhow, Result};

// ConfigMap implements a low-level get/set config that is backed by an in-memory tree of toml
// nodes. Comments present when the toml was parsed survive a write.
#[derive(Clone, Debug)]
pub struct ConfigMap {
    pub root: toml_edit::Table,
}

impl ConfigMap {
    pub fn get_string_value(&self, key: &str) -> Result<Option<String>> {
        match self.root.get(key) {
            Some(toml_edit::Item::Value(toml_edit::Value::String(s))) => Ok(Some(s.value().to_string())),
            Some(v) => Err(anyhow!("Expected string value for key '{}', found '{:?}'", key, v)),
            None => Ok(None),
        }
    }

    pub fn set_string_value(&mut self, key: &str, value: &str) {
        self.root.insert(key, toml_edit::value(value));
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_config_map_values() {
        let doc = "# talus\nhost = \"https://talus.example.com\"\nretries = 3\n"
            .parse::<toml_edit::Document>()
            .unwrap();
        let mut map = ConfigMap {
            root: doc.as_table().clone(),
        };

        assert_eq!(
            map.get_string_value("host").unwrap(),
            Some("https://talus.example.com".to_string())
        );
        assert_eq!(map.get_string_value("user").unwrap(), None);
        assert!(map.get_string_value("retries").is_err());

        map.set_string_value("user", "jane");
        assert_eq!(map.get_string_value("user").unwrap(), Some("jane".to_string()));
    }
}
