use anyhow::{anyhow, Result};

// This type implements a Config interface and represents a config file on disk.
#[derive(Debug, Clone)]
pub struct FileConfig {
    pub map: crate::config_map::ConfigMap,
    /// Where `write` puts the file; the default location when unset.
    pub path: Option<String>,
}

impl FileConfig {
    fn filename(&self) -> Result<String> {
        match &self.path {
            Some(path) => Ok(path.to_string()),
            None => crate::config_file::config_file(),
        }
    }
}

impl crate::config::Config for FileConfig {
    fn get(&self, key: &str) -> Result<String> {
        let (val, _) = self.get_with_source(key)?;
        Ok(val)
    }

    fn get_with_source(&self, key: &str) -> Result<(String, String)> {
        if let Some(value) = self.map.get_string_value(key)? {
            return Ok((value, self.filename()?));
        }

        match crate::config::default_value(key) {
            Some(value) => Ok((value, "default".to_string())),
            None => Err(anyhow!("Key '{}' not found", key)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.map.set_string_value(key, value);
        Ok(())
    }

    fn check_writable(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn write(&self) -> Result<()> {
        let config_filename = self.filename()?;
        let content = self.config_to_string()?;
        log::debug!("writing config to {}", config_filename);

        crate::config_file::write_config_file(&config_filename, &content)
    }

    fn config_to_string(&self) -> Result<String> {
        let doc: toml_edit::Document = self.map.root.clone().into();

        Ok(doc.to_string().trim().to_string())
    }
}
