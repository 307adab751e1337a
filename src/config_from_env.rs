use anyhow::{anyhow, Result};

const TALUS_HOST: &str = "TALUS_HOST";
const TALUS_USER: &str = "TALUS_USER";

/// The environment variable that overrides a config key, if any.
fn env_override(key: &str) -> Option<&'static str> {
    match key {
        "host" => Some(TALUS_HOST),
        "user" => Some(TALUS_USER),
        _ => None,
    }
}

/// Layers environment overrides on top of another config.
pub struct EnvConfig<'a> {
    pub config: &'a mut (dyn crate::config::Config + 'a),
}

impl EnvConfig<'_> {
    pub fn inherit_env(config: &mut dyn crate::config::Config) -> EnvConfig {
        EnvConfig { config }
    }
}

impl crate::config::Config for EnvConfig<'_> {
    fn get(&self, key: &str) -> Result<String> {
        let (val, _) = self.get_with_source(key)?;
        Ok(val)
    }

    fn get_with_source(&self, key: &str) -> Result<(String, String)> {
        if let Some(var) = env_override(key) {
            let value = crate::config_file::get_env_var(var);
            if !value.is_empty() {
                return Ok((value, var.to_string()));
            }
        }

        self.config.get_with_source(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.config.set(key, value)
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if let Some(var) = env_override(key) {
            if !crate::config_file::get_env_var(var).is_empty() {
                return Err(anyhow!("read-only value in {}", var));
            }
        }

        self.config.check_writable(key)
    }

    fn write(&self) -> Result<()> {
        self.config.write()
    }

    fn config_to_string(&self) -> Result<String> {
        self.config.config_to_string()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    use super::*;
    use crate::config::Config;

    #[test]
    #[serial]
    fn test_env_overrides() {
        let orig_host = std::env::var(TALUS_HOST);
        let orig_user = std::env::var(TALUS_USER);

        let mut config = crate::config::new_blank_config().unwrap();
        config.set("user", "jane").unwrap();

        std::env::set_var(TALUS_HOST, "https://talus.example.com");
        std::env::remove_var(TALUS_USER);

        let c = EnvConfig::inherit_env(&mut config);
        assert_eq!(
            c.get_with_source("host").unwrap(),
            ("https://talus.example.com".to_string(), TALUS_HOST.to_string())
        );
        assert_eq!(c.get("user").unwrap(), "jane");
        assert_eq!(c.get("prompt").unwrap(), "enabled");

        let err = c.check_writable("host").unwrap_err();
        assert_eq!(err.to_string(), "read-only value in TALUS_HOST");
        c.check_writable("user").unwrap();

        match orig_host {
            Ok(val) => std::env::set_var(TALUS_HOST, val),
            Err(_) => std::env::remove_var(TALUS_HOST),
        }
        match orig_user {
            Ok(val) => std::env::set_var(TALUS_USER, val),
            Err(_) => std::env::remove_var(TALUS_USER),
        }
    }
}
