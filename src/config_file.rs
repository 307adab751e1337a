use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};

const TALUS_CONFIG_DIR: &str = "TALUS_CONFIG_DIR";
const XDG_CONFIG_HOME: &str = "XDG_CONFIG_HOME";
const APP_DATA: &str = "AppData";

// Config path precedence
// 1. TALUS_CONFIG_DIR
// 2. XDG_CONFIG_HOME
// 3. AppData (windows only)
// 4. HOME
pub fn config_dir() -> Result<String> {
    let path: PathBuf;

    let talus_config_dir = get_env_var(TALUS_CONFIG_DIR);
    let xdg_config_home = get_env_var(XDG_CONFIG_HOME);
    let app_data = get_env_var(APP_DATA);

    if !talus_config_dir.is_empty() {
        path = Path::new(&talus_config_dir).to_path_buf();
    } else if !xdg_config_home.is_empty() {
        path = Path::new(&xdg_config_home).join("talus");
    } else if !app_data.is_empty() && std::env::consts::OS == "windows" {
        path = Path::new(&app_data).join("Talus CLI");
    } else {
        match dirs::home_dir() {
            Some(home) => {
                path = home.join(".config").join("talus");
            }
            None => {
                return Err(anyhow!("could not find home directory"));
            }
        }
    }

    path_to_string(&path)
}

pub fn config_file() -> Result<String> {
    let config_dir = config_dir()?;
    path_to_string(&Path::new(&config_dir).join("config.toml"))
}

fn path_to_string(path: &Path) -> Result<String> {
    match path.to_str() {
        None => Err(anyhow!("path is not a valid UTF-8 sequence")),
        Some(s) => Ok(s.to_string()),
    }
}

pub fn parse_default_config() -> Result<crate::config_from_file::FileConfig> {
    let config_file_path = config_file()?;
    parse_config_file(&config_file_path)
}

/// Read the config at `filename`, or a blank one if there is no file yet.
pub fn parse_config_file(filename: &str) -> Result<crate::config_from_file::FileConfig> {
    let path = Path::new(filename);
    let root = if !path.exists() {
        crate::config::new_blank_root()?
    } else {
        let contents = read_config_file(filename)?;
        contents
            .parse::<toml_edit::Document>()
            .with_context(|| format!("failed to parse {}", filename))?
    };

    let mut config = crate::config::new_config(root);
    config.path = Some(filename.to_string());

    Ok(config)
}

fn read_config_file(filename: &str) -> Result<String> {
    fs::read_to_string(filename).with_context(|| format!("failed to read from {}", filename))
}

pub fn write_config_file(filename: &str, data: &str) -> Result<()> {
    let path = Path::new(filename);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let mut file = fs::File::create(filename)?;
    file.write_all(data.as_bytes())
        .with_context(|| format!("failed to write to {}", filename))
}

pub fn get_env_var(key: &str) -> String {
    match env::var(key) {
        Ok(val) => val,
        Err(_) => "".to_string(),
    }
}
