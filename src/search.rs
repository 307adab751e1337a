use crate::{error::ApiError, models::Search};

/// Search terms parsed from `--key value` pairs on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchTerms {
    pub search: Search,
    /// Words that were not a value for some key, in order.
    pub leftover: Vec<String>,
    /// Whether `--all` was given.
    pub all: bool,
}

impl SearchTerms {
    /// Parse free-form search arguments.
    ///
    /// Keys are `--`-prefixed words, each followed by its value. Repeated
    /// keys accumulate. Hex values (`0x...`) are converted to integers.
    pub fn parse(args: &[String]) -> Self {
        let mut terms = SearchTerms::default();
        let mut key: Option<String> = None;

        for item in args {
            match key.take() {
                None => {
                    let name = match item.strip_prefix("--") {
                        Some(name) => name,
                        None => {
                            terms.leftover.push(item.to_string());
                            continue;
                        }
                    };

                    let name = name.replace('-', "_");
                    if name == "all" {
                        terms.all = true;
                        continue;
                    }

                    key = Some(normalize_key(&name));
                }
                Some(k) => {
                    let value = hex_to_int(item).unwrap_or_else(|| item.to_string());
                    log::debug!("searching for {} = {}", k, value);
                    terms.search.push(&k, &value);
                }
            }
        }

        // A trailing key without a value is treated as a plain word.
        if let Some(k) = key {
            terms.leftover.push(k);
        }

        terms
    }

    /// Fail when words were given that are not part of a key/value pair.
    pub fn deny_leftover(&self) -> Result<(), ApiError> {
        if self.leftover.is_empty() {
            return Ok(());
        }

        Err(ApiError::validation(format!(
            "args must be alternating search item/value pairs, unexpected: {}",
            self.leftover.join(" ")
        )))
    }

    /// Restrict the search to images tagged with `user` unless `--all` was
    /// given. Returns true when the filter was applied.
    pub fn apply_user_filter(&mut self, user: Option<&str>) -> bool {
        match user {
            Some(user) if !self.all && !user.is_empty() => {
                self.search.push("tags", user);
                true
            }
            _ => false,
        }
    }
}

/// Pull a command's own `NAME VALUE` option out of free-form search words,
/// wherever it was given. The last occurrence wins.
///
/// Values of search keys are skipped, so `--desc -f` stays a search term.
pub fn take_option(args: &mut Vec<String>, names: &[&str]) -> Option<String> {
    let mut found = None;
    let mut i = 0;

    while i < args.len() {
        let word = args[i].to_string();

        if let Some((name, value)) = word.split_once('=') {
            if names.contains(&name) {
                found = Some(value.to_string());
                args.remove(i);
                continue;
            }
        }

        if names.contains(&word.as_str()) && i + 1 < args.len() {
            found = Some(args[i + 1].to_string());
            args.drain(i..i + 2);
            continue;
        }

        i += if word.starts_with("--") && word != "--all" { 2 } else { 1 };
    }

    found
}

/// Drop every occurrence of a flag that takes no value.
pub fn drop_flag(args: &[String], name: &str) -> Vec<String> {
    args.iter().filter(|a| a.as_str() != name).cloned().collect()
}

fn normalize_key(name: &str) -> String {
    let mut key = match name {
        "status" => "status.name".to_string(),
        _ => name.to_string(),
    };

    if key.ends_with("__type") || key.ends_with(".type") {
        key.push('_');
    } else if let Some(field) = key.strip_suffix("__re") {
        key = format!("{}.$regex", field);
    }

    key
}

fn hex_to_int(s: &str) -> Option<String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok().map(|n| n.to_string())
}
