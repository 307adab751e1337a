use parse_display::{Display, FromStr};

/// How listings are printed.
#[derive(Debug, Clone, PartialEq, Eq, FromStr, Display)]
#[display(style = "kebab-case")]
pub enum FormatOutput {
    Json,
    Yaml,
    Table,
}

impl Default for FormatOutput {
    fn default() -> FormatOutput {
        FormatOutput::Table
    }
}

impl FormatOutput {
    pub fn variants() -> Vec<&'static str> {
        vec!["table", "json", "yaml"]
    }

    /// Write `value` to the output in this format. Tables are the caller's
    /// job; for `Table` this returns false and writes nothing.
    pub fn write_value(&self, io: &mut crate::iostreams::IoStreams, value: &serde_json::Value) -> anyhow::Result<bool> {
        match self {
            FormatOutput::Json => io.write_json(value)?,
            FormatOutput::Yaml => io.write_yaml(value)?,
            FormatOutput::Table => return Ok(false),
        }

        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_format_output_parse() {
        for name in FormatOutput::variants() {
            let format: FormatOutput = name.parse().unwrap();
            assert_eq!(format.to_string(), name);
        }

        assert!("xml".parse::<FormatOutput>().is_err());
        assert_eq!(FormatOutput::default(), FormatOutput::Table);
    }
}
