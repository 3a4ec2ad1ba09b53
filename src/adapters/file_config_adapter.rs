//! INI file configuration adapter.

use crate::domain::error::SignalbenchError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SignalbenchError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| SignalbenchError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, SignalbenchError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| SignalbenchError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn has_section(&self, section: &str) -> bool {
        let section = section.to_lowercase();
        self.config.sections().iter().any(|s| *s == section)
    }

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, String> {
        self.config.getint(section, key)
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, String> {
        self.config.getfloat(section, key)
    }

    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, String> {
        match self.get_string(section, key) {
            None => Ok(None),
            Some(v) => Self::parse_bool(&v)
                .map(Some)
                .ok_or_else(|| format!("expected a boolean, got '{}'", v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[backtest]
symbol = BTCUSDT
initial_capital = 10000.0

[strategy]
type = sma_crossover
fast = 20
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "symbol"),
            Some("BTCUSDT".to_string())
        );
        assert_eq!(adapter.get_int("strategy", "fast"), Ok(Some(20)));
        assert!(adapter.has_section("strategy"));
        assert!(!adapter.has_section("regime"));
    }

    #[test]
    fn missing_keys_are_none() {
        let adapter = FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
        assert_eq!(adapter.get_double("backtest", "missing"), Ok(None));
        assert_eq!(adapter.get_bool("backtest", "missing"), Ok(None));
    }

    #[test]
    fn empty_value_is_none() {
        let adapter = FileConfigAdapter::from_string("[backtest]\nsymbol =\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "symbol"), None);
    }

    #[test]
    fn non_numeric_values_are_errors() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nfast = abc\nnum_std = two\n").unwrap();
        assert!(adapter.get_int("strategy", "fast").is_err());
        assert!(adapter.get_double("strategy", "num_std").is_err());
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100000.5\n").unwrap();
        assert_eq!(adapter.get_double("backtest", "initial_capital"), Ok(Some(100000.5)));
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\ng = maybe\n",
        )
        .unwrap();
        for key in ["a", "b", "c"] {
            assert_eq!(adapter.get_bool("strategy", key), Ok(Some(true)));
        }
        for key in ["d", "e", "f"] {
            assert_eq!(adapter.get_bool("strategy", key), Ok(Some(false)));
        }
        assert!(adapter.get_bool("strategy", "g").is_err());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[backtest]\ntimeframe = 4h\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("backtest", "timeframe"), Some("4h".to_string()));
    }

    #[test]
    fn from_file_missing_is_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        assert!(matches!(err, SignalbenchError::ConfigParse { .. }));
    }
}
