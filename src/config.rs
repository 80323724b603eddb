use serde_derive::{Deserialize, Serialize};

pub const DEFAULT_DELIMITER: char = ',';
pub const DEFAULT_PRECISION: usize = 3;

/// Settings for turning a store into a tracking file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub delimiter: char,
    /// Decimal places written for coordinates and confidences.
    pub precision: usize,
    pub username: String,
    /// Names indexed by a record's `identity_order`.
    pub identity_names: Vec<String>,
}

impl ExportConfig {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_identity_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity_names = names.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            precision: DEFAULT_PRECISION,
            username: String::new(),
            identity_names: Vec::new(),
        }
    }
}
