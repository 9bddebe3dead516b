use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::overlay::OptionsOverlay;
use crate::schema::SchemaDocument;

/// Overlay key holding an explicit schema document.
pub const SCHEMA_KEY: &str = "schema";

/// Overlay key naming the input format type. Fixed by the format itself.
pub const TYPE_KEY: &str = "type";

/// Input-file encodings the matrix exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InputFormat {
    Avro,
    Json,
    Tsv,
    Parquet,
    Orc,
    Csv,
}

impl InputFormat {
    pub const ALL: [InputFormat; 6] = [
        InputFormat::Avro,
        InputFormat::Json,
        InputFormat::Tsv,
        InputFormat::Parquet,
        InputFormat::Orc,
        InputFormat::Csv,
    ];

    /// Upper-case identifier used in matrix definitions and logs.
    pub fn name(self) -> &'static str {
        match self {
            InputFormat::Avro => "AVRO",
            InputFormat::Json => "JSON",
            InputFormat::Tsv => "TSV",
            InputFormat::Parquet => "PARQUET",
            InputFormat::Orc => "ORC",
            InputFormat::Csv => "CSV",
        }
    }

    /// Value of `inputFormat.type` in the ingestion spec.
    pub fn type_key(self) -> &'static str {
        match self {
            InputFormat::Avro => "avro_ocf",
            InputFormat::Json => "json",
            InputFormat::Tsv => "tsv",
            InputFormat::Parquet => "parquet",
            InputFormat::Orc => "orc",
            InputFormat::Csv => "csv",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            InputFormat::Avro => ".avro",
            InputFormat::Json => ".json",
            InputFormat::Tsv => ".tsv",
            InputFormat::Parquet => ".parquet",
            InputFormat::Orc => ".orc",
            InputFormat::Csv => ".csv",
        }
    }

    /// Sub-directory of the fixture base dir holding this format's files.
    pub fn folder_suffix(self) -> &'static str {
        match self {
            InputFormat::Avro => "/avro",
            InputFormat::Json => "/json",
            InputFormat::Tsv => "/tsv",
            InputFormat::Parquet => "/parquet",
            InputFormat::Orc => "/orc",
            InputFormat::Csv => "/csv",
        }
    }

    /// Whether records can carry an explicit field-type schema.
    pub fn is_schema_bearing(self) -> bool {
        matches!(self, InputFormat::Avro)
    }

    /// Default `inputFormat` options, `type` first.
    pub fn default_options(self) -> OptionsOverlay {
        let base = OptionsOverlay::new().with(TYPE_KEY, self.type_key());
        match self {
            InputFormat::Avro | InputFormat::Parquet | InputFormat::Orc => {
                base.with("binaryAsString", false)
            }
            InputFormat::Json => base.with("keepNullColumns", false),
            InputFormat::Tsv => base
                .with("delimiter", "\t")
                .with("findColumnsFromHeader", false)
                .with("skipHeaderRows", 0),
            InputFormat::Csv => base
                .with("findColumnsFromHeader", false)
                .with("skipHeaderRows", 0),
        }
    }

    /// Resolve the `inputFormat` map for a case: validate, then merge.
    ///
    /// - `type` may not be overridden.
    /// - A `schema` entry must be a well-formed [`SchemaDocument`]; it is
    ///   replaced by the re-serialized document.
    /// - Everything else passes through untouched, overlay winning over
    ///   defaults key by key.
    pub fn resolve_options(
        self,
        overlay: Option<&OptionsOverlay>,
    ) -> Result<OptionsOverlay, ConfigurationError> {
        let defaults = self.default_options();
        let Some(overlay) = overlay else {
            return Ok(defaults);
        };

        if overlay.contains_key(TYPE_KEY) {
            return Err(ConfigurationError::ReservedOverlayKey(TYPE_KEY.into()));
        }

        let mut overlay = overlay.clone();
        if let Some(raw) = overlay.get(SCHEMA_KEY) {
            let payload = SchemaDocument::from_value(raw)?.to_payload();
            overlay.insert(SCHEMA_KEY, payload);
        }

        Ok(defaults.merged_with(&overlay))
    }

    /// Case-insensitive lookup by name (`AVRO`) or type key (`avro_ocf`).
    pub fn parse(id: &str) -> Result<Self, ConfigurationError> {
        let needle = id.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(needle) || f.type_key().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ConfigurationError::UnsupportedFormat(id.to_string()))
    }
}

impl FromStr for InputFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
