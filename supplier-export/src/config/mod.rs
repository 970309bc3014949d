//! Supplier configuration - the YAML document describing one supplier layout.
//!
//! The file is deserialized into loose `Raw*` structs first, then checked and
//! converted into a [`SupplierConfig`]. Everything that can be checked without
//! looking at the order export is checked here, so a broken config fails
//! before any data is read.
//!
//! ```yaml
//! supplier: acme
//! source:
//!   normalize_headers: true
//! filters:
//!   - { column: financial_status, operator: one_of, value: [paid], case_insensitive: true }
//!   - { column: lineitem_quantity, operator: gte, value: 1 }
//! mappings:
//!   rename:
//!     name: PO_Number
//!     lineitem_sku: Item
//!   computed:
//!     total: lineitem_price * lineitem_quantity
//! output:
//!   rename_final: { total: Line Total }
//!   order: [PO_Number, Item, Line Total]
//! validation:
//!   required: [PO_Number]
//! delivery:
//!   format: xlsx
//!   filename_pattern: "acme_{today}"
//!   on_conflict: suffix
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{ConfigError, ConfigResult};
use crate::parser::normalize_column_name;
use crate::transform::formula::Formula;

// =============================================================================
// Validated configuration
// =============================================================================

/// A fully validated supplier configuration.
#[derive(Debug, Clone)]
pub struct SupplierConfig {
    /// Identifier used in output file names.
    pub supplier: Option<String>,
    /// Rewrite source headers to snake_case before anything else.
    pub normalize_headers: bool,
    pub filters: Vec<Filter>,
    /// Source column -> new name, in declaration order.
    pub rename: Vec<(String, String)>,
    pub computed: Vec<ComputedColumn>,
    pub output: OutputSpec,
    pub validation: ValidationRules,
    pub delivery: DeliverySpec,
}

/// One row predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub predicate: Predicate,
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(String),
    NotEquals(String),
    OneOf(Vec<String>),
    NotOneOf(Vec<String>),
    IsEmpty,
    IsNotEmpty,
    Compare(CompareOp, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Gte => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Lte => lhs <= rhs,
        }
    }
}

/// A derived column and its formula.
#[derive(Debug, Clone)]
pub struct ComputedColumn {
    pub name: String,
    pub formula: Formula,
}

/// Final renaming and column layout.
#[derive(Debug, Clone, Default)]
pub struct OutputSpec {
    pub rename_final: Vec<(String, String)>,
    /// Exact output column sequence. `None` keeps the projected order.
    pub order: Option<Vec<String>>,
    /// Add columns named in `order` but absent from the table, empty.
    pub fill_missing: bool,
}

/// Checks run on the final table before it is written.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub nonempty: Vec<String>,
    #[serde(default)]
    pub positive_int: Vec<String>,
}

impl ValidationRules {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.nonempty.is_empty() && self.positive_int.is_empty()
    }
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryFormat {
    #[default]
    Csv,
    Xlsx,
}

impl DeliveryFormat {
    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "csv" => Ok(DeliveryFormat::Csv),
            "xlsx" => Ok(DeliveryFormat::Xlsx),
            _ => Err(ConfigError::UnsupportedFormat(value.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DeliveryFormat::Csv => "csv",
            DeliveryFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for DeliveryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// What to do when the output file name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Write `name-1.ext`, `name-2.ext`, ... instead.
    #[default]
    Suffix,
    /// Abort the run.
    Fail,
}

impl ConflictPolicy {
    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "suffix" => Ok(ConflictPolicy::Suffix),
            "fail" => Ok(ConflictPolicy::Fail),
            other => Err(ConfigError::InvalidKey {
                key: "delivery.on_conflict".into(),
                message: format!("expected 'suffix' or 'fail', got '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeliverySpec {
    pub format: DeliveryFormat,
    /// Placeholders: `{supplier}`, `{today}`, `{timestamp}`, `{ext}`.
    pub filename_pattern: Option<String>,
    pub on_conflict: ConflictPolicy,
}

// =============================================================================
// Raw YAML shape
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    supplier: Option<Value>,
    source: Option<RawSource>,
    filters: Option<Vec<RawFilter>>,
    mappings: Option<RawMappings>,
    computed: Option<Mapping>,
    output: Option<RawOutput>,
    validation: Option<ValidationRules>,
    delivery: Option<RawDelivery>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSource {
    #[serde(default)]
    normalize_headers: bool,
}

#[derive(Debug, Deserialize)]
struct RawFilter {
    column: Option<Value>,
    #[serde(alias = "op")]
    operator: Option<String>,
    value: Option<Value>,
    #[serde(default)]
    case_insensitive: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawMappings {
    rename: Option<Mapping>,
    computed: Option<Mapping>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOutput {
    rename_final: Option<Mapping>,
    #[serde(alias = "columns_order")]
    order: Option<Vec<Value>>,
    #[serde(default)]
    fill_missing: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawDelivery {
    format: Option<String>,
    filename_pattern: Option<String>,
    on_conflict: Option<String>,
}

// =============================================================================
// Loading
// =============================================================================

/// Load and validate a supplier config file.
///
/// When the document has no `supplier` key, the file stem is used.
pub fn load_config<P: AsRef<Path>>(path: P) -> ConfigResult<SupplierConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = SupplierConfig::from_yaml(&content)?;
    if config.supplier.is_none() {
        config.supplier = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string());
    }
    Ok(config)
}

impl SupplierConfig {
    /// Parse and validate a config from YAML text.
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        if content.trim().is_empty() {
            return Err(ConfigError::Empty);
        }
        let value: Value = serde_yaml::from_str(content)?;
        if value.is_null() {
            return Err(ConfigError::Empty);
        }
        if !value.is_mapping() {
            return Err(ConfigError::InvalidKey {
                key: "<root>".into(),
                message: "expected a mapping of top-level keys".into(),
            });
        }
        let raw: RawConfig = serde_yaml::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> ConfigResult<Self> {
        let normalize_headers = raw.source.map(|s| s.normalize_headers).unwrap_or(false);
        let source_name = |name: String| {
            if normalize_headers {
                normalize_column_name(&name)
            } else {
                name
            }
        };

        let supplier = raw
            .supplier
            .map(|v| scalar_to_string("supplier", &v))
            .transpose()?
            .filter(|s| !s.trim().is_empty());

        let filters = raw
            .filters
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, f)| parse_filter(i + 1, f))
            .map(|f| {
                f.map(|mut f| {
                    f.column = source_name(f.column);
                    f
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        let mappings = raw.mappings.unwrap_or_default();
        let rename: Vec<(String, String)> = pairs("mappings.rename", mappings.rename)?
            .into_iter()
            .map(|(from, to)| (source_name(from), to))
            .collect();
        check_unique_targets("mappings.rename", &rename)?;

        let mut computed_pairs = pairs("computed", raw.computed)?;
        for (name, formula) in pairs("mappings.computed", mappings.computed)? {
            if computed_pairs.iter().any(|(n, _)| *n == name) {
                return Err(ConfigError::InvalidKey {
                    key: format!("computed.{}", name),
                    message: "defined both under 'computed' and 'mappings.computed'".into(),
                });
            }
            computed_pairs.push((name, formula));
        }

        let mut computed: Vec<ComputedColumn> = Vec::with_capacity(computed_pairs.len());
        for (name, source) in computed_pairs {
            if let Some((from, _)) = rename.iter().find(|(_, to)| *to == name) {
                return Err(ConfigError::InvalidKey {
                    key: format!("computed.{}", name),
                    message: format!("name collides with the rename target of '{}'", from),
                });
            }
            let mut formula = Formula::parse(&source).map_err(|e| ConfigError::Formula {
                column: name.clone(),
                message: e.to_string(),
            })?;
            if normalize_headers {
                let earlier: Vec<&str> = computed.iter().map(|c| c.name.as_str()).collect();
                formula.map_columns(|col| {
                    if earlier.contains(&col) {
                        col.to_string()
                    } else {
                        normalize_column_name(col)
                    }
                });
            }
            computed.push(ComputedColumn { name, formula });
        }

        let raw_output = raw.output.unwrap_or_default();
        let rename_final = pairs("output.rename_final", raw_output.rename_final)?;
        check_unique_targets("output.rename_final", &rename_final)?;
        let order = raw_output
            .order
            .map(|cols| {
                let names = cols
                    .iter()
                    .map(|v| scalar_to_string("output.order", v))
                    .collect::<ConfigResult<Vec<_>>>()?;
                check_unique_names("output.order", &names)?;
                Ok::<_, ConfigError>(names)
            })
            .transpose()?;

        let raw_delivery = raw.delivery.unwrap_or_default();
        let delivery = DeliverySpec {
            format: match raw_delivery.format {
                Some(f) => DeliveryFormat::parse(&f)?,
                None => DeliveryFormat::default(),
            },
            filename_pattern: raw_delivery
                .filename_pattern
                .filter(|p| !p.trim().is_empty())
                .map(check_file_pattern)
                .transpose()?,
            on_conflict: match raw_delivery.on_conflict {
                Some(p) => ConflictPolicy::parse(&p)?,
                None => ConflictPolicy::default(),
            },
        };

        Ok(Self {
            supplier,
            normalize_headers,
            filters,
            rename,
            computed,
            output: OutputSpec {
                rename_final,
                order,
                fill_missing: raw_output.fill_missing,
            },
            validation: raw.validation.unwrap_or_default(),
            delivery,
        })
    }

    /// Whether the projection stage should drop unmapped columns.
    pub fn projects(&self) -> bool {
        !self.rename.is_empty() || !self.computed.is_empty()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_filter(index: usize, raw: RawFilter) -> ConfigResult<Filter> {
    let column = match &raw.column {
        Some(v) => scalar_to_string("filters.column", v)?,
        None => String::new(),
    };
    let invalid = |message: String| ConfigError::InvalidFilter {
        index,
        column: column.clone(),
        message,
    };
    if column.trim().is_empty() {
        return Err(invalid("missing 'column'".into()));
    }

    let operator = raw
        .operator
        .as_deref()
        .ok_or_else(|| invalid("missing 'operator'".into()))?;
    let op_key = operator.trim().to_lowercase().replace(['-', ' '], "_");

    let scalar = |value: &Option<Value>| -> ConfigResult<String> {
        match value {
            Some(v) if !v.is_sequence() && !v.is_mapping() => scalar_to_string("filters.value", v)
                .map_err(|_| invalid(format!("operator '{}' needs a scalar value", operator))),
            _ => Err(invalid(format!("operator '{}' needs a scalar value", operator))),
        }
    };
    let list = |value: &Option<Value>| -> ConfigResult<Vec<String>> {
        match value {
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|v| scalar_to_string("filters.value", v))
                .collect::<ConfigResult<Vec<_>>>()
                .map_err(|_| invalid("list values must be scalars".into())),
            _ => Err(invalid(format!("operator '{}' needs a list value", operator))),
        }
    };
    let number = |value: &Option<Value>| -> ConfigResult<f64> {
        value
            .as_ref()
            .and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .ok_or_else(|| invalid(format!("operator '{}' needs a numeric value", operator)))
    };

    let predicate = match op_key.as_str() {
        "equals" | "eq" | "==" => Predicate::Equals(scalar(&raw.value)?),
        "not_equals" | "ne" | "!=" => Predicate::NotEquals(scalar(&raw.value)?),
        "one_of" | "in" => Predicate::OneOf(list(&raw.value)?),
        "not_one_of" | "not_in" => Predicate::NotOneOf(list(&raw.value)?),
        "is_empty" => Predicate::IsEmpty,
        "is_not_empty" => Predicate::IsNotEmpty,
        "gt" | ">" => Predicate::Compare(CompareOp::Gt, number(&raw.value)?),
        "gte" | ">=" => Predicate::Compare(CompareOp::Gte, number(&raw.value)?),
        "lt" | "<" => Predicate::Compare(CompareOp::Lt, number(&raw.value)?),
        "lte" | "<=" => Predicate::Compare(CompareOp::Lte, number(&raw.value)?),
        _ => return Err(invalid(format!("unknown operator '{}'", operator))),
    };

    Ok(Filter {
        column,
        predicate,
        case_insensitive: raw.case_insensitive,
    })
}

/// Render a YAML scalar as a string. Sequences, mappings and nulls are errors.
fn scalar_to_string(key: &str, value: &Value) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(key, &tagged.value),
        Value::Null => Err(ConfigError::InvalidKey {
            key: key.to_string(),
            message: "value is missing".into(),
        }),
        Value::Sequence(_) | Value::Mapping(_) => Err(ConfigError::InvalidKey {
            key: key.to_string(),
            message: "expected a single value, found a list or mapping".into(),
        }),
    }
}

/// Flatten a YAML mapping into ordered `(key, value)` string pairs.
fn pairs(section: &str, mapping: Option<Mapping>) -> ConfigResult<Vec<(String, String)>> {
    let Some(mapping) = mapping else {
        return Ok(Vec::new());
    };
    mapping
        .iter()
        .map(|(k, v)| {
            let key = scalar_to_string(section, k)?;
            let value = scalar_to_string(&format!("{}.{}", section, key), v)?;
            Ok((key, value))
        })
        .collect()
}

/// Reject rename maps where two sources land on the same target.
fn check_unique_targets(section: &str, pairs: &[(String, String)]) -> ConfigResult<()> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (from, to) in pairs {
        if let Some(first) = seen.insert(to.as_str(), from.as_str()) {
            return Err(ConfigError::DuplicateTarget {
                section: section.to_string(),
                target: to.clone(),
                first: first.to_string(),
                second: from.clone(),
            });
        }
    }
    Ok(())
}

/// The pattern names a file inside the output directory, never a path.
fn check_file_pattern(pattern: String) -> ConfigResult<String> {
    let trimmed = pattern.trim();
    if pattern.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
        return Err(ConfigError::InvalidKey {
            key: "delivery.filename_pattern".into(),
            message: format!("'{}' must be a file name without directory parts", pattern),
        });
    }
    Ok(pattern)
}

fn check_unique_names(section: &str, names: &[String]) -> ConfigResult<()> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::InvalidKey {
                key: section.to_string(),
                message: format!("column '{}' listed twice", name),
            });
        }
    }
    Ok(())
}
