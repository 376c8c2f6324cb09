//! Rule evaluator -- pure logic, no store access.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

use super::mapping::{FieldMapping, RowRecord};
use super::rules::{FieldType, ImportError, ValidationRule, ValidationRules};
use crate::error::CoreError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9\s\-().]{7,20}$").expect("valid regex"));

/// Accepted calendar date layouts, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// A ruleset with user patterns compiled once for the lifetime of a job.
#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    rules: Vec<CompiledRule>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    field: String,
    rule: ValidationRule,
    pattern: Option<Regex>,
}

impl CompiledRules {
    /// Compile `rules` for use against records produced by `mapping`.
    ///
    /// Fails on an invalid `pattern`, on `min_length > max_length`, or on a
    /// rule for a field the mapping does not supply.
    pub fn compile(rules: &ValidationRules, mapping: &FieldMapping) -> Result<Self, CoreError> {
        let mut compiled = Vec::with_capacity(rules.len());

        for (field, rule) in rules {
            if !mapping.contains_field(field) {
                return Err(CoreError::Validation(format!(
                    "Validation rule for unmapped field '{field}'"
                )));
            }
            if let (Some(min), Some(max)) = (rule.min_length, rule.max_length) {
                if min > max {
                    return Err(CoreError::Validation(format!(
                        "Field '{field}': min_length {min} exceeds max_length {max}"
                    )));
                }
            }
            let pattern = rule
                .pattern
                .as_deref()
                .map(|p| {
                    Regex::new(&format!("^(?:{p})$")).map_err(|e| {
                        CoreError::Validation(format!("Field '{field}': invalid pattern: {e}"))
                    })
                })
                .transpose()?;

            compiled.push(CompiledRule {
                field: field.clone(),
                rule: rule.clone(),
                pattern,
            });
        }

        Ok(Self { rules: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule against one record, collecting all violations.
    pub fn evaluate(&self, record: &RowRecord) -> Vec<ImportError> {
        let mut errors = Vec::new();
        for compiled in &self.rules {
            compiled.evaluate_into(record, &mut errors);
        }
        errors
    }
}

impl CompiledRule {
    fn evaluate_into(&self, record: &RowRecord, errors: &mut Vec<ImportError>) {
        let row = record.row_number;
        let field = self.field.as_str();

        // Mapping already trims and drops blanks, so `None` means empty.
        let value = match record.get(field) {
            Some(v) => v,
            None => {
                if self.rule.required {
                    errors.push(ImportError::field(
                        row,
                        field,
                        format!("{field} is required"),
                        None,
                    ));
                }
                return;
            }
        };

        let mut push = |message: String| {
            errors.push(ImportError::field(row, field, message, Some(value)));
        };

        if !matches_type(self.rule.field_type, value) {
            push(type_message(field, self.rule.field_type));
        }

        if let Some(re) = &self.pattern {
            if !re.is_match(value) {
                push(format!("{field} does not match the required format"));
            }
        }

        let len = value.chars().count();
        if let Some(min) = self.rule.min_length {
            if len < min {
                push(format!("{field} must be at least {min} characters"));
            }
        }
        if let Some(max) = self.rule.max_length {
            if len > max {
                push(format!("{field} must be at most {max} characters"));
            }
        }

        if let Some(custom) = &self.rule.custom {
            if let Err(message) = custom.check(value) {
                push(message);
            }
        }
    }
}

fn matches_type(field_type: FieldType, value: &str) -> bool {
    match field_type {
        FieldType::Text => true,
        FieldType::Email => EMAIL_RE.is_match(value),
        FieldType::Phone => PHONE_RE.is_match(value),
        FieldType::Number => value.parse::<f64>().is_ok_and(f64::is_finite),
        FieldType::Date => is_date(value),
    }
}

fn is_date(value: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
        || DateTime::parse_from_rfc3339(value).is_ok()
}

fn type_message(field: &str, field_type: FieldType) -> String {
    match field_type {
        FieldType::Text => format!("{field} is not valid text"),
        FieldType::Email => format!("{field} must be a valid email address"),
        FieldType::Phone => format!("{field} must be a valid phone number"),
        FieldType::Date => format!("{field} must be a valid date"),
        FieldType::Number => format!("{field} must be a number"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn record(pairs: &[(&str, &str)]) -> RowRecord {
        RowRecord {
            row_number: 7,
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn compile(field: &str, rule: ValidationRule) -> CompiledRules {
        let mut rules = ValidationRules::new();
        rules.insert(field.to_string(), rule);
        let mapping = FieldMapping::new().with(field, "Column");
        CompiledRules::compile(&rules, &mapping).expect("rules compile")
    }

    #[test]
    fn missing_required_field_yields_exactly_one_error() {
        let rules = compile(
            "email",
            ValidationRule {
                required: true,
                field_type: FieldType::Email,
                min_length: Some(5),
                ..Default::default()
            },
        );
        let errors = rules.evaluate(&record(&[]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row, 7);
        assert_eq!(errors[0].field.as_deref(), Some("email"));
        assert_eq!(errors[0].message, "email is required");
    }

    #[test]
    fn optional_empty_field_passes() {
        let rules = compile("phone", ValidationRule::of_type(FieldType::Phone));
        assert!(rules.evaluate(&record(&[])).is_empty());
    }

    #[test]
    fn email_type_check() {
        let rules = compile("email", ValidationRule::of_type(FieldType::Email));
        assert!(rules.evaluate(&record(&[("email", "ann@example.com")])).is_empty());

        let errors = rules.evaluate(&record(&[("email", "not-an-email")]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].value.as_deref(), Some("not-an-email"));
    }

    #[test]
    fn phone_type_check() {
        let rules = compile("phone", ValidationRule::of_type(FieldType::Phone));
        assert!(rules.evaluate(&record(&[("phone", "+44 (20) 7946-0958")])).is_empty());
        assert_eq!(rules.evaluate(&record(&[("phone", "12ab")])).len(), 1);
    }

    #[test]
    fn number_type_check() {
        let rules = compile("age", ValidationRule::of_type(FieldType::Number));
        assert!(rules.evaluate(&record(&[("age", "42")])).is_empty());
        assert!(rules.evaluate(&record(&[("age", "-3.5")])).is_empty());
        assert_eq!(rules.evaluate(&record(&[("age", "forty")])).len(), 1);
        assert_eq!(rules.evaluate(&record(&[("age", "NaN")])).len(), 1);
    }

    #[test]
    fn date_type_accepts_common_layouts() {
        let rules = compile("dob", ValidationRule::of_type(FieldType::Date));
        for ok in ["2024-02-29", "31/12/2023", "12/31/2023", "2024-05-01T10:00:00Z"] {
            assert!(rules.evaluate(&record(&[("dob", ok)])).is_empty(), "{ok}");
        }
        assert_eq!(rules.evaluate(&record(&[("dob", "2023-02-30")])).len(), 1);
        assert_eq!(rules.evaluate(&record(&[("dob", "yesterday")])).len(), 1);
    }

    #[test]
    fn length_counts_characters() {
        let rules = compile(
            "name",
            ValidationRule {
                min_length: Some(2),
                max_length: Some(4),
                ..Default::default()
            },
        );
        assert!(rules.evaluate(&record(&[("name", "Zoë")])).is_empty());
        assert_eq!(rules.evaluate(&record(&[("name", "Z")])).len(), 1);
        assert_eq!(rules.evaluate(&record(&[("name", "Zoëlle")])).len(), 1);
    }

    #[test]
    fn all_applicable_rules_run_without_short_circuit() {
        let rules = compile(
            "email",
            ValidationRule {
                required: true,
                field_type: FieldType::Email,
                max_length: Some(3),
                pattern: Some(r"^[a-z]+$".into()),
                ..Default::default()
            }
            .with_custom(|_| Err("blocked domain".into())),
        );
        let errors = rules.evaluate(&record(&[("email", "Bad Value")]));
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "email must be a valid email address",
                "email does not match the required format",
                "email must be at most 3 characters",
                "blocked domain",
            ]
        );
    }

    #[test]
    fn errors_accumulate_across_fields() {
        let mut rules = ValidationRules::new();
        rules.insert("email".into(), ValidationRule::required());
        rules.insert("name".into(), ValidationRule::required());
        let mapping = FieldMapping::new().with("email", "E").with("name", "N");
        let compiled = CompiledRules::compile(&rules, &mapping).unwrap();
        assert_eq!(compiled.evaluate(&record(&[])).len(), 2);
    }

    #[test]
    fn pattern_must_match_whole_value() {
        let rules = compile(
            "code",
            ValidationRule {
                pattern: Some("[0-9]{3}".into()),
                ..Default::default()
            },
        );
        assert!(rules.evaluate(&record(&[("code", "123")])).is_empty());

        let errors = rules.evaluate(&record(&[("code", "abc123xyz")]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "code does not match the required format");
        assert_eq!(rules.evaluate(&record(&[("code", "1234")])).len(), 1);
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        let rules = compile(
            "tier",
            ValidationRule {
                pattern: Some("gold|silver".into()),
                ..Default::default()
            },
        );
        assert!(rules.evaluate(&record(&[("tier", "silver")])).is_empty());
        assert_eq!(rules.evaluate(&record(&[("tier", "goldfish")])).len(), 1);
    }

    #[test]
    fn invalid_pattern_fails_compilation() {
        let mut rules = ValidationRules::new();
        rules.insert(
            "code".into(),
            ValidationRule {
                pattern: Some("([a-z".into()),
                ..Default::default()
            },
        );
        let mapping = FieldMapping::new().with("code", "Code");
        let err = CompiledRules::compile(&rules, &mapping).unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn rule_for_unmapped_field_fails_compilation() {
        let mut rules = ValidationRules::new();
        rules.insert("ticket".into(), ValidationRule::required());
        let err = CompiledRules::compile(&rules, &FieldMapping::new().with("email", "E"))
            .unwrap_err();
        assert!(err.to_string().contains("unmapped field 'ticket'"));
    }

    #[test]
    fn inverted_length_bounds_fail_compilation() {
        let mut rules = ValidationRules::new();
        rules.insert(
            "name".into(),
            ValidationRule {
                min_length: Some(10),
                max_length: Some(2),
                ..Default::default()
            },
        );
        let mapping = FieldMapping::new().with("name", "N");
        assert!(CompiledRules::compile(&rules, &mapping).is_err());
    }
}
