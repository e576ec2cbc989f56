//! Stock attribute validators

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};

fn invalid(request: &ValidatorRequest, summary: &str, detail: String) -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![Diagnostic::error(summary, detail).with_attribute(request.path.clone())],
    }
}

/// Matches string values against a regular expression.
pub struct StringPatternValidator {
    pattern: Result<regex::Regex, regex::Error>,
    description: String,
}

impl StringPatternValidator {
    pub fn new(pattern: &str, description: &str) -> Self {
        Self {
            pattern: regex::Regex::new(pattern),
            description: description.to_string(),
        }
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return ValidatorResponse::default();
        };
        match &self.pattern {
            Ok(re) if re.is_match(s) => ValidatorResponse::default(),
            Ok(_) => invalid(
                &request,
                "Invalid attribute value",
                format!("{}: {:?} {}", request.path, s, self.description),
            ),
            Err(e) => invalid(
                &request,
                "Invalid validator pattern",
                format!("{}: {}", request.path, e),
            ),
        }
    }
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        format!("string length between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return ValidatorResponse::default();
        };
        let len = s.chars().count();
        if let Some(min) = self.min.filter(|min| len < *min) {
            return invalid(
                &request,
                "Invalid attribute value length",
                format!("{} must be at least {} characters, got {}", request.path, min, len),
            );
        }
        if let Some(max) = self.max.filter(|max| len > *max) {
            return invalid(
                &request,
                "Invalid attribute value length",
                format!("{} must be at most {} characters, got {}", request.path, max, len),
            );
        }
        ValidatorResponse::default()
    }
}

/// Accepts only the listed string values.
pub struct StringOneOfValidator {
    allowed: Vec<String>,
}

impl StringOneOfValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for StringOneOfValidator {
    fn description(&self) -> String {
        format!("one of {:?}", self.allowed)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.value.as_str() {
            Some(s) if !self.allowed.iter().any(|a| a == s) => invalid(
                &request,
                "Invalid attribute value",
                format!(
                    "{}: expected to be one of {:?}, got {:?}",
                    request.path, self.allowed, s
                ),
            ),
            _ => ValidatorResponse::default(),
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        format!("number between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(n) = request.config_value.value.as_number() else {
            return ValidatorResponse::default();
        };
        let below = self.min.is_some_and(|min| n < min);
        let above = self.max.is_some_and(|max| n > max);
        if below || above {
            let range = match (self.min, self.max) {
                (Some(min), Some(max)) => format!("in the range ({} - {})", min, max),
                (Some(min), None) => format!("at least {}", min),
                (None, Some(max)) => format!("at most {}", max),
                (None, None) => "unbounded".to_string(),
            };
            return invalid(
                &request,
                "Invalid attribute value",
                format!("expected {} to be {}, got {}", request.path, range, n),
            );
        }
        ValidatorResponse::default()
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        format!("list length between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::List(items) = &request.config_value.value else {
            return ValidatorResponse::default();
        };
        if let Some(min) = self.min.filter(|min| items.len() < *min) {
            return invalid(
                &request,
                "Invalid list length",
                format!("{} must have at least {} items, got {}", request.path, min, items.len()),
            );
        }
        if let Some(max) = self.max.filter(|max| items.len() > *max) {
            return invalid(
                &request,
                "Invalid list length",
                format!("{} must have at most {} items, got {}", request.path, max, items.len()),
            );
        }
        ValidatorResponse::default()
    }
}

/// Runs `inner` against every element of a list or set value.
pub struct EachElement<V> {
    inner: V,
}

impl<V: Validator> EachElement<V> {
    pub fn new(inner: V) -> Self {
        Self { inner }
    }
}

impl<V: Validator> Validator for EachElement<V> {
    fn description(&self) -> String {
        format!("each element: {}", self.inner.description())
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::List(items) = &request.config_value.value else {
            return ValidatorResponse::default();
        };
        let mut response = ValidatorResponse::default();
        for (i, item) in items.iter().enumerate() {
            let inner = self.inner.validate(ValidatorRequest {
                config_value: crate::types::DynamicValue::new(item.clone()),
                path: request.path.clone().index(i as i64),
            });
            response.diagnostics.extend(inner.diagnostics);
        }
        response
    }
}
