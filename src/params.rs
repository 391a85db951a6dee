//! Merges `--param KEY=VALUE` input with a template's declared parameters.
//!
//! Resolution is a pure function of the template, the user input and a small
//! context (account identifier and default region). Every failure here is a
//! user-correctable validation error.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::info;

use crate::catalog::{NumericBound, ParameterDeclaration, ParameterKind, Template};

pub const NAME_KEY: &str = "Name";
pub const REGION_KEY: &str = "Region";
/// Lifted out of the parameter list and submitted as stack tags.
pub const TAGS_KEY: &str = "Tags";
pub const DEFAULT_NAME_PREFIX: &str = "rosa-network-stack";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("invalid parameter format: '{0}', expected KEY=VALUE")]
    InvalidFormat(String),

    #[error("Parameters: [{}] do not exist in the template", .0.join(" "))]
    Unknown(Vec<String>),

    #[error("Parameters: [{}] must have values", .0.join(" "))]
    Missing(Vec<String>),

    #[error("Parameter '{0}' must be a number")]
    NotANumber(String),

    #[error("Parameter '{name}' must be a number not greater than {max}")]
    AboveMaximum { name: String, max: String },

    #[error("Parameter '{name}' must be a number not less than {min}")]
    BelowMinimum { name: String, min: String },

    #[error("Parameter '{name}' must contain at least {min} characters")]
    TooShort { name: String, min: u64 },

    #[error("Parameter '{name}' must contain at most {max} characters")]
    TooLong { name: String, max: u64 },

    #[error("Parameter '{name}' must match pattern {pattern}")]
    PatternMismatch { name: String, pattern: String },

    #[error("Parameter '{0}' must be one of AllowedValues")]
    NotAllowed(String),

    #[error("invalid tag format: '{0}', expected Key=Value")]
    InvalidTagFormat(String),

    #[error("duplicate tag key {0}")]
    DuplicateTagKey(String),
}

/// Raw `--param` entries after syntax checking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserParameters {
    values: BTreeMap<String, String>,
    tags: Option<String>,
}

impl UserParameters {
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, Error> {
        let mut parameters = Self::default();

        for entry in entries {
            let entry = entry.as_ref();
            let (key, value) = match entry.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => (key.trim(), value),
                _ => return Err(Error::InvalidFormat(entry.to_string())),
            };

            if key == TAGS_KEY {
                parameters.tags = Some(value.to_string());
            } else {
                parameters.values.insert(key.to_string(), value.to_string());
            }
        }

        return Ok(parameters);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn tags(&self) -> Option<&str> {
        self.tags.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveContext {
    /// Used to derive a missing `Name`; when absent the name is left pending.
    pub account_id: Option<String>,
    pub default_region: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    Flag,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedValue {
    pub value: String,
    pub source: ValueSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Stack tags in submission order. Keys are unique ignoring case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagSet(Vec<Tag>);

impl TagSet {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let mut tags = Vec::new();
        let mut seen = HashSet::new();

        for pair in raw.split(',').filter(|pair| !pair.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) if !key.is_empty() => (key, value),
                _ => return Err(Error::InvalidTagFormat(pair.to_string())),
            };

            if !seen.insert(key.to_lowercase()) {
                return Err(Error::DuplicateTagKey(key.to_string()));
            }

            tags.push(Tag {
                key: key.to_string(),
                value: value.to_string(),
            });
        }

        return Ok(Self(tags));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedParameters {
    pub values: BTreeMap<String, ResolvedValue>,
    pub tags: TagSet,
}

impl ResolvedParameters {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|resolved| resolved.value.as_str())
    }

    pub fn stack_name(&self) -> &str {
        self.get(NAME_KEY).unwrap_or_default()
    }

    /// `false` until a supplied or derived `Name` is present.
    pub fn has_stack_name(&self) -> bool {
        self.values.contains_key(NAME_KEY)
    }

    pub fn region(&self) -> &str {
        self.get(REGION_KEY).unwrap_or_default()
    }

    /// Values that were supplied or derived, sorted by key. Declared defaults
    /// are left for CloudFormation to apply.
    pub fn explicit(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .filter(|(_, resolved)| resolved.source != ValueSource::Default)
            .map(|(key, resolved)| (key.as_str(), resolved.value.as_str()))
    }

    /// Fills in `rosa-network-stack-<account>` for a missing `Name` and checks
    /// it against the template's constraints.
    pub fn with_default_name(
        mut self,
        template: &Template,
        account_id: &str,
    ) -> Result<Self, Error> {
        if self.has_stack_name() {
            return Ok(self);
        }

        let name = default_stack_name(account_id);
        info!("Name not provided, using default name {}", name);

        if let Some(declaration) = template.declaration(NAME_KEY) {
            check_constraints(declaration, &name)?;
        }
        self.values.insert(
            NAME_KEY.to_string(),
            ResolvedValue {
                value: name,
                source: ValueSource::Derived,
            },
        );

        return Ok(self);
    }
}

pub fn default_stack_name(account_id: &str) -> String {
    format!("{}-{}", DEFAULT_NAME_PREFIX, account_id)
}

/// Merges defaults, user input and derived values, then validates the result.
///
/// Without an account id a missing `Name` is left out; every other check
/// still runs, so callers can report input errors before looking the account
/// up and finishing with [`ResolvedParameters::with_default_name`].
pub fn resolve(
    template: &Template,
    user: &UserParameters,
    context: &ResolveContext,
) -> Result<ResolvedParameters, Error> {
    let mut values: BTreeMap<String, ResolvedValue> = template
        .parameters
        .iter()
        .filter_map(|declaration| {
            declaration.default.as_ref().map(|default| {
                let resolved = ResolvedValue {
                    value: default.clone(),
                    source: ValueSource::Default,
                };
                (declaration.name.clone(), resolved)
            })
        })
        .collect();

    let mut supplied: BTreeMap<String, ResolvedValue> = user
        .values
        .iter()
        .map(|(key, value)| {
            let resolved = ResolvedValue {
                value: value.clone(),
                source: ValueSource::Flag,
            };
            (key.clone(), resolved)
        })
        .collect();

    let name_pending = !supplied.contains_key(NAME_KEY);

    if !supplied.contains_key(REGION_KEY) {
        info!(
            "Region not provided, using default region {}",
            context.default_region
        );
        supplied.insert(
            REGION_KEY.to_string(),
            ResolvedValue {
                value: context.default_region.clone(),
                source: ValueSource::Derived,
            },
        );
    }

    let mut keys: BTreeSet<&str> = supplied.keys().map(String::as_str).collect();
    if name_pending {
        keys.insert(NAME_KEY);
    }
    let unknown: Vec<String> = keys
        .into_iter()
        .filter(|key| !template.declares(key))
        .map(String::from)
        .collect();
    if !unknown.is_empty() {
        return Err(Error::Unknown(unknown));
    }

    values.extend(supplied);

    let missing: Vec<String> = template
        .parameters
        .iter()
        .filter(|declaration| !(name_pending && declaration.name == NAME_KEY))
        .filter(|declaration| !values.contains_key(&declaration.name))
        .map(|declaration| declaration.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(Error::Missing(missing));
    }

    for declaration in &template.parameters {
        if let Some(resolved) = values.get(&declaration.name) {
            check_constraints(declaration, &resolved.value)?;
        }
    }

    let tags = match user.tags() {
        Some(raw) => TagSet::parse(raw)?,
        None => TagSet::default(),
    };

    let resolved = ResolvedParameters { values, tags };
    return match &context.account_id {
        Some(account_id) => resolved.with_default_name(template, account_id),
        None => Ok(resolved),
    };
}

fn check_constraints(declaration: &ParameterDeclaration, value: &str) -> Result<(), Error> {
    match declaration.kind {
        ParameterKind::Number => check_number(declaration, value)?,
        ParameterKind::NumberList => {
            for item in split_list(value) {
                check_number(declaration, item)?;
            }
        }
        ParameterKind::String => check_string(declaration, value)?,
        ParameterKind::List => {}
    }

    if declaration.allowed_values.is_empty() {
        return Ok(());
    }

    let items = if declaration.kind.is_list() {
        split_list(value)
    } else {
        vec![value]
    };
    let allowed = items
        .iter()
        .all(|item| declaration.allowed_values.iter().any(|allowed| allowed == item));
    if !allowed {
        return Err(Error::NotAllowed(declaration.name.clone()));
    }

    return Ok(());
}

fn check_number(declaration: &ParameterDeclaration, value: &str) -> Result<(), Error> {
    let number = match value.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => number,
        _ => return Err(Error::NotANumber(declaration.name.clone())),
    };

    if let Some(NumericBound { value: max, literal }) = &declaration.max_value {
        if number > *max {
            return Err(Error::AboveMaximum {
                name: declaration.name.clone(),
                max: literal.clone(),
            });
        }
    }

    if let Some(NumericBound { value: min, literal }) = &declaration.min_value {
        if number < *min {
            return Err(Error::BelowMinimum {
                name: declaration.name.clone(),
                min: literal.clone(),
            });
        }
    }

    return Ok(());
}

fn check_string(declaration: &ParameterDeclaration, value: &str) -> Result<(), Error> {
    let length = value.chars().count() as u64;

    if let Some(min) = declaration.min_length {
        if length < min {
            return Err(Error::TooShort {
                name: declaration.name.clone(),
                min,
            });
        }
    }

    if let Some(max) = declaration.max_length {
        if length > max {
            return Err(Error::TooLong {
                name: declaration.name.clone(),
                max,
            });
        }
    }

    if let Some(pattern) = &declaration.allowed_pattern {
        if !pattern.regex.is_match(value) {
            return Err(Error::PatternMismatch {
                name: declaration.name.clone(),
                pattern: pattern.literal.clone(),
            });
        }
    }

    return Ok(());
}

fn split_list(value: &str) -> Vec<&str> {
    value.split(',').map(str::trim).collect()
}
