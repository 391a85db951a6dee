use std::{
    fs, io,
    path::{Path, PathBuf},
};

use regex::Regex;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

pub const TEMPLATE_FILE_NAME: &str = "cloudformation.yaml";
pub const DEFAULT_TEMPLATE: &str = "rosa-quickstart-default-vpc";

/// Virtual root the embedded templates are reported under.
const BUILT_IN_ROOT: &str = "cmd/create/network/templates";

const BUILT_IN_TEMPLATES: &[(&str, &str)] = &[(
    DEFAULT_TEMPLATE,
    include_str!("../templates/rosa-quickstart-default-vpc/cloudformation.yaml"),
)];

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("failed to read template file: open {0}: no such file or directory")]
    NotFound(String),

    #[error("failed to read template file: open {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse template {name}: {message}")]
    Parsing { name: String, message: String },
}

/// Where template bodies are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Catalog {
    /// Templates compiled into the binary.
    BuiltIn,
    /// `<root>/<template-name>/cloudformation.yaml` on disk.
    Directory(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource {
    BuiltIn,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Number,
    List,
    NumberList,
}

impl ParameterKind {
    fn from_cloudformation(kind: &str) -> Self {
        match kind {
            "Number" => ParameterKind::Number,
            "List<Number>" => ParameterKind::NumberList,
            "CommaDelimitedList" => ParameterKind::List,
            other if other.starts_with("List<") => ParameterKind::List,
            _ => ParameterKind::String,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ParameterKind::List | ParameterKind::NumberList)
    }
}

/// A numeric constraint as declared, kept verbatim for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericBound {
    pub value: f64,
    pub literal: String,
}

/// An `AllowedPattern`, compiled to match the whole value.
#[derive(Debug, Clone)]
pub struct AllowedPattern {
    pub regex: Regex,
    pub literal: String,
}

#[derive(Debug, Clone)]
pub struct ParameterDeclaration {
    pub name: String,
    pub kind: ParameterKind,
    pub default: Option<String>,
    pub min_value: Option<NumericBound>,
    pub max_value: Option<NumericBound>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub allowed_pattern: Option<AllowedPattern>,
    pub allowed_values: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub source: TemplateSource,
    pub path: PathBuf,
    pub body: String,
    pub parameters: Vec<ParameterDeclaration>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawParameter {
    #[serde(rename = "Type")]
    kind: String,
    default: Option<Value>,
    min_value: Option<Value>,
    max_value: Option<Value>,
    min_length: Option<Value>,
    max_length: Option<Value>,
    allowed_pattern: Option<String>,
    #[serde(default)]
    allowed_values: Vec<Value>,
}

impl Catalog {
    pub fn resolve(&self, name: &str) -> Result<Template, Error> {
        match self {
            Catalog::BuiltIn => {
                let path = Path::new(BUILT_IN_ROOT).join(name).join(TEMPLATE_FILE_NAME);
                let body = BUILT_IN_TEMPLATES
                    .iter()
                    .find(|(template_name, _)| *template_name == name)
                    .map(|(_, body)| *body);

                match body {
                    Some(body) => {
                        debug!(template = name, "using built-in template");
                        Template::parse(name, TemplateSource::BuiltIn, path, body.to_string())
                    }
                    None => Err(Error::NotFound(path.display().to_string())),
                }
            }
            Catalog::Directory(root) => {
                let path = root.join(name).join(TEMPLATE_FILE_NAME);
                let body = match fs::read_to_string(&path) {
                    Ok(body) => Ok(body),
                    Err(error) => match error.kind() {
                        io::ErrorKind::NotFound => Err(Error::NotFound(path.display().to_string())),
                        _ => Err(Error::Read {
                            path: path.display().to_string(),
                            message: error.to_string(),
                        }),
                    },
                }?;

                debug!(template = name, path = %path.display(), "read template from disk");
                Template::parse(name, TemplateSource::File, path, body)
            }
        }
    }
}

impl Template {
    pub fn parse(
        name: &str,
        source: TemplateSource,
        path: PathBuf,
        body: String,
    ) -> Result<Self, Error> {
        let parsing = |message: String| Error::Parsing {
            name: name.to_string(),
            message,
        };

        let document: Value =
            serde_yaml::from_str(&body).map_err(|error| parsing(error.to_string()))?;

        let parameters = match document.get("Parameters") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Mapping(mapping)) => parse_declarations(mapping).map_err(parsing)?,
            Some(_) => return Err(parsing(String::from("Parameters must be a mapping"))),
        };

        return Ok(Self {
            name: name.to_string(),
            source,
            path,
            body,
            parameters,
        });
    }

    pub fn declaration(&self, name: &str) -> Option<&ParameterDeclaration> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.declaration(name).is_some()
    }
}

fn parse_declarations(mapping: &Mapping) -> Result<Vec<ParameterDeclaration>, String> {
    let mut declarations = Vec::with_capacity(mapping.len());

    for (key, value) in mapping {
        let name = match key.as_str() {
            Some(name) => name.to_string(),
            None => return Err(format!("parameter name {:?} is not a string", key)),
        };

        let raw: RawParameter = serde_yaml::from_value(value.clone())
            .map_err(|error| format!("parameter {}: {}", name, error))?;

        let default = match &raw.default {
            Some(value) => Some(
                scalar_to_string(value)
                    .ok_or_else(|| format!("parameter {}: unsupported Default", name))?,
            ),
            None => None,
        };

        let allowed_pattern = match &raw.allowed_pattern {
            Some(pattern) => Some(AllowedPattern {
                regex: Regex::new(&format!("^(?:{})$", pattern)).map_err(|error| {
                    format!("parameter {}: invalid AllowedPattern: {}", name, error)
                })?,
                literal: pattern.clone(),
            }),
            None => None,
        };

        let allowed_values = raw
            .allowed_values
            .iter()
            .map(|value| {
                scalar_to_string(value)
                    .ok_or_else(|| format!("parameter {}: unsupported AllowedValues entry", name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        declarations.push(ParameterDeclaration {
            kind: ParameterKind::from_cloudformation(&raw.kind),
            default,
            min_value: numeric_bound(&name, "MinValue", raw.min_value.as_ref())?,
            max_value: numeric_bound(&name, "MaxValue", raw.max_value.as_ref())?,
            min_length: length_bound(&name, "MinLength", raw.min_length.as_ref())?,
            max_length: length_bound(&name, "MaxLength", raw.max_length.as_ref())?,
            allowed_pattern,
            allowed_values,
            name,
        });
    }

    return Ok(declarations);
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(string) => Some(string.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(boolean) => Some(boolean.to_string()),
        Value::Sequence(items) => items
            .iter()
            .map(scalar_to_string)
            .collect::<Option<Vec<_>>>()
            .map(|items| items.join(",")),
        _ => None,
    }
}

fn numeric_bound(
    parameter: &str,
    field: &str,
    value: Option<&Value>,
) -> Result<Option<NumericBound>, String> {
    let value = match value {
        Some(value) => value,
        None => return Ok(None),
    };

    let literal = scalar_to_string(value)
        .ok_or_else(|| format!("parameter {}: {} must be a number", parameter, field))?;
    let number = literal
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("parameter {}: {} must be a number", parameter, field))?;

    return Ok(Some(NumericBound {
        value: number,
        literal,
    }));
}

fn length_bound(parameter: &str, field: &str, value: Option<&Value>) -> Result<Option<u64>, String> {
    match value {
        Some(value) => scalar_to_string(value)
            .and_then(|literal| literal.trim().parse::<u64>().ok())
            .map(Some)
            .ok_or_else(|| format!("parameter {}: {} must be a non-negative integer", parameter, field)),
        None => Ok(None),
    }
}
