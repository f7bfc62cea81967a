//! API specification documents and the format decisions around them.
//!
//! Parsing and upgrading specification documents is delegated to a
//! [`SpecificationConverter`]. This module only decides which wire format a
//! document is published as, and whether it must be converted first.

use std::path::Path;

use serde_json::Value;

use super::error::{ArtifactError, ConversionError, Result};

/// Candidate specification file names, in lookup order.
pub const SPECIFICATION_FILES: &[&str] = &[
    "specification.yaml",
    "specification.yml",
    "specification.json",
    "specification.graphql",
    "specification.wsdl",
    "specification.wadl",
];

/// Format of a specification document as accepted by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecificationFormat {
    /// OpenAPI 3.x as YAML.
    OpenApi,
    /// OpenAPI 3.x as JSON.
    OpenApiJson,
    /// Swagger 2.0 as JSON. The service rejects Swagger 2.0 as YAML.
    SwaggerJson,
    GraphQl,
    Wsdl,
    Wadl,
}

impl SpecificationFormat {
    /// Value of `properties.format` for this document format.
    pub fn wire_format(&self) -> &'static str {
        match self {
            SpecificationFormat::OpenApi => "openapi",
            SpecificationFormat::OpenApiJson => "openapi+json",
            SpecificationFormat::SwaggerJson => "swagger-json",
            SpecificationFormat::GraphQl => "graphql",
            SpecificationFormat::Wsdl => "wsdl",
            SpecificationFormat::Wadl => "wadl-xml",
        }
    }

    /// Returns true for file names that hold an API specification.
    pub fn is_specification_file(file_name: &str) -> bool {
        SPECIFICATION_FILES.contains(&file_name)
    }
}

/// Converts specification documents between formats.
pub trait SpecificationConverter: Send + Sync {
    /// Converts `document` so it can be published as `target`.
    fn convert(
        &self,
        document: &str,
        target: SpecificationFormat,
    ) -> std::result::Result<String, ConversionError>;
}

/// Converter that handles YAML to JSON re-encoding natively.
///
/// Version upgrades (Swagger 2.0 to OpenAPI 3) are not supported.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeConverter;

impl SpecificationConverter for NativeConverter {
    fn convert(
        &self,
        document: &str,
        target: SpecificationFormat,
    ) -> std::result::Result<String, ConversionError> {
        match target {
            SpecificationFormat::SwaggerJson | SpecificationFormat::OpenApiJson => {
                let value: Value = serde_yaml::from_str(document)?;
                Ok(serde_json::to_string_pretty(&value)?)
            }
            other => Err(ConversionError::Unsupported {
                target: other.wire_format(),
            }),
        }
    }
}

/// A specification document ready to be embedded in an API body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSpecification {
    pub format: SpecificationFormat,
    pub value: String,
}

/// Detects the document format and converts it when the service would
/// reject it as written.
pub fn prepare(
    path: &Path,
    contents: String,
    converter: &dyn SpecificationConverter,
) -> Result<PreparedSpecification> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let format = match extension {
        "graphql" => SpecificationFormat::GraphQl,
        "wsdl" => SpecificationFormat::Wsdl,
        "wadl" => SpecificationFormat::Wadl,
        "json" => {
            if is_swagger_v2(&parse_yaml(path, &contents)?) {
                SpecificationFormat::SwaggerJson
            } else {
                SpecificationFormat::OpenApiJson
            }
        }
        "yaml" | "yml" => {
            if is_swagger_v2(&parse_yaml(path, &contents)?) {
                let value = converter
                    .convert(&contents, SpecificationFormat::SwaggerJson)
                    .map_err(|source| ArtifactError::Conversion {
                        path: path.to_path_buf(),
                        source,
                    })?;
                tracing::debug!(path = %path.display(), "Converted Swagger 2.0 YAML to JSON");
                return Ok(PreparedSpecification {
                    format: SpecificationFormat::SwaggerJson,
                    value,
                });
            }
            SpecificationFormat::OpenApi
        }
        other => {
            return Err(ArtifactError::InvalidArtifact {
                path: path.to_path_buf(),
                message: format!("unsupported specification extension '{}'", other),
            })
        }
    };

    Ok(PreparedSpecification {
        format,
        value: contents,
    })
}

fn parse_yaml(path: &Path, contents: &str) -> Result<Value> {
    // JSON is a subset of YAML, so one parser covers both.
    serde_yaml::from_str(contents).map_err(|e| ArtifactError::ParseYaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn is_swagger_v2(document: &Value) -> bool {
    document
        .get("swagger")
        .is_some_and(|version| version.as_str() == Some("2.0"))
}
