//! Dotted relationship/field paths such as `comments.author.name` or
//! `imageable#documents`.

use crate::error::{Error, Result};
use crate::schema::{ID_FIELD, RelationshipDef, Schema};
use std::fmt;

/// Flags controlling what a path may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Allow a trailing field segment.
    pub parse_fields: bool,
    /// Append the target's default field (`id`) when the path ends in a
    /// relationship. Only honored together with `parse_fields`.
    pub ensure_default_field: bool,
}

impl ParseOptions {
    /// Relationship-only paths, as used by `include`.
    pub const RELATIONSHIPS: ParseOptions = ParseOptions {
        parse_fields: false,
        ensure_default_field: false,
    };

    /// Paths that end in a field, as used by `sort` and `filter`.
    pub const FIELDS: ParseOptions = ParseOptions {
        parse_fields: true,
        ensure_default_field: true,
    };
}

/// One hop along a relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipSegment {
    pub source_type: String,
    pub relationship: RelationshipDef,
    /// Concrete type given with the `#type` suffix.
    pub type_override: Option<String>,
}

impl RelationshipSegment {
    /// The relationship name, without any `#type` suffix.
    pub fn name(&self) -> &str {
        &self.relationship.name
    }

    /// The type this segment lands on, or `None` for a polymorphic
    /// relationship whose type was not narrowed.
    pub fn resource_type(&self) -> Option<&str> {
        self.type_override
            .as_deref()
            .or_else(|| self.relationship.target_type())
    }

    /// Whether the concrete type was given explicitly rather than inferred.
    pub fn type_specified(&self) -> bool {
        self.type_override.is_some()
    }
}

impl fmt::Display for RelationshipSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_override {
            Some(t) => write!(f, "{}#{}", self.relationship.name, t),
            None => write!(f, "{}", self.relationship.name),
        }
    }
}

/// A terminal field segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSegment {
    /// `None` when the field sits behind an un-narrowed polymorphic hop.
    pub resource_type: Option<String>,
    pub field_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Relationship(RelationshipSegment),
    Field(FieldSegment),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Relationship(r) => write!(f, "{}", r),
            PathSegment::Field(field) => write!(f, "{}", field.field_name),
        }
    }
}

/// A parsed path, validated against the schema.
///
/// A field segment can only be the last segment. A polymorphic relationship
/// segment without a `#type` suffix must also be last (or be followed only
/// by the implicit default field), because the type its further segments
/// would resolve against is unknown until fetch time.
///
/// ```
/// use jsonapi_graph::v1::{ParseOptions, Path, ResourceDef, Schema};
///
/// let schema = Schema::new()
///     .with(ResourceDef::new("people").attribute("name"))
///     .with(ResourceDef::new("posts").has_one("author", "people"));
///
/// let path = Path::parse(&schema, "posts", "author.name", ParseOptions::FIELDS).unwrap();
/// assert_eq!(path.relationship_path_string(), "author");
/// assert_eq!(path.field().unwrap().field_name, "name");
///
/// assert!(Path::parse(&schema, "posts", "author.name", ParseOptions::RELATIONSHIPS).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    resource_type: String,
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn parse(
        schema: &Schema,
        resource_type: &str,
        path_string: &str,
        options: ParseOptions,
    ) -> Result<Self> {
        let tokens: Vec<&str> = path_string.split('.').collect();
        let mut segments = Vec::with_capacity(tokens.len() + 1);
        let mut current = Some(resource_type.to_string());
        let mut ambiguous_from = resource_type.to_string();

        for (i, token) in tokens.iter().enumerate() {
            let is_last = i + 1 == tokens.len();
            let Some(current_type) = current.clone() else {
                return Err(Error::invalid_relationship(ambiguous_from, *token));
            };
            let def = schema.require(&current_type)?;
            let (name, type_part) = match token.split_once('#') {
                Some((name, t)) => (name, Some(t)),
                None => (*token, None),
            };

            if let Some(relationship) = def.relationship(name) {
                if let Some(t) = type_part
                    && (!relationship.polymorphic || !relationship.accepts_type(t))
                {
                    return Err(Error::invalid_relationship(&current_type, *token));
                }
                let segment = RelationshipSegment {
                    source_type: current_type.clone(),
                    relationship: relationship.clone(),
                    type_override: type_part.map(str::to_string),
                };
                current = segment.resource_type().map(str::to_string);
                ambiguous_from = segment.name().to_string();
                segments.push(PathSegment::Relationship(segment));
            } else if options.parse_fields
                && type_part.is_none()
                && (name == ID_FIELD || def.has_attribute(name))
            {
                if !is_last {
                    return Err(Error::invalid_relationship(&current_type, *token));
                }
                segments.push(PathSegment::Field(FieldSegment {
                    resource_type: Some(current_type.clone()),
                    field_name: name.to_string(),
                }));
            } else {
                return Err(Error::invalid_relationship(&current_type, *token));
            }
        }

        if options.parse_fields
            && options.ensure_default_field
            && let Some(PathSegment::Relationship(last)) = segments.last()
        {
            let resource_type = last.resource_type().map(str::to_string);
            segments.push(PathSegment::Field(FieldSegment {
                resource_type,
                field_name: ID_FIELD.to_string(),
            }));
        }

        Ok(Path {
            resource_type: resource_type.to_string(),
            segments,
        })
    }

    /// The type the path starts from.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn relationship_segments(&self) -> impl Iterator<Item = &RelationshipSegment> {
        self.segments.iter().filter_map(|s| match s {
            PathSegment::Relationship(r) => Some(r),
            PathSegment::Field(_) => None,
        })
    }

    pub fn last_relationship(&self) -> Option<&RelationshipSegment> {
        self.relationship_segments().last()
    }

    pub fn field(&self) -> Option<&FieldSegment> {
        match self.segments.last() {
            Some(PathSegment::Field(f)) => Some(f),
            _ => None,
        }
    }

    /// Relationship names joined by `.`, without type suffixes or fields.
    pub fn relationship_path_string(&self) -> String {
        self.relationship_segments()
            .map(RelationshipSegment::name)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}
