use crate::access::AccessError;
use crate::document::{ErrorDocument, ErrorObject, ErrorSource};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// JSON:API error codes carried in the `code` member of error objects.
pub mod codes {
    pub const INVALID_RESOURCE: &str = "101";
    pub const FILTER_NOT_ALLOWED: &str = "102";
    pub const INVALID_FIELD: &str = "104";
    pub const PARAM_NOT_ALLOWED: &str = "105";
    pub const INVALID_SORT_CRITERIA: &str = "114";
    pub const INVALID_PAGE_VALUE: &str = "118";
    pub const INVALID_RELATIONSHIP: &str = "123";
    pub const REQUEST_CANCELED: &str = "499";
    pub const RECORD_NOT_FOUND: &str = "404";
    pub const INTERNAL_SERVER_ERROR: &str = "500";
}

#[derive(Debug, Error)]
pub enum Error {
    /// A path segment names no relationship (or no field where one is allowed).
    #[error("{relationship} is not a valid relationship of {resource_type}")]
    InvalidRelationship {
        resource_type: String,
        relationship: String,
    },

    #[error("{field} is not a valid field for {resource_type}")]
    InvalidField {
        resource_type: String,
        field: String,
    },

    #[error("{0} is not a valid resource")]
    InvalidResource(String),

    #[error("{criteria} is not a valid sort criteria for {resource_type}")]
    InvalidSortCriteria {
        resource_type: String,
        criteria: String,
    },

    #[error("{filter} is not allowed")]
    FilterNotAllowed { filter: String },

    #[error("{value} is not a valid value for {param} page parameter")]
    InvalidPageValue { param: String, value: String },

    #[error("{0} is not allowed")]
    ParameterNotAllowed(String),

    #[error("the record identified by {id} could not be found")]
    RecordNotFound { resource_type: String, id: String },

    /// The cancellation token tripped between data-access calls.
    #[error("resolution was canceled")]
    Canceled,

    #[error("data access error: {0}")]
    DataAccess(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_relationship(
        resource_type: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Error::InvalidRelationship {
            resource_type: resource_type.into(),
            relationship: relationship.into(),
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            Error::RecordNotFound { .. } => 404,
            Error::Canceled => 499,
            Error::DataAccess(_) | Error::Json(_) => 500,
            _ => 400,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRelationship { .. } => codes::INVALID_RELATIONSHIP,
            Error::InvalidField { .. } => codes::INVALID_FIELD,
            Error::InvalidResource(_) => codes::INVALID_RESOURCE,
            Error::InvalidSortCriteria { .. } => codes::INVALID_SORT_CRITERIA,
            Error::FilterNotAllowed { .. } => codes::FILTER_NOT_ALLOWED,
            Error::InvalidPageValue { .. } => codes::INVALID_PAGE_VALUE,
            Error::ParameterNotAllowed(_) => codes::PARAM_NOT_ALLOWED,
            Error::RecordNotFound { .. } => codes::RECORD_NOT_FOUND,
            Error::Canceled => codes::REQUEST_CANCELED,
            Error::DataAccess(_) | Error::Json(_) => codes::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Error::InvalidRelationship { .. } => "Invalid relationship",
            Error::InvalidField { .. } => "Invalid field",
            Error::InvalidResource(_) => "Invalid resource",
            Error::InvalidSortCriteria { .. } => "Invalid sort criteria",
            Error::FilterNotAllowed { .. } => "Filter not allowed",
            Error::InvalidPageValue { .. } => "Invalid page value",
            Error::ParameterNotAllowed(_) => "Param not allowed",
            Error::RecordNotFound { .. } => "Record not found",
            Error::Canceled => "Request canceled",
            Error::DataAccess(_) | Error::Json(_) => "Internal Server Error",
        }
    }

    fn source_parameter(&self) -> Option<&str> {
        match self {
            Error::InvalidField { .. } => Some("fields"),
            Error::InvalidSortCriteria { .. } => Some("sort"),
            Error::FilterNotAllowed { .. } => Some("filter"),
            Error::InvalidPageValue { .. } => Some("page"),
            Error::ParameterNotAllowed(param) => Some(param.as_str()),
            _ => None,
        }
    }

    /// The JSON:API error object describing this error.
    pub fn to_error_object(&self) -> ErrorObject {
        ErrorObject {
            title: self.title().to_string(),
            detail: self.to_string(),
            code: self.code().to_string(),
            status: self.status().to_string(),
            source: self.source_parameter().map(|p| ErrorSource {
                pointer: None,
                parameter: Some(p.to_string()),
            }),
        }
    }

    /// Wrap this error in an `{"errors": [...]}` document.
    pub fn to_document(&self) -> ErrorDocument {
        ErrorDocument {
            errors: vec![self.to_error_object()],
        }
    }
}

impl From<AccessError> for Error {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::RecordNotFound(identity) => Error::RecordNotFound {
                resource_type: identity.resource_type,
                id: identity.id,
            },
            other => Error::DataAccess(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_relationship_names_segment_and_type() {
        let err = Error::invalid_relationship("posts", "commnets");
        assert_eq!(
            err.to_string(),
            "commnets is not a valid relationship of posts"
        );
        assert_eq!(err.status(), 400);
        assert_eq!(err.code(), codes::INVALID_RELATIONSHIP);
    }

    #[test]
    fn test_record_not_found_maps_to_404() {
        let err = Error::RecordNotFound {
            resource_type: "posts".into(),
            id: "99".into(),
        };
        let obj = err.to_error_object();
        assert_eq!(obj.status, "404");
        assert_eq!(obj.code, "404");
        assert_eq!(obj.title, "Record not found");
        assert!(obj.source.is_none());
    }

    #[test]
    fn test_field_error_points_at_parameter() {
        let err = Error::InvalidField {
            resource_type: "posts".into(),
            field: "bogus".into(),
        };
        let obj = err.to_error_object();
        assert_eq!(obj.code, codes::INVALID_FIELD);
        assert_eq!(
            obj.source.and_then(|s| s.parameter),
            Some("fields".to_string())
        );
    }

    #[test]
    fn test_access_errors_convert() {
        let err = Error::from(AccessError::Backend("connection reset".into()));
        assert_eq!(err.status(), 500);
        assert_eq!(err.to_string(), "data access error: connection reset");
        let err = Error::from(AccessError::RecordNotFound(crate::identity::ResourceIdentity::new("posts", "7")));
        assert!(matches!(err, Error::RecordNotFound { ref id, .. } if id == "7"));
    }

    #[test]
    fn test_error_document_shape() {
        let doc = Error::Canceled.to_document();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["errors"][0]["status"], "499");
        assert_eq!(json["errors"][0]["detail"], "resolution was canceled");
        assert!(json["errors"][0].get("source").is_none());
    }
}
