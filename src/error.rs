use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovgateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("<{element}> at position {position} is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
        position: usize,
    },

    #[error("<{element}> at position {position} has invalid {attribute}=\"{value}\"")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
        position: usize,
    },

    #[error("report '{name}': {source}")]
    Report {
        name: String,
        #[source]
        source: Box<CovgateError>,
    },
}

impl CovgateError {
    /// True when the error means a single report could not be read as
    /// coverage. Callers may skip that report and continue with the rest.
    pub fn is_malformed_report(&self) -> bool {
        match self {
            CovgateError::Xml { .. }
            | CovgateError::MissingAttribute { .. }
            | CovgateError::InvalidAttribute { .. } => true,
            CovgateError::Report { source, .. } => source.is_malformed_report(),
            CovgateError::Io(_) | CovgateError::Json(_) => false,
        }
    }

    pub(crate) fn in_report(self, name: &str) -> Self {
        CovgateError::Report {
            name: name.to_string(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, CovgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_wrapper_keeps_classification() {
        let err = CovgateError::MissingAttribute {
            element: "line",
            attribute: "hits",
            position: 42,
        }
        .in_report("coverage.xml");
        assert!(err.is_malformed_report());
        let msg = err.to_string();
        assert!(msg.contains("coverage.xml"), "{msg}");

        let io = CovgateError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(!io.is_malformed_report());
    }
}
