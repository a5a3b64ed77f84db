use thiserror::Error;

use acqorders_core::DomainError;

use crate::gateway::GatewayError;

/// Failure of an orchestration call (line, order or delete).
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A fan-out failed; `scope` names the line or order it was working on.
    #[error("{scope}: {source}")]
    Aggregation {
        scope: String,
        source: Box<OrchestrationError>,
    },
}

impl OrchestrationError {
    pub fn aggregation(scope: impl Into<String>, source: impl Into<OrchestrationError>) -> Self {
        OrchestrationError::Aggregation {
            scope: scope.into(),
            source: Box::new(source.into()),
        }
    }

    /// The innermost error, below any aggregation wrappers.
    pub fn root_cause(&self) -> &OrchestrationError {
        let mut current = self;
        while let OrchestrationError::Aggregation { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// Storage status of the root cause, if it was a status rejection.
    pub fn status_code(&self) -> Option<u16> {
        match self.root_cause() {
            OrchestrationError::Gateway(err) => err.status_code(),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self.root_cause(),
            OrchestrationError::Gateway(GatewayError::Transport(_))
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}
