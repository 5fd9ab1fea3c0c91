use relay_domain::error::RelayError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("relay: {0}")]
    Relay(#[from] RelayError),

    #[error("persistence: event_name={event_name}, reason={source}")]
    Persistence {
        event_name: &'static str,
        #[source]
        source: RelayError,
    },

    #[error("validation: {0}")]
    Validation(String),
}

pub type AppResult<T> = Result<T, AppError>;
