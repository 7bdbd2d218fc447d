use reqwest::StatusCode;

/// Input rejected before anything is sent to the server.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a story prompt or select an example.")]
    EmptyPrompt,

    #[error("Story prompt is {len} characters long; the limit is {max}.")]
    PromptTooLong { len: usize, max: usize },

    #[error("No perspective selected")]
    NoSelection,
}

/// Failure of a single exchange with the generation service.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Failed to connect to the server at {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("The server at {url} did not respond in time")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{status}. Details: {body}")]
    Status { status: StatusCode, body: String },

    #[error("{message}")]
    Application { message: String },

    #[error("unexpected response from server: {message}")]
    Decode { message: String },

    #[error("Invalid response format from server")]
    UnexpectedContentType { content_type: Option<String> },
}

/// Failure while producing an exported document.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export: {0}")]
    Empty(&'static str),

    #[error("failed to lay out document: {0}")]
    Layout(String),

    #[error("failed to encode document: {0}")]
    Encode(String),

    #[error("server failed to render document: {0}")]
    Render(#[from] GenerationError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}
