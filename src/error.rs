use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlPoolError {
    #[error("Could not find {0} crawler")]
    UnknownCrawler(String),

    #[error("Failed to resolve worker program: {0}")]
    WorkerProgram(String),

    #[error("Failed to spawn worker {0}: {1}")]
    WorkerSpawn(String, String),

    #[error("Signal handler error: {0}")]
    SignalHandler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CrawlPoolError>;
