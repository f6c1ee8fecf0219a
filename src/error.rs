use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("html parse error: {0}")]
    HtmlParse(String),
    #[error("selector not found: {0}")]
    SelectorNotFound(String),
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
    /// The handle points at a node that has been disposed.
    #[error("stale node handle: {0}")]
    StaleNode(String),
    #[error("node is not an element: {0}")]
    NotAnElement(String),
    #[error("hierarchy request error: {0}")]
    HierarchyRequest(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("log export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, Error>;
