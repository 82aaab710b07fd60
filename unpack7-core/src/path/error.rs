use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    Absolute,
    ParentTraversal,
}

impl std::error::Error for PathError {}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PathError {
    pub fn as_str(&self) -> &str {
        match self {
            PathError::Absolute => "entry name is an absolute path",
            PathError::ParentTraversal => "entry name escapes the output directory",
        }
    }
}
