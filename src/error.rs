use std::fmt;

/// Errors produced anywhere between the password gate and the rendered page
///
/// Every variant is terminal for the current run: nothing is retried and the
/// user sees the message on the page.
#[derive(Debug)]
pub enum DashboardError {
    /// The candidate password did not match the configured secret
    Rejected,

    /// The gate could not be configured (empty secret, hashing failure)
    Gate(String),

    /// Upload mode is active but the session has no dataset yet
    NoUpload,

    /// The multipart upload itself could not be read
    Upload(String),

    /// The CSV is missing one or more of the required columns
    MissingColumns(Vec<String>),

    /// A data row contains a value that cannot be parsed for its column
    MalformedRow {
        line: usize,
        column: &'static str,
        value: String,
    },

    /// The CSV could not be read at all (bad quoting, invalid UTF-8)
    Csv(String),

    /// The input had a header but no usable data rows, or no header at all
    EmptyInput,

    /// The gender/year selection left no rows to aggregate
    EmptySelection,

    /// Remote fetch failed (connection, status code, body)
    Fetch(String),

    /// Chart drawing or PNG encoding failed
    Render(String),

    Io(std::io::Error),
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::Rejected => write!(f, "Incorrect password"),
            DashboardError::Gate(msg) => write!(f, "Password gate error: {}", msg),
            DashboardError::NoUpload => write!(f, "Please upload a CSV file to continue"),
            DashboardError::Upload(msg) => write!(f, "Could not read the uploaded file: {}", msg),
            DashboardError::MissingColumns(cols) => {
                write!(f, "Malformed input: missing column(s) {}", cols.join(", "))
            }
            DashboardError::MalformedRow {
                line,
                column,
                value,
            } => write!(
                f,
                "Malformed input: line {} has invalid {} value {:?}",
                line, column, value
            ),
            DashboardError::Csv(msg) => write!(f, "Malformed input: {}", msg),
            DashboardError::EmptyInput => write!(f, "Malformed input: no data rows found"),
            DashboardError::EmptySelection => {
                write!(f, "No records match the selected filters")
            }
            DashboardError::Fetch(msg) => write!(f, "Error loading data: {}", msg),
            DashboardError::Render(msg) => write!(f, "Error drawing charts: {}", msg),
            DashboardError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for DashboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DashboardError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(e: std::io::Error) -> Self {
        DashboardError::Io(e)
    }
}

impl From<csv::Error> for DashboardError {
    fn from(e: csv::Error) -> Self {
        DashboardError::Csv(e.to_string())
    }
}

#[cfg(feature = "web")]
impl From<reqwest::Error> for DashboardError {
    fn from(e: reqwest::Error) -> Self {
        DashboardError::Fetch(e.to_string())
    }
}

#[cfg(feature = "web")]
impl From<image::ImageError> for DashboardError {
    fn from(e: image::ImageError) -> Self {
        DashboardError::Render(e.to_string())
    }
}

#[cfg(feature = "web")]
impl<E: std::error::Error + Send + Sync> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for DashboardError
{
    fn from(e: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        DashboardError::Render(e.to_string())
    }
}

impl DashboardError {
    /// Whether the failure is the user's to fix (bad input, missing upload)
    /// rather than a fault on the serving side
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            DashboardError::Rejected
                | DashboardError::NoUpload
                | DashboardError::Upload(_)
                | DashboardError::MissingColumns(_)
                | DashboardError::MalformedRow { .. }
                | DashboardError::Csv(_)
                | DashboardError::EmptyInput
                | DashboardError::EmptySelection
        )
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
