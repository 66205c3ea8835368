/**
 * Error kinds surfaced by the engine.
 *
 * Every error is fatal to the operation in progress; there are no retries.
 * The only silent recovery path lives in `GridReader::interpolate`, which
 * returns a caller-supplied fill value on an out-of-grid query instead of
 * erroring.
 */
#[derive(thiserror::Error, Debug)]
pub enum Error {

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unable to find the description of the spatial coordinates")]
    NoSpatialAxes,

    #[error("no data loaded into memory")]
    NoDataLoaded,

    #[error("date {0} is out of range of the loaded time series")]
    DateOutOfRange(f64),

    #[error("{0}")]
    UnitError(String),

    #[error("syntax error line {line}: {text}")]
    SyntaxError { line: usize, text: String },
}

pub type Result<T> = std::result::Result<T, Error>;
