//! Error types for the Psil interpreter

use thiserror::Error;

/// Psil interpreter errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Reader errors
    /// Syntax error encountered while reading source text
    ///
    /// **Triggered by:** unbalanced parentheses, bad string escapes, unclassifiable tokens
    /// **Example:** `(define x 1` (missing closing parenthesis)
    #[error("Syntax error at line {line}, column {col}: {message}")]
    SyntaxError {
        /// Line number where error occurred (1-indexed)
        line: usize,
        /// Column number where error occurred (1-indexed)
        col: usize,
        /// Error description
        message: String,
        /// True when the input simply ended too early (a REPL may read more)
        incomplete: bool,
    },

    /// Special form used with the wrong shape
    ///
    /// **Example:** `(quote)`, `(lambda 5 x)`, `(define 3 4)`
    #[error("Malformed {form}: {reason}")]
    MalformedForm {
        /// Special form keyword
        form: String,
        /// What was wrong with it
        reason: String,
    },

    // Runtime errors
    /// Reference to a symbol bound in no reachable frame
    ///
    /// **Triggered by:** using a name before defining it
    /// **Example:** `(+ undefined-thing 1)`
    #[error("Undefined symbol: {name}")]
    UnboundSymbol {
        /// Symbol name
        name: String,
    },

    /// Wrong number of arguments at application
    #[error("Arity error: {name} expected {expected} arguments, got {got}")]
    ArityError {
        /// Name of the procedure (or `lambda` when anonymous)
        name: String,
        /// Human readable description of the accepted counts
        expected: String,
        /// Number of arguments actually supplied
        got: usize,
    },

    /// Type mismatch error
    ///
    /// **Triggered by:** arithmetic on non-numbers, `car` of a non-pair
    /// **Example:** `(+ "hello" 5)`
    #[error("Type error: expected {expected}, got {got}")]
    TypeError {
        /// Expected type
        expected: String,
        /// Actual type
        got: String,
    },

    /// Attempt to call a non-callable value
    #[error("Value is not callable: {type_name}")]
    NotCallable {
        /// Type of non-callable value
        type_name: String,
    },

    /// Division by zero error
    ///
    /// **Triggered by:** `/`, `//` or `%` with a zero divisor (integer or float)
    #[error("Division by zero")]
    DivisionByZero,

    /// Integer arithmetic overflowed 64 bits
    #[error("Integer overflow in {op}")]
    Overflow {
        /// Operator that overflowed
        op: String,
    },

    // Resource errors
    /// Evaluation nested deeper than the configured limit
    ///
    /// **Triggered by:** runaway non-tail recursion or recursive macro expansion
    #[error("Evaluation depth exceeded (limit: {limit})")]
    ResourceExhausted {
        /// Configured maximum depth
        limit: usize,
    },

    // User-defined
    /// Raised by the `error` builtin
    #[error("User error: {0}")]
    UserError(String),

    /// Failure reported by a host-provided function
    #[error("Host function {function} failed: {message}")]
    Host {
        /// Host function name
        function: String,
        /// Failure description
        message: String,
    },
}

/// The error kinds surfaced to embedders, independent of message details
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed source or special form
    Syntax,
    /// Symbol not found in any reachable frame
    UnboundSymbol,
    /// Wrong argument count at application
    Arity,
    /// Operation applied to a value of the wrong variant
    Type,
    /// Division by zero
    Division,
    /// Integer result outside 64 bits
    Overflow,
    /// Evaluation depth exceeded
    Resource,
    /// Raised explicitly by interpreted code
    User,
    /// Raised by a host function
    Host,
}

impl ErrorKind {
    /// Name used by the regression corpus (`!! Kind`)
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::UnboundSymbol => "UnboundSymbolError",
            ErrorKind::Arity => "ArityError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Division => "DivisionError",
            ErrorKind::Overflow => "OverflowError",
            ErrorKind::Resource => "ResourceError",
            ErrorKind::User => "UserError",
            ErrorKind::Host => "HostError",
        }
    }
}

impl Error {
    /// Create a syntax error at a source position
    pub fn syntax(line: usize, col: usize, message: impl Into<String>) -> Self {
        Error::SyntaxError {
            line,
            col,
            message: message.into(),
            incomplete: false,
        }
    }

    /// Create a syntax error for input that ended too early
    pub fn incomplete(line: usize, col: usize, message: impl Into<String>) -> Self {
        Error::SyntaxError {
            line,
            col,
            message: message.into(),
            incomplete: true,
        }
    }

    /// Create a malformed special form error
    pub fn malformed(form: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedForm {
            form: form.into(),
            reason: reason.into(),
        }
    }

    /// Create a type error
    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::TypeError {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create a host function error
    pub fn host(function: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Host {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SyntaxError { .. } | Error::MalformedForm { .. } => ErrorKind::Syntax,
            Error::UnboundSymbol { .. } => ErrorKind::UnboundSymbol,
            Error::ArityError { .. } => ErrorKind::Arity,
            Error::TypeError { .. } | Error::NotCallable { .. } => ErrorKind::Type,
            Error::DivisionByZero => ErrorKind::Division,
            Error::Overflow { .. } => ErrorKind::Overflow,
            Error::ResourceExhausted { .. } => ErrorKind::Resource,
            Error::UserError(_) => ErrorKind::User,
            Error::Host { .. } => ErrorKind::Host,
        }
    }

    /// True when the reader ran out of input in the middle of a form
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Error::SyntaxError {
                incomplete: true,
                ..
            }
        )
    }
}

/// Result type for Psil operations
pub type Result<T> = std::result::Result<T, Error>;
