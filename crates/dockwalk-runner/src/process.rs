use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start `{program}`; is it installed and on PATH?")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("command failed ({status}): {invocation}\n{stderr}")]
    Failed {
        invocation: String,
        status: String,
        stderr: String,
    },

    #[error("output of `{invocation}` was not valid UTF-8")]
    InvalidUtf8 {
        invocation: String,
        source: std::string::FromUtf8Error,
    },

    #[error("failed to write to stdin of `{program}`")]
    StdinWrite {
        program: String,
        source: std::io::Error,
    },

    #[error("I/O error while running `{invocation}`: {context}")]
    Io {
        invocation: String,
        context: &'static str,
        source: std::io::Error,
    },

    #[error("`{invocation}` timed out after {after:?}")]
    TimedOut { invocation: String, after: Duration },
}
