use fhub_derive::fhub_error;
use std::borrow::Cow;

#[fhub_error]
pub enum DemoError {
    #[error("Path not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn open(path: &str) -> Result<std::fs::File, DemoError> {
    std::fs::File::open(path).context(format!("Opening {path}"))
}

fn main() {
    let err = open("/definitely/not/here").unwrap_err();
    assert_eq!(err.context_message(), Some("Opening /definitely/not/here"));

    let internal: DemoError = "boom".into();
    assert!(internal.context_message().is_none());

    let missing: Result<(), DemoError> =
        Err(DemoError::NotFound { message: "a.txt".into(), context: None });
    let missing = missing.context("lookup").unwrap_err();
    assert_eq!(missing.to_string(), "Path not found (lookup): a.txt");
}
