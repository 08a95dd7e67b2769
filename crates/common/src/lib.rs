//! Shared error plumbing for the lodestone workspace.
//!
//! Crates define their own error type, implement [`FromMessage`] for it, and
//! invoke [`impl_context!`] next to their `Result` alias to get `.context()`
//! and `.with_context()` on `Result` and `Option` without pulling in a
//! catch-all error crate.

/// Conversion from a plain message into a crate's error type.
///
/// Required by the extension trait generated by [`impl_context!`].
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Generate a crate-local `Context` extension trait for the given error type.
///
/// Invoke in the module that defines the error type and its `Result<T>`
/// alias:
///
/// ```ignore
/// // in crates/mcp/src/error.rs
/// pub type Result<T> = std::result::Result<T, McpError>;
/// lodestone_common::impl_context!(McpError);
/// ```
#[macro_export]
macro_rules! impl_context {
    ($error:ty) => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;
            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                let ctx = context.into();
                self.map_err(|source| {
                    <$error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.map_err(|source| {
                    let ctx = f().into();
                    <$error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }
        }

        impl<T> Context<T> for Option<T> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.ok_or_else(|| {
                    <$error as $crate::FromMessage>::from_message(context.into())
                })
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.ok_or_else(|| <$error as $crate::FromMessage>::from_message(f().into()))
            }
        }
    };
}
