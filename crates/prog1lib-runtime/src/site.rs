//! Call-site capture.
//!
//! A [`Site`] is the `(file, function, line)` triple attached to every tracked
//! allocation and echoed verbatim in leak reports and fatal diagnostics. The
//! [`site!`](crate::site) macro captures it at the expansion point; tests build
//! synthetic sites with [`Site::new`].

use std::fmt;

/// Source location of an allocating, reallocating or checking call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Site {
    /// Source file as reported by `file!()`.
    pub file: &'static str,
    /// Name of the enclosing function.
    pub function: &'static str,
    /// Line number as reported by `line!()`.
    pub line: u32,
}

impl Site {
    #[must_use]
    pub const fn new(file: &'static str, function: &'static str, line: u32) -> Self {
        Self {
            file,
            function,
            line,
        }
    }

    /// Site used when the caller's location is not known.
    #[must_use]
    pub const fn unknown() -> Self {
        Self::new("<unknown>", "<unknown>", 0)
    }

    /// Location prefix shared by every diagnostic: `<file>, line <line>`.
    #[must_use]
    pub fn location(&self) -> Location<'_> {
        Location(self)
    }
}

/// Display adapter rendering `<file>, line <line>`.
#[derive(Debug, Clone, Copy)]
pub struct Location<'a>(&'a Site);

impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, line {}", self.0.file, self.0.line)
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location(), self.function)
    }
}

/// Reduce a `type_name` path of a marker fn to the bare enclosing function name.
///
/// `my_crate::module::parse::__here` becomes `parse`; closure frames
/// (`{{closure}}`) are skipped so a check inside a closure still names the
/// function that contains it.
#[doc(hidden)]
#[must_use]
pub fn short_function_name(path: &'static str) -> &'static str {
    let mut path = path.strip_suffix("::__here").unwrap_or(path);
    while let Some(outer) = path.strip_suffix("::{{closure}}") {
        path = outer;
    }
    match path.rfind("::") {
        Some(idx) => &path[idx + 2..],
        None => path,
    }
}

/// Name of the enclosing function, as a `&'static str`.
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __here() {}
        fn __name_of<T>(_: T) -> &'static str {
            ::core::any::type_name::<T>()
        }
        $crate::site::short_function_name(__name_of(__here))
    }};
}

/// Capture the current call site.
#[macro_export]
macro_rules! site {
    () => {
        $crate::Site::new(file!(), $crate::function_name!(), line!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_strips_module_path() {
        assert_eq!(
            short_function_name("prog1lib_runtime::site::tests::parse::__here"),
            "parse"
        );
        assert_eq!(short_function_name("main::__here"), "main");
        assert_eq!(short_function_name("plain"), "plain");
    }

    #[test]
    fn short_name_skips_closure_frames() {
        assert_eq!(
            short_function_name("app::work::{{closure}}::{{closure}}::__here"),
            "work"
        );
    }

    #[test]
    fn site_macro_names_enclosing_function() {
        fn allocate_buffer() -> Site {
            crate::site!()
        }
        let site = allocate_buffer();
        assert_eq!(site.function, "allocate_buffer");
        assert!(site.file.ends_with("site.rs"), "file was {}", site.file);
        assert!(site.line > 0);
    }

    #[test]
    fn display_forms() {
        let site = Site::new("main.c", "main", 12);
        assert_eq!(site.location().to_string(), "main.c, line 12");
        assert_eq!(site.to_string(), "main.c, line 12: main");
    }
}
