//! Human-readable message rendering.

use std::fmt;

/// Terse or verbose text form of a message or message part.
///
/// `indent` prefixes every line after the first; nested entries are written
/// with `indent` plus two spaces.
pub trait Render {
    /// Write the rendering to `out`
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result;

    /// Rendering as an owned string
    fn rendered(&self, verbose: bool, indent: &str) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.render(&mut out, verbose, indent);
        out
    }
}

/// Write `body` as a braced block on its own line, closed at `indent`
pub(crate) fn render_block(out: &mut dyn fmt::Write, body: &dyn fmt::Display, indent: &str) -> fmt::Result {
    write!(out, " {{\n{}  {}\n{}}}", indent, body, indent)
}

/// Write `entries` one per line, each prefixed with `indent` plus two spaces
pub(crate) fn render_entries<'a, T, I>(
    out: &mut dyn fmt::Write,
    entries: I,
    verbose: bool,
    indent: &str,
) -> fmt::Result
where
    T: Render + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let nested = format!("{}  ", indent);
    for entry in entries {
        write!(out, "\n{}", nested)?;
        entry.render(out, verbose, &nested)?;
    }
    Ok(())
}
