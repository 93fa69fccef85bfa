//! Call-stack inspection
//!
//! Migration code often runs inside the same binary as the production
//! service, so the classifier can look for migration-shaped frames on the
//! current stack. Capturing a full stack is slow; it only happens during the
//! single classification pass, and hosts without usable symbols can plug in
//! [`NoStack`].

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::Debug;

/// One frame of a captured call stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Last path segment (the method / function name)
    pub function: String,
    /// Segment before the function (type or module), if any
    pub declaring_type: Option<String>,
    /// Full demangled symbol
    pub path: String,
}

impl StackFrame {
    /// Parse a demangled symbol path such as `app::migrations::Seed::up`
    ///
    /// Closure markers, symbol hashes and generic arguments are ignored.
    /// Returns `None` when nothing resembling a name remains.
    #[must_use]
    pub fn parse(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        let mut segments: Vec<String> = split_path(symbol)
            .into_iter()
            .filter(|s| !s.is_empty() && !is_closure(s) && !is_symbol_hash(s))
            .map(|s| normalize_segment(&s))
            .filter(|s| !s.is_empty())
            .collect();

        let function = segments.pop()?;
        let declaring_type = segments.pop();
        Some(Self {
            function,
            declaring_type,
            path: symbol.to_string(),
        })
    }

    /// Crate the frame's symbol belongs to (self type for trait impls)
    #[must_use]
    pub fn crate_name(&self) -> &str {
        let path = self.path.trim_start_matches('<');
        path.split("::").next().unwrap_or(path)
    }

    /// Frame of this crate or the standard library
    #[must_use]
    pub fn is_internal(&self) -> bool {
        INTERNAL_CRATES.contains(&self.crate_name())
    }
}

/// Source of call-stack frames
pub trait StackProbe: Debug + Send + Sync {
    /// Capture the current stack; `None` if it cannot be captured
    fn capture(&self) -> Option<Vec<StackFrame>>;
}

/// Crates whose frames never count as caller frames: this crate (the
/// classifier's own capture and signal dispatch), the standard library and
/// the lazy-initialisation cell the classification runs inside.
const INTERNAL_CRATES: [&str; 5] = ["guardrail_context", "std", "core", "alloc", "once_cell"];

/// Captures the real stack through `std::backtrace`
///
/// Frames belonging to this crate or the standard library are dropped, so
/// only the embedding application's frames are inspected.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostStack;

impl StackProbe for HostStack {
    fn capture(&self) -> Option<Vec<StackFrame>> {
        let backtrace = Backtrace::force_capture();
        if backtrace.status() != BacktraceStatus::Captured {
            tracing::debug!("call stack unavailable: {:?}", backtrace.status());
            return None;
        }
        let frames: Vec<_> = parse_backtrace(&backtrace.to_string())
            .into_iter()
            .filter(|f| !f.is_internal())
            .collect();
        tracing::trace!(frames = frames.len(), "call stack captured");
        Some(frames)
    }
}

/// Stack probe for hosts where introspection is unavailable or too costly
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStack;

impl StackProbe for NoStack {
    fn capture(&self) -> Option<Vec<StackFrame>> {
        None
    }
}

/// Stack probe returning injected frames
#[derive(Debug, Clone, Default)]
pub struct StaticStack {
    frames: Vec<StackFrame>,
}

impl StaticStack {
    /// Build from demangled symbol paths, innermost first
    #[must_use]
    pub fn from_symbols(symbols: &[&str]) -> Self {
        Self {
            frames: symbols.iter().filter_map(|s| StackFrame::parse(s)).collect(),
        }
    }
}

impl StackProbe for StaticStack {
    fn capture(&self) -> Option<Vec<StackFrame>> {
        Some(self.frames.clone())
    }
}

/// Parse the rendered form of a `std::backtrace::Backtrace`
///
/// Frame lines look like `  12: crate::module::function`; the `at file:line`
/// lines that follow them are skipped.
#[must_use]
pub fn parse_backtrace(rendered: &str) -> Vec<StackFrame> {
    rendered
        .lines()
        .filter_map(|line| {
            let (index, symbol) = line.trim_start().split_once(": ")?;
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            StackFrame::parse(symbol)
        })
        .collect()
}

/// Split on `::` outside of generic brackets
fn split_path(symbol: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = symbol.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ':' if depth == 0 && chars.peek() == Some(&':') => {
                chars.next();
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

fn is_closure(segment: &str) -> bool {
    segment.starts_with("{{") && segment.ends_with("}}")
}

fn is_symbol_hash(segment: &str) -> bool {
    segment.len() == 17
        && segment.starts_with('h')
        && segment[1..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// `<app::Seed as Migration>` → `Seed`, `Vec<T>` → `Vec`
fn normalize_segment(segment: &str) -> String {
    let trimmed = segment.trim();
    if let Some(inner) = trimmed.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        let self_type = inner.split(" as ").next().unwrap_or(inner);
        let last = split_path(self_type).pop().unwrap_or_default();
        return normalize_segment(&last);
    }
    match trimmed.find('<') {
        Some(pos) => trimmed[..pos].to_string(),
        None => trimmed.to_string(),
    }
}
