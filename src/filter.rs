//! Message filters, decide which pushes a [LiveFeed](crate::feed::LiveFeed) counts.

use crate::ws::Message;

/// Type implements this trait can check if a message is wanted.
pub trait Filter: Send + Sync {
    /// true if message is wanted, otherwise false.
    fn filter_message(&self, message: &Message) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&Message) -> bool + Send + Sync,
{
    fn filter_message(&self, message: &Message) -> bool {
        self(message)
    }
}

/// Negative wrapper of a filter.
#[derive(Debug, Copy, Clone)]
pub struct Not<F> {
    filter: F,
}

impl<F: Filter> Filter for Not<F> {
    fn filter_message(&self, message: &Message) -> bool {
        !self.filter.filter_message(message)
    }
}

/// If and only if a and b both pass, this filter will pass.
#[derive(Debug, Copy, Clone)]
pub struct And<FA, FB> {
    a: FA,
    b: FB,
}

impl<FA: Filter, FB: Filter> Filter for And<FA, FB> {
    fn filter_message(&self, message: &Message) -> bool {
        self.a.filter_message(message) && self.b.filter_message(message)
    }
}

/// If a or b pass, this filter will pass.
#[derive(Debug, Copy, Clone)]
pub struct Or<FA, FB> {
    a: FA,
    b: FB,
}

impl<FA: Filter, FB: Filter> Filter for Or<FA, FB> {
    fn filter_message(&self, message: &Message) -> bool {
        self.a.filter_message(message) || self.b.filter_message(message)
    }
}

/// Filter combinator.
pub trait FilterExt
where
    Self: Sized,
{
    /// Invert a filter.
    fn not(self) -> Not<Self> {
        Not { filter: self }
    }

    /// Return a new filter that pass a message only if self and other both pass it.
    fn and<F>(self, other: F) -> And<Self, F> {
        And { a: self, b: other }
    }

    /// Return a new filter that pass a message if self or other pass it.
    fn or<F>(self, other: F) -> Or<Self, F> {
        Or { a: self, b: other }
    }
}

impl<T> FilterExt for T where T: Filter {}

/// Filter that pass messages whose `type` field equals `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kind {
    kind: String,
}

impl Filter for Kind {
    fn filter_message(&self, message: &Message) -> bool {
        message.kind() == self.kind
    }
}

/// Create a filter that pass messages of type `kind`.
pub fn kind<S: Into<String>>(kind: S) -> Kind {
    Kind { kind: kind.into() }
}

/// Filter that pass new-item pushes, `new_event` and `new_activity`.
pub fn new_item() -> Or<Kind, Kind> {
    kind("new_event").or(kind("new_activity"))
}

/// Filter that will pass all messages.
#[derive(Debug, Copy, Clone)]
pub struct All;

impl Filter for All {
    fn filter_message(&self, _message: &Message) -> bool {
        true
    }
}

/// Create a filter that pass all messages.
pub fn all() -> All {
    All
}

/// Filter that will reject all messages.
#[derive(Debug, Copy, Clone)]
pub struct None;

impl Filter for None {
    fn filter_message(&self, _message: &Message) -> bool {
        false
    }
}

/// Create a filter that will reject all messages.
pub fn none() -> None {
    None
}
