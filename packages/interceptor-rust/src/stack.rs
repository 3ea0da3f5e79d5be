//! Minimal LIFO stack used for per-thread interception state.

/// Vec-backed last-in-first-out stack.
///
/// `pop` and `peek` on an empty stack return `None` instead of failing, so
/// that a protocol slip never aborts an interceptor callback.
#[derive(Debug, Clone, Default)]
pub struct LifoStack<T> {
    items: Vec<T>,
}

impl<T> LifoStack<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn peek_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_reverse_push_order() {
        let mut stack = LifoStack::new();
        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
    }

    #[test]
    fn empty_pop_and_peek_are_none() {
        let mut stack: LifoStack<u8> = LifoStack::default();
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.peek(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn peek_mut_edits_top_only() {
        let mut stack = LifoStack::new();
        stack.push(1);
        stack.push(2);
        if let Some(top) = stack.peek_mut() {
            *top = 20;
        }
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop(), Some(20));
        assert_eq!(stack.peek(), Some(&1));
    }
}
