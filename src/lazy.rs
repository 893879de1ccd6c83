use std::{
    cell::{Cell, OnceCell},
    fmt,
    rc::Rc,
};

type Thunk<T> = Box<dyn FnOnce() -> T>;

struct Inner<T> {
    value: OnceCell<T>,
    thunk: Cell<Option<Thunk<T>>>,
}

/// A shared, memoized thunk. Clones observe the same realization, and the
/// thunk runs at most once.
pub struct Deferred<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Deferred<T> {
    pub fn new(thunk: impl FnOnce() -> T + 'static) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: OnceCell::new(),
                thunk: Cell::new(Some(Box::new(thunk))),
            }),
        }
    }

    /// A handle that is realized from the start.
    pub fn ready(value: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: OnceCell::from(value),
                thunk: Cell::new(None),
            }),
        }
    }

    /// Realize (once) and borrow the value.
    ///
    /// # Panics
    ///
    /// If the thunk forces its own handle.
    pub fn force(&self) -> &T {
        self.inner.value.get_or_init(|| match self.inner.thunk.take() {
            Some(thunk) => thunk(),
            None => panic!("deferred value forced re-entrantly"),
        })
    }

    /// The value if already realized; never runs the thunk.
    pub fn get(&self) -> Option<&T> {
        self.inner.value.get()
    }

    pub fn is_realized(&self) -> bool {
        self.inner.value.get().is_some()
    }

    /// Whether both handles share one realization.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => value.fmt(f),
            None => f.write_str("<deferred>"),
        }
    }
}

/// Comparison forces both sides.
impl<T: PartialEq> PartialEq for Deferred<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.force() == other.force()
    }
}

/// Wrap `thunk` so it runs on first use.
pub fn wrap<T>(thunk: impl FnOnce() -> T + 'static) -> Deferred<T> {
    Deferred::new(thunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thunk_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let d = wrap(move || {
            counter.set(counter.get() + 1);
            counter.get() * 10
        });

        assert!(!d.is_realized());
        assert_eq!(calls.get(), 0);
        assert_eq!(*d.force(), 10);
        assert_eq!(*d.force(), 10);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn clones_share_realization() {
        let d = wrap(|| String::from("compress"));
        let e = d.clone();

        assert!(d.ptr_eq(&e));
        e.force();
        assert_eq!(d.get().map(String::as_str), Some("compress"));
    }

    #[test]
    fn equality_forces_both_sides() {
        let a = wrap(|| 1);
        let b = wrap(|| 1);

        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        assert!(a.is_realized() && b.is_realized());
    }

    #[test]
    fn debug_does_not_force() {
        let d = wrap(|| 7);
        assert_eq!(format!("{d:?}"), "<deferred>");
        d.force();
        assert_eq!(format!("{d:?}"), "7");
    }

    #[test]
    fn ready_handles_need_no_thunk() {
        let d = Deferred::ready("x");
        assert!(d.is_realized());
        assert_eq!(*d.force(), "x");
    }
}
