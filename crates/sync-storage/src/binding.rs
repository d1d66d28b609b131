use std::sync::Arc;

/// A two-way projection of a value: a getter and a setter that can be handed to UI code.
///
/// Bindings are cheap to clone and do not own the value they project.
pub struct Binding<T> {
    get: Arc<dyn Fn() -> T + Send + Sync>,
    set: Arc<dyn Fn(T) + Send + Sync>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            get: self.get.clone(),
            set: self.set.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding").finish()
    }
}

impl<T: 'static> Binding<T> {
    /// Create a binding from a getter and a setter.
    pub fn new<G, S>(get: G, set: S) -> Self
    where
        G: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// A binding that always reads `value` and ignores writes.
    pub fn constant(value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        Self::new(move || value.clone(), |_| {})
    }

    /// Read the current value.
    pub fn get(&self) -> T {
        (self.get)()
    }

    /// Write a new value.
    pub fn set(&self, value: T) {
        (self.set)(value)
    }

    /// Project this binding through a pair of conversions.
    pub fn map<U, F, G>(self, to: F, from: G) -> Binding<U>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
        G: Fn(U) -> T + Send + Sync + 'static,
    {
        let Binding { get, set } = self;
        Binding::new(move || to(get()), move |value| set(from(value)))
    }
}
