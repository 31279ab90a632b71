//! Layer type and utilities.
//!
//! Layers are the abstraction of middleware: they wrap an inner service.
//! Same shape as [tower-layer](https://docs.rs/tower-layer/0.3.0/tower_layer/trait.Layer.html).

/// A layer that produces a layered service (middleware(inner service)).
pub trait Layer<S> {
    /// The service produced by the layer.
    type Service;

    /// Wrap the given service with the middleware, returning a new service.
    fn layer(&self, inner: S) -> Self::Service;

    /// Same as [`Layer::layer`] but consuming self, avoiding a clone.
    fn into_layer(self, inner: S) -> Self::Service
    where
        Self: Sized,
    {
        self.layer(inner)
    }
}
