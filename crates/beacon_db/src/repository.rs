//! Repository factory trait
//!
//! Store implementations are created from a shared [`crate::DbClient`] through a
//! factory so callers never depend on the concrete SQL types.

/// A trait for database repository factories
///
/// Generic over the repository type and the configuration it is built from.
pub trait RepositoryFactory<R, C> {
    /// Create a new repository instance
    fn create_repository(&self, config: C) -> R;
}
