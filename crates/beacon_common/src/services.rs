//! Service seams for external collaborators.
//!
//! The dispatch core only talks to the push provider and the stores through these
//! traits. Implementations are injected as `Arc<dyn Trait>` at construction time,
//! which lets tests substitute in-memory fakes.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

use crate::error::{DeliveryError, StoreError};
use crate::models::{
    DeviceToken, MulticastMessage, MulticastResponse, NotificationRequest, StatusUpdate,
    UserTokenSet,
};

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A multicast push-delivery provider.
pub trait DeliveryProvider: Send + Sync {
    /// Sends one message to every token in `message.tokens`.
    ///
    /// On `Ok`, `responses` must hold exactly one outcome per token, in token order.
    /// An `Err` means the batch as a whole failed and no outcome is known.
    fn send_multicast(&self, message: MulticastMessage)
        -> BoxFuture<'_, MulticastResponse, DeliveryError>;
}

/// Per-user device token sets.
pub trait TokenStore: Send + Sync {
    /// Ids of every user whose token set contains `token`.
    fn find_users_with_token<'a>(
        &'a self,
        token: &'a DeviceToken,
    ) -> BoxFuture<'a, Vec<String>, StoreError>;

    /// Removes `token` from each listed user and stamps `last_token_update`.
    ///
    /// Must be atomic: either every listed user is updated or none is. Users that no
    /// longer hold the token are left alone. Returns the number of users whose set
    /// actually changed.
    fn remove_token_from_users<'a>(
        &'a self,
        token: &'a DeviceToken,
        user_ids: &'a [String],
        stamped_at: DateTime<Utc>,
    ) -> BoxFuture<'a, usize, StoreError>;

    /// The user's token set, or `None` when the user is unknown.
    fn tokens_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Option<UserTokenSet>, StoreError>;

    /// Adds `token` to the user's set, creating the user record if needed.
    fn add_token<'a>(
        &'a self,
        user_id: &'a str,
        token: &'a DeviceToken,
    ) -> BoxFuture<'a, UserTokenSet, StoreError>;
}

/// Storage for notification request records.
pub trait RequestStore: Send + Sync {
    fn insert_request(
        &self,
        request: NotificationRequest,
    ) -> BoxFuture<'_, NotificationRequest, StoreError>;

    fn get_request<'a>(
        &'a self,
        request_id: &'a str,
    ) -> BoxFuture<'a, Option<NotificationRequest>, StoreError>;

    /// Merges `update` into the stored record. Fails with `NotFound` for unknown ids.
    fn apply_status_update<'a>(
        &'a self,
        request_id: &'a str,
        update: StatusUpdate,
    ) -> BoxFuture<'a, (), StoreError>;
}
