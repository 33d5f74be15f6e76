use std::fmt;
use std::sync::Arc;

use async_channel::{Receiver, unbounded};

use crate::{FusedLocationProvider, LocationRequest, LocationResult, LocationSample};

/// Platform identifier of an update stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// A live location-update stream.
///
/// The stream is removed from the provider when the subscription is dropped,
/// so holding at most one `Subscription` keeps at most one platform stream alive.
pub struct Subscription {
    provider: Arc<dyn FusedLocationProvider>,
    id: SubscriptionId,
    receiver: Receiver<LocationSample>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pending", &self.receiver.len())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Requests updates from `provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider refused the request.
    pub fn start(
        provider: Arc<dyn FusedLocationProvider>,
        request: &LocationRequest,
    ) -> LocationResult<Self> {
        let (sender, receiver) = unbounded();
        let id = provider.request_updates(request, sender)?;
        log::debug!("location updates started as {id:?} with {request:?}");

        Ok(Self {
            provider,
            id,
            receiver,
        })
    }

    /// Platform identifier of this stream.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// A handle on the sample stream that does not borrow the subscription.
    #[must_use]
    pub fn samples(&self) -> Receiver<LocationSample> {
        self.receiver.clone()
    }

    /// Waits for the next sample. Returns `None` once the provider dropped the stream.
    pub async fn next(&self) -> Option<LocationSample> {
        self.receiver.recv().await.ok()
    }

    /// Removes the stream from the provider.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        log::debug!("removing location updates {:?}", self.id);
        self.receiver.close();
        self.provider.remove_updates(self.id);
    }
}
