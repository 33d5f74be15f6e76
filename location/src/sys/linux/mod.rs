//! Linux location implementation using the GeoClue2 D-Bus service.
//!
//! GeoClue has no notion of separate GPS and network providers. It reports
//! the best accuracy it can currently deliver, which is mapped onto the two
//! providers: any level enables the network provider, exact level enables GPS.
//! Each update subscription owns a started GeoClue client on a dedicated
//! thread and forwards its `LocationUpdated` signals.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use async_channel::Sender;
use futures::StreamExt;
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, Either};
use zbus::{Connection, Proxy};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::{
    FusedLocationProvider, LocationError, LocationRequest, LocationResult, LocationSample,
    Provider, ProviderStatus, SettingsClient, SettingsOutcome, SubscriptionId,
};

const GEOCLUE: &str = "org.freedesktop.GeoClue2";
const MANAGER_PATH: &str = "/org/freedesktop/GeoClue2/Manager";
const MANAGER_INTERFACE: &str = "org.freedesktop.GeoClue2.Manager";
const CLIENT_INTERFACE: &str = "org.freedesktop.GeoClue2.Client";
const LOCATION_INTERFACE: &str = "org.freedesktop.GeoClue2.Location";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// `GCLUE_ACCURACY_LEVEL_EXACT`.
const ACCURACY_EXACT: u32 = 8;

fn platform(context: &str, err: impl std::fmt::Display) -> LocationError {
    LocationError::Platform {
        message: format!("{context}: {err}"),
    }
}

struct Stream {
    stop: oneshot::Sender<()>,
}

impl Stream {
    /// Ends the update thread, which then stops its GeoClue client.
    fn stop(self) {
        let _ = self.stop.send(());
    }
}

/// Location backend talking to GeoClue2 on the system bus.
pub struct GeoClueLocation {
    desktop_id: Arc<str>,
    next_id: AtomicU64,
    streams: Mutex<HashMap<SubscriptionId, Stream>>,
}

impl std::fmt::Debug for GeoClueLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoClueLocation")
            .field("desktop_id", &self.desktop_id)
            .finish_non_exhaustive()
    }
}

impl GeoClueLocation {
    /// Creates a backend that identifies itself to GeoClue as `desktop_id`.
    #[must_use]
    pub fn new(desktop_id: impl Into<String>) -> Self {
        Self {
            desktop_id: desktop_id.into().into(),
            next_id: AtomicU64::new(1),
            streams: Mutex::new(HashMap::new()),
        }
    }

    fn available_accuracy(&self) -> LocationResult<u32> {
        futures::executor::block_on(available_accuracy())
    }
}

async fn available_accuracy() -> LocationResult<u32> {
    let connection = Connection::system()
        .await
        .map_err(|e| platform("D-Bus connection failed", e))?;

    let level: OwnedValue = connection
        .call_method(
            Some(GEOCLUE),
            MANAGER_PATH,
            Some(PROPERTIES_INTERFACE),
            "Get",
            &(MANAGER_INTERFACE, "AvailableAccuracyLevel"),
        )
        .await
        .map_err(|e| platform("GeoClue2 not available", e))?
        .body()
        .deserialize()
        .map_err(|e| platform("Failed to parse accuracy level", e))?;

    u32::try_from(level).map_err(|e| platform("Unexpected accuracy level", e))
}

async fn fetch_location(desktop_id: &str) -> LocationResult<Option<LocationSample>> {
    let connection = Connection::system()
        .await
        .map_err(|e| platform("D-Bus connection failed", e))?;

    let client_path = create_client(&connection, desktop_id).await?;
    call_client(&connection, &client_path, "Start")
        .await
        .map_err(|e| platform("Failed to start GeoClue client", e))?;

    let result = read_client_location(&connection, &client_path).await;

    if let Err(err) = call_client(&connection, &client_path, "Stop").await {
        log::debug!("failed to stop GeoClue client: {err}");
    }
    result
}

/// Asks the manager for a client and identifies it as `desktop_id`.
async fn create_client(
    connection: &Connection,
    desktop_id: &str,
) -> LocationResult<OwnedObjectPath> {
    let client_path: OwnedObjectPath = connection
        .call_method(
            Some(GEOCLUE),
            MANAGER_PATH,
            Some(MANAGER_INTERFACE),
            "GetClient",
            &(),
        )
        .await
        .map_err(|e| platform("GeoClue2 not available", e))?
        .body()
        .deserialize()
        .map_err(|e| platform("Failed to parse response", e))?;

    set_client_property(connection, &client_path, "DesktopId", Value::from(desktop_id))
        .await
        .map_err(|e| platform("Failed to set desktop ID", e))?;
    Ok(client_path)
}

async fn set_client_property(
    connection: &Connection,
    client_path: &OwnedObjectPath,
    name: &str,
    value: Value<'_>,
) -> zbus::Result<()> {
    connection
        .call_method(
            Some(GEOCLUE),
            client_path.as_str(),
            Some(PROPERTIES_INTERFACE),
            "Set",
            &(CLIENT_INTERFACE, name, value),
        )
        .await
        .map(drop)
}

async fn call_client(
    connection: &Connection,
    client_path: &OwnedObjectPath,
    method: &str,
) -> zbus::Result<()> {
    connection
        .call_method(
            Some(GEOCLUE),
            client_path.as_str(),
            Some(CLIENT_INTERFACE),
            method,
            &(),
        )
        .await
        .map(drop)
}

async fn read_client_location(
    connection: &Connection,
    client_path: &OwnedObjectPath,
) -> LocationResult<Option<LocationSample>> {
    let location_reply: OwnedValue = connection
        .call_method(
            Some(GEOCLUE),
            client_path.as_str(),
            Some(PROPERTIES_INTERFACE),
            "Get",
            &(CLIENT_INTERFACE, "Location"),
        )
        .await
        .map_err(|e| platform("Failed to get location", e))?
        .body()
        .deserialize()
        .map_err(|e| platform("Failed to parse location path", e))?;

    let location_path = OwnedObjectPath::try_from(location_reply)
        .map_err(|e| platform("Unexpected location path", e))?;

    match fix_path(location_path) {
        Some(path) => read_location(connection, &path).await.map(Some),
        None => Ok(None),
    }
}

/// GeoClue reports `/` until the client has its first fix.
fn fix_path(path: OwnedObjectPath) -> Option<OwnedObjectPath> {
    (path.as_str() != "/").then_some(path)
}

async fn read_location(
    connection: &Connection,
    location_path: &OwnedObjectPath,
) -> LocationResult<LocationSample> {
    let get_property = |prop: &'static str| async move {
        let reply: OwnedValue = connection
            .call_method(
                Some(GEOCLUE),
                location_path.as_str(),
                Some(PROPERTIES_INTERFACE),
                "Get",
                &(LOCATION_INTERFACE, prop),
            )
            .await
            .map_err(|e| platform(prop, e))?
            .body()
            .deserialize()
            .map_err(|e| platform(prop, e))?;
        f64::try_from(reply).map_err(|e| platform(prop, e))
    };

    let latitude = get_property("Latitude").await?;
    let longitude = get_property("Longitude").await?;
    Ok(LocationSample::new(latitude, longitude))
}

/// Minimum seconds between updates GeoClue should send for `request`.
fn time_threshold(request: &LocationRequest) -> u32 {
    u32::try_from(request.fastest_interval_ms / 1000).unwrap_or(u32::MAX)
}

/// Keeps one started client alive and forwards every `LocationUpdated`
/// signal to `sink` until `stopped` fires or the sink is closed.
async fn stream_updates(
    desktop_id: &str,
    time_threshold: u32,
    sink: &Sender<LocationSample>,
    stopped: oneshot::Receiver<()>,
) -> LocationResult<()> {
    let connection = Connection::system()
        .await
        .map_err(|e| platform("D-Bus connection failed", e))?;

    let client_path = create_client(&connection, desktop_id).await?;
    set_client_property(
        &connection,
        &client_path,
        "TimeThreshold",
        Value::from(time_threshold),
    )
    .await
    .map_err(|e| platform("Failed to set time threshold", e))?;

    let result = forward_updates(&connection, &client_path, sink, stopped).await;

    if let Err(err) = call_client(&connection, &client_path, "Stop").await {
        log::debug!("failed to stop GeoClue client: {err}");
    }
    result
}

async fn forward_updates(
    connection: &Connection,
    client_path: &OwnedObjectPath,
    sink: &Sender<LocationSample>,
    mut stopped: oneshot::Receiver<()>,
) -> LocationResult<()> {
    let client = Proxy::new(connection, GEOCLUE, client_path.as_str(), CLIENT_INTERFACE)
        .await
        .map_err(|e| platform("Failed to create client proxy", e))?;
    // Subscribe before starting so the first fix is not missed
    let mut updates = pin!(
        client
            .receive_signal("LocationUpdated")
            .await
            .map_err(|e| platform("Failed to subscribe to LocationUpdated", e))?
    );

    call_client(connection, client_path, "Start")
        .await
        .map_err(|e| platform("Failed to start GeoClue client", e))?;

    loop {
        let message = match future::select(updates.next(), &mut stopped).await {
            Either::Left((Some(message), _)) => message,
            Either::Left((None, _)) | Either::Right(_) => return Ok(()),
        };

        let (_, new): (OwnedObjectPath, OwnedObjectPath) = message
            .body()
            .deserialize()
            .map_err(|e| platform("Failed to parse LocationUpdated", e))?;
        let Some(path) = fix_path(new) else {
            continue;
        };

        match read_location(connection, &path).await {
            Ok(sample) => {
                if sink.send(sample).await.is_err() {
                    return Ok(());
                }
            }
            Err(err) => log::warn!("GeoClue update failed: {err}"),
        }
    }
}

impl ProviderStatus for GeoClueLocation {
    fn is_provider_enabled(&self, provider: Provider) -> bool {
        match self.available_accuracy() {
            Ok(level) => match provider {
                Provider::Gps => level >= ACCURACY_EXACT,
                Provider::Network => level > 0,
            },
            Err(err) => {
                log::warn!("treating {provider:?} as disabled: {err}");
                false
            }
        }
    }
}

impl FusedLocationProvider for GeoClueLocation {
    fn last_location(&self) -> BoxFuture<'static, LocationResult<Option<LocationSample>>> {
        let desktop_id = self.desktop_id.clone();
        Box::pin(async move { fetch_location(&desktop_id).await })
    }

    fn request_updates(
        &self,
        request: &LocationRequest,
        sink: Sender<LocationSample>,
    ) -> LocationResult<SubscriptionId> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (stop, stopped) = oneshot::channel();
        let threshold = time_threshold(request);
        let desktop_id = self.desktop_id.clone();

        thread::Builder::new()
            .name(format!("geoclue-updates-{}", id.0))
            .spawn(move || {
                let updates = stream_updates(&desktop_id, threshold, &sink, stopped);
                if let Err(err) = futures::executor::block_on(updates) {
                    log::warn!("GeoClue updates {id:?} ended: {err}");
                }
            })
            .map_err(|e| platform("Failed to spawn update thread", e))?;

        self.streams
            .lock()
            .map_err(|e| platform("stream registry poisoned", e))?
            .insert(id, Stream { stop });
        Ok(id)
    }

    fn remove_updates(&self, id: SubscriptionId) {
        let stream = match self.streams.lock() {
            Ok(mut streams) => streams.remove(&id),
            Err(err) => {
                log::error!("failed to remove GeoClue updates {id:?}: {err}");
                return;
            }
        };

        if let Some(stream) = stream {
            stream.stop();
        }
    }
}

impl SettingsClient for GeoClueLocation {
    fn check_settings(&self, _request: &LocationRequest) -> BoxFuture<'static, SettingsOutcome> {
        Box::pin(async {
            match available_accuracy().await {
                Ok(level) if level > 0 => SettingsOutcome::Satisfied,
                Ok(_) => SettingsOutcome::UnresolvableError,
                Err(err) => {
                    log::warn!("GeoClue settings check failed: {err}");
                    SettingsOutcome::UnresolvableError
                }
            }
        })
    }

    fn start_resolution(&self, _request_code: i32) -> LocationResult<()> {
        // Location is toggled in the desktop's privacy settings, not from here
        Err(LocationError::NotSupported)
    }
}

impl Drop for GeoClueLocation {
    fn drop(&mut self) {
        if let Ok(mut streams) = self.streams.lock() {
            for (_, stream) in streams.drain() {
                stream.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_path_means_no_fix_yet() {
        let root = OwnedObjectPath::try_from("/").unwrap();
        assert_eq!(fix_path(root), None);

        let fix = OwnedObjectPath::try_from("/org/freedesktop/GeoClue2/Location/1").unwrap();
        assert_eq!(fix_path(fix.clone()), Some(fix));
    }

    #[test]
    fn time_threshold_follows_the_fastest_interval() {
        assert_eq!(time_threshold(&LocationRequest::default()), 5);
        assert_eq!(time_threshold(&LocationRequest::with_interval(1_000)), 0);
    }

    #[test]
    fn removed_updates_close_their_sink() {
        let location = GeoClueLocation::new("locator-tests");
        let (sink, samples) = async_channel::unbounded();
        let id = location
            .request_updates(&LocationRequest::default(), sink)
            .unwrap();

        location.remove_updates(id);
        assert!(location.streams.lock().unwrap().is_empty());
        while samples.recv_blocking().is_ok() {}
        assert!(samples.is_closed());
    }
}
