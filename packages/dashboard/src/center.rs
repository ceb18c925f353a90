//! Shared, observable center of interest.

use std::sync::Arc;

use outbreak_watch_cluster::map::ClusterClickCallback;
use outbreak_watch_surveillance_models::Coordinates;
use tokio::sync::watch;

/// Handle to the point the nearby queries are scoped to.
///
/// Clones share the same value. Every write notifies subscribers, even
/// when the new value equals the old one.
#[derive(Debug, Clone)]
pub struct CenterOfInterest {
    tx: Arc<watch::Sender<Option<Coordinates>>>,
}

impl CenterOfInterest {
    /// Creates a handle holding `initial`.
    #[must_use]
    pub fn new(initial: Option<Coordinates>) -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(initial)),
        }
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> Option<Coordinates> {
        *self.tx.borrow()
    }

    /// Replaces the center with `(lat, lon)`.
    pub fn set(&self, lat: f64, lon: f64) {
        self.set_coordinates(Coordinates::new(lat, lon));
    }

    /// Replaces the center with `coordinates`.
    pub fn set_coordinates(&self, coordinates: Coordinates) {
        log::info!(
            "Center of interest set to {:.4}, {:.4}",
            coordinates.lat,
            coordinates.lon
        );
        self.tx.send_replace(Some(coordinates));
    }

    /// Clears the center, disabling the nearby queries.
    pub fn clear(&self) {
        log::info!("Center of interest cleared");
        self.tx.send_replace(None);
    }

    /// Receiver that sees every later write.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Coordinates>> {
        self.tx.subscribe()
    }

    /// Callback for [`outbreak_watch_cluster::map::ClusterMap`] that moves
    /// the center to the clicked cluster.
    #[must_use]
    pub fn click_callback(&self) -> ClusterClickCallback {
        let center = self.clone();
        Arc::new(move |coordinates| center.set_coordinates(coordinates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_value() {
        let a = CenterOfInterest::new(None);
        let b = a.clone();
        a.set(27.5, 95.0);
        assert_eq!(b.get(), Some(Coordinates::new(27.5, 95.0)));

        b.clear();
        assert_eq!(a.get(), None);
    }

    #[test]
    fn repeated_value_still_notifies() {
        let center = CenterOfInterest::new(Some(Coordinates::new(27.5, 95.0)));
        let mut rx = center.subscribe();
        assert!(!rx.has_changed().unwrap());

        center.set(27.5, 95.0);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn click_callback_sets_center() {
        let center = CenterOfInterest::new(None);
        let callback = center.click_callback();
        callback(Coordinates::new(26.1, 91.7));
        assert_eq!(center.get(), Some(Coordinates::new(26.1, 91.7)));
    }
}
