//! Ad and announcement banner slots.
//!
//! Banners are not persisted: they are loaded from the server on startup and
//! edited only by admins through the optimistic protocol.

use shopfront_core::{Banner, BannerKind};
use tracing::{debug, warn};

use crate::api::{ApiError, BannerApi, BannerUpdate};
use crate::events::EventBus;
use crate::optimistic::{InFlight, Whole, optimistic};
use crate::store::Store;

/// One banner slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BannerSlot {
    pub banner: Option<Banner>,
    pub loading: bool,
}

impl BannerSlot {
    /// Whether a banner is configured and shown.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.banner.as_ref().is_some_and(|banner| banner.is_active)
    }
}

impl InFlight for BannerSlot {
    fn set_in_flight(&mut self, in_flight: bool) {
        self.loading = in_flight;
    }
}

/// Both banner slots.
#[derive(Debug)]
pub struct BannerStore {
    ad: Store<BannerSlot>,
    announcement: Store<BannerSlot>,
}

impl BannerStore {
    /// Empty slots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ad: Store::new("banner:ad", BannerSlot::default()),
            announcement: Store::new("banner:announcement", BannerSlot::default()),
        }
    }

    /// The observable store for one slot.
    #[must_use]
    pub const fn slot(&self, kind: BannerKind) -> &Store<BannerSlot> {
        match kind {
            BannerKind::Ad => &self.ad,
            BannerKind::Announcement => &self.announcement,
        }
    }

    /// Current banner of `kind`.
    #[must_use]
    pub fn get(&self, kind: BannerKind) -> Option<Banner> {
        self.slot(kind).read(|slot| slot.banner.clone())
    }

    /// Replace a slot's banner with the server's.
    pub fn set(&self, kind: BannerKind, banner: Option<Banner>) {
        self.slot(kind).update(|slot| slot.banner = banner);
    }

    /// Load both slots. A slot that fails to load keeps its previous value.
    pub async fn load(&self, api: &dyn BannerApi) {
        for kind in BannerKind::ALL {
            let store = self.slot(kind);
            store.update(|slot| slot.loading = true);
            match api.banner(kind).await {
                Ok(banner) => {
                    debug!(kind = %kind, present = banner.is_some(), "Loaded banner");
                    store.update(|slot| {
                        slot.banner = banner;
                        slot.loading = false;
                    });
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Failed to load banner");
                    store.update(|slot| slot.loading = false);
                }
            }
        }
    }

    /// Show or hide a banner through the optimistic protocol.
    ///
    /// # Errors
    ///
    /// Returns the API error after the slot has been restored. Toggling a
    /// slot with no banner is rejected without a request.
    pub async fn set_active(
        &self,
        api: &dyn BannerApi,
        bus: &EventBus,
        kind: BannerKind,
        active: bool,
    ) -> Result<(), ApiError> {
        let store = self.slot(kind);
        let Some(current) = store.read(|slot| slot.banner.clone()) else {
            return Err(ApiError::Rejected(format!("No {kind} banner configured")));
        };
        let update = BannerUpdate::visibility(&current, active);
        let action = format!("Update {kind} banner");

        optimistic(
            store,
            bus,
            &action,
            Whole,
            |slot| {
                if let Some(banner) = slot.banner.as_mut() {
                    banner.is_active = active;
                }
            },
            api.update_banner(kind, &update),
            |slot, canonical| slot.banner = Some(canonical),
        )
        .await
    }
}

impl Default for BannerStore {
    fn default() -> Self {
        Self::new()
    }
}
